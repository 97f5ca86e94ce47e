// region:    --- Imports
use crate::auction::model::{NewAuction, NewLot, NewProduct};
use crate::broadcast::{Broadcaster, TopicRegistry};
use crate::clock::Clock;
use crate::config::AuctionConfig;
use crate::purchase::commands::{handle_buy as command_handle_buy, BuyCommand, BuyError};
use crate::query;
use crate::store::{AuctionStore, StoreError};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

// endregion: --- Imports

// region:    --- App State

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AuctionStore>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub registry: Arc<TopicRegistry>,
    pub clock: Arc<dyn Clock>,
    pub config: AuctionConfig,
}

/// 저장소 오류를 HTTP 응답으로 변환
fn store_error_response(e: StoreError) -> axum::response::Response {
    match e {
        StoreError::NotFound => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "대상을 찾을 수 없습니다.", "code": "NOT_FOUND"})),
        )
            .into_response(),
        StoreError::Conflict(reason) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": reason, "code": "CONFLICT"})),
        )
            .into_response(),
        StoreError::Database(e) => {
            // 원문 오류는 서버 로그에만 남긴다
            error!("{:<12} --> 저장소 내부 오류: {}", "Handler", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "내부 저장소 오류가 발생했습니다.",
                    "code": "INTERNAL"
                })),
            )
                .into_response()
        }
    }
}

// endregion: --- App State

// region:    --- Command Handlers

/// 상품 등록 요청 처리
pub async fn handle_register_product(
    State(state): State<AppState>,
    Json(new_product): Json<NewProduct>,
) -> impl IntoResponse {
    info!("{:<12} --> 상품 등록: {}", "Command", new_product.name);
    match state.store.register_product(new_product).await {
        Ok(product) => (StatusCode::OK, Json(product)).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// 랏 등록 요청 처리
pub async fn handle_register_lot(
    State(state): State<AppState>,
    Json(new_lot): Json<NewLot>,
) -> impl IntoResponse {
    info!(
        "{:<12} --> 랏 등록: 상품 {}, 재고 {}",
        "Command", new_lot.product_id, new_lot.stock
    );
    match state.store.register_lot(new_lot).await {
        Ok(lot) => (StatusCode::OK, Json(lot)).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// 경매 생성 요청 처리 (경매사가 랏 편성과 서빙 순서를 함께 확정)
pub async fn handle_create_auction(
    State(state): State<AppState>,
    Json(new_auction): Json<NewAuction>,
) -> impl IntoResponse {
    info!(
        "{:<12} --> 경매 생성: 위치 {}, 랏 {}개",
        "Command",
        new_auction.clock_location,
        new_auction.lots.len()
    );
    match state.store.create_auction(new_auction).await {
        Ok(auction) => (StatusCode::OK, Json(auction)).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// 구매 요청 처리
/// 거절 시에는 스냅샷을 함께 내려 클라이언트가 권위 있는 현재 랏/가격으로
/// 재동기화할 수 있게 한다. 가장 흔한 거절 사유가 "누가 방금 먼저 샀다"이기 때문.
pub async fn handle_buy(
    State(state): State<AppState>,
    Json(cmd): Json<BuyCommand>,
) -> impl IntoResponse {
    let auction_id = cmd.auction_id;
    match command_handle_buy(
        cmd,
        state.store.as_ref(),
        state.broadcaster.as_ref(),
        state.clock.as_ref(),
        &state.config,
    )
    .await
    {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(BuyError::Store(e)) => store_error_response(e),
        Err(e) => {
            let snapshot = query::get_snapshot(
                state.store.as_ref(),
                state.clock.as_ref(),
                &state.config,
                auction_id,
            )
            .await
            .ok();
            let status = match e {
                BuyError::NotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            };
            (
                status,
                Json(serde_json::json!({
                    "error": e.message(),
                    "code": e.code(),
                    "snapshot": snapshot,
                })),
            )
                .into_response()
        }
    }
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// 모든 열린 경매 조회
pub async fn handle_get_auctions(State(state): State<AppState>) -> impl IntoResponse {
    info!("{:<12} --> 열린 경매 조회", "HandlerQuery");
    match state.store.get_open_auctions().await {
        Ok(auctions) => Json(auctions).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// 라이브 경매만 조회
pub async fn handle_get_live_auctions(State(state): State<AppState>) -> impl IntoResponse {
    info!("{:<12} --> 라이브 경매 조회", "HandlerQuery");
    match state.store.get_live_auctions().await {
        Ok(auctions) => Json(auctions).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// 경매 스냅샷 조회 (server_time 포함)
pub async fn handle_get_snapshot(
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 경매 스냅샷 조회 id: {}", "HandlerQuery", auction_id);
    match query::get_snapshot(
        state.store.as_ref(),
        state.clock.as_ref(),
        &state.config,
        auction_id,
    )
    .await
    {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// 랏 판매 이력 조회
pub async fn handle_get_lot_sales(
    State(state): State<AppState>,
    Path(lot_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 랏 판매 이력 조회 id: {}", "HandlerQuery", lot_id);
    match state.store.get_lot_sales(lot_id).await {
        Ok(sales) => Json(sales).into_response(),
        Err(e) => store_error_response(e),
    }
}

// endregion: --- Query Handlers

// region:    --- Event Stream Handler

static CONNECTION_SEQ: AtomicU64 = AtomicU64::new(0);

/// 경매 이벤트 스트림 구독 (WebSocket)
pub async fn handle_auction_events(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| auction_event_stream(socket, state, auction_id))
}

async fn auction_event_stream(socket: WebSocket, state: AppState, auction_id: i64) {
    let connection_id = format!("conn-{}", CONNECTION_SEQ.fetch_add(1, Ordering::Relaxed));
    let mut events = state.registry.join(&connection_id, auction_id);
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!("{:<12} --> 이벤트 직렬화 실패: {}", "EventStream", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // at-most-once: 밀린 이벤트는 버린다. 클라이언트는
                    // 스냅샷을 다시 받아 스스로 복구해야 한다.
                    warn!(
                        "{:<12} --> {} 이벤트 {}건 유실 (lagged)",
                        "EventStream", connection_id, skipped
                    );
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            msg = receiver.next() => match msg {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    // 자신의 수신자를 먼저 내려놓아야 leave 가 빈 토픽을 정리할 수 있다
    drop(events);
    state.registry.leave(&connection_id, auction_id);
}

// endregion: --- Event Stream Handler

// region:    --- Tests


// endregion: --- Tests
