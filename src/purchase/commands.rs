/// 구매 커맨드 처리 (Dutch 방식: 현재 하락가를 수락하는 단일 구매 이벤트)
/// 가격은 항상 커밋 시점에 서버 시계로 재계산한다. 클라이언트가 관측한
/// 가격은 신뢰하지 않는다 (오래된 가격 악용 방지).
// region:    --- Imports
use crate::auction::events::AuctionEvent;
use crate::auction::model::{AuctionPhase, NewSaleRecord, Pricing};
use crate::broadcast::Broadcaster;
use crate::clock::Clock;
use crate::config::AuctionConfig;
use crate::pricing;
use crate::queue;
use crate::store::{AuctionStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Command & Result

/// 구매 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BuyCommand {
    pub auction_id: i64,
    pub lot_id: i64,
    pub buyer_id: i64,
    pub quantity: i64,
}

/// 구매 영수증
#[derive(Debug, Serialize, Clone)]
pub struct BuyReceipt {
    pub auction_id: i64,
    pub lot_id: i64,
    pub quantity: i64,
    /// 커밋 순간의 단가(센트)
    pub unit_price: i64,
    pub remaining_stock: i64,
    /// 랏이 소진되어 전진했으면 새 랏의 하락 시작 시각
    pub next_lot_start_time: Option<DateTime<Utc>>,
}

/// 구매 거절 사유
/// OutOfStock / LotNotCurrent 는 동시 구매의 정상적인 경합 결과이며
/// 시스템 오류가 아니다. 호출자는 스냅샷을 다시 받아 재동기화한다.
#[derive(Debug)]
pub enum BuyError {
    NotFound,
    AuctionNotLive,
    LotNotCurrent,
    OutOfStock,
    Store(StoreError),
}

impl BuyError {
    pub fn code(&self) -> &'static str {
        match self {
            BuyError::NotFound => "NOT_FOUND",
            BuyError::AuctionNotLive => "AUCTION_NOT_LIVE",
            BuyError::LotNotCurrent => "LOT_NOT_CURRENT",
            BuyError::OutOfStock => "OUT_OF_STOCK",
            BuyError::Store(_) => "STORE_ERROR",
        }
    }

    pub fn message(&self) -> String {
        match self {
            BuyError::NotFound => "경매 또는 랏을 찾을 수 없습니다.".to_string(),
            BuyError::AuctionNotLive => "경매가 라이브 상태가 아닙니다.".to_string(),
            BuyError::LotNotCurrent => "이미 다음 랏으로 넘어갔습니다.".to_string(),
            BuyError::OutOfStock => "남은 재고가 부족합니다.".to_string(),
            BuyError::Store(e) => e.to_string(),
        }
    }
}

impl From<StoreError> for BuyError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => BuyError::NotFound,
            other => BuyError::Store(other),
        }
    }
}

// endregion: --- Command & Result

// region:    --- Buy Handler

/// 구매 처리
/// 1. 경매가 라이브인지, 명령의 랏이 현재 서빙 중인 랏인지 검증
/// 2. 서버 시계로 현재 하락가 재계산
/// 3. 재고를 원자적으로 차감 (경합 패배 시 OutOfStock)
/// 4. 판매 기록 추가, 소진 시 큐 전진
/// 5. LotSold 브로드캐스트 (fire-and-forget)
pub async fn handle_buy(
    cmd: BuyCommand,
    store: &dyn AuctionStore,
    broadcaster: &dyn Broadcaster,
    clock: &dyn Clock,
    config: &AuctionConfig,
) -> Result<BuyReceipt, BuyError> {
    info!("{:<12} --> 구매 요청 처리 시작: {:?}", "Command", cmd);

    let auction = store.get_auction(cmd.auction_id).await?;
    if auction.phase != AuctionPhase::Live {
        return Err(BuyError::AuctionNotLive);
    }

    let current = queue::current_lot(store, cmd.auction_id).await?;
    let lot = match current {
        Some(lot) if lot.id == cmd.lot_id => lot,
        // 이미 전진했거나 활성 랏이 없음
        _ => return Err(BuyError::LotNotCurrent),
    };

    if cmd.quantity < 1 || cmd.quantity > lot.stock {
        return Err(BuyError::OutOfStock);
    }

    // 랏 전환이 진행 중이면 타이머가 비어 있을 수 있다
    let lot_started = auction
        .next_lot_start_time
        .ok_or(BuyError::LotNotCurrent)?;

    let (floor, ceiling) = match lot.pricing() {
        Pricing::Priced { floor, ceiling } => (floor, ceiling),
        Pricing::Unpriced => {
            // 편성 시 시작가가 부여되므로 정상 경로에서는 도달하지 않는다
            warn!("{:<12} --> 시작가 없는 랏 {} 구매 시도", "Command", lot.id);
            return Err(BuyError::LotNotCurrent);
        }
    };

    // 커밋 시점 가격 재계산
    let now = clock.now();
    let duration = pricing::effective_duration_secs(ceiling, floor, config);
    let elapsed = (now - lot_started).num_milliseconds() as f64 / 1000.0;
    let unit_price = pricing::price_at(ceiling, floor, elapsed, duration);

    // 재고 차감: 단일 조건부 업데이트. 경합에서 지면 여기서 끝난다.
    let remaining = match store.try_decrement_stock(lot.id, cmd.quantity).await? {
        Some(remaining) => remaining,
        None => return Err(BuyError::OutOfStock),
    };

    store
        .append_sale_record(NewSaleRecord {
            auction_id: cmd.auction_id,
            lot_id: lot.id,
            buyer_id: cmd.buyer_id,
            quantity: cmd.quantity,
            unit_price,
            sold_at: now,
        })
        .await?;

    // 재고 소진 시 큐 전진. CAS 에서 지면(스케줄러가 먼저 만료 처리)
    // 전진은 이미 일어난 것이므로 no-op.
    // 큐가 비어 있으면 채택할 하락 시계도 없으므로 None 을 내보낸다.
    let next_lot_start_time = if remaining == 0 {
        match queue::advance(store, cmd.auction_id, lot.id, now).await? {
            Some(advanced) => advanced
                .next_lot
                .as_ref()
                .map(|_| advanced.next_lot_start_time),
            None => match queue::current_lot(store, cmd.auction_id).await? {
                Some(_) => store
                    .get_auction(cmd.auction_id)
                    .await?
                    .next_lot_start_time,
                None => None,
            },
        }
    } else {
        None
    };

    let event = AuctionEvent::LotSold {
        auction_id: cmd.auction_id,
        lot_id: lot.id,
        remaining_stock: remaining,
        next_lot_start_time,
    };
    if let Err(e) = broadcaster.publish(&event).await {
        // 브로드캐스트 실패가 판매 확정을 되돌리지는 않는다
        warn!("{:<12} --> LotSold 브로드캐스트 실패: {}", "Command", e);
    }

    info!(
        "{:<12} --> 구매 확정: 랏 {}, 수량 {}, 단가 {}, 남은 재고 {}",
        "Command", lot.id, cmd.quantity, unit_price, remaining
    );

    Ok(BuyReceipt {
        auction_id: cmd.auction_id,
        lot_id: lot.id,
        quantity: cmd.quantity,
        unit_price,
        remaining_stock: remaining,
        next_lot_start_time,
    })
}

// endregion: --- Buy Handler
