// region:    --- Imports
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use dutch_auction_service::broadcast::{
    create_event_topic, EventBroadcaster, KafkaProducer, TopicRegistry,
};
use dutch_auction_service::clock::SystemClock;
use dutch_auction_service::config::AuctionConfig;
use dutch_auction_service::handlers::{self, AppState};
use dutch_auction_service::scheduler::AuctionClockScheduler;
use dutch_auction_service::store::postgres::PostgresAuctionStore;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
// endregion: --- Imports

// region:    --- Main

const EVENT_TOPIC: &str = "auction-events";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    let config = AuctionConfig::from_env();

    // 저장소 연결 및 스키마 초기화
    let store = Arc::new(PostgresAuctionStore::connect().await);
    if let Err(e) = store.initialize_schema().await {
        error!("{:<12} --> 데이터베이스 초기화 실패: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> 데이터베이스 초기화 성공", "Main");

    // Kafka 프로듀서 생성 및 이벤트 토픽 준비
    let brokers = std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string());
    let producer = Arc::new(KafkaProducer::new(&brokers));
    create_event_topic(&brokers, EVENT_TOPIC, 5, 1).await?;
    info!("{:<12} --> Kafka 초기화 성공", "Main");

    // 브로드캐스터: Kafka 발행 + 접속 관찰자 팬아웃
    let registry = Arc::new(TopicRegistry::new());
    let broadcaster = Arc::new(EventBroadcaster::new(
        Arc::clone(&producer),
        Arc::clone(&registry),
        EVENT_TOPIC,
    ));

    let clock = Arc::new(SystemClock);

    // 경매 시계 스케줄러 시작 (graceful shutdown 신호 포함)
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Arc::new(AuctionClockScheduler::new(
        store.clone(),
        broadcaster.clone(),
        clock.clone(),
        config.clone(),
    ));
    let scheduler_handle = scheduler.start(shutdown_rx);

    // 테스트 페이지를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = AppState {
        store,
        broadcaster,
        registry,
        clock,
        config,
    };

    // 라우터 설정
    let routes_all = Router::new()
        .route("/products", post(handlers::handle_register_product))
        .route("/lots", post(handlers::handle_register_lot))
        .route("/lots/:id/sales", get(handlers::handle_get_lot_sales))
        .route(
            "/auctions",
            post(handlers::handle_create_auction).get(handlers::handle_get_auctions),
        )
        .route("/auctions/live", get(handlers::handle_get_live_auctions))
        .route("/auction/:id", get(handlers::handle_get_snapshot))
        .route("/auction/:id/events", get(handlers::handle_auction_events))
        .route("/buy", post(handlers::handle_buy))
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 20))
        .with_state(state);

    // 리스너 생성(로컬 호스트의 3000번 포트를 사용)
    let listener = TcpListener::bind("0.0.0.0:3000").await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행 (ctrl-c 시 스케줄러까지 정리하고 종료)
    let server = axum::serve(listener, routes_all.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("{:<12} --> 종료 신호 수신", "Main");
        });

    if let Err(err) = server.await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }

    // 진행 중인 틱은 끝까지 수행된다 (부분적인 재고 변경 없음)
    let _ = shutdown_tx.send(true);
    let _ = scheduler_handle.await;

    Ok(())
}
// endregion: --- Main
