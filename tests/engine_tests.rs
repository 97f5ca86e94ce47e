/// 경매 시계 엔진 통합 테스트
/// 인메모리 저장소 + 수동 시계 + 기록용 브로드캐스터로 외부 인프라 없이
/// 스케줄러/구매 경로 전체를 돌린다. 틱은 run_tick 으로 직접 구동한다.
mod common;

// region:    --- Imports
use chrono::Utc;
use common::{seed_auction, seed_lot, RecordingBroadcaster};
use dutch_auction_service::auction::events::AuctionEvent;
use dutch_auction_service::auction::model::AuctionPhase;
use dutch_auction_service::clock::{Clock, ManualClock};
use dutch_auction_service::config::AuctionConfig;
use dutch_auction_service::purchase::commands::{handle_buy, BuyCommand, BuyError};
use dutch_auction_service::scheduler::AuctionClockScheduler;
use dutch_auction_service::store::memory::InMemoryAuctionStore;
use dutch_auction_service::store::AuctionStore;
use std::sync::Arc;

// endregion: --- Imports

// region:    --- Test Rig

struct Rig {
    store: Arc<InMemoryAuctionStore>,
    clock: Arc<ManualClock>,
    broadcaster: Arc<RecordingBroadcaster>,
    scheduler: AuctionClockScheduler,
    config: AuctionConfig,
}

/// 엔진 구성 (기본 설정: 노출 2시간 전, 최소 하락 30초, 틱 1초)
fn rig() -> Rig {
    let store = Arc::new(InMemoryAuctionStore::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let broadcaster = Arc::new(RecordingBroadcaster::new());
    let config = AuctionConfig::default();
    let scheduler = AuctionClockScheduler::new(
        store.clone(),
        broadcaster.clone(),
        clock.clone(),
        config.clone(),
    );
    Rig {
        store,
        clock,
        broadcaster,
        scheduler,
        config,
    }
}

impl Rig {
    /// Hidden -> Visible -> Live 까지 두 틱 구동
    async fn drive_to_live(&self, auction_id: i64) {
        self.scheduler.run_tick().await;
        self.scheduler.run_tick().await;
        let auction = self.store.get_auction(auction_id).await.unwrap();
        assert_eq!(auction.phase, AuctionPhase::Live);
    }
}

fn buy_cmd(auction_id: i64, lot_id: i64, buyer_id: i64, quantity: i64) -> BuyCommand {
    BuyCommand {
        auction_id,
        lot_id,
        buyer_id,
        quantity,
    }
}

// endregion: --- Test Rig

// region:    --- Lifecycle Tests

/// 경매 수명주기: 노출 -> 라이브 -> 단일 랏 구매 -> 다음 틱에 종료
#[tokio::test]
async fn lifecycle_buy_last_unit_then_finish() {
    let rig = rig();
    let lot = seed_lot(&rig.store, 100, 1).await;
    let auction = seed_auction(&rig.store, rig.clock.now(), &[(lot.id, 200)]).await;

    rig.drive_to_live(auction.id).await;

    // 만료 전 아무 때나 1개 구매는 성공한다
    let receipt = handle_buy(
        buy_cmd(auction.id, lot.id, 7, 1),
        rig.store.as_ref(),
        rig.broadcaster.as_ref(),
        rig.clock.as_ref(),
        &rig.config,
    )
    .await
    .unwrap();
    assert_eq!(receipt.remaining_stock, 0);
    assert_eq!(receipt.unit_price, 200); // 경과 0초 = 시작가
    assert_eq!(receipt.next_lot_start_time, None); // 다음 랏이 없으면 시계도 없다

    // 다음 틱에서 큐 소진으로 Finished 전이
    rig.scheduler.run_tick().await;
    let auction = rig.store.get_auction(auction.id).await.unwrap();
    assert_eq!(auction.phase, AuctionPhase::Finished);

    assert_eq!(
        rig.broadcaster.event_names(),
        vec!["AuctionStarted", "LotSold", "AuctionStopped"]
    );
}

/// 구매자가 없는 랏은 만료되어 다음 serve_order 로 전진한다
#[tokio::test]
async fn unsold_lot_expires_and_advances() {
    let rig = rig();
    let first = seed_lot(&rig.store, 100, 5).await;
    let second = seed_lot(&rig.store, 100, 5).await;
    let auction = seed_auction(
        &rig.store,
        rig.clock.now(),
        &[(first.id, 200), (second.id, 200)],
    )
    .await;

    rig.drive_to_live(auction.id).await;

    // 2.00 -> 1.00, 5%/초 => implied 10초, 최소 30초 적용
    rig.clock.advance_secs(31);
    rig.scheduler.run_tick().await;

    let current = rig.store.get_current_lot(auction.id).await.unwrap().unwrap();
    assert_eq!(current.id, second.id);

    // 새 랏의 하락 시계는 만료 틱 시점부터 새로 시작
    let auction = rig.store.get_auction(auction.id).await.unwrap();
    assert_eq!(auction.next_lot_start_time, Some(rig.clock.now()));
    assert_eq!(auction.phase, AuctionPhase::Live);

    let events = rig.broadcaster.events();
    assert!(matches!(
        events.last().unwrap(),
        AuctionEvent::LotExpired { lot_id, next_lot_start_time: Some(_), .. } if *lot_id == first.id
    ));
}

/// 마지막 랏까지 만료되면 경매는 종료된다
#[tokio::test]
async fn all_lots_expired_finishes_auction() {
    let rig = rig();
    let lot = seed_lot(&rig.store, 100, 5).await;
    let auction = seed_auction(&rig.store, rig.clock.now(), &[(lot.id, 200)]).await;

    rig.drive_to_live(auction.id).await;
    rig.clock.advance_secs(31);
    rig.scheduler.run_tick().await;

    let auction = rig.store.get_auction(auction.id).await.unwrap();
    assert_eq!(auction.phase, AuctionPhase::Finished);
    assert_eq!(
        rig.broadcaster.event_names(),
        vec!["AuctionStarted", "LotExpired", "AuctionStopped"]
    );
}

/// 노출 윈도우 전에는 Hidden 을 유지한다
#[tokio::test]
async fn auction_stays_hidden_before_visibility_window() {
    let rig = rig();
    let lot = seed_lot(&rig.store, 100, 5).await;
    let start = rig.clock.now() + chrono::Duration::hours(3);
    let auction = seed_auction(&rig.store, start, &[(lot.id, 200)]).await;

    rig.scheduler.run_tick().await;
    assert_eq!(
        rig.store.get_auction(auction.id).await.unwrap().phase,
        AuctionPhase::Hidden
    );

    // 윈도우(2시간) 안으로 들어오면 Visible
    rig.clock.advance_secs(3601);
    rig.scheduler.run_tick().await;
    assert_eq!(
        rig.store.get_auction(auction.id).await.unwrap().phase,
        AuctionPhase::Visible
    );

    // 시작 시각 전에는 Live 가 되지 않는다
    rig.scheduler.run_tick().await;
    assert_eq!(
        rig.store.get_auction(auction.id).await.unwrap().phase,
        AuctionPhase::Visible
    );
}

/// 같은 시계 위치에서는 동시에 하나의 경매만 라이브가 된다
#[tokio::test]
async fn one_live_auction_per_clock_location() {
    let rig = rig();
    let first_lot = seed_lot(&rig.store, 100, 5).await;
    let second_lot = seed_lot(&rig.store, 100, 5).await;

    let first = seed_auction(&rig.store, rig.clock.now(), &[(first_lot.id, 200)]).await;
    let second = seed_auction(&rig.store, rig.clock.now(), &[(second_lot.id, 200)]).await;

    rig.scheduler.run_tick().await; // 둘 다 Visible
    rig.scheduler.run_tick().await; // 하나만 Live

    let first = rig.store.get_auction(first.id).await.unwrap();
    let second = rig.store.get_auction(second.id).await.unwrap();
    let live_count = [first.phase, second.phase]
        .iter()
        .filter(|p| **p == AuctionPhase::Live)
        .count();
    assert_eq!(live_count, 1);
    // 나머지 하나는 위치가 빌 때까지 Visible 에서 대기
    assert!(matches!(
        (first.phase, second.phase),
        (AuctionPhase::Live, AuctionPhase::Visible) | (AuctionPhase::Visible, AuctionPhase::Live)
    ));
}

// endregion: --- Lifecycle Tests

// region:    --- Purchase Tests

/// 단가는 커밋 시점에 서버 시계로 재계산된다
#[tokio::test]
async fn sale_price_is_recomputed_at_commit_time() {
    let rig = rig();
    let lot = seed_lot(&rig.store, 100, 10).await;
    let auction = seed_auction(&rig.store, rig.clock.now(), &[(lot.id, 200)]).await;

    rig.drive_to_live(auction.id).await;

    // 유효 시간 30초의 절반: 2.00 - (1.00 * 15/30) = 1.50
    rig.clock.advance_secs(15);
    let receipt = handle_buy(
        buy_cmd(auction.id, lot.id, 3, 2),
        rig.store.as_ref(),
        rig.broadcaster.as_ref(),
        rig.clock.as_ref(),
        &rig.config,
    )
    .await
    .unwrap();

    assert_eq!(receipt.unit_price, 150);
    assert_eq!(receipt.remaining_stock, 8);
    assert_eq!(receipt.next_lot_start_time, None); // 부분 판매는 전진 없음

    let sales = rig.store.get_lot_sales(lot.id).await.unwrap();
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].unit_price, 150);
    assert_eq!(sales[0].quantity, 2);
}

/// 소진 구매의 영수증과 LotSold 이벤트: 다음 랏이 있으면 새 하락 시작 시각,
/// 마지막 랏이었으면 None (관찰자가 존재하지 않는 랏의 시계를 채택하지 않도록)
#[tokio::test]
async fn exhausting_buy_reports_next_lot_clock_only_when_one_exists() {
    let rig = rig();
    let first = seed_lot(&rig.store, 100, 1).await;
    let second = seed_lot(&rig.store, 100, 5).await;
    let auction = seed_auction(
        &rig.store,
        rig.clock.now(),
        &[(first.id, 200), (second.id, 200)],
    )
    .await;

    rig.drive_to_live(auction.id).await;

    // 첫 랏 소진: 두 번째 랏이 대기 중이므로 새 시계가 내려온다
    let receipt = handle_buy(
        buy_cmd(auction.id, first.id, 1, 1),
        rig.store.as_ref(),
        rig.broadcaster.as_ref(),
        rig.clock.as_ref(),
        &rig.config,
    )
    .await
    .unwrap();
    assert_eq!(receipt.next_lot_start_time, Some(rig.clock.now()));

    // 마지막 랏 소진: 전진할 곳이 없으므로 None
    let receipt = handle_buy(
        buy_cmd(auction.id, second.id, 1, 5),
        rig.store.as_ref(),
        rig.broadcaster.as_ref(),
        rig.clock.as_ref(),
        &rig.config,
    )
    .await
    .unwrap();
    assert_eq!(receipt.next_lot_start_time, None);

    let events = rig.broadcaster.events();
    assert!(matches!(
        events.last().unwrap(),
        AuctionEvent::LotSold {
            lot_id,
            next_lot_start_time: None,
            ..
        } if *lot_id == second.id
    ));
}

/// 라이브가 아닌 경매에 대한 구매는 거절된다
#[tokio::test]
async fn buy_rejected_when_auction_not_live() {
    let rig = rig();
    let lot = seed_lot(&rig.store, 100, 5).await;
    let auction = seed_auction(
        &rig.store,
        rig.clock.now() + chrono::Duration::hours(1),
        &[(lot.id, 200)],
    )
    .await;

    let result = handle_buy(
        buy_cmd(auction.id, lot.id, 1, 1),
        rig.store.as_ref(),
        rig.broadcaster.as_ref(),
        rig.clock.as_ref(),
        &rig.config,
    )
    .await;
    assert!(matches!(result, Err(BuyError::AuctionNotLive)));
}

/// 이미 전진한 랏에 대한 구매는 LotNotCurrent 로 거절된다
#[tokio::test]
async fn buy_rejected_when_lot_not_current() {
    let rig = rig();
    let first = seed_lot(&rig.store, 100, 5).await;
    let second = seed_lot(&rig.store, 100, 5).await;
    let auction = seed_auction(
        &rig.store,
        rig.clock.now(),
        &[(first.id, 200), (second.id, 200)],
    )
    .await;

    rig.drive_to_live(auction.id).await;

    // 첫 랏이 만료되어 전진한 뒤, 뒤늦게 첫 랏을 사려는 클라이언트
    rig.clock.advance_secs(31);
    rig.scheduler.run_tick().await;

    let result = handle_buy(
        buy_cmd(auction.id, first.id, 1, 1),
        rig.store.as_ref(),
        rig.broadcaster.as_ref(),
        rig.clock.as_ref(),
        &rig.config,
    )
    .await;
    assert!(matches!(result, Err(BuyError::LotNotCurrent)));
}

/// 재고를 넘는 수량은 거절된다
#[tokio::test]
async fn buy_rejected_when_quantity_exceeds_stock() {
    let rig = rig();
    let lot = seed_lot(&rig.store, 100, 5).await;
    let auction = seed_auction(&rig.store, rig.clock.now(), &[(lot.id, 200)]).await;

    rig.drive_to_live(auction.id).await;

    let result = handle_buy(
        buy_cmd(auction.id, lot.id, 1, 6),
        rig.store.as_ref(),
        rig.broadcaster.as_ref(),
        rig.clock.as_ref(),
        &rig.config,
    )
    .await;
    assert!(matches!(result, Err(BuyError::OutOfStock)));
}

// endregion: --- Purchase Tests

// region:    --- Concurrency Tests

/// 재고 5에 수량 3 동시 구매 두 건: 정확히 하나만 성공하고 초과 판매는 없다
#[tokio::test]
async fn concurrent_buys_never_oversell() {
    let rig = rig();
    let lot = seed_lot(&rig.store, 100, 5).await;
    let auction = seed_auction(&rig.store, rig.clock.now(), &[(lot.id, 200)]).await;

    rig.drive_to_live(auction.id).await;

    let mut handles = vec![];
    for buyer_id in 1..=2 {
        let store = rig.store.clone();
        let broadcaster = rig.broadcaster.clone();
        let clock = rig.clock.clone();
        let config = rig.config.clone();
        let cmd = BuyCommand {
            auction_id: auction.id,
            lot_id: lot.id,
            buyer_id,
            quantity: 3,
        };
        handles.push(tokio::spawn(async move {
            handle_buy(
                cmd,
                store.as_ref(),
                broadcaster.as_ref(),
                clock.as_ref(),
                &config,
            )
            .await
        }));
    }

    let mut accepted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(receipt) => {
                accepted += 1;
                assert_eq!(receipt.quantity, 3);
            }
            Err(BuyError::OutOfStock) => rejected += 1,
            Err(e) => panic!("예상치 못한 거절: {:?}", e),
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(rejected, 1);

    // 판매 원장의 총 수량이 원래 재고를 넘지 않는다
    let sales = rig.store.get_lot_sales(lot.id).await.unwrap();
    let total_sold: i64 = sales.iter().map(|s| s.quantity).sum();
    assert!(total_sold <= 5);
    assert_eq!(total_sold, 3);
}

/// 같은 소진 랏에 대한 동시 전진은 정확히 한 번만 큐를 움직인다
#[tokio::test]
async fn concurrent_advance_is_idempotent() {
    let rig = rig();
    let first = seed_lot(&rig.store, 100, 5).await;
    let second = seed_lot(&rig.store, 100, 5).await;
    let auction = seed_auction(
        &rig.store,
        rig.clock.now(),
        &[(first.id, 200), (second.id, 200)],
    )
    .await;

    rig.drive_to_live(auction.id).await;

    let now = rig.clock.now();
    let mut handles = vec![];
    for _ in 0..2 {
        let store = rig.store.clone();
        let auction_id = auction.id;
        let lot_id = first.id;
        handles.push(tokio::spawn(async move {
            store.try_advance_lot(auction_id, lot_id, now).await.unwrap()
        }));
    }

    let mut wins = 0;
    for handle in handles {
        if handle.await.unwrap() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1);

    // 큐는 정확히 한 칸 전진
    let current = rig.store.get_current_lot(auction.id).await.unwrap().unwrap();
    assert_eq!(current.id, second.id);
}

/// 구매로 소진된 직후 스케줄러가 같은 랏을 만료 처리해도 중복 전진은 없다
#[tokio::test]
async fn exhaustion_and_expiry_race_advances_once() {
    let rig = rig();
    let first = seed_lot(&rig.store, 100, 2).await;
    let second = seed_lot(&rig.store, 100, 5).await;
    let auction = seed_auction(
        &rig.store,
        rig.clock.now(),
        &[(first.id, 200), (second.id, 200)],
    )
    .await;

    rig.drive_to_live(auction.id).await;

    // 만료 시각을 지나면서 남은 재고를 전부 구매 (구매 경로가 전진)
    rig.clock.advance_secs(31);
    let receipt = handle_buy(
        buy_cmd(auction.id, first.id, 1, 2),
        rig.store.as_ref(),
        rig.broadcaster.as_ref(),
        rig.clock.as_ref(),
        &rig.config,
    )
    .await
    .unwrap();
    assert_eq!(receipt.remaining_stock, 0);
    assert_eq!(receipt.unit_price, 100); // 만료 시각 이후라 바닥가

    // 같은 틱에서 스케줄러도 만료를 보지만 CAS 에서 지고 no-op
    rig.scheduler.run_tick().await;

    let current = rig.store.get_current_lot(auction.id).await.unwrap().unwrap();
    assert_eq!(current.id, second.id);

    // LotExpired 가 중복 발행되지 않았다
    let expired_count = rig
        .broadcaster
        .event_names()
        .iter()
        .filter(|n| **n == "LotExpired")
        .count();
    assert_eq!(expired_count, 0);
}

// endregion: --- Concurrency Tests

// region:    --- Snapshot Tests

/// 스냅샷은 서버 시간과 현재 랏의 하락가를 담는다
#[tokio::test]
async fn snapshot_carries_server_time_and_current_price() {
    use dutch_auction_service::query;

    let rig = rig();
    let first = seed_lot(&rig.store, 100, 5).await;
    let second = seed_lot(&rig.store, 100, 5).await;
    let auction = seed_auction(
        &rig.store,
        rig.clock.now(),
        &[(first.id, 200), (second.id, 200)],
    )
    .await;

    rig.drive_to_live(auction.id).await;
    rig.clock.advance_secs(15);

    let snapshot = query::get_snapshot(
        rig.store.as_ref(),
        rig.clock.as_ref(),
        &rig.config,
        auction.id,
    )
    .await
    .unwrap();

    assert_eq!(snapshot.server_time, rig.clock.now());
    assert_eq!(snapshot.current_and_upcoming_lots.len(), 2);

    // 현재 랏만 가격이 움직인다
    let head = &snapshot.current_and_upcoming_lots[0];
    assert_eq!(head.lot.id, first.id);
    assert_eq!(head.current_price, Some(150));
    assert!((head.decay_fraction.unwrap() - 0.5).abs() < 1e-9);

    let upcoming = &snapshot.current_and_upcoming_lots[1];
    assert_eq!(upcoming.current_price, None);
    assert_eq!(upcoming.decay_fraction, None);
}

// endregion: --- Snapshot Tests
