/// 읽기 측: 경매 스냅샷
/// 모든 스냅샷 응답에는 서버 시간이 포함된다. 클라이언트는 이 값으로
/// 오프셋을 한 번 계산한 뒤 카운트다운을 렌더링한다.
// region:    --- Imports
use crate::auction::model::{Auction, AuctionPhase, Lot};
use crate::clock::Clock;
use crate::config::AuctionConfig;
use crate::pricing;
use crate::store::{AuctionStore, StoreError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

// endregion: --- Imports

// region:    --- Snapshot Model

/// 경매 스냅샷: 경매 본체 + 현재/대기 랏 + 서버 시간
#[derive(Debug, Serialize)]
pub struct AuctionSnapshot {
    pub auction: Auction,
    pub current_and_upcoming_lots: Vec<LotSnapshot>,
    pub server_time: DateTime<Utc>,
}

/// 스냅샷 안의 랏. 현재 서빙 중인 랏에만 하락가와 진행률이 채워진다.
#[derive(Debug, Serialize)]
pub struct LotSnapshot {
    pub serve_order: i32,
    pub lot: Lot,
    /// 현재 하락가(센트, 올림 표시가). 현재 랏이 아니면 None.
    pub current_price: Option<i64>,
    /// 하락 진행률 [0, 1] (반올림 없음)
    pub decay_fraction: Option<f64>,
}

// endregion: --- Snapshot Model

// region:    --- Snapshot Query

/// 경매 스냅샷 조회
pub async fn get_snapshot(
    store: &dyn AuctionStore,
    clock: &dyn Clock,
    config: &AuctionConfig,
    auction_id: i64,
) -> Result<AuctionSnapshot, StoreError> {
    info!("{:<12} --> 경매 스냅샷 조회 id: {}", "Query", auction_id);

    let auction = store.get_auction(auction_id).await?;
    let queued = store.get_open_lots(auction_id).await?;
    let now = clock.now();

    let mut lots = Vec::with_capacity(queued.len());
    for (index, entry) in queued.into_iter().enumerate() {
        // 현재 랏(큐 선두)만 가격이 움직인다
        let is_current = index == 0
            && auction.phase == AuctionPhase::Live
            && auction.next_lot_start_time.is_some();

        let (current_price, decay_fraction) = if is_current {
            price_of(&entry.lot, auction.next_lot_start_time, now, config)
        } else {
            (None, None)
        };

        lots.push(LotSnapshot {
            serve_order: entry.serve_order,
            lot: entry.lot,
            current_price,
            decay_fraction,
        });
    }

    Ok(AuctionSnapshot {
        auction,
        current_and_upcoming_lots: lots,
        server_time: now,
    })
}

/// 현재 랏의 하락가와 진행률 계산 (스케줄러와 같은 순수 함수 사용)
fn price_of(
    lot: &Lot,
    lot_started: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    config: &AuctionConfig,
) -> (Option<i64>, Option<f64>) {
    use crate::auction::model::Pricing;

    let started = match lot_started {
        Some(started) => started,
        None => return (None, None),
    };
    let (floor, ceiling) = match lot.pricing() {
        Pricing::Priced { floor, ceiling } => (floor, ceiling),
        Pricing::Unpriced => return (None, None),
    };

    let duration = pricing::effective_duration_secs(ceiling, floor, config);
    let elapsed = (now - started).num_milliseconds() as f64 / 1000.0;

    (
        Some(pricing::price_at(ceiling, floor, elapsed, duration)),
        Some(pricing::decay_fraction(elapsed, duration)),
    )
}

// endregion: --- Snapshot Query
