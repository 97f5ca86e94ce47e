/// 경매 시계 스케줄러
/// 1초 틱마다 모든 열린 경매를 순회하며 단계 전이와 랏 만료를 결정하는
/// 단일 백그라운드 루프. 노출/라이브 전이와 타임아웃 전진의 유일한 작성자다.
/// (재고 차감과 소진 전진은 구매 경로가 두 번째 작성자)
// region:    --- Imports
use crate::auction::events::AuctionEvent;
use crate::auction::model::{Auction, AuctionPhase, Lot, Pricing};
use crate::auction::state;
use crate::broadcast::Broadcaster;
use crate::clock::Clock;
use crate::config::AuctionConfig;
use crate::pricing;
use crate::queue;
use crate::store::{AuctionStore, StoreError};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

// endregion: --- Imports

// region:    --- Auction Clock Scheduler

pub struct AuctionClockScheduler {
    store: Arc<dyn AuctionStore>,
    broadcaster: Arc<dyn Broadcaster>,
    clock: Arc<dyn Clock>,
    config: AuctionConfig,
}

impl AuctionClockScheduler {
    pub fn new(
        store: Arc<dyn AuctionStore>,
        broadcaster: Arc<dyn Broadcaster>,
        clock: Arc<dyn Clock>,
        config: AuctionConfig,
    ) -> Self {
        Self {
            store,
            broadcaster,
            clock,
            config,
        }
    }

    /// 스케줄러 시작. shutdown 신호가 오면 진행 중인 틱을 마치고 종료한다.
    pub fn start(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(self.config.tick_interval_ms));
            info!(
                "{:<12} --> 스케줄러 시작 (틱 간격 {}ms)",
                "Scheduler", self.config.tick_interval_ms
            );
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_tick().await;
                    }
                    _ = shutdown.changed() => {
                        info!("{:<12} --> 종료 신호 수신, 스케줄러 정지", "Scheduler");
                        break;
                    }
                }
            }
        })
    }

    /// 틱 1회 실행
    /// 경매 하나의 실패는 로깅만 하고 나머지 경매 처리를 막지 않는다.
    /// 실패한 틱에 대한 재시도는 없다. 다음 주기가 곧 재시도다.
    pub async fn run_tick(&self) {
        let now = self.clock.now();
        let auctions = match self.store.get_open_auctions().await {
            Ok(auctions) => auctions,
            Err(e) => {
                error!("{:<12} --> 열린 경매 조회 실패: {}", "Scheduler", e);
                return;
            }
        };

        // 시계 위치 점유 현황 (위치당 라이브 경매 하나 불변식)
        let mut live_locations: HashSet<String> = auctions
            .iter()
            .filter(|a| a.phase == AuctionPhase::Live)
            .map(|a| a.clock_location.clone())
            .collect();

        for auction in &auctions {
            if let Err(e) = self.process_auction(auction, now, &mut live_locations).await {
                error!(
                    "{:<12} --> 경매 {} 틱 처리 실패: {}",
                    "Scheduler", auction.id, e
                );
            }
        }
    }

    /// 경매 하나 처리: 단계 전이 평가 후, 라이브면 현재 랏 만료 검사
    async fn process_auction(
        &self,
        auction: &Auction,
        now: DateTime<Utc>,
        live_locations: &mut HashSet<String>,
    ) -> Result<(), StoreError> {
        let current = self.store.get_current_lot(auction.id).await?;
        let location_busy =
            auction.phase != AuctionPhase::Live && live_locations.contains(&auction.clock_location);

        let mut phase = auction.phase;
        let mut lot_started = auction.next_lot_start_time;

        match state::next_phase(auction, current.is_some(), location_busy, now, &self.config) {
            Some(AuctionPhase::Visible) => {
                self.store
                    .update_auction_phase(auction.id, AuctionPhase::Visible)
                    .await?;
                phase = AuctionPhase::Visible;
                info!("{:<12} --> 경매 {} 노출 시작", "Scheduler", auction.id);
            }
            Some(AuctionPhase::Live) => {
                // Live 진입 시 첫 랏의 하락은 정확히 예정 시각부터 시작
                self.store
                    .update_auction_phase(auction.id, AuctionPhase::Live)
                    .await?;
                phase = AuctionPhase::Live;
                lot_started = Some(auction.start_date);
                live_locations.insert(auction.clock_location.clone());
                info!("{:<12} --> 경매 {} 라이브 시작", "Scheduler", auction.id);
                self.publish(AuctionEvent::AuctionStarted {
                    auction_id: auction.id,
                    next_lot_start_time: auction.start_date,
                })
                .await;
            }
            Some(AuctionPhase::Finished) => {
                self.finish_auction(auction.id).await?;
                return Ok(());
            }
            Some(AuctionPhase::Hidden) | None => {}
        }

        if phase == AuctionPhase::Live {
            if let Some(lot) = current {
                self.check_lot_expiry(auction.id, &lot, lot_started, now)
                    .await?;
            }
        }

        Ok(())
    }

    /// 현재 랏의 만료 검사 및 타임아웃 전진
    async fn check_lot_expiry(
        &self,
        auction_id: i64,
        lot: &Lot,
        lot_started: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let started = match lot_started {
            Some(started) => started,
            // 전환 도중 타이머가 비는 순간은 다음 틱에서 따라잡는다
            None => return Ok(()),
        };

        let duration = match lot.pricing() {
            Pricing::Priced { floor, ceiling } => {
                pricing::effective_duration_secs(ceiling, floor, &self.config)
            }
            Pricing::Unpriced => {
                warn!(
                    "{:<12} --> 경매 {} 의 랏 {} 에 시작가가 없음",
                    "Scheduler", auction_id, lot.id
                );
                return Ok(());
            }
        };

        let elapsed = (now - started).num_milliseconds() as f64 / 1000.0;
        if elapsed < duration {
            debug!(
                "{:<12} --> 경매 {} 랏 {} 진행 중 ({:.1}/{:.1}초)",
                "Scheduler", auction_id, lot.id, elapsed, duration
            );
            return Ok(());
        }

        // 만료: 구매자 없이 바닥가 유지 시간까지 소진. 전진을 시도하되
        // 구매 경로가 동시에 소진 전진했다면 CAS 에서 지고 no-op 이 된다.
        match queue::advance(self.store.as_ref(), auction_id, lot.id, now).await? {
            Some(advanced) => {
                info!(
                    "{:<12} --> 경매 {} 랏 {} 만료, 다음 랏: {:?}",
                    "Scheduler",
                    auction_id,
                    lot.id,
                    advanced.next_lot.as_ref().map(|l| l.id)
                );
                let queue_empty = advanced.next_lot.is_none();
                self.publish(AuctionEvent::LotExpired {
                    auction_id,
                    lot_id: lot.id,
                    next_lot_start_time: if queue_empty { None } else { Some(now) },
                })
                .await;

                if queue_empty {
                    self.finish_auction(auction_id).await?;
                }
            }
            None => {
                debug!(
                    "{:<12} --> 경매 {} 랏 {} 전진 경합 패배 (no-op)",
                    "Scheduler", auction_id, lot.id
                );
            }
        }

        Ok(())
    }

    /// 큐가 소진된 경매 종료 처리
    async fn finish_auction(&self, auction_id: i64) -> Result<(), StoreError> {
        self.store
            .update_auction_phase(auction_id, AuctionPhase::Finished)
            .await?;
        info!("{:<12} --> 경매 {} 종료 (큐 소진)", "Scheduler", auction_id);
        self.publish(AuctionEvent::AuctionStopped { auction_id }).await;
        Ok(())
    }

    /// fire-and-forget 발행
    async fn publish(&self, event: AuctionEvent) {
        if let Err(e) = self.broadcaster.publish(&event).await {
            warn!(
                "{:<12} --> {} 브로드캐스트 실패: {}",
                "Scheduler",
                event.name(),
                e
            );
        }
    }
}

// endregion: --- Auction Clock Scheduler
