/// 경매 상태 기계 (Hidden -> Visible -> Live -> Finished)
/// 경매별 타이머를 갖는 객체가 아니라, 매 틱마다 영속 상태를 놓고
/// 재평가되는 순수 결정 함수다. 역행 전이는 없다.
// region:    --- Imports
use crate::auction::model::{Auction, AuctionPhase};
use crate::config::AuctionConfig;
use chrono::{DateTime, Duration, Utc};

// endregion: --- Imports

// region:    --- Transition Function

/// 다음 단계 결정. 전이가 없으면 None.
///
/// * `has_eligible_lot` - 재고가 남은 열린 랏이 하나라도 있는지
/// * `clock_location_busy` - 같은 시계 위치에 이미 다른 라이브 경매가 있는지
pub fn next_phase(
    auction: &Auction,
    has_eligible_lot: bool,
    clock_location_busy: bool,
    now: DateTime<Utc>,
    config: &AuctionConfig,
) -> Option<AuctionPhase> {
    match auction.phase {
        AuctionPhase::Hidden => {
            let visible_from =
                auction.start_date - Duration::seconds(config.visibility_window_seconds);
            if now >= visible_from && has_eligible_lot {
                // 노출 시점과 시작 시점을 한 틱에 모두 지난 경우에도
                // Visible 을 거쳐 다음 틱에 Live 가 된다.
                Some(AuctionPhase::Visible)
            } else {
                None
            }
        }
        AuctionPhase::Visible => {
            if now >= auction.start_date && has_eligible_lot && !clock_location_busy {
                Some(AuctionPhase::Live)
            } else {
                None
            }
        }
        AuctionPhase::Live => {
            if has_eligible_lot {
                None
            } else {
                Some(AuctionPhase::Finished)
            }
        }
        // 종료 상태는 터미널
        AuctionPhase::Finished => None,
    }
}

// endregion: --- Transition Function

// region:    --- Tests


// endregion: --- Tests
