use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 경매 토픽으로 브로드캐스트되는 이벤트 어휘
/// 전달은 at-most-once: 이벤트를 놓친 클라이언트는 스냅샷을 다시 받아 복구한다.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum AuctionEvent {
    // 경매 시작 (Visible -> Live)
    AuctionStarted {
        auction_id: i64,
        next_lot_start_time: DateTime<Utc>,
    },
    // 경매 종료 (큐 소진)
    AuctionStopped {
        auction_id: i64,
    },
    // 판매 발생. remaining_stock <= 0 이면 클라이언트는 LotExpired 와 동일하게
    // 해당 랏을 큐에서 제거하고 next_lot_start_time 을 채택해야 한다.
    LotSold {
        auction_id: i64,
        lot_id: i64,
        remaining_stock: i64,
        next_lot_start_time: Option<DateTime<Utc>>,
    },
    // 구매자 없이 바닥가 도달 후 타임아웃
    LotExpired {
        auction_id: i64,
        lot_id: i64,
        next_lot_start_time: Option<DateTime<Utc>>,
    },
}

impl AuctionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AuctionEvent::AuctionStarted { .. } => "AuctionStarted",
            AuctionEvent::AuctionStopped { .. } => "AuctionStopped",
            AuctionEvent::LotSold { .. } => "LotSold",
            AuctionEvent::LotExpired { .. } => "LotExpired",
        }
    }

    pub fn auction_id(&self) -> i64 {
        match self {
            AuctionEvent::AuctionStarted { auction_id, .. }
            | AuctionEvent::AuctionStopped { auction_id }
            | AuctionEvent::LotSold { auction_id, .. }
            | AuctionEvent::LotExpired { auction_id, .. } => *auction_id,
        }
    }
}

/// 경매별 토픽 키
pub fn auction_topic(auction_id: i64) -> String {
    format!("auction-{}", auction_id)
}
