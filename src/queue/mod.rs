/// 랏 큐: 경매별 서빙 순서 큐의 "현재 랏"과 "다음 랏으로 전진" 연산
/// 스케줄러(타임아웃 만료)와 구매 경로(재고 소진) 둘 다 이 모듈을 통해
/// 전진하므로, 랏 활성화 하나당 전진은 최대 한 번만 일어난다.
// region:    --- Imports
use crate::auction::model::Lot;
use crate::store::{AuctionStore, StoreError};
use chrono::{DateTime, Utc};

// endregion: --- Imports

// region:    --- Lot Queue

/// 전진 결과: 새 현재 랏(큐가 비었으면 None)과 새 하락 시작 시각
#[derive(Debug, Clone)]
pub struct Advanced {
    pub next_lot: Option<Lot>,
    pub next_lot_start_time: DateTime<Utc>,
}

/// 현재 서빙 중인 랏 조회
pub async fn current_lot(
    store: &dyn AuctionStore,
    auction_id: i64,
) -> Result<Option<Lot>, StoreError> {
    store.get_current_lot(auction_id).await
}

/// 다음 랏으로 전진 시도
/// 조건부 업데이트가 실패하면(다른 쪽이 먼저 전진) None 을 반환하고,
/// 호출자는 현재 랏을 다시 읽기만 하면 된다.
pub async fn advance(
    store: &dyn AuctionStore,
    auction_id: i64,
    expected_lot_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<Advanced>, StoreError> {
    if !store.try_advance_lot(auction_id, expected_lot_id, now).await? {
        return Ok(None);
    }

    let next_lot = store.get_current_lot(auction_id).await?;
    Ok(Some(Advanced {
        next_lot,
        next_lot_start_time: now,
    }))
}

// endregion: --- Lot Queue
