/// 테스트 공용 도구: 기록용 브로드캐스터와 시드 헬퍼
// region:    --- Imports
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dutch_auction_service::auction::events::AuctionEvent;
use dutch_auction_service::auction::model::{
    Auction, Lot, NewAuction, NewAuctionLot, NewLot, NewProduct,
};
use dutch_auction_service::broadcast::Broadcaster;
use dutch_auction_service::store::memory::InMemoryAuctionStore;
use dutch_auction_service::store::AuctionStore;
use std::sync::Mutex;

// endregion: --- Imports

// region:    --- Recording Broadcaster

/// 발행된 이벤트를 그대로 기록하는 브로드캐스터
#[derive(Default)]
pub struct RecordingBroadcaster {
    events: Mutex<Vec<AuctionEvent>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuctionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name()).collect()
    }
}

#[async_trait]
impl Broadcaster for RecordingBroadcaster {
    async fn publish(&self, event: &AuctionEvent) -> Result<(), String> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

// endregion: --- Recording Broadcaster

// region:    --- Seed Helpers

/// 테스트용 랏 생성 (상품 포함)
pub async fn seed_lot(store: &InMemoryAuctionStore, min_price: i64, stock: i64) -> Lot {
    let product = store
        .register_product(NewProduct {
            name: "장미".to_string(),
            description: "테스트용 품종입니다.".to_string(),
            image_url: None,
        })
        .await
        .unwrap();

    store
        .register_lot(NewLot {
            product_id: product.id,
            provider: "테스트농장".to_string(),
            region: "알스메이르".to_string(),
            harvested_at: Utc::now(),
            stem_length_cm: Some(50),
            min_price,
            stock,
        })
        .await
        .unwrap()
}

/// 테스트용 경매 생성: 랏들에 시작가를 부여하고 서빙 순서대로 편성
pub async fn seed_auction(
    store: &InMemoryAuctionStore,
    start_date: DateTime<Utc>,
    lots: &[(i64, i64)], // (lot_id, max_price)
) -> Auction {
    store
        .create_auction(NewAuction {
            auctioneer: "테스트경매사".to_string(),
            clock_location: "clock-a".to_string(),
            start_date,
            lots: lots
                .iter()
                .map(|(lot_id, max_price)| NewAuctionLot {
                    lot_id: *lot_id,
                    max_price: *max_price,
                })
                .collect(),
        })
        .await
        .unwrap()
}

// endregion: --- Seed Helpers
