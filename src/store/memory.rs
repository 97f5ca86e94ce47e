/// 인메모리 저장소 구현
/// Postgres 구현과 동일한 조건부 업데이트 의미론을 뮤텍스 아래에서 제공한다.
/// 외부 인프라 없이 엔진을 통째로 돌리는 테스트 스위트가 사용한다.
// region:    --- Imports
use crate::auction::model::{
    Auction, AuctionPhase, Lot, NewAuction, NewLot, NewProduct, NewSaleRecord, Product, QueuedLot,
    SaleRecord,
};
use crate::store::{AuctionStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

// endregion: --- Imports

// region:    --- In-Memory Store

/// 경매-랏 편성 행
#[derive(Debug, Clone)]
struct Membership {
    auction_id: i64,
    lot_id: i64,
    serve_order: i32,
    closed_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct MemoryState {
    products: HashMap<i64, Product>,
    lots: HashMap<i64, Lot>,
    auctions: HashMap<i64, Auction>,
    memberships: Vec<Membership>,
    sales: Vec<SaleRecord>,
    next_id: i64,
}

impl MemoryState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// 현재 랏 = 닫히지 않은 편성 중 serve_order 최솟값, 재고 > 0
    fn current_lot(&self, auction_id: i64) -> Option<Lot> {
        self.memberships
            .iter()
            .filter(|m| {
                m.auction_id == auction_id
                    && m.closed_at.is_none()
                    && self.lots.get(&m.lot_id).map(|l| l.stock > 0).unwrap_or(false)
            })
            .min_by_key(|m| m.serve_order)
            .and_then(|m| self.lots.get(&m.lot_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryAuctionStore {
    state: Mutex<MemoryState>,
}

impl InMemoryAuctionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuctionStore for InMemoryAuctionStore {
    async fn register_product(&self, new_product: NewProduct) -> Result<Product, StoreError> {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id();
        let product = Product {
            id,
            name: new_product.name,
            description: new_product.description,
            image_url: new_product.image_url,
        };
        state.products.insert(id, product.clone());
        Ok(product)
    }

    async fn register_lot(&self, new_lot: NewLot) -> Result<Lot, StoreError> {
        if new_lot.min_price < 0 || new_lot.stock < 0 {
            return Err(StoreError::Conflict(
                "바닥가와 재고는 음수일 수 없습니다".to_string(),
            ));
        }
        let mut state = self.state.lock().unwrap();
        if !state.products.contains_key(&new_lot.product_id) {
            return Err(StoreError::NotFound);
        }
        let id = state.allocate_id();
        let lot = Lot {
            id,
            product_id: new_lot.product_id,
            provider: new_lot.provider,
            region: new_lot.region,
            harvested_at: new_lot.harvested_at,
            stem_length_cm: new_lot.stem_length_cm,
            min_price: new_lot.min_price,
            max_price: None,
            stock: new_lot.stock,
            created_at: Utc::now(),
        };
        state.lots.insert(id, lot.clone());
        Ok(lot)
    }

    async fn create_auction(&self, new_auction: NewAuction) -> Result<Auction, StoreError> {
        if new_auction.lots.is_empty() {
            return Err(StoreError::Conflict(
                "경매에는 최소 한 개의 랏이 필요합니다".to_string(),
            ));
        }

        let mut state = self.state.lock().unwrap();

        // 검증을 먼저 전부 끝내고 나서 변경한다 (원자성)
        for entry in &new_auction.lots {
            let lot = state.lots.get(&entry.lot_id).ok_or(StoreError::NotFound)?;
            if entry.max_price < lot.min_price {
                return Err(StoreError::Conflict(format!(
                    "랏 {} 의 시작가가 바닥가보다 낮거나 랏이 없습니다",
                    entry.lot_id
                )));
            }
            let already_booked = state.memberships.iter().any(|m| {
                m.lot_id == entry.lot_id
                    && m.closed_at.is_none()
                    && state
                        .auctions
                        .get(&m.auction_id)
                        .map(|a| a.phase != AuctionPhase::Finished)
                        .unwrap_or(false)
            });
            if already_booked {
                return Err(StoreError::Conflict(format!(
                    "랏 {} 은(는) 이미 다른 열린 경매에 편성되어 있습니다",
                    entry.lot_id
                )));
            }
        }

        let id = state.allocate_id();
        let auction = Auction {
            id,
            auctioneer: new_auction.auctioneer,
            clock_location: new_auction.clock_location,
            start_date: new_auction.start_date,
            phase: AuctionPhase::Hidden,
            next_lot_start_time: None,
            created_at: Utc::now(),
        };
        state.auctions.insert(id, auction.clone());

        for (index, entry) in new_auction.lots.iter().enumerate() {
            if let Some(lot) = state.lots.get_mut(&entry.lot_id) {
                lot.max_price = Some(entry.max_price);
            }
            state.memberships.push(Membership {
                auction_id: id,
                lot_id: entry.lot_id,
                serve_order: (index + 1) as i32,
                closed_at: None,
            });
        }

        Ok(auction)
    }

    async fn get_auction(&self, auction_id: i64) -> Result<Auction, StoreError> {
        let state = self.state.lock().unwrap();
        state
            .auctions
            .get(&auction_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_open_auctions(&self) -> Result<Vec<Auction>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut auctions: Vec<Auction> = state
            .auctions
            .values()
            .filter(|a| a.phase != AuctionPhase::Finished)
            .cloned()
            .collect();
        auctions.sort_by_key(|a| a.start_date);
        Ok(auctions)
    }

    async fn get_live_auctions(&self) -> Result<Vec<Auction>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut auctions: Vec<Auction> = state
            .auctions
            .values()
            .filter(|a| a.phase == AuctionPhase::Live)
            .cloned()
            .collect();
        auctions.sort_by_key(|a| a.start_date);
        Ok(auctions)
    }

    async fn get_current_lot(&self, auction_id: i64) -> Result<Option<Lot>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.current_lot(auction_id))
    }

    async fn get_open_lots(&self, auction_id: i64) -> Result<Vec<QueuedLot>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut queued: Vec<QueuedLot> = state
            .memberships
            .iter()
            .filter(|m| m.auction_id == auction_id && m.closed_at.is_none())
            .filter_map(|m| {
                state.lots.get(&m.lot_id).and_then(|lot| {
                    (lot.stock > 0).then(|| QueuedLot {
                        serve_order: m.serve_order,
                        lot: lot.clone(),
                    })
                })
            })
            .collect();
        queued.sort_by_key(|q| q.serve_order);
        Ok(queued)
    }

    async fn try_advance_lot(
        &self,
        auction_id: i64,
        expected_lot_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;

        let membership = state.memberships.iter_mut().find(|m| {
            m.auction_id == auction_id && m.lot_id == expected_lot_id && m.closed_at.is_none()
        });

        match membership {
            Some(m) => {
                m.closed_at = Some(now);
                if let Some(auction) = state.auctions.get_mut(&auction_id) {
                    auction.next_lot_start_time = Some(now);
                }
                Ok(true)
            }
            // 이미 닫혀 있으면 경합 패배: no-op
            None => Ok(false),
        }
    }

    async fn try_decrement_stock(
        &self,
        lot_id: i64,
        quantity: i64,
    ) -> Result<Option<i64>, StoreError> {
        let mut state = self.state.lock().unwrap();
        let lot = state.lots.get_mut(&lot_id).ok_or(StoreError::NotFound)?;
        if lot.stock >= quantity {
            lot.stock -= quantity;
            Ok(Some(lot.stock))
        } else {
            Ok(None)
        }
    }

    async fn append_sale_record(&self, record: NewSaleRecord) -> Result<SaleRecord, StoreError> {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id();
        let sale = SaleRecord {
            id,
            auction_id: record.auction_id,
            lot_id: record.lot_id,
            buyer_id: record.buyer_id,
            quantity: record.quantity,
            unit_price: record.unit_price,
            sold_at: record.sold_at,
        };
        state.sales.push(sale.clone());
        Ok(sale)
    }

    async fn get_lot_sales(&self, lot_id: i64) -> Result<Vec<SaleRecord>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut sales: Vec<SaleRecord> = state
            .sales
            .iter()
            .filter(|s| s.lot_id == lot_id)
            .cloned()
            .collect();
        sales.sort_by(|a, b| b.sold_at.cmp(&a.sold_at));
        Ok(sales)
    }

    async fn update_auction_phase(
        &self,
        auction_id: i64,
        phase: AuctionPhase,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let auction = state
            .auctions
            .get_mut(&auction_id)
            .ok_or(StoreError::NotFound)?;
        auction.phase = phase;
        if phase == AuctionPhase::Live {
            auction.next_lot_start_time = Some(auction.start_date);
        }
        Ok(())
    }
}

// endregion: --- In-Memory Store

// region:    --- Tests


// endregion: --- Tests
