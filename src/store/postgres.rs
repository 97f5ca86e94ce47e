/// PostgreSQL 저장소 구현
// region:    --- Imports
use crate::auction::model::{
    Auction, AuctionPhase, Lot, NewAuction, NewLot, NewProduct, NewSaleRecord, Product, QueuedLot,
    SaleRecord,
};
use crate::store::{queries, AuctionStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use tracing::info;

// endregion: --- Imports

// region:    --- Postgres Store

pub struct PostgresAuctionStore {
    pool: Arc<PgPool>,
}

impl PostgresAuctionStore {
    /// 저장소 연결 (DATABASE_URL 환경 변수 필요)
    pub async fn connect() -> Self {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .expect("Failed to create pool");
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> Arc<PgPool> {
        Arc::clone(&self.pool)
    }

    /// 스키마 초기화
    pub async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        // 00-recreate-db.sql 실행
        let recreate_db_sql = include_str!("../sql/00-recreate-db.sql");
        self.execute_multi_query(recreate_db_sql).await?;

        // 01-create-schema.sql 실행
        let create_schema_sql = include_str!("../sql/01-create-schema.sql");
        self.execute_multi_query(create_schema_sql).await?;

        info!("{:<12} --> 스키마 초기화 완료", "Store");
        Ok(())
    }

    /// 여러 쿼리 실행
    async fn execute_multi_query(&self, sql: &str) -> Result<(), sqlx::Error> {
        for query in sql.split(';') {
            let query = query.trim();
            if !query.is_empty() {
                sqlx::query(query).execute(&*self.pool).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AuctionStore for PostgresAuctionStore {
    async fn register_product(&self, new_product: NewProduct) -> Result<Product, StoreError> {
        let product = sqlx::query_as::<_, Product>(queries::INSERT_PRODUCT)
            .bind(&new_product.name)
            .bind(&new_product.description)
            .bind(&new_product.image_url)
            .fetch_one(&*self.pool)
            .await?;
        Ok(product)
    }

    async fn register_lot(&self, new_lot: NewLot) -> Result<Lot, StoreError> {
        if new_lot.min_price < 0 || new_lot.stock < 0 {
            return Err(StoreError::Conflict(
                "바닥가와 재고는 음수일 수 없습니다".to_string(),
            ));
        }
        let lot = sqlx::query_as::<_, Lot>(queries::INSERT_LOT)
            .bind(new_lot.product_id)
            .bind(&new_lot.provider)
            .bind(&new_lot.region)
            .bind(new_lot.harvested_at)
            .bind(new_lot.stem_length_cm)
            .bind(new_lot.min_price)
            .bind(new_lot.stock)
            .bind(Utc::now())
            .fetch_one(&*self.pool)
            .await?;
        Ok(lot)
    }

    async fn create_auction(&self, new_auction: NewAuction) -> Result<Auction, StoreError> {
        if new_auction.lots.is_empty() {
            return Err(StoreError::Conflict(
                "경매에는 최소 한 개의 랏이 필요합니다".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let auction = sqlx::query_as::<_, Auction>(queries::INSERT_AUCTION)
            .bind(&new_auction.auctioneer)
            .bind(&new_auction.clock_location)
            .bind(new_auction.start_date)
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await?;

        // serve_order 는 편성 순서대로 1부터 증가
        for (index, entry) in new_auction.lots.iter().enumerate() {
            // 랏 행을 먼저 잠그고 나서 편성 여부를 센다. 잠금 없이 세면
            // 동시 create_auction 두 건이 모두 0 을 읽고 같은 랏을 편성한다.
            let locked: Option<i64> = sqlx::query_scalar(queries::LOCK_LOT)
                .bind(entry.lot_id)
                .fetch_optional(&mut *tx)
                .await?;
            if locked.is_none() {
                tx.rollback().await.map_err(StoreError::from)?;
                return Err(StoreError::NotFound);
            }

            let open_memberships: i64 = sqlx::query_scalar(queries::COUNT_OPEN_MEMBERSHIPS)
                .bind(entry.lot_id)
                .fetch_one(&mut *tx)
                .await?;
            if open_memberships > 0 {
                tx.rollback().await.map_err(StoreError::from)?;
                return Err(StoreError::Conflict(format!(
                    "랏 {} 은(는) 이미 다른 열린 경매에 편성되어 있습니다",
                    entry.lot_id
                )));
            }

            // 시작가 부여: 바닥가 이상일 때만 갱신된다
            let assigned = sqlx::query(queries::ASSIGN_CEILING_PRICE)
                .bind(entry.lot_id)
                .bind(entry.max_price)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from)?
                .rows_affected();
            if assigned == 0 {
                tx.rollback().await.map_err(StoreError::from)?;
                return Err(StoreError::Conflict(format!(
                    "랏 {} 의 시작가가 바닥가보다 낮거나 랏이 없습니다",
                    entry.lot_id
                )));
            }

            sqlx::query(queries::INSERT_MEMBERSHIP)
                .bind(auction.id)
                .bind(entry.lot_id)
                .bind((index + 1) as i32)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from)?;
        }

        tx.commit().await.map_err(StoreError::from)?;
        info!(
            "{:<12} --> 경매 {} 생성: 랏 {}개, 시작 {}",
            "Store",
            auction.id,
            new_auction.lots.len(),
            auction.start_date
        );
        Ok(auction)
    }

    async fn get_auction(&self, auction_id: i64) -> Result<Auction, StoreError> {
        let auction = sqlx::query_as::<_, Auction>(queries::GET_AUCTION)
            .bind(auction_id)
            .fetch_optional(&*self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(auction)
    }

    async fn get_open_auctions(&self) -> Result<Vec<Auction>, StoreError> {
        let auctions = sqlx::query_as::<_, Auction>(queries::GET_OPEN_AUCTIONS)
            .fetch_all(&*self.pool)
            .await?;
        Ok(auctions)
    }

    async fn get_live_auctions(&self) -> Result<Vec<Auction>, StoreError> {
        let auctions = sqlx::query_as::<_, Auction>(queries::GET_LIVE_AUCTIONS)
            .fetch_all(&*self.pool)
            .await?;
        Ok(auctions)
    }

    async fn get_current_lot(&self, auction_id: i64) -> Result<Option<Lot>, StoreError> {
        let lot = sqlx::query_as::<_, Lot>(queries::GET_CURRENT_LOT)
            .bind(auction_id)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(lot)
    }

    async fn get_open_lots(&self, auction_id: i64) -> Result<Vec<QueuedLot>, StoreError> {
        let lots = sqlx::query_as::<_, QueuedLot>(queries::GET_OPEN_LOTS)
            .bind(auction_id)
            .fetch_all(&*self.pool)
            .await?;
        Ok(lots)
    }

    async fn try_advance_lot(
        &self,
        auction_id: i64,
        expected_lot_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        // 편성이 아직 열려 있을 때만 닫힌다. affected rows 0 = 경합 패배.
        let closed = sqlx::query(queries::CLOSE_MEMBERSHIP)
            .bind(auction_id)
            .bind(expected_lot_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?
            .rows_affected();

        if closed == 0 {
            tx.rollback().await.map_err(StoreError::from)?;
            return Ok(false);
        }

        // 다음 랏의 하락 시계는 지금부터 새로 시작
        sqlx::query(queries::RESET_LOT_TIMER)
            .bind(auction_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;

        tx.commit().await.map_err(StoreError::from)?;
        Ok(true)
    }

    async fn try_decrement_stock(
        &self,
        lot_id: i64,
        quantity: i64,
    ) -> Result<Option<i64>, StoreError> {
        let remaining: Option<i64> = sqlx::query_scalar(queries::DECREMENT_STOCK)
            .bind(lot_id)
            .bind(quantity)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(remaining)
    }

    async fn append_sale_record(&self, record: NewSaleRecord) -> Result<SaleRecord, StoreError> {
        let sale = sqlx::query_as::<_, SaleRecord>(queries::INSERT_SALE)
            .bind(record.auction_id)
            .bind(record.lot_id)
            .bind(record.buyer_id)
            .bind(record.quantity)
            .bind(record.unit_price)
            .bind(record.sold_at)
            .fetch_one(&*self.pool)
            .await?;
        Ok(sale)
    }

    async fn get_lot_sales(&self, lot_id: i64) -> Result<Vec<SaleRecord>, StoreError> {
        let sales = sqlx::query_as::<_, SaleRecord>(queries::GET_LOT_SALES)
            .bind(lot_id)
            .fetch_all(&*self.pool)
            .await?;
        Ok(sales)
    }

    async fn update_auction_phase(
        &self,
        auction_id: i64,
        phase: AuctionPhase,
    ) -> Result<(), StoreError> {
        sqlx::query(queries::UPDATE_AUCTION_PHASE)
            .bind(auction_id)
            .bind(phase.as_str())
            .execute(&*self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }
}

// endregion: --- Postgres Store
