/// 영속성 추상화: 경매 시계 엔진이 보는 저장소 표면
/// 스케줄러와 구매 경로 양쪽이 같은 트레이트를 통해 상태를 변경하며,
/// 경합 해소(조건부 업데이트)는 전부 이 표면 뒤에서 일어난다.
// region:    --- Imports
use crate::auction::model::{
    Auction, AuctionPhase, Lot, NewAuction, NewLot, NewProduct, NewSaleRecord, Product, QueuedLot,
    SaleRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

pub mod memory;
pub mod postgres;
pub mod queries;

// endregion: --- Imports

// region:    --- Store Error

#[derive(Debug)]
pub enum StoreError {
    /// 경매/랏이 존재하지 않음 (호출자 오류)
    NotFound,
    /// 생성 규칙 위반 (중복 편성, 바닥가보다 낮은 시작가 등)
    Conflict(String),
    /// 저장소 내부 오류
    Database(sqlx::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "대상을 찾을 수 없습니다"),
            StoreError::Conflict(reason) => write!(f, "저장소 규칙 위반: {}", reason),
            StoreError::Database(e) => write!(f, "데이터베이스 오류: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            other => StoreError::Database(other),
        }
    }
}

// endregion: --- Store Error

// region:    --- Auction Store Trait

#[async_trait]
pub trait AuctionStore: Send + Sync {
    /// 기본 상품 등록
    async fn register_product(&self, new_product: NewProduct) -> Result<Product, StoreError>;

    /// 랏 등록 (바닥가 필수, 시작가는 경매 편성 시 부여)
    async fn register_lot(&self, new_lot: NewLot) -> Result<Lot, StoreError>;

    /// 경매 생성: 경매 본체와 랏 편성을 원자적으로 만들고 시작가를 부여한다.
    /// 이미 다른 열린 경매에 편성된 랏, 바닥가 미만의 시작가는 Conflict.
    async fn create_auction(&self, new_auction: NewAuction) -> Result<Auction, StoreError>;

    async fn get_auction(&self, auction_id: i64) -> Result<Auction, StoreError>;

    /// 종료되지 않은 모든 경매 (스케줄러 틱 대상)
    async fn get_open_auctions(&self) -> Result<Vec<Auction>, StoreError>;

    /// 라이브 경매만
    async fn get_live_auctions(&self) -> Result<Vec<Auction>, StoreError>;

    /// 현재 서빙 중인 랏: serve_order 가 가장 낮고, 닫히지 않았고, 재고가 남은 편성
    async fn get_current_lot(&self, auction_id: i64) -> Result<Option<Lot>, StoreError>;

    /// 현재 및 대기 중인 랏 전체 (serve_order 오름차순)
    async fn get_open_lots(&self, auction_id: i64) -> Result<Vec<QueuedLot>, StoreError>;

    /// 랏 전진 조건부 업데이트 (compare-and-swap):
    /// expected_lot 의 편성이 아직 열려 있을 때만 닫고, 같은 트랜잭션에서
    /// 경매의 next_lot_start_time 을 now 로 재설정한다.
    /// 이미 닫혀 있으면 false (경합 패배, 호출자는 no-op 처리).
    async fn try_advance_lot(
        &self,
        auction_id: i64,
        expected_lot_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// 재고 차감 원자 연산: stock >= quantity 일 때만 차감하고 남은 재고를 반환.
    /// 조건 불충족(경합 패배 포함)이면 None.
    async fn try_decrement_stock(
        &self,
        lot_id: i64,
        quantity: i64,
    ) -> Result<Option<i64>, StoreError>;

    /// 판매 기록 추가 (append-only)
    async fn append_sale_record(&self, record: NewSaleRecord) -> Result<SaleRecord, StoreError>;

    /// 랏의 판매 이력 조회
    async fn get_lot_sales(&self, lot_id: i64) -> Result<Vec<SaleRecord>, StoreError>;

    /// 경매 단계 갱신. Live 진입 시 next_lot_start_time = start_date 로 설정하여
    /// 첫 랏의 하락이 정확히 예정 시각부터 시작되게 한다.
    async fn update_auction_phase(
        &self,
        auction_id: i64,
        phase: AuctionPhase,
    ) -> Result<(), StoreError>;
}

// endregion: --- Auction Store Trait
