/// 도메인 모델: 상품, 랏, 경매, 경매-랏 큐, 판매 기록
// region:    --- Imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

// endregion: --- Imports

// region:    --- Product

/// 기본 상품 정의 (여러 판매자의 랏이 동일한 품종 메타데이터를 공유)
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub image_url: Option<String>,
}

/// 상품 등록 요청
#[derive(Debug, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub image_url: Option<String>,
}

// endregion: --- Product

// region:    --- Lot

/// 랏의 가격 상태
/// 바닥가만 등록된 랏은 Unpriced, 경매에 편성되어 시작가까지 정해지면 Priced.
/// Priced 랏만 경매 편성 대상이 될 수 있다.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Pricing {
    Unpriced,
    Priced { floor: i64, ceiling: i64 },
}

/// 판매자가 등록한 랏 (특정 상품의 판매 가능 수량)
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Lot {
    pub id: i64,
    pub product_id: i64,
    pub provider: String,
    pub region: String,
    pub harvested_at: DateTime<Utc>,
    pub stem_length_cm: Option<i32>,
    /// 바닥가(센트). 등록 시 필수.
    pub min_price: i64,
    /// 시작가(센트). 경매 편성 시점에 부여된다.
    pub max_price: Option<i64>,
    /// 남은 수량. 경매가 라이브된 이후에는 감소만 한다.
    pub stock: i64,
    pub created_at: DateTime<Utc>,
}

impl Lot {
    /// 가격 상태를 명시적 합 타입으로 노출
    pub fn pricing(&self) -> Pricing {
        match self.max_price {
            Some(ceiling) => Pricing::Priced {
                floor: self.min_price,
                ceiling,
            },
            None => Pricing::Unpriced,
        }
    }
}

/// 랏 등록 요청
#[derive(Debug, Serialize, Deserialize)]
pub struct NewLot {
    pub product_id: i64,
    pub provider: String,
    pub region: String,
    pub harvested_at: DateTime<Utc>,
    pub stem_length_cm: Option<i32>,
    pub min_price: i64,
    pub stock: i64,
}

// endregion: --- Lot

// region:    --- Auction

/// 경매 수명주기 단계 (Hidden -> Visible -> Live -> Finished, 역행 없음)
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuctionPhase {
    Hidden,
    Visible,
    Live,
    Finished,
}

impl AuctionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionPhase::Hidden => "HIDDEN",
            AuctionPhase::Visible => "VISIBLE",
            AuctionPhase::Live => "LIVE",
            AuctionPhase::Finished => "FINISHED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HIDDEN" => Some(AuctionPhase::Hidden),
            "VISIBLE" => Some(AuctionPhase::Visible),
            "LIVE" => Some(AuctionPhase::Live),
            "FINISHED" => Some(AuctionPhase::Finished),
            _ => None,
        }
    }
}

/// 경매
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Auction {
    pub id: i64,
    pub auctioneer: String,
    /// 물리/가상 시계 위치. 같은 위치에서 동시에 라이브 경매는 하나만 허용.
    pub clock_location: String,
    /// 첫 랏 예정 시각
    pub start_date: DateTime<Utc>,
    pub phase: AuctionPhase,
    /// 현재 서빙 중인 랏의 하락 시작 시각 (활성 랏이 없으면 None)
    pub next_lot_start_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl FromRow<'_, PgRow> for Auction {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let phase_text: String = row.try_get("phase")?;
        let phase = AuctionPhase::parse(&phase_text).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "phase".into(),
            source: format!("알 수 없는 경매 단계: {}", phase_text).into(),
        })?;

        Ok(Auction {
            id: row.try_get("id")?,
            auctioneer: row.try_get("auctioneer")?,
            clock_location: row.try_get("clock_location")?,
            start_date: row.try_get("start_date")?,
            phase,
            next_lot_start_time: row.try_get("next_lot_start_time")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// 경매 생성 요청: 경매 본체와 서빙 순서가 매겨진 랏 편성을 원자적으로 만든다.
#[derive(Debug, Serialize, Deserialize)]
pub struct NewAuction {
    pub auctioneer: String,
    pub clock_location: String,
    pub start_date: DateTime<Utc>,
    /// 서빙 순서대로 나열된 랏 편성 (벡터 순서 = serve_order)
    pub lots: Vec<NewAuctionLot>,
}

/// 경매 편성 항목: 랏과 경매용 시작가
#[derive(Debug, Serialize, Deserialize)]
pub struct NewAuctionLot {
    pub lot_id: i64,
    /// 경매 시작가(센트). 랏의 바닥가 이상이어야 한다.
    pub max_price: i64,
}

/// 경매 큐 안의 랏 (serve_order 포함)
#[derive(Debug, Serialize, Clone)]
pub struct QueuedLot {
    pub serve_order: i32,
    pub lot: Lot,
}

impl FromRow<'_, PgRow> for QueuedLot {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(QueuedLot {
            serve_order: row.try_get("serve_order")?,
            lot: Lot::from_row(row)?,
        })
    }
}

// endregion: --- Auction

// region:    --- Sale Record

/// 판매 기록 (불변, append-only 원장)
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct SaleRecord {
    pub id: i64,
    pub auction_id: i64,
    pub lot_id: i64,
    pub buyer_id: i64,
    pub quantity: i64,
    /// 구매 확정 순간의 단가(센트). 항상 서버가 재계산한 값.
    pub unit_price: i64,
    pub sold_at: DateTime<Utc>,
}

/// 판매 기록 추가 요청
#[derive(Debug, Clone)]
pub struct NewSaleRecord {
    pub auction_id: i64,
    pub lot_id: i64,
    pub buyer_id: i64,
    pub quantity: i64,
    pub unit_price: i64,
    pub sold_at: DateTime<Utc>,
}

// endregion: --- Sale Record
