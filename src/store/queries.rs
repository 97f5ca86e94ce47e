/// 상품 등록
pub const INSERT_PRODUCT: &str = r#"
    INSERT INTO products (name, description, image_url)
    VALUES ($1, $2, $3)
    RETURNING id, name, description, image_url
"#;

/// 랏 등록
pub const INSERT_LOT: &str = r#"
    INSERT INTO lots (product_id, provider, region, harvested_at, stem_length_cm, min_price, stock, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    RETURNING id, product_id, provider, region, harvested_at, stem_length_cm, min_price, max_price, stock, created_at
"#;

/// 경매 생성
pub const INSERT_AUCTION: &str = r#"
    INSERT INTO auctions (auctioneer, clock_location, start_date, phase, created_at)
    VALUES ($1, $2, $3, 'HIDDEN', $4)
    RETURNING id, auctioneer, clock_location, start_date, phase, next_lot_start_time, created_at
"#;

/// 편성 검증 전에 랏 행을 잠근다 (동시 편성 시도의 직렬화 지점)
pub const LOCK_LOT: &str = "SELECT id FROM lots WHERE id = $1 FOR UPDATE";

/// 랏이 다른 열린 경매에 이미 편성되어 있는지 확인
pub const COUNT_OPEN_MEMBERSHIPS: &str = r#"
    SELECT COUNT(*) FROM auction_lots al
    JOIN auctions a ON a.id = al.auction_id
    WHERE al.lot_id = $1 AND a.phase != 'FINISHED' AND al.closed_at IS NULL
"#;

/// 경매 편성 시 시작가 부여 (바닥가 이상일 때만)
pub const ASSIGN_CEILING_PRICE: &str =
    "UPDATE lots SET max_price = $2 WHERE id = $1 AND min_price <= $2";

/// 경매-랏 편성 추가
pub const INSERT_MEMBERSHIP: &str =
    "INSERT INTO auction_lots (auction_id, lot_id, serve_order) VALUES ($1, $2, $3)";

/// 경매 조회
pub const GET_AUCTION: &str = r#"
    SELECT id, auctioneer, clock_location, start_date, phase, next_lot_start_time, created_at
    FROM auctions WHERE id = $1
"#;

/// 종료되지 않은 경매 조회
pub const GET_OPEN_AUCTIONS: &str = r#"
    SELECT id, auctioneer, clock_location, start_date, phase, next_lot_start_time, created_at
    FROM auctions WHERE phase != 'FINISHED' ORDER BY start_date
"#;

/// 라이브 경매 조회
pub const GET_LIVE_AUCTIONS: &str = r#"
    SELECT id, auctioneer, clock_location, start_date, phase, next_lot_start_time, created_at
    FROM auctions WHERE phase = 'LIVE' ORDER BY start_date
"#;

/// 현재 서빙 중인 랏: 닫히지 않은 편성 중 serve_order 최솟값, 재고 > 0
pub const GET_CURRENT_LOT: &str = r#"
    SELECT l.id, l.product_id, l.provider, l.region, l.harvested_at, l.stem_length_cm,
           l.min_price, l.max_price, l.stock, l.created_at
    FROM auction_lots al
    JOIN lots l ON l.id = al.lot_id
    WHERE al.auction_id = $1 AND al.closed_at IS NULL AND l.stock > 0
    ORDER BY al.serve_order ASC
    LIMIT 1
"#;

/// 현재 및 대기 중인 랏 전체
pub const GET_OPEN_LOTS: &str = r#"
    SELECT al.serve_order, l.id, l.product_id, l.provider, l.region, l.harvested_at,
           l.stem_length_cm, l.min_price, l.max_price, l.stock, l.created_at
    FROM auction_lots al
    JOIN lots l ON l.id = al.lot_id
    WHERE al.auction_id = $1 AND al.closed_at IS NULL AND l.stock > 0
    ORDER BY al.serve_order ASC
"#;

/// 랏 전진 CAS: 아직 열려 있는 편성만 닫는다 (affected rows 로 승패 판정)
pub const CLOSE_MEMBERSHIP: &str = r#"
    UPDATE auction_lots SET closed_at = $3
    WHERE auction_id = $1 AND lot_id = $2 AND closed_at IS NULL
"#;

/// 전진 후 하락 타이머 재설정
pub const RESET_LOT_TIMER: &str = "UPDATE auctions SET next_lot_start_time = $2 WHERE id = $1";

/// 재고 차감 원자 연산 (두 구매자가 동시에 초과 판매할 수 없다)
pub const DECREMENT_STOCK: &str =
    "UPDATE lots SET stock = stock - $2 WHERE id = $1 AND stock >= $2 RETURNING stock";

/// 판매 기록 추가
pub const INSERT_SALE: &str = r#"
    INSERT INTO sales (auction_id, lot_id, buyer_id, quantity, unit_price, sold_at)
    VALUES ($1, $2, $3, $4, $5, $6)
    RETURNING id, auction_id, lot_id, buyer_id, quantity, unit_price, sold_at
"#;

/// 랏 판매 이력 조회
pub const GET_LOT_SALES: &str = r#"
    SELECT id, auction_id, lot_id, buyer_id, quantity, unit_price, sold_at
    FROM sales WHERE lot_id = $1 ORDER BY sold_at DESC
"#;

/// 경매 단계 갱신 (LIVE 진입 시 타이머를 start_date 로 설정)
pub const UPDATE_AUCTION_PHASE: &str = r#"
    UPDATE auctions
    SET phase = $2,
        next_lot_start_time = CASE WHEN $2 = 'LIVE' THEN start_date ELSE next_lot_start_time END
    WHERE id = $1
"#;
