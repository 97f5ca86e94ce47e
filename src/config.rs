/// 경매 시계 엔진 설정
/// 환경 변수에서 읽어오며, 없으면 기본값을 사용한다.
// region:    --- Imports
use tracing::info;

// endregion: --- Imports

// region:    --- Auction Config

/// 경매 시계 엔진 설정값
#[derive(Debug, Clone)]
pub struct AuctionConfig {
    /// 경매 노출 리드 타임(초): start_date 이 시간 전부터 경매가 보이기 시작한다.
    pub visibility_window_seconds: i64,
    /// 랏 하나의 최소 하락 시간(초)
    pub min_lot_duration_seconds: i64,
    /// 최대 하락 시간 상한 적용 여부
    pub use_max_lot_duration: bool,
    /// 랏 하나의 최대 하락 시간(초)
    pub max_lot_duration_seconds: i64,
    /// 스케줄러 틱 간격(밀리초)
    pub tick_interval_ms: u64,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            visibility_window_seconds: 7200, // 2시간
            min_lot_duration_seconds: 30,
            use_max_lot_duration: false,
            max_lot_duration_seconds: 300,
            tick_interval_ms: 1000,
        }
    }
}

impl AuctionConfig {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let config = Self {
            visibility_window_seconds: env_i64(
                "VISIBILITY_WINDOW_SECONDS",
                defaults.visibility_window_seconds,
            ),
            min_lot_duration_seconds: env_i64(
                "MIN_LOT_DURATION_SECONDS",
                defaults.min_lot_duration_seconds,
            ),
            use_max_lot_duration: std::env::var("USE_MAX_LOT_DURATION")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.use_max_lot_duration),
            max_lot_duration_seconds: env_i64(
                "MAX_LOT_DURATION_SECONDS",
                defaults.max_lot_duration_seconds,
            ),
            tick_interval_ms: env_i64("TICK_INTERVAL_MS", defaults.tick_interval_ms as i64) as u64,
        };
        info!("{:<12} --> 설정 로드 완료: {:?}", "Config", config);
        config
    }
}

/// 환경 변수를 i64로 파싱, 실패 시 기본값
fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// endregion: --- Auction Config
