/// 가격 하락 함수(PriceDecayFunction)와 하락 시간 정책(DurationPolicy)
/// 둘 다 순수 함수다. 스케줄러와 스냅샷 경로가 같은 입력에 대해
/// 반드시 같은 결과를 내야 하므로 상태나 I/O를 가지면 안 된다.
// region:    --- Imports
use crate::config::AuctionConfig;

// endregion: --- Imports

// region:    --- Price Decay

/// 시작가의 초당 하락 비율 (5%/초)
pub const DECAY_RATE_PER_SEC: f64 = 0.05;

/// 현재 가격 계산 (센트 단위)
/// elapsed <= 0 이면 시작가, elapsed >= duration 이면 바닥가로 클램프.
/// 표시 가격은 항상 올림 처리하여 구매자가 실제 순간 가치보다
/// 싸게 사는 일이 없도록 한다.
pub fn price_at(start_price: i64, floor_price: i64, elapsed_secs: f64, duration_secs: f64) -> i64 {
    if elapsed_secs <= 0.0 {
        return start_price;
    }
    if duration_secs <= 0.0 || elapsed_secs >= duration_secs {
        return floor_price;
    }

    let span = (start_price - floor_price) as f64;
    let dropped = span * (elapsed_secs / duration_secs);
    let price = (start_price as f64 - dropped).ceil() as i64;

    price.clamp(floor_price, start_price)
}

/// 하락 진행률 [0, 1] (프로그레스 바 용, 반올림 없음)
pub fn decay_fraction(elapsed_secs: f64, duration_secs: f64) -> f64 {
    if duration_secs <= 0.0 {
        return 1.0;
    }
    (elapsed_secs / duration_secs).clamp(0.0, 1.0)
}

// endregion: --- Price Decay

// region:    --- Duration Policy

/// 랏 하나의 유효 하락 시간(초) 계산
/// 기본 속도는 시작가의 5%/초. implied = (시작가 - 바닥가) / (시작가 * 0.05),
/// 유효 시간 = max(최소 시간, implied), 설정에 따라 최대 시간으로 캡.
/// 시작가가 0 이하라면 0을 반환하여 다음 틱에 즉시 만료 처리되도록 한다.
/// 랏 활성화 시점에 한 번만 평가하고 그 활성화 동안 불변으로 취급한다.
pub fn effective_duration_secs(start_price: i64, floor_price: i64, config: &AuctionConfig) -> f64 {
    let rate = start_price as f64 * DECAY_RATE_PER_SEC;
    if rate <= 0.0 {
        return 0.0;
    }

    let implied = (start_price - floor_price).max(0) as f64 / rate;
    let mut duration = implied.max(config.min_lot_duration_seconds as f64);
    if config.use_max_lot_duration {
        duration = duration.min(config.max_lot_duration_seconds as f64);
    }
    duration
}

// endregion: --- Duration Policy

// region:    --- Tests


// endregion: --- Tests
