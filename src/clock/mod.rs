/// 서버 시간 권위(clock authority) 및 클라이언트 시간 동기화
/// 스케줄러와 구매 처리 모두 이 트레이트를 통해서만 현재 시간을 읽는다.
// region:    --- Imports
use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

// endregion: --- Imports

// region:    --- Clock Trait

/// 권위 있는 현재 시간을 제공하는 트레이트 (테스트에서 주입 가능)
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 시스템 시계 (운영용)
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 수동 시계 (테스트용): 설정된 시각을 반환하고 임의로 전진시킬 수 있다.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// 시계를 지정된 초만큼 전진
    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.lock().unwrap();
        *now += Duration::seconds(secs);
    }

    /// 시계를 지정된 밀리초만큼 전진
    pub fn advance_millis(&self, millis: i64) {
        let mut now = self.now.lock().unwrap();
        *now += Duration::milliseconds(millis);
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// endregion: --- Clock Trait

// region:    --- Client Clock Sync

/// 클라이언트 측 시간 보정
/// 스냅샷 응답의 server_time 으로 오프셋을 한 번 계산하고,
/// 이후 카운트다운은 로컬 시계 + 오프셋으로만 렌더링한다.
#[derive(Debug, Clone, Copy)]
pub struct ClientClock {
    offset: Duration,
}

impl ClientClock {
    /// 스냅샷의 서버 시간과 로컬 시간으로 오프셋 계산
    pub fn from_snapshot(server_time: DateTime<Utc>, local_time: DateTime<Utc>) -> Self {
        Self {
            offset: server_time - local_time,
        }
    }

    /// 로컬 시간을 서버 기준 시간으로 변환
    pub fn server_now(&self, local_now: DateTime<Utc>) -> DateTime<Utc> {
        local_now + self.offset
    }

    pub fn offset(&self) -> Duration {
        self.offset
    }
}

// endregion: --- Client Clock Sync

// region:    --- Tests


// endregion: --- Tests
