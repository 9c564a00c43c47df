use chrono::{DateTime, Utc};

/// 現在時刻の取得元。テストでは固定値を差し込む。
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// エポックからのミリ秒
    fn unix_timestamp_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
