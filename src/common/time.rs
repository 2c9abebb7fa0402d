use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;

    fn now_ms(&self) -> i64 {
        epoch_millis(self.now())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Milliseconds since the Unix epoch; instants before the epoch clamp to 0.
pub fn epoch_millis(ts: SystemTime) -> i64 {
    ts.duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

pub fn from_epoch_millis(ms: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_millis_roundtrips_whole_milliseconds() {
        let ts = from_epoch_millis(1_702_800_000_000);
        assert_eq!(epoch_millis(ts), 1_702_800_000_000);
    }

    #[test]
    fn epoch_millis_clamps_pre_epoch() {
        let ts = UNIX_EPOCH - Duration::from_secs(5);
        assert_eq!(epoch_millis(ts), 0);
    }
}
