use crate::probe_engine::{DEFAULT_PROBE_TIMEOUT, TransportKind, TransportOptions};
use crate::storage::DEFAULT_RETENTION_DAYS;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TARGET: &str = "https://www.google.com";
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);
pub const DB_FILE_NAME: &str = "netpulse.db";

#[derive(Clone, Debug)]
pub struct MonitorConfig {
    pub target: String,
    pub interval: Duration,
    pub transport: TransportKind,
    pub probe_timeout: Duration,
    pub retention_days: u32,
    /// `None` runs without durable history.
    pub db_path: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET.to_string(),
            interval: DEFAULT_INTERVAL,
            transport: TransportKind::default(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            retention_days: DEFAULT_RETENTION_DAYS,
            db_path: default_db_path(),
        }
    }
}

impl MonitorConfig {
    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            timeout: self.probe_timeout,
            interval: self.interval,
        }
    }

    pub fn history_enabled(&self) -> bool {
        self.db_path.is_some()
    }
}

fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("netpulse"))
}

pub fn default_db_path() -> Option<PathBuf> {
    data_dir().map(|p| p.join(DB_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = MonitorConfig::default();
        assert_eq!(config.target, DEFAULT_TARGET);
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.transport, TransportKind::Http);
    }

    #[test]
    fn transport_options_carry_interval_and_timeout() {
        let config = MonitorConfig {
            interval: Duration::from_millis(2500),
            probe_timeout: Duration::from_secs(3),
            ..MonitorConfig::default()
        };
        let options = config.transport_options();
        assert_eq!(options.interval, Duration::from_millis(2500));
        assert_eq!(options.timeout, Duration::from_secs(3));
    }

    #[test]
    fn default_db_path_ends_with_file_name() {
        if let Some(path) = default_db_path() {
            assert!(path.ends_with(DB_FILE_NAME));
        }
    }
}
