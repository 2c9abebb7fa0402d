use crate::common::net::parse_target_url;
use crate::config::{DEFAULT_TARGET, MonitorConfig, default_db_path};
use crate::data_model::settings::AppSettings;
use crate::probe_engine::TransportKind;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "netpulse")]
#[command(about = "Continuous network latency probe with rolling statistics", long_about = None)]
pub struct CliArgs {
    /// Target URL or host to probe
    #[arg(short, long, value_name = "URL", default_value = DEFAULT_TARGET)]
    target: String,

    /// Polling interval in milliseconds
    #[arg(short, long, default_value_t = 1000)]
    interval_ms: u64,

    /// Probe mechanism
    #[arg(long, value_enum, default_value_t = TransportKind::Http)]
    transport: TransportKind,

    /// Per-probe timeout in milliseconds (http and tcp)
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Days of history kept in the database
    #[arg(long, default_value_t = 30)]
    retention_days: u32,

    /// SQLite database path (defaults to the user data directory)
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Keep measurements in memory only
    #[arg(long, conflicts_with = "db")]
    no_history: bool,

    /// Stop after this many seconds
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print one JSON object per measurement
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("polling interval must be greater than zero (got {value})")]
    InvalidInterval { value: u64 },
    #[error("probe timeout must be greater than zero (got {value})")]
    InvalidTimeout { value: u64 },
    #[error("retention must be at least one day (got {value})")]
    InvalidRetention { value: u32 },
    #[error("target is not a valid URL or host: {value:?}")]
    InvalidTarget { value: String },
}

pub fn load_from_cli() -> Result<AppSettings, SettingsError> {
    let args = CliArgs::parse();
    from_args(args)
}

pub fn from_args(args: CliArgs) -> Result<AppSettings, SettingsError> {
    if args.interval_ms == 0 {
        return Err(SettingsError::InvalidInterval {
            value: args.interval_ms,
        });
    }
    if args.timeout_ms == 0 {
        return Err(SettingsError::InvalidTimeout {
            value: args.timeout_ms,
        });
    }
    if args.retention_days == 0 {
        return Err(SettingsError::InvalidRetention {
            value: args.retention_days,
        });
    }
    let target = match parse_target_url(&args.target) {
        Some(url) if url.host_str().is_some() => url.to_string(),
        _ => return Err(SettingsError::InvalidTarget { value: args.target }),
    };

    let db_path = if args.no_history {
        None
    } else {
        args.db.or_else(default_db_path)
    };

    Ok(AppSettings {
        target,
        interval_ms: args.interval_ms,
        transport: args.transport,
        timeout_ms: args.timeout_ms,
        retention_days: args.retention_days,
        db_path,
        duration_secs: args.duration_secs,
        log_level: args.log_level,
        json: args.json,
    })
}

pub fn apply_monitor(settings: &AppSettings, config: &mut MonitorConfig) {
    config.target = settings.target.clone();
    config.interval = Duration::from_millis(settings.interval_ms);
    config.transport = settings.transport;
    config.probe_timeout = Duration::from_millis(settings.timeout_ms);
    config.retention_days = settings.retention_days;
    config.db_path = settings.db_path.clone();
}

#[cfg(test)]
mod tests {
    use super::{CliArgs, SettingsError, apply_monitor, from_args};
    use crate::config::{DEFAULT_TARGET, MonitorConfig};
    use crate::probe_engine::TransportKind;
    use clap::Parser;
    use std::path::PathBuf;
    use std::time::Duration;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["netpulse"];
        argv.extend_from_slice(extra);
        CliArgs::try_parse_from(argv).expect("parse")
    }

    #[test]
    fn defaults_follow_documented_values() {
        let settings = from_args(args(&[])).expect("settings");
        assert_eq!(settings.target, format!("{DEFAULT_TARGET}/"));
        assert_eq!(settings.interval_ms, 1000);
        assert_eq!(settings.transport, TransportKind::Http);
        assert_eq!(settings.retention_days, 30);
        assert!(!settings.json);
    }

    #[test]
    fn explicit_options_are_kept() {
        let settings = from_args(args(&[
            "--target",
            "1.1.1.1",
            "--interval-ms",
            "2000",
            "--transport",
            "ping",
            "--db",
            "/tmp/pings.db",
            "--duration-secs",
            "10",
        ]))
        .expect("settings");

        assert_eq!(settings.target, "https://1.1.1.1/");
        assert_eq!(settings.transport, TransportKind::Ping);
        assert_eq!(settings.db_path, Some(PathBuf::from("/tmp/pings.db")));
        assert_eq!(settings.duration_secs, Some(10));
    }

    #[test]
    fn bare_host_target_is_normalised_to_https_url() {
        let settings = from_args(args(&["--target", " www.google.com "])).expect("settings");
        assert_eq!(settings.target, "https://www.google.com/");

        let settings = from_args(args(&["--target", "http://example.com:8080/health"]))
            .expect("settings");
        assert_eq!(settings.target, "http://example.com:8080/health");
    }

    #[test]
    fn no_history_clears_db_path() {
        let settings = from_args(args(&["--no-history"])).expect("settings");
        assert_eq!(settings.db_path, None);
    }

    #[test]
    fn no_history_conflicts_with_db() {
        let parsed = CliArgs::try_parse_from(["netpulse", "--no-history", "--db", "x.db"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn rejects_zero_interval() {
        let err = from_args(args(&["--interval-ms", "0"])).expect_err("should error");
        assert!(matches!(err, SettingsError::InvalidInterval { value: 0 }));
    }

    #[test]
    fn rejects_zero_retention() {
        let err = from_args(args(&["--retention-days", "0"])).expect_err("should error");
        assert!(matches!(err, SettingsError::InvalidRetention { value: 0 }));
    }

    #[test]
    fn rejects_blank_target() {
        let err = from_args(args(&["--target", "  "])).expect_err("should error");
        assert!(matches!(err, SettingsError::InvalidTarget { .. }));
    }

    #[test]
    fn apply_monitor_copies_settings() {
        let settings =
            from_args(args(&["--interval-ms", "250", "--no-history"])).expect("settings");
        let mut config = MonitorConfig::default();
        apply_monitor(&settings, &mut config);
        assert_eq!(config.interval, Duration::from_millis(250));
        assert!(!config.history_enabled());
    }
}
