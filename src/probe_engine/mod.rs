//! Latency transports. Exactly one is active per process, picked once at
//! startup through [`build_transport`] and shared by every tick.

mod helpers;
mod http;
mod ping;
mod tcp;

pub use http::HttpHeadTransport;
pub use ping::SystemPingTransport;
pub use tcp::TcpConnectTransport;

use crate::probe::{ProbeOutcome, TransportError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Total deadline for a single HTTP or TCP probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Performs one probe. Hard faults may be returned as errors; the engine
    /// turns them into `error` measurements.
    fn probe(&self, target: &str) -> Result<ProbeOutcome, TransportError>;
}

#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// In-process HTTP HEAD request
    #[default]
    Http,
    /// System `ping` command (ICMP echo)
    Ping,
    /// Plain TCP connect handshake
    Tcp,
}

impl TransportKind {
    pub fn label(self) -> &'static str {
        match self {
            TransportKind::Http => "http",
            TransportKind::Ping => "ping",
            TransportKind::Tcp => "tcp",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TransportOptions {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_PROBE_TIMEOUT,
            interval: Duration::from_millis(1000),
        }
    }
}

pub fn build_transport(kind: TransportKind, options: TransportOptions) -> Arc<dyn Transport> {
    tracing::debug!(
        transport = %kind,
        timeout_ms = options.timeout.as_millis() as u64,
        "selecting transport"
    );
    match kind {
        TransportKind::Http => Arc::new(HttpHeadTransport::new(options.timeout)),
        TransportKind::Ping => Arc::new(SystemPingTransport::new(options.interval)),
        TransportKind::Tcp => Arc::new(TcpConnectTransport::new(options.timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_transport_honors_kind() {
        let options = TransportOptions::default();
        assert_eq!(build_transport(TransportKind::Http, options).name(), "http");
        assert_eq!(build_transport(TransportKind::Ping, options).name(), "ping");
        assert_eq!(build_transport(TransportKind::Tcp, options).name(), "tcp");
    }

    #[test]
    fn transport_kind_labels_match_display() {
        assert_eq!(TransportKind::Ping.to_string(), "ping");
        assert_eq!(TransportKind::default(), TransportKind::Http);
    }
}
