use crate::common::time::{epoch_millis, from_epoch_millis};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::SystemTime;
use thiserror::Error;

/// Outcome of one transport probe as reported by the backend.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProbeOutcome {
    pub success: bool,
    pub latency_ms: f64,
}

impl ProbeOutcome {
    pub fn reachable(latency_ms: f64) -> Self {
        Self {
            success: true,
            latency_ms: latency_ms.max(0.0),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            success: false,
            latency_ms: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureStatus {
    Ok,
    Error,
}

impl MeasureStatus {
    pub fn label(self) -> &'static str {
        match self {
            MeasureStatus::Ok => "ok",
            MeasureStatus::Error => "error",
        }
    }
}

/// One probe result. `latency_ms` is `Some` exactly when `status` is `Ok`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawMeasurement")]
pub struct Measurement {
    #[serde(serialize_with = "ser_epoch_ms")]
    timestamp: SystemTime,
    latency_ms: Option<f64>,
    status: MeasureStatus,
}

impl Measurement {
    pub fn ok(timestamp: SystemTime, latency_ms: f64) -> Self {
        Self {
            timestamp,
            latency_ms: Some(latency_ms.max(0.0)),
            status: MeasureStatus::Ok,
        }
    }

    pub fn error(timestamp: SystemTime) -> Self {
        Self {
            timestamp,
            latency_ms: None,
            status: MeasureStatus::Error,
        }
    }

    pub fn from_outcome(timestamp: SystemTime, outcome: ProbeOutcome) -> Self {
        if outcome.success {
            Self::ok(timestamp, outcome.latency_ms)
        } else {
            Self::error(timestamp)
        }
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub fn latency_ms(&self) -> Option<f64> {
        self.latency_ms
    }

    pub fn status(&self) -> MeasureStatus {
        self.status
    }

    pub fn is_ok(&self) -> bool {
        self.status == MeasureStatus::Ok
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum InvalidMeasurement {
    #[error("error measurement carries a latency ({latency_ms} ms)")]
    LatencyOnError { latency_ms: f64 },
    #[error("ok measurement has no latency")]
    MissingLatency,
    #[error("latency must be a finite, non-negative number (got {latency_ms})")]
    BadLatency { latency_ms: f64 },
}

/// Wire shape checked before it becomes a [`Measurement`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMeasurement {
    #[serde(deserialize_with = "de_epoch_ms")]
    timestamp: SystemTime,
    #[serde(default)]
    latency_ms: Option<f64>,
    status: MeasureStatus,
}

impl TryFrom<RawMeasurement> for Measurement {
    type Error = InvalidMeasurement;

    fn try_from(raw: RawMeasurement) -> Result<Self, Self::Error> {
        match (raw.status, raw.latency_ms) {
            (MeasureStatus::Error, None) => Ok(Self::error(raw.timestamp)),
            (MeasureStatus::Error, Some(latency_ms)) => {
                Err(InvalidMeasurement::LatencyOnError { latency_ms })
            }
            (MeasureStatus::Ok, None) => Err(InvalidMeasurement::MissingLatency),
            (MeasureStatus::Ok, Some(latency_ms))
                if !latency_ms.is_finite() || latency_ms < 0.0 =>
            {
                Err(InvalidMeasurement::BadLatency { latency_ms })
            }
            (MeasureStatus::Ok, Some(latency_ms)) => Ok(Self::ok(raw.timestamp, latency_ms)),
        }
    }
}

fn ser_epoch_ms<S: Serializer>(ts: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(epoch_millis(*ts))
}

fn de_epoch_ms<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SystemTime, D::Error> {
    let ms = i64::deserialize(deserializer)?;
    Ok(from_epoch_millis(ms))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TransportErrorKind {
    DnsFailure,
    ConnectFailed,
    Timeout,
    Protocol,
    CommandMissing,
    Io,
}

impl TransportErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            TransportErrorKind::DnsFailure => "dns_failure",
            TransportErrorKind::ConnectFailed => "connect_failed",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Protocol => "protocol",
            TransportErrorKind::CommandMissing => "command_missing",
            TransportErrorKind::Io => "io_error",
        }
    }
}

#[derive(Clone, Debug, Error)]
#[error("{}: {message}", .kind.label())]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
