use crate::probe::Measurement;
use serde::{Deserialize, Serialize};

/// Smoothing divisor for the jitter EWMA.
pub const JITTER_SMOOTHING: f64 = 16.0;

/// Live statistics derived from the result window. All fields are 0 when the
/// window holds no successful measurement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RollingStats {
    pub current: f64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub jitter: f64,
}

impl RollingStats {
    /// Recomputes from scratch over the `ok` entries of `window`, in window order.
    pub fn from_window<'a, I>(window: I) -> Self
    where
        I: IntoIterator<Item = &'a Measurement>,
    {
        let latencies: Vec<f64> = window
            .into_iter()
            .filter(|m| m.is_ok())
            .filter_map(Measurement::latency_ms)
            .collect();
        Self::from_latencies(&latencies)
    }

    pub fn from_latencies(values: &[f64]) -> Self {
        let Some(&current) = values.last() else {
            return Self::default();
        };

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for value in values {
            min = min.min(*value);
            max = max.max(*value);
            sum += value;
        }

        Self {
            current,
            avg: sum / values.len() as f64,
            min,
            max,
            jitter: jitter(values),
        }
    }
}

/// `j ← j + (|Δ| − j) / 16` over adjacent pairs, seeded at 0.
pub fn jitter(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.windows(2).fold(0.0, |acc, pair| {
        let diff = (pair[1] - pair[0]).abs();
        acc + (diff - acc) / JITTER_SMOOTHING
    })
}
