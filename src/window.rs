use crate::metrics::RollingStats;
use crate::probe::Measurement;
use std::collections::VecDeque;

pub const WINDOW_CAPACITY: usize = 50;

/// Bounded FIFO of recent measurements, newest last.
#[derive(Clone, Debug)]
pub struct ResultWindow {
    entries: VecDeque<Measurement>,
    capacity: usize,
}

impl Default for ResultWindow {
    fn default() -> Self {
        Self::with_capacity(WINDOW_CAPACITY)
    }
}

impl ResultWindow {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Appends and evicts the oldest entry once over capacity.
    pub fn push(&mut self, measurement: Measurement) {
        self.entries.push_back(measurement);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> RollingStats {
        RollingStats::from_window(&self.entries)
    }

    pub fn to_vec(&self) -> Vec<Measurement> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{ResultWindow, WINDOW_CAPACITY};
    use crate::common::time::from_epoch_millis;
    use crate::probe::Measurement;

    #[test]
    fn keeps_latest_fifty_after_sixty_pushes() {
        let mut window = ResultWindow::default();
        for i in 0..60 {
            window.push(Measurement::ok(from_epoch_millis(i), i as f64));
            assert!(window.len() <= WINDOW_CAPACITY);
        }

        let entries = window.to_vec();
        assert_eq!(entries.len(), 50);
        assert_eq!(entries.first().and_then(Measurement::latency_ms), Some(10.0));
        assert_eq!(entries.last().and_then(Measurement::latency_ms), Some(59.0));
    }

    #[test]
    fn full_window_stays_full_on_push() {
        let mut window = ResultWindow::with_capacity(3);
        for i in 0..3 {
            window.push(Measurement::ok(from_epoch_millis(i), 1.0));
        }
        window.push(Measurement::error(from_epoch_millis(3)));
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn stats_follow_window_contents() {
        let mut window = ResultWindow::with_capacity(2);
        window.push(Measurement::ok(from_epoch_millis(0), 100.0));
        window.push(Measurement::ok(from_epoch_millis(1), 10.0));
        window.push(Measurement::ok(from_epoch_millis(2), 20.0));

        // 100 was evicted, so it contributes to neither max nor jitter
        let stats = window.stats();
        assert_eq!(stats.max, 20.0);
        assert!((stats.jitter - 10.0 / 16.0).abs() < 1e-12);
    }
}
