use crate::broadcast::Broadcast;
use crate::common::time::{Clock, SystemClock};
use crate::metrics::RollingStats;
use crate::probe::{Measurement, ProbeOutcome, TransportError, TransportErrorKind};
use crate::probe_engine::Transport;
use crate::storage::SaveQueue;
use crate::window::ResultWindow;
use crossbeam_channel::{Receiver, Sender};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Clone, Debug)]
pub enum ControlMessage {
    Stop,
}

struct SchedulerHandle {
    sender: Sender<ControlMessage>,
    join: Option<JoinHandle<()>>,
}

struct Shared {
    transport: Arc<dyn Transport>,
    target: String,
    saves: Option<SaveQueue>,
    clock: Arc<dyn Clock>,
    window: Mutex<ResultWindow>,
    results: Broadcast<Vec<Measurement>>,
    stats: Broadcast<RollingStats>,
    active: Broadcast<bool>,
    /// Bumped on every stop; probes from an older run are discarded.
    generation: AtomicU64,
    live_schedulers: AtomicUsize,
}

/// The polling engine: one scheduler thread at a time, one detached probe per
/// tick, and a shared window every tick folds its result into.
pub struct Monitor {
    shared: Arc<Shared>,
    scheduler: Mutex<Option<SchedulerHandle>>,
}

pub struct MonitorBuilder {
    transport: Arc<dyn Transport>,
    target: String,
    saves: Option<SaveQueue>,
    clock: Arc<dyn Clock>,
}

impl MonitorBuilder {
    pub fn persist_to(mut self, saves: SaveQueue) -> Self {
        self.saves = Some(saves);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Monitor {
        Monitor {
            shared: Arc::new(Shared {
                transport: self.transport,
                target: self.target,
                saves: self.saves,
                clock: self.clock,
                window: Mutex::new(ResultWindow::default()),
                results: Broadcast::new(Vec::new()),
                stats: Broadcast::new(RollingStats::default()),
                active: Broadcast::new(false),
                generation: AtomicU64::new(0),
                live_schedulers: AtomicUsize::new(0),
            }),
            scheduler: Mutex::new(None),
        }
    }
}

impl Monitor {
    pub fn builder(transport: Arc<dyn Transport>, target: impl Into<String>) -> MonitorBuilder {
        MonitorBuilder {
            transport,
            target: target.into(),
            saves: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn new(transport: Arc<dyn Transport>, target: impl Into<String>) -> Self {
        Self::builder(transport, target).build()
    }

    /// Starts polling, replacing any loop already running. The first probe
    /// fires immediately, later ones on a fixed-rate ticker.
    pub fn start(&self, interval: Duration) {
        let mut scheduler = self.lock_scheduler();
        self.stop_locked(&mut scheduler);

        let interval = interval.max(MIN_INTERVAL);
        let generation = self.shared.generation.load(Ordering::SeqCst);
        self.shared.active.publish_if_changed(true);

        let (tx, rx) = crossbeam_channel::unbounded();
        let shared = Arc::clone(&self.shared);
        // counted before the thread runs so a racing start still sees it
        self.shared.live_schedulers.fetch_add(1, Ordering::SeqCst);
        let spawned = thread::Builder::new()
            .name("netpulse-scheduler".to_string())
            .spawn(move || run_scheduler(shared, generation, interval, rx));

        match spawned {
            Ok(join) => {
                tracing::info!(
                    target_url = %self.shared.target,
                    transport = self.shared.transport.name(),
                    interval_ms = interval.as_millis() as u64,
                    "monitoring started"
                );
                *scheduler = Some(SchedulerHandle {
                    sender: tx,
                    join: Some(join),
                });
            }
            Err(err) => {
                self.shared.live_schedulers.fetch_sub(1, Ordering::SeqCst);
                self.shared.active.publish_if_changed(false);
                tracing::error!(error = %err, "failed to spawn scheduler thread");
            }
        }
    }

    /// Stops polling. Once this returns no further result reaches the window,
    /// including probes that were still in flight. Safe to call repeatedly.
    pub fn stop(&self) {
        let mut scheduler = self.lock_scheduler();
        self.stop_locked(&mut scheduler);
    }

    fn stop_locked(&self, scheduler: &mut Option<SchedulerHandle>) {
        let was_running = if let Some(mut handle) = scheduler.take() {
            let _ = handle.sender.send(ControlMessage::Stop);
            if let Some(join) = handle.join.take()
                && join.join().is_err()
            {
                tracing::error!("scheduler thread panicked");
            }
            true
        } else {
            false
        };

        {
            // taken under the window lock so no in-flight probe can publish
            // between this bump and our return
            let _window = self.shared.lock_window();
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
        }
        self.shared.active.publish_if_changed(false);

        if was_running {
            tracing::info!(target_url = %self.shared.target, "monitoring stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_scheduler().is_some()
    }

    /// Live window stream; a new receiver first yields the current window.
    pub fn results(&self) -> Receiver<Vec<Measurement>> {
        self.shared.results.subscribe()
    }

    pub fn stats(&self) -> Receiver<RollingStats> {
        self.shared.stats.subscribe()
    }

    pub fn is_monitoring_active(&self) -> Receiver<bool> {
        self.shared.active.subscribe()
    }

    pub fn window(&self) -> Vec<Measurement> {
        self.shared.results.latest()
    }

    pub fn current_stats(&self) -> RollingStats {
        self.shared.stats.latest()
    }

    fn lock_scheduler(&self) -> MutexGuard<'_, Option<SchedulerHandle>> {
        self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn live_schedulers(&self) -> usize {
        self.shared.live_schedulers.load(Ordering::SeqCst)
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    fn lock_window(&self) -> MutexGuard<'_, ResultWindow> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn measure(&self) -> Measurement {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.transport.probe(&self.target)))
            .unwrap_or_else(|_| {
                Err(TransportError::new(
                    TransportErrorKind::Io,
                    "transport panicked",
                ))
            });
        let ts = self.clock.now();
        match outcome {
            Ok(outcome) => Measurement::from_outcome(ts, outcome),
            Err(err) => {
                tracing::debug!(
                    target_url = %self.target,
                    kind = err.kind.label(),
                    error = %err.message,
                    "probe failed"
                );
                Measurement::from_outcome(ts, ProbeOutcome::unreachable())
            }
        }
    }

    /// Folds one result into the window and publishes window and stats as a
    /// single step. Returns false when the run that produced it was stopped.
    fn record(&self, generation: u64, measurement: Measurement) -> bool {
        let mut window = self.lock_window();
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        window.push(measurement);
        self.results.publish(window.to_vec());
        self.stats.publish(window.stats());
        true
    }

    fn tick(&self, generation: u64) {
        let measurement = self.measure();
        if !self.record(generation, measurement.clone()) {
            tracing::trace!("discarding result from a stopped run");
            return;
        }
        if let Some(saves) = &self.saves {
            saves.submit(measurement, &self.target);
        }
    }
}

fn run_scheduler(
    shared: Arc<Shared>,
    generation: u64,
    interval: Duration,
    control_rx: Receiver<ControlMessage>,
) {
    let ticker = crossbeam_channel::tick(interval);

    // initial probe goes out immediately, without waiting a full interval
    spawn_probe(&shared, generation);

    loop {
        crossbeam_channel::select! {
            recv(control_rx) -> msg => match msg {
                Ok(ControlMessage::Stop) | Err(_) => break,
            },
            recv(ticker) -> _ => spawn_probe(&shared, generation),
        }
    }

    shared.live_schedulers.fetch_sub(1, Ordering::SeqCst);
}

fn spawn_probe(shared: &Arc<Shared>, generation: u64) {
    let shared = Arc::clone(shared);
    let spawned = thread::Builder::new()
        .name("netpulse-probe".to_string())
        .spawn(move || shared.tick(generation));
    if let Err(err) = spawned {
        tracing::warn!(error = %err, "failed to spawn probe thread; tick skipped");
    }
}
