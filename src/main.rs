use crossbeam_channel::Receiver;
use netpulse::config::MonitorConfig;
use netpulse::metrics::RollingStats;
use netpulse::probe::Measurement;
use netpulse::probe_engine::build_transport;
use netpulse::runtime::Monitor;
use netpulse::settings::{apply_monitor, load_from_cli};
use netpulse::startup::bootstrap;
use netpulse::storage::{MeasurementRepository, SqliteStorage, Storage, spawn_writer};
use netpulse::{SystemClock, epoch_millis};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
struct Report<'a> {
    target: &'a str,
    measurement: &'a Measurement,
    stats: RollingStats,
}

fn main() -> std::io::Result<()> {
    let settings = load_from_cli()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;
    init_logging(&settings.log_level);

    let mut config = MonitorConfig::default();
    apply_monitor(&settings, &mut config);

    let storage: Arc<dyn Storage> = match &config.db_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "using history database");
            let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::open_path(path));
            let report = bootstrap(
                Arc::clone(&storage),
                config.retention_days,
                Arc::new(SystemClock),
            );
            if !report.history_available() {
                tracing::warn!("continuing without durable history");
            }
            storage
        }
        None => {
            tracing::info!("history disabled");
            // never initialized, so every save is a no-op
            Arc::new(SqliteStorage::in_memory())
        }
    };

    let writer = spawn_writer(MeasurementRepository::new(Arc::clone(&storage)));
    let transport = build_transport(config.transport, config.transport_options());
    let monitor = Monitor::builder(transport, config.target.clone())
        .persist_to(writer.queue())
        .build();

    let (interrupt_tx, interrupt) = crossbeam_channel::bounded(1);
    if let Err(err) = ctrlc::set_handler(move || {
        let _ = interrupt_tx.try_send(());
    }) {
        tracing::warn!(error = %err, "failed to install Ctrl-C handler");
    }

    let results = monitor.results();
    let deadline = match settings.duration_secs {
        Some(secs) => crossbeam_channel::after(Duration::from_secs(secs)),
        None => crossbeam_channel::never(),
    };

    monitor.start(config.interval);
    let reason = run_until(&results, &deadline, &interrupt, |window| {
        print_latest(&config.target, window, settings.json)
    });
    tracing::info!(reason = reason.label(), "shutting down");

    monitor.stop();
    writer.shutdown();
    storage.close();
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StopReason {
    Interrupted,
    Deadline,
    StreamClosed,
    OutputFailed,
}

impl StopReason {
    fn label(self) -> &'static str {
        match self {
            StopReason::Interrupted => "interrupted",
            StopReason::Deadline => "duration elapsed",
            StopReason::StreamClosed => "result stream closed",
            StopReason::OutputFailed => "output failed",
        }
    }
}

/// Feeds every window to `on_window` until Ctrl-C, the deadline, or the end
/// of the stream. Returns instead of exiting so the caller can flush storage.
fn run_until(
    results: &Receiver<Vec<Measurement>>,
    deadline: &Receiver<Instant>,
    interrupt: &Receiver<()>,
    mut on_window: impl FnMut(&[Measurement]) -> std::io::Result<()>,
) -> StopReason {
    loop {
        crossbeam_channel::select! {
            recv(interrupt) -> _ => return StopReason::Interrupted,
            recv(deadline) -> _ => return StopReason::Deadline,
            recv(results) -> window => match window {
                Ok(window) => {
                    if let Err(err) = on_window(&window) {
                        tracing::error!(error = %err, "failed to write measurement");
                        return StopReason::OutputFailed;
                    }
                }
                Err(_) => return StopReason::StreamClosed,
            },
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_latest(target: &str, window: &[Measurement], json: bool) -> std::io::Result<()> {
    // the replayed empty window on subscribe carries nothing to print
    let Some(latest) = window.last() else {
        return Ok(());
    };
    let stats = RollingStats::from_window(window);

    if json {
        let report = Report {
            target,
            measurement: latest,
            stats,
        };
        let line = serde_json::to_string(&report).map_err(std::io::Error::other)?;
        println!("{line}");
        return Ok(());
    }

    let latency = match latest.latency_ms() {
        Some(ms) => format!("{ms:.1} ms"),
        None => "unreachable".to_string(),
    };
    println!(
        "{} {target} {latency} | cur {:.1} avg {:.1} min {:.1} max {:.1} jitter {:.2}",
        epoch_millis(latest.timestamp()),
        stats.current,
        stats.avg,
        stats.min,
        stats.max,
        stats.jitter,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{StopReason, run_until};
    use netpulse::from_epoch_millis;
    use netpulse::probe::Measurement;
    use std::time::{Duration, Instant};

    #[test]
    fn interrupt_ends_the_loop_without_a_deadline() {
        let (_results_tx, results) = crossbeam_channel::unbounded();
        let (interrupt_tx, interrupt) = crossbeam_channel::bounded(1);
        interrupt_tx.send(()).expect("send");

        let started = Instant::now();
        let reason = run_until(&results, &crossbeam_channel::never(), &interrupt, |_| Ok(()));
        assert_eq!(reason, StopReason::Interrupted);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn deadline_ends_the_loop() {
        let (_results_tx, results) = crossbeam_channel::unbounded();
        let deadline = crossbeam_channel::after(Duration::from_millis(20));
        let reason = run_until(&results, &deadline, &crossbeam_channel::never(), |_| Ok(()));
        assert_eq!(reason, StopReason::Deadline);
    }

    #[test]
    fn every_window_is_handled_until_the_stream_closes() {
        let (results_tx, results) = crossbeam_channel::unbounded();
        results_tx.send(Vec::new()).expect("send");
        results_tx
            .send(vec![Measurement::ok(from_epoch_millis(1), 4.0)])
            .expect("send");
        drop(results_tx);

        let mut seen = Vec::new();
        let reason = run_until(
            &results,
            &crossbeam_channel::never(),
            &crossbeam_channel::never(),
            |window| {
                seen.push(window.len());
                Ok(())
            },
        );
        assert_eq!(reason, StopReason::StreamClosed);
        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn output_failure_stops_the_loop() {
        let (results_tx, results) = crossbeam_channel::unbounded();
        results_tx.send(Vec::new()).expect("send");
        let reason = run_until(
            &results,
            &crossbeam_channel::never(),
            &crossbeam_channel::never(),
            |_| Err(std::io::Error::other("closed pipe")),
        );
        assert_eq!(reason, StopReason::OutputFailed);
    }
}
