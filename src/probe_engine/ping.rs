use super::Transport;
use super::helpers::map_io_error;
use crate::common::net::target_host;
use crate::probe::{ProbeOutcome, TransportError, TransportErrorKind};
use regex::Regex;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

const MIN_WAIT_SECS: u64 = 1;
const MIN_DEADLINE_SECS: f64 = 2.0;
const DEADLINE_SLACK_SECS: f64 = 1.0;
const POLL_STEP: Duration = Duration::from_millis(10);

static TIME_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

/// Shells out to the system `ping` for one ICMP echo and reads the reported
/// round-trip time.
pub struct SystemPingTransport {
    wait: Duration,
    deadline: Duration,
}

impl SystemPingTransport {
    pub fn new(interval: Duration) -> Self {
        let wait_secs = interval.as_secs().max(MIN_WAIT_SECS);
        let deadline_secs = (interval.as_secs_f64() + DEADLINE_SLACK_SECS).max(MIN_DEADLINE_SECS);
        Self {
            wait: Duration::from_secs(wait_secs),
            deadline: Duration::from_secs_f64(deadline_secs),
        }
    }

    fn command(&self, host: &str) -> Command {
        let mut cmd = Command::new("ping");
        cmd.args(ping_args(host, self.wait))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        cmd
    }

    fn wait_for(&self, child: &mut Child) -> Result<bool, TransportError> {
        let started = Instant::now();
        loop {
            match child.try_wait().map_err(|err| map_io_error(&err))? {
                Some(status) => return Ok(status.success()),
                None if started.elapsed() >= self.deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(TransportError::new(
                        TransportErrorKind::Timeout,
                        format!("ping gave no answer within {:?}", self.deadline),
                    ));
                }
                None => thread::sleep(POLL_STEP),
            }
        }
    }
}

impl Transport for SystemPingTransport {
    fn name(&self) -> &'static str {
        "ping"
    }

    fn probe(&self, target: &str) -> Result<ProbeOutcome, TransportError> {
        let host = target_host(target).ok_or_else(|| {
            TransportError::new(TransportErrorKind::Protocol, format!("no host in {target}"))
        })?;

        let mut child = self.command(&host).spawn().map_err(|err| {
            let mut mapped = map_io_error(&err);
            if mapped.kind == TransportErrorKind::CommandMissing {
                tracing::error!("`ping` command not found; install it or pick another transport");
                mapped.message = format!("ping command not found: {err}");
            }
            mapped
        })?;

        let succeeded = self.wait_for(&mut child)?;
        if !succeeded {
            tracing::debug!(host = %host, "ping exited unsuccessfully");
            return Ok(ProbeOutcome::unreachable());
        }

        let mut output = String::new();
        if let Some(mut stdout) = child.stdout.take() {
            stdout
                .read_to_string(&mut output)
                .map_err(|err| map_io_error(&err))?;
        }

        match parse_ping_time(&output) {
            Some(ms) => Ok(ProbeOutcome::reachable(ms)),
            None => {
                tracing::warn!(host = %host, "ping succeeded but no time found in output");
                Ok(ProbeOutcome::unreachable())
            }
        }
    }
}

#[cfg(target_os = "windows")]
fn ping_args(host: &str, wait: Duration) -> Vec<String> {
    vec![
        "-n".to_string(),
        "1".to_string(),
        "-w".to_string(),
        wait.as_millis().to_string(),
        host.to_string(),
    ]
}

#[cfg(target_os = "macos")]
fn ping_args(host: &str, wait: Duration) -> Vec<String> {
    vec![
        "-c".to_string(),
        "1".to_string(),
        "-W".to_string(),
        wait.as_millis().to_string(),
        host.to_string(),
    ]
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn ping_args(host: &str, wait: Duration) -> Vec<String> {
    vec![
        "-c".to_string(),
        "1".to_string(),
        "-W".to_string(),
        wait.as_secs().to_string(),
        host.to_string(),
    ]
}

/// Extracts `time=12.3 ms` (or Windows' `time<1ms`) from ping output.
pub(super) fn parse_ping_time(output: &str) -> Option<f64> {
    let pattern = TIME_PATTERN
        .get_or_init(|| Regex::new(r"(?i)time[=<]\s*([0-9]+(?:\.[0-9]+)?)\s*ms").ok())
        .as_ref()?;
    pattern
        .captures(output)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}
