use super::Transport;
use super::helpers::{duration_ms, map_curl_error};
use crate::common::net::parse_target_url;
use crate::probe::{ProbeOutcome, TransportError, TransportErrorKind};
use curl::easy::{Easy2, Handler, WriteError};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Idle handles kept around so warm connections get reused across ticks.
const MAX_IDLE_HANDLES: usize = 4;

/// Swallows whatever body a server sends despite the HEAD request.
#[derive(Default)]
struct ResponseSink;

impl Handler for ResponseSink {
    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        Ok(data.len())
    }
}

/// HEAD request through libcurl. Any HTTP response, whatever its status,
/// counts as reachable; only transport faults are failures.
pub struct HttpHeadTransport {
    timeout: Duration,
    idle: Mutex<Vec<Easy2<ResponseSink>>>,
}

impl HttpHeadTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            idle: Mutex::new(Vec::new()),
        }
    }

    fn checkout(&self) -> Easy2<ResponseSink> {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_else(|| Easy2::new(ResponseSink))
    }

    fn checkin(&self, easy: Easy2<ResponseSink>) {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < MAX_IDLE_HANDLES {
            idle.push(easy);
        }
    }

    fn perform(
        &self,
        easy: &mut Easy2<ResponseSink>,
        target: &str,
    ) -> Result<ProbeOutcome, TransportError> {
        let configure = |easy: &mut Easy2<ResponseSink>| -> Result<(), curl::Error> {
            easy.url(target)?;
            easy.nobody(true)?;
            easy.follow_location(false)?;
            easy.timeout(self.timeout)?;
            easy.connect_timeout(self.timeout)?;
            Ok(())
        };
        configure(easy).map_err(|err| map_curl_error(&err))?;

        let started = Instant::now();
        easy.perform().map_err(|err| map_curl_error(&err))?;
        let elapsed = started.elapsed();

        let total = easy.total_time().unwrap_or(elapsed);
        let status = easy.response_code().unwrap_or(0);
        tracing::trace!(
            target_url = target,
            status,
            latency_ms = duration_ms(total),
            "http probe"
        );
        Ok(ProbeOutcome::reachable(duration_ms(total)))
    }
}

impl Transport for HttpHeadTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    fn probe(&self, target: &str) -> Result<ProbeOutcome, TransportError> {
        // bare hosts get https://, matching the ping and tcp transports
        let url = parse_target_url(target).ok_or_else(|| {
            TransportError::new(
                TransportErrorKind::Protocol,
                format!("invalid target {target:?}"),
            )
        })?;
        let mut easy = self.checkout();
        let outcome = self.perform(&mut easy, url.as_str());
        if outcome.is_ok() {
            self.checkin(easy);
        }
        outcome
    }
}
