use super::Transport;
use super::helpers::{duration_ms, map_io_error};
use crate::common::net::target_host_port;
use crate::probe::{ProbeOutcome, TransportError, TransportErrorKind};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

/// Times a TCP three-way handshake to the target's host and port.
pub struct TcpConnectTransport {
    timeout: Duration,
}

impl TcpConnectTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn resolve(host: &str, port: u16) -> Result<SocketAddr, TransportError> {
        (host, port)
            .to_socket_addrs()
            .map_err(|err| TransportError::new(TransportErrorKind::DnsFailure, err.to_string()))?
            .next()
            .ok_or_else(|| {
                TransportError::new(
                    TransportErrorKind::DnsFailure,
                    format!("{host} resolved to no addresses"),
                )
            })
    }
}

impl Transport for TcpConnectTransport {
    fn name(&self) -> &'static str {
        "tcp"
    }

    fn probe(&self, target: &str) -> Result<ProbeOutcome, TransportError> {
        let (host, port) = target_host_port(target).ok_or_else(|| {
            TransportError::new(TransportErrorKind::Protocol, format!("no host in {target}"))
        })?;
        let addr = Self::resolve(&host, port)?;

        let started = Instant::now();
        let stream =
            TcpStream::connect_timeout(&addr, self.timeout).map_err(|err| map_io_error(&err))?;
        let elapsed = started.elapsed();
        drop(stream);

        Ok(ProbeOutcome::reachable(duration_ms(elapsed)))
    }
}
