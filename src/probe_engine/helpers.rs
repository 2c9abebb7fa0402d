use crate::probe::{TransportError, TransportErrorKind};
use curl::Error as CurlError;
use std::io;
use std::time::Duration;

pub(super) fn map_curl_error(err: &CurlError) -> TransportError {
    let message = err.to_string();

    let kind = if err.is_couldnt_resolve_host() || err.is_couldnt_resolve_proxy() {
        TransportErrorKind::DnsFailure
    } else if err.is_operation_timedout() {
        TransportErrorKind::Timeout
    } else if err.is_couldnt_connect() {
        TransportErrorKind::ConnectFailed
    } else if err.is_ssl_connect_error()
        || err.is_ssl_cacert()
        || err.is_ssl_certproblem()
        || err.is_ssl_cipher()
        || err.is_unsupported_protocol()
        || err.is_url_malformed()
    {
        TransportErrorKind::Protocol
    } else {
        TransportErrorKind::Io
    };

    TransportError { kind, message }
}

pub(super) fn map_io_error(err: &io::Error) -> TransportError {
    let kind = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportErrorKind::Timeout,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::AddrNotAvailable => TransportErrorKind::ConnectFailed,
        io::ErrorKind::NotFound => TransportErrorKind::CommandMissing,
        _ => TransportErrorKind::Io,
    };
    TransportError::new(kind, err.to_string())
}

pub(super) fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::{duration_ms, map_curl_error, map_io_error};
    use crate::probe::TransportErrorKind;
    use curl::Error as CurlError;
    use std::io;
    use std::time::Duration;

    #[test]
    fn curl_resolve_failure_is_dns() {
        let err = map_curl_error(&CurlError::new(6));
        assert_eq!(err.kind, TransportErrorKind::DnsFailure);
    }

    #[test]
    fn curl_connect_failure_is_connect() {
        let err = map_curl_error(&CurlError::new(7));
        assert_eq!(err.kind, TransportErrorKind::ConnectFailed);
    }

    #[test]
    fn curl_timeout_is_timeout() {
        let err = map_curl_error(&CurlError::new(28));
        assert_eq!(err.kind, TransportErrorKind::Timeout);
    }

    #[test]
    fn io_refused_is_connect() {
        let err = map_io_error(&io::Error::from(io::ErrorKind::ConnectionRefused));
        assert_eq!(err.kind, TransportErrorKind::ConnectFailed);
    }

    #[test]
    fn io_not_found_is_missing_command() {
        let err = map_io_error(&io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(err.kind, TransportErrorKind::CommandMissing);
    }

    #[test]
    fn duration_ms_keeps_fraction() {
        assert!((duration_ms(Duration::from_micros(1500)) - 1.5).abs() < 1e-9);
    }
}
