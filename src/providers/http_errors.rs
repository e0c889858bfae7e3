use std::error::Error as StdError;
use std::io::ErrorKind;
use std::time::Duration;

use crate::config::UpstreamConfig;
use crate::error::ProxyError;

fn error_chain_has_connection_refused(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == ErrorKind::ConnectionRefused
        {
            return true;
        }

        if source
            .to_string()
            .to_ascii_lowercase()
            .contains("connection refused")
        {
            return true;
        }

        current = source.source();
    }

    false
}

fn error_chain_has_timeout(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == ErrorKind::TimedOut
        {
            return true;
        }

        if source
            .to_string()
            .to_ascii_lowercase()
            .contains("timed out")
        {
            return true;
        }

        current = source.source();
    }

    false
}

/// Reason text embedded in the "Service unavailable" message.
fn unavailable_reason(err: &reqwest::Error) -> String {
    if err.is_connect() {
        if error_chain_has_connection_refused(err) {
            return "connection refused".to_string();
        }
        return "failed to connect".to_string();
    }

    let mut reason = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        reason = format!("{reason}: {inner}");
        source = inner.source();
    }
    reason
}

pub(crate) fn request_error(err: reqwest::Error, upstream: &UpstreamConfig) -> ProxyError {
    if err.is_timeout() || error_chain_has_timeout(&err) {
        return timeout_error(upstream.timeout);
    }

    ProxyError::Unavailable {
        reason: unavailable_reason(&err),
        service: upstream.name.clone(),
        url: upstream.display_url().to_string(),
    }
}

pub(crate) fn timeout_error(timeout: Duration) -> ProxyError {
    ProxyError::Timeout { timeout }
}
