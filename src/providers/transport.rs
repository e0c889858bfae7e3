use axum::body::Bytes;
use reqwest::{RequestBuilder, StatusCode};
use tracing::warn;

use crate::config::UpstreamConfig;
use crate::error::ProxyError;
use crate::providers::http_errors::{request_error, timeout_error};

/// Sends one request and reads its body under the upstream deadline.
///
/// The in-flight call lives inside the timed future, so when the deadline wins
/// the request (and its connection) is dropped. There is no retry.
pub(crate) async fn send_with_deadline(
    request: RequestBuilder,
    upstream: &UpstreamConfig,
    url: &str,
) -> Result<(StatusCode, Bytes), ProxyError> {
    let call = async {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok::<_, reqwest::Error>((status, body))
    };

    match tokio::time::timeout(upstream.timeout, call).await {
        Ok(Ok(reply)) => Ok(reply),
        Ok(Err(err)) => {
            warn!(
                url = %url,
                service = %upstream.name,
                error = %err,
                "upstream request failed"
            );
            Err(request_error(err, upstream))
        }
        Err(_) => {
            warn!(
                url = %url,
                service = %upstream.name,
                timeout_ms = upstream.timeout.as_millis() as u64,
                "upstream request timed out; call cancelled"
            );
            Err(timeout_error(upstream.timeout))
        }
    }
}
