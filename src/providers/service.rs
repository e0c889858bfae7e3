use axum::body::Bytes;
use reqwest::{Client, StatusCode};
use serde::de::IgnoredAny;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::UpstreamConfig;
use crate::error::ProxyError;
use crate::gateway::{GatewayFuture, GatewayReply, PlanGateway};
use crate::plan::Capability;
use crate::providers::transport::send_with_deadline;

const HEALTH_PATH: &str = "/health";

/// Forwards plan requests to the internal API service.
pub struct ServiceGateway {
    client: Client,
    upstream: UpstreamConfig,
}

impl ServiceGateway {
    pub fn new(client: Client, upstream: UpstreamConfig) -> Self {
        Self { client, upstream }
    }

    async fn forward(
        &self,
        capability: Capability,
        body: &Value,
    ) -> Result<GatewayReply, ProxyError> {
        let url = self.upstream.endpoint(capability.path());
        info!(
            capability = capability.as_str(),
            url = %url,
            service = %self.upstream.name,
            "forwarding plan request"
        );

        let (status, payload) =
            send_with_deadline(self.client.post(&url).json(body), &self.upstream, &url).await?;

        if !status.is_success() {
            let err = rejection(&self.upstream.name, status, &payload);
            warn!(
                capability = capability.as_str(),
                status = %status,
                error = %err,
                "upstream rejected plan request"
            );
            return Err(err);
        }

        if serde_json::from_slice::<IgnoredAny>(&payload).is_err() {
            warn!(
                capability = capability.as_str(),
                status = %status,
                response_body_len = payload.len(),
                "upstream returned a non-JSON success body"
            );
            return Err(ProxyError::UpstreamMalformed {
                service: self.upstream.name.clone(),
                status,
            });
        }

        Ok(GatewayReply::Relayed(payload))
    }

    async fn check_health(&self) -> Result<Value, ProxyError> {
        let url = self.upstream.endpoint(HEALTH_PATH);
        let (status, payload) =
            send_with_deadline(self.client.get(&url), &self.upstream, &url).await?;

        if !status.is_success() {
            return Err(ProxyError::UpstreamRejected {
                status,
                message: format!("{} health check returned {}", self.upstream.name, status),
            });
        }

        serde_json::from_slice(&payload).map_err(|_| ProxyError::UpstreamMalformed {
            service: self.upstream.name.clone(),
            status,
        })
    }
}

impl PlanGateway for ServiceGateway {
    fn generate<'a>(
        &'a self,
        capability: Capability,
        body: &'a Value,
        _user_data: &'a Value,
    ) -> GatewayFuture<'a, GatewayReply> {
        Box::pin(self.forward(capability, body))
    }

    fn health(&self) -> GatewayFuture<'_, Value> {
        Box::pin(self.check_health())
    }
}

/// Turns a non-2xx upstream reply into the error relayed to the caller.
fn rejection(service: &str, status: StatusCode, payload: &Bytes) -> ProxyError {
    let Ok(parsed) = serde_json::from_slice::<Value>(payload) else {
        return ProxyError::UpstreamMalformed {
            service: service.to_string(),
            status,
        };
    };

    let message = match parsed.get("error") {
        Some(Value::String(text)) if !text.is_empty() => text.clone(),
        Some(Value::Null) | Some(Value::String(_)) | None => {
            format!("{service} Error: {}", status.as_u16())
        }
        Some(other) => other.to_string(),
    };
    ProxyError::UpstreamRejected { status, message }
}
