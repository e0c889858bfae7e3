use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::body::Bytes;
use reqwest::Client;
use serde_json::Value;

use crate::config::{Config, UpstreamMode};
use crate::error::ProxyError;
use crate::plan::Capability;
use crate::providers::{GeminiGateway, ServiceGateway};

/// What a backend produced for one plan request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayReply {
    /// Upstream JSON body, relayed byte for byte.
    Relayed(Bytes),
    /// Narrative text generated by the provider.
    Generated(String),
}

pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProxyError>> + Send + 'a>>;

pub trait PlanGateway: Send + Sync {
    /// `body` is the caller's JSON body; `user_data` is its `userData` member.
    fn generate<'a>(
        &'a self,
        capability: Capability,
        body: &'a Value,
        user_data: &'a Value,
    ) -> GatewayFuture<'a, GatewayReply>;

    fn health(&self) -> GatewayFuture<'_, Value>;
}

pub fn from_config(client: Client, cfg: &Config) -> Arc<dyn PlanGateway> {
    match &cfg.mode {
        UpstreamMode::Forward => Arc::new(ServiceGateway::new(client, cfg.upstream.clone())),
        UpstreamMode::Direct(settings) => {
            Arc::new(GeminiGateway::new(client, cfg.upstream.clone(), settings.clone()))
        }
    }
}
