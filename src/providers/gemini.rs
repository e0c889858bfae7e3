use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::{GeminiSettings, SERVICE_NAME, UpstreamConfig};
use crate::error::ProxyError;
use crate::gateway::{GatewayFuture, GatewayReply, PlanGateway};
use crate::plan::{Capability, PlanRequest};
use crate::providers::transport::send_with_deadline;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

fn generate_url(upstream: &UpstreamConfig, model: &str) -> String {
    upstream.endpoint(&format!("/v1beta/models/{model}:generateContent"))
}

fn single_turn(prompt: &str) -> GenerateContentRequest<'_> {
    GenerateContentRequest {
        contents: vec![RequestContent {
            role: "user",
            parts: vec![RequestPart { text: prompt }],
        }],
    }
}

/// First text part of the first candidate.
fn first_candidate_text(response: GenerateContentResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .find_map(|part| part.text)
        .filter(|text| !text.trim().is_empty())
}

/// Calls the generative-language provider directly, one attempt per request.
pub struct GeminiGateway {
    client: Client,
    upstream: UpstreamConfig,
    settings: GeminiSettings,
}

impl GeminiGateway {
    pub fn new(client: Client, upstream: UpstreamConfig, settings: GeminiSettings) -> Self {
        Self {
            client,
            upstream,
            settings,
        }
    }

    pub async fn generate_text(&self, prompt: &str) -> Result<String, ProxyError> {
        let url = generate_url(&self.upstream, &self.settings.model);
        debug!(
            url = %url,
            model = %self.settings.model,
            prompt_len = prompt.len(),
            "sending generateContent request"
        );

        let request = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.settings.api_key.as_str())
            .json(&single_turn(prompt));
        let (status, payload) = send_with_deadline(request, &self.upstream, &url).await?;

        if !status.is_success() {
            warn!(
                model = %self.settings.model,
                status = %status,
                response_body_len = payload.len(),
                "provider returned non-success status"
            );
            return Err(ProxyError::UpstreamRejected {
                status,
                message: format!(
                    "API Error: {} - {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown Status")
                ),
            });
        }

        let parsed: GenerateContentResponse = match serde_json::from_slice(&payload) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(error = %err, "failed to parse provider response");
                return Err(ProxyError::UpstreamMalformed {
                    service: self.upstream.name.clone(),
                    status,
                });
            }
        };

        let candidate_count = parsed.candidates.len();
        let text = first_candidate_text(parsed).ok_or_else(|| {
            warn!(candidate_count, "provider returned no usable candidate");
            ProxyError::NoCandidates
        })?;
        debug!(
            model = %self.settings.model,
            response_len = text.len(),
            "received generateContent response"
        );
        Ok(text)
    }

    async fn generate_plan(
        &self,
        capability: Capability,
        user_data: &Value,
    ) -> Result<GatewayReply, ProxyError> {
        let request = PlanRequest::from_user_data(user_data)?;
        info!(
            capability = capability.as_str(),
            model = %self.settings.model,
            condition_count = request.conditions.len(),
            "generating plan with provider"
        );
        let text = self.generate_text(&request.prompt(capability)).await?;
        Ok(GatewayReply::Generated(text))
    }
}

impl PlanGateway for GeminiGateway {
    fn generate<'a>(
        &'a self,
        capability: Capability,
        _body: &'a Value,
        user_data: &'a Value,
    ) -> GatewayFuture<'a, GatewayReply> {
        Box::pin(self.generate_plan(capability, user_data))
    }

    fn health(&self) -> GatewayFuture<'_, Value> {
        let status = json!({
            "status": "ok",
            "service": SERVICE_NAME,
            "mode": "direct",
            "model": self.settings.model,
        });
        Box::pin(async move { Ok(status) })
    }
}
