//! Replicate prediction API client.
//!
//! Predictions are created with `Prefer: wait` so fast models answer inline; anything still
//! `starting` or `processing` is polled through its `urls.get` link until it settles.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::{GenerationProvider, GenerationRequest, ProviderError, Result, UpscaleProvider, UpscaleRequest};
use crate::config::{ReplicateGenerationConfig, ReplicateUpscaleConfig};

const PROVIDER: &str = "replicate";

/// Longest upstream error body carried into a [`ProviderError`]
const MAX_ERROR_BODY: usize = 512;

#[derive(Clone)]
pub struct ReplicateClient {
    http: Client,
    api_base: String,
    api_token: String,
    poll_interval: Duration,
}

impl ReplicateClient {
    pub fn new(api_base: &str, api_token: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            http: Client::new(),
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            poll_interval,
        }
    }

    /// Official models are addressed by name, community models by `owner/name:version`
    fn prediction_target(&self, model: &str, input: Value) -> (String, Value) {
        match model.split_once(':') {
            Some((_, version)) => (
                format!("{}/predictions", self.api_base),
                json!({ "version": version, "input": input }),
            ),
            None => (
                format!("{}/models/{}/predictions", self.api_base, model),
                json!({ "input": input }),
            ),
        }
    }

    /// Create a prediction and wait for it to settle, returning its `output`
    #[instrument(skip(self, input), err)]
    pub async fn run<I: Serialize + Sync>(&self, model: &str, input: &I) -> Result<Value> {
        let input = serde_json::to_value(input).map_err(|e| malformed(format!("unserializable input: {e}")))?;
        let (endpoint, payload) = self.prediction_target(model, input);

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.api_token)
            .header("Prefer", "wait")
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;
        let mut prediction = response_json(response).await?;

        loop {
            match prediction_status(&prediction).as_str() {
                "succeeded" => break,
                "failed" | "canceled" => {
                    let detail = prediction
                        .get("error")
                        .and_then(Value::as_str)
                        .unwrap_or("prediction did not succeed");
                    return Err(ProviderError::Upstream {
                        provider: PROVIDER.to_string(),
                        status: None,
                        message: truncate(detail),
                    });
                }
                "starting" | "processing" => {
                    let poll_url = prediction
                        .get("urls")
                        .and_then(|urls| urls.get("get"))
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|url| !url.is_empty())
                        .ok_or_else(|| malformed("prediction is missing its poll URL".to_string()))?
                        .to_string();

                    debug!(poll_url, "Prediction still running, polling");
                    tokio::time::sleep(self.poll_interval).await;

                    let response = self
                        .http
                        .get(&poll_url)
                        .bearer_auth(&self.api_token)
                        .send()
                        .await
                        .map_err(transport_error)?;
                    prediction = response_json(response).await?;
                }
                other => return Err(malformed(format!("unexpected prediction status '{other}'"))),
            }
        }

        prediction
            .get("output")
            .cloned()
            .filter(|output| !output.is_null())
            .ok_or_else(|| malformed("prediction succeeded without output".to_string()))
    }
}

/// Collect every distinct http(s) URL found in a prediction output: a bare string, an array
/// of outputs, or objects carrying `url`, `urls` or `output`.
pub fn extract_output_urls(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(url) => {
            let trimmed = url.trim();
            if trimmed.starts_with("http") && !out.iter().any(|existing| existing == trimmed) {
                out.push(trimmed.to_string());
            }
        }
        Value::Array(rows) => {
            for row in rows {
                extract_output_urls(row, out);
            }
        }
        Value::Object(obj) => {
            for key in ["url", "urls", "output"] {
                if let Some(nested) = obj.get(key) {
                    extract_output_urls(nested, out);
                }
            }
        }
        _ => {}
    }
}

fn prediction_status(prediction: &Value) -> String {
    prediction
        .get("status")
        .and_then(Value::as_str)
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

async fn response_json(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Upstream {
            provider: PROVIDER.to_string(),
            status: Some(status.as_u16()),
            message: truncate(&body),
        });
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| malformed(format!("response was not JSON: {e}")))
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    ProviderError::Upstream {
        provider: PROVIDER.to_string(),
        status: err.status().map(|s| s.as_u16()),
        message: err.to_string(),
    }
}

fn malformed(message: String) -> ProviderError {
    ProviderError::MalformedOutput {
        provider: PROVIDER.to_string(),
        message,
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_ERROR_BODY).collect()
}

/// Image-to-image generation (FLUX dev by default)
pub struct ReplicateGenerator {
    client: ReplicateClient,
    model: String,
    cost_per_output: Decimal,
}

impl From<ReplicateGenerationConfig> for ReplicateGenerator {
    fn from(config: ReplicateGenerationConfig) -> Self {
        Self {
            client: ReplicateClient::new(&config.api_base, config.api_token, config.poll_interval),
            model: config.model,
            cost_per_output: config.cost_per_output,
        }
    }
}

#[async_trait]
impl GenerationProvider for ReplicateGenerator {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn cost_per_output(&self) -> Decimal {
        self.cost_per_output
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<String>> {
        let output = self.client.run(&self.model, request).await?;
        let mut urls = Vec::new();
        extract_output_urls(&output, &mut urls);
        Ok(urls)
    }
}

/// Super-resolution upscaling (Real-ESRGAN by default)
pub struct ReplicateUpscaler {
    client: ReplicateClient,
    model: String,
}

impl From<ReplicateUpscaleConfig> for ReplicateUpscaler {
    fn from(config: ReplicateUpscaleConfig) -> Self {
        Self {
            client: ReplicateClient::new(&config.api_base, config.api_token, config.poll_interval),
            model: config.model,
        }
    }
}

#[async_trait]
impl UpscaleProvider for ReplicateUpscaler {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn upscale(&self, request: &UpscaleRequest) -> Result<String> {
        let output = self.client.run(&self.model, request).await?;
        let mut urls = Vec::new();
        extract_output_urls(&output, &mut urls);
        urls.into_iter()
            .next()
            .ok_or_else(|| malformed("upscale returned no image URL".to_string()))
    }
}
