//! Generation and upscale provider abstraction.
//!
//! Providers are opaque remote services: the pipeline only knows how to send them a request
//! and get back output URLs, or a [`ProviderError`]. Deadlines are applied by the caller
//! (see [`with_deadline`]); implementations simply run until they have an answer.

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::{GenerationProviderConfig, UpscaleProviderConfig};

pub mod dummy;
pub mod replicate;

/// Create the generation provider from configuration
///
/// Adding a new provider requires adding a match arm here.
pub fn create_generation_provider(config: &GenerationProviderConfig) -> Arc<dyn GenerationProvider> {
    match config {
        GenerationProviderConfig::Replicate(replicate) => Arc::new(replicate::ReplicateGenerator::from(replicate.clone())),
        GenerationProviderConfig::Dummy(dummy) => Arc::new(dummy::DummyGenerator::from(dummy.clone())),
    }
}

/// Create the upscale provider from configuration
pub fn create_upscale_provider(config: &UpscaleProviderConfig) -> Arc<dyn UpscaleProvider> {
    match config {
        UpscaleProviderConfig::Replicate(replicate) => Arc::new(replicate::ReplicateUpscaler::from(replicate.clone())),
        UpscaleProviderConfig::Dummy(dummy) => Arc::new(dummy::DummyUpscaler::from(dummy.clone())),
    }
}

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors that can occur calling a provider
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} did not respond within {after:?}")]
    Timeout { provider: String, after: Duration },

    #[error("{provider} request failed (status {status:?}): {message}")]
    Upstream {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    #[error("{provider} returned malformed output: {message}")]
    MalformedOutput { provider: String, message: String },
}

/// Fixed image-to-image generation parameters plus the per-call prompt, source and seed
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub image: String,
    pub prompt_strength: f64,
    pub num_outputs: usize,
    pub aspect_ratio: String,
    pub output_format: String,
    pub output_quality: u8,
    pub seed: u32,
}

impl GenerationRequest {
    /// Number of variations every generation must produce
    pub const OUTPUT_COUNT: usize = 4;

    /// Build a request with the standard parameters and a fresh random seed
    pub fn new(prompt: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: image.into(),
            prompt_strength: 0.8,
            num_outputs: Self::OUTPUT_COUNT,
            aspect_ratio: "16:9".to_string(),
            output_format: "webp".to_string(),
            output_quality: 90,
            seed: rand::random_range(0..1_000_000),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UpscaleRequest {
    pub image: String,
    pub scale: u8,
    pub face_enhance: bool,
}

impl UpscaleRequest {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            scale: 4,
            face_enhance: false,
        }
    }
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Identifier recorded on jobs
    fn name(&self) -> &str;

    /// Cost of one output, in dollars
    fn cost_per_output(&self) -> Decimal;

    /// Run a generation and return the output URLs in provider order
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<String>>;
}

#[async_trait]
pub trait UpscaleProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Run an upscale and return the URL of the result
    async fn upscale(&self, request: &UpscaleRequest) -> Result<String>;
}

/// Run a provider call with a deadline, mapping expiry to [`ProviderError::Timeout`]
pub async fn with_deadline<T, F>(provider: &str, after: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout {
            provider: provider.to_string(),
            after,
        }),
    }
}
