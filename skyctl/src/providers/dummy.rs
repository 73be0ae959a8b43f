//! Offline providers that answer immediately with synthetic URLs.
//!
//! Used for local development and as the default when no provider is configured.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{GenerationProvider, GenerationRequest, Result, UpscaleProvider, UpscaleRequest};
use crate::config::DummyProviderConfig;

pub struct DummyGenerator {
    base_url: String,
    cost_per_output: Decimal,
}

impl From<DummyProviderConfig> for DummyGenerator {
    fn from(config: DummyProviderConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cost_per_output: config.cost_per_output,
        }
    }
}

#[async_trait]
impl GenerationProvider for DummyGenerator {
    fn name(&self) -> &str {
        "dummy"
    }

    fn cost_per_output(&self) -> Decimal {
        self.cost_per_output
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<String>> {
        let batch = Uuid::new_v4();
        Ok((0..request.num_outputs)
            .map(|i| format!("{}/generations/{batch}/{i}.{}", self.base_url, request.output_format))
            .collect())
    }
}

pub struct DummyUpscaler {
    base_url: String,
}

impl From<DummyProviderConfig> for DummyUpscaler {
    fn from(config: DummyProviderConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl UpscaleProvider for DummyUpscaler {
    fn name(&self) -> &str {
        "dummy"
    }

    async fn upscale(&self, request: &UpscaleRequest) -> Result<String> {
        Ok(format!("{}/upscaled/{}-x{}.png", self.base_url, Uuid::new_v4(), request.scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dummy_generator_returns_requested_outputs() {
        let generator = DummyGenerator::from(DummyProviderConfig::default());
        let urls = generator
            .generate(&GenerationRequest::new("prompt", "https://img.example.com/a.jpg"))
            .await
            .unwrap();

        assert_eq!(urls.len(), GenerationRequest::OUTPUT_COUNT);
        assert!(urls.iter().all(|u| u.starts_with("https://dummy.skyctl.local/generations/") && u.ends_with(".webp")));
    }

    #[tokio::test]
    async fn test_dummy_upscaler() {
        let upscaler = DummyUpscaler::from(DummyProviderConfig {
            base_url: "https://cdn.test/".to_string(),
            cost_per_output: Decimal::ZERO,
        });
        let url = upscaler.upscale(&UpscaleRequest::new("https://cdn.test/v.webp")).await.unwrap();
        assert!(url.starts_with("https://cdn.test/upscaled/"));
        assert!(url.ends_with("-x4.png"));
    }
}
