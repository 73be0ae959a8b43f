//! Test utilities: account fixtures, scripted providers and an in-memory test server.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use axum_test::TestServer;
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use sha2::Sha256;
use uuid::Uuid;

use crate::{
    config::{Config, PaymentConfig, StripeConfig},
    db::{
        InMemoryStorage, Storage,
        models::{
            accounts::AccountCreateDBRequest,
            jobs::{JobCreateDBRequest, JobDBResponse},
            variations::VariationDBResponse,
        },
    },
    providers::{GenerationProvider, GenerationRequest, ProviderError, UpscaleProvider, UpscaleRequest},
    types::AccountId,
};

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

pub fn create_test_config() -> Config {
    Config {
        payment: Some(PaymentConfig::Stripe(StripeConfig {
            webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
        })),
        enable_metrics: false,
        ..Default::default()
    }
}

/// Test server over in-memory storage with a four-output generator and a working upscaler
pub fn create_test_app() -> (TestServer, Arc<InMemoryStorage>) {
    create_test_app_with(create_test_config(), Arc::new(StubGenerator::new(4)), Arc::new(StubUpscaler::new()))
}

pub fn create_test_app_with(
    config: Config,
    generator: Arc<dyn GenerationProvider>,
    upscaler: Arc<dyn UpscaleProvider>,
) -> (TestServer, Arc<InMemoryStorage>) {
    let storage = Arc::new(InMemoryStorage::new());
    let app = crate::Application::with_components(config, storage.clone(), generator, upscaler, None)
        .expect("Failed to create application");
    (app.into_test_server(), storage)
}

pub async fn create_account<S: Storage + ?Sized>(storage: &S, credits: i64) -> AccountId {
    storage
        .create_account(&AccountCreateDBRequest::new(credits))
        .await
        .expect("Failed to create test account")
        .id
}

/// A completed job with four stored variations, none selected
pub async fn completed_job<S: Storage + ?Sized>(storage: &S, account_id: AccountId) -> (JobDBResponse, Vec<VariationDBResponse>) {
    let id = Uuid::new_v4();
    storage
        .create_job(&JobCreateDBRequest {
            id,
            account_id,
            source_image: "https://img.example.com/listing.jpg".to_string(),
            prompt: "Clear blue sky".to_string(),
            preset_used: "standard-blue".to_string(),
            provider: "stub".to_string(),
            credits_charged: 1,
        })
        .await
        .expect("Failed to create test job");
    storage.mark_job_processing(id).await.expect("Failed to start test job");

    let urls: Vec<String> = (0..4).map(|i| format!("https://cdn.example.com/{id}/{i}.webp")).collect();
    storage
        .complete_job(id, Decimal::ZERO, &urls)
        .await
        .expect("Failed to complete test job")
}

/// Build a `Stripe-Signature` header value for `payload`
pub fn stripe_signature(payload: &str, secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

/// A complete `checkout.session.completed` event body as Stripe would send it
pub fn checkout_completed_event(account_id: &str, credits: i64, amount_cents: i64, payment_intent: &str) -> serde_json::Value {
    let created = chrono::Utc::now().timestamp();
    serde_json::json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "object": "event",
        "api_version": "2025-04-30.basil",
        "created": created,
        "livemode": false,
        "pending_webhooks": 1,
        "request": { "id": null, "idempotency_key": null },
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": format!("cs_test_{}", Uuid::new_v4().simple()),
                "object": "checkout.session",
                "adaptive_pricing": { "enabled": false },
                "after_expiration": null,
                "allow_promotion_codes": null,
                "amount_subtotal": amount_cents,
                "amount_total": amount_cents,
                "automatic_tax": { "enabled": false, "liability": null, "provider": null, "status": null },
                "billing_address_collection": null,
                "cancel_url": "https://app.example.com/credits",
                "client_reference_id": null,
                "client_secret": null,
                "collected_information": null,
                "consent": null,
                "consent_collection": null,
                "created": created,
                "currency": "usd",
                "currency_conversion": null,
                "custom_fields": [],
                "custom_text": {
                    "after_submit": null,
                    "shipping_address": null,
                    "submit": null,
                    "terms_of_service_acceptance": null
                },
                "customer": "cus_test123",
                "customer_creation": "always",
                "customer_details": null,
                "customer_email": null,
                "discounts": [],
                "expires_at": created + 86_400,
                "invoice": null,
                "invoice_creation": null,
                "livemode": false,
                "locale": null,
                "metadata": {
                    "userId": account_id,
                    "credits": credits.to_string()
                },
                "mode": "payment",
                "payment_intent": payment_intent,
                "payment_link": null,
                "payment_method_collection": "if_required",
                "payment_method_configuration_details": null,
                "payment_method_options": {},
                "payment_method_types": ["card"],
                "payment_status": "paid",
                "permissions": null,
                "phone_number_collection": { "enabled": false },
                "presentment_details": null,
                "recovered_from": null,
                "saved_payment_method_options": null,
                "setup_intent": null,
                "shipping_address_collection": null,
                "shipping_cost": null,
                "shipping_options": [],
                "status": "complete",
                "submit_type": null,
                "subscription": null,
                "success_url": "https://app.example.com/credits?paid=1",
                "total_details": { "amount_discount": 0, "amount_shipping": 0, "amount_tax": 0 },
                "ui_mode": "hosted",
                "url": null,
                "wallet_options": null
            }
        }
    })
}

/// Generator returning `count` fresh URLs, optionally after a delay
pub struct StubGenerator {
    count: usize,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_request: Mutex<Option<GenerationRequest>>,
}

impl StubGenerator {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            delay: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.last_request.lock().clone()
    }
}

#[async_trait]
impl GenerationProvider for StubGenerator {
    fn name(&self) -> &str {
        "stub"
    }

    fn cost_per_output(&self) -> Decimal {
        Decimal::new(25, 4)
    }

    async fn generate(&self, request: &GenerationRequest) -> crate::providers::Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let batch = Uuid::new_v4();
        Ok((0..self.count).map(|i| format!("https://cdn.example.com/{batch}/{i}.webp")).collect())
    }
}

/// Generator whose every call fails upstream
pub struct FailingGenerator;

#[async_trait]
impl GenerationProvider for FailingGenerator {
    fn name(&self) -> &str {
        "failing"
    }

    fn cost_per_output(&self) -> Decimal {
        Decimal::ZERO
    }

    async fn generate(&self, _request: &GenerationRequest) -> crate::providers::Result<Vec<String>> {
        Err(ProviderError::Upstream {
            provider: "failing".to_string(),
            status: Some(500),
            message: "model crashed".to_string(),
        })
    }
}

/// Upscaler that records its calls; can be made slow or failing
pub struct StubUpscaler {
    fail: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_image: Mutex<Option<String>>,
}

impl StubUpscaler {
    pub fn new() -> Self {
        Self {
            fail: false,
            delay: None,
            calls: AtomicUsize::new(0),
            last_image: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::new() }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_image(&self) -> Option<String> {
        self.last_image.lock().clone()
    }
}

#[async_trait]
impl UpscaleProvider for StubUpscaler {
    fn name(&self) -> &str {
        "stub"
    }

    async fn upscale(&self, request: &UpscaleRequest) -> crate::providers::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_image.lock() = Some(request.image.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ProviderError::Upstream {
                provider: "stub".to_string(),
                status: Some(502),
                message: "bad gateway".to_string(),
            });
        }
        Ok(format!("https://cdn.example.com/upscaled/{}-x{}.png", Uuid::new_v4(), request.scale))
    }
}
