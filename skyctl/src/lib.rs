//! # skyctl: credit-metered sky replacement for real estate photography
//!
//! `skyctl` sells photo enhancement by the credit. A client uploads a listing photo reference,
//! picks a sky preset and a few clean-up enhancements, and gets back four candidate
//! variations for one credit. Picking a variation and upscaling it to the final deliverable is
//! free. Credits are bought through the payment processor and land on the account when its
//! signed webhook arrives.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer.
//! Persistence goes through the [`db::Storage`] trait, backed by PostgreSQL in production or
//! by process memory for development and tests.
//!
//! ### Request Flow
//!
//! ```text
//! POST /enhance ──→ JobOrchestrator ──→ CreditLedger.debit ──→ generation provider
//!                         │                                          │
//!                         └── on failure: job failed + refund ←──────┘
//!
//! POST /upscale ──→ UpscaleCoordinator ──→ select variation ──→ upscale provider ──→ artifact
//!
//! POST /webhooks/payment ──→ WebhookReconciler ──→ verify signature ──→ CreditLedger.credit
//! ```
//!
//! ### Core Components
//!
//! The **ledger** ([`ledger`]) is the only code that changes balances. Debits are conditional
//! single-statement updates; credits are keyed by a unique payment reference, so refunds and
//! replayed webhooks are applied at most once.
//!
//! The **orchestrator** ([`orchestrator`]) validates an enhancement request, builds the prompt
//! ([`prompt`]), charges one credit and drives the job through
//! `pending → processing → completed | failed`, refunding whenever a charged job fails.
//!
//! The **upscale coordinator** ([`upscale`]) turns the selected variation into the final
//! artifact, at most once per variation.
//!
//! The **reconciler** ([`reconciler`]) verifies payment webhooks through a
//! [`payment_providers::PaymentProvider`] and credits purchases.
//!
//! Generation and upscaling are delegated to remote [`providers`] behind traits, so tests and
//! local development can swap in the dummy implementations.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use skyctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = skyctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     skyctl::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
#![recursion_limit = "256"]
pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod ledger;
mod metrics;
mod openapi;
pub mod orchestrator;
pub mod payment_providers;
pub mod prompt;
pub mod providers;
pub mod reconciler;
pub mod telemetry;
pub mod types;
pub mod upscale;

#[cfg(test)]
pub mod test_utils;

use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    http::{self, HeaderValue},
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;
pub use types::{AccountId, ArtifactId, JobId, TransactionId, VariationId};

use crate::{
    config::{CorsOrigin, DatabaseConfig},
    db::{InMemoryStorage, PgStorage, Storage},
    ledger::CreditLedger,
    openapi::ApiDoc,
    orchestrator::JobOrchestrator,
    providers::{GenerationProvider, UpscaleProvider},
    reconciler::WebhookReconciler,
    upscale::UpscaleCoordinator,
};

/// Application state shared across all request handlers.
///
/// Every service shares one [`Storage`]; providers are injected when the state is built, so
/// nothing reaches for a global client.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .storage(storage)
///     .ledger(ledger)
///     .orchestrator(orchestrator)
///     .upscaler(upscaler)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn Storage>,
    pub ledger: CreditLedger,
    pub orchestrator: JobOrchestrator,
    pub upscaler: UpscaleCoordinator,
    /// Absent when no payment processor is configured
    pub reconciler: Option<WebhookReconciler>,
}

impl AppState {
    /// Wire the services over `storage` with the given providers
    pub fn new(
        config: Config,
        storage: Arc<dyn Storage>,
        generator: Arc<dyn GenerationProvider>,
        upscaler: Arc<dyn UpscaleProvider>,
    ) -> Self {
        let ledger = CreditLedger::new(storage.clone());
        let orchestrator = JobOrchestrator::new(storage.clone(), ledger.clone(), generator, config.jobs.generation_timeout);
        let upscale_coordinator = UpscaleCoordinator::new(storage.clone(), upscaler, config.jobs.upscale_timeout);
        let reconciler = config
            .payment
            .clone()
            .map(|payment| WebhookReconciler::new(payment_providers::create_provider(payment), ledger.clone(), storage.clone()));

        AppState::builder()
            .config(config)
            .storage(storage)
            .ledger(ledger)
            .orchestrator(orchestrator)
            .upscaler(upscale_coordinator)
            .maybe_reconciler(reconciler)
            .build()
    }
}

/// Get the skyctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Open the configured storage backend. PostgreSQL is migrated before use and its pool is
/// returned so it can be closed on shutdown.
#[instrument(skip_all)]
pub async fn setup_storage(config: &Config) -> anyhow::Result<(Arc<dyn Storage>, Option<PgPool>)> {
    match &config.database {
        DatabaseConfig::InMemory => {
            warn!("Using in-memory storage: balances and jobs are lost on restart");
            Ok((Arc::new(InMemoryStorage::new()), None))
        }
        DatabaseConfig::Postgres { url, pool } => {
            let duration = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));
            let pg_pool = PgPoolOptions::new()
                .max_connections(pool.max_connections)
                .min_connections(pool.min_connections)
                .acquire_timeout(Duration::from_secs(pool.acquire_timeout_secs))
                .idle_timeout(duration(pool.idle_timeout_secs))
                .max_lifetime(duration(pool.max_lifetime_secs))
                .connect(url)
                .await?;

            migrator().run(&pg_pool).await?;
            info!("Connected to PostgreSQL and applied migrations");

            Ok((Arc::new(PgStorage::new(pg_pool.clone())), Some(pg_pool)))
        }
    }
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.cors;

    // A list containing "*" is rejected by tower-http, so the wildcard is its own mode
    let allow_origin = if cors_config.allowed_origins.contains(&CorsOrigin::Wildcard) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.origin().ascii_serialization().parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([http::Method::GET, http::Method::POST])
        .allow_headers([http::header::CONTENT_TYPE]);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// This function constructs the complete Axum router with:
/// - Enhancement, account, job and webhook routes
/// - OpenAPI document and interactive docs
/// - Optional Prometheus metrics
/// - CORS configuration
/// - Tracing middleware
///
/// # Errors
///
/// Returns an error if the CORS configuration is invalid.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    use api::handlers::{accounts, enhance, health, jobs, options, payments};

    let cors_layer = create_cors_layer(&state.config)?;
    let enable_metrics = state.config.enable_metrics;

    let router = Router::new()
        .route("/enhance", post(enhance::enhance))
        .route("/upscale", post(enhance::upscale))
        .route("/options", get(options::list_options))
        .route("/accounts", post(accounts::create_account))
        .route("/accounts/{account_id}", get(accounts::get_account))
        .route("/accounts/{account_id}/transactions", get(accounts::list_transactions))
        .route("/jobs/{job_id}", get(jobs::get_job))
        .route("/variations/{variation_id}/select", post(jobs::select_variation))
        .route("/artifacts/{artifact_id}/downloads", post(jobs::record_download))
        // Called by the payment processor, not by clients
        .route("/webhooks/payment", post(payments::webhook))
        .route("/healthz", get(health::healthz))
        .with_state(state)
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let mut router = router.layer(cors_layer);

    // Add Prometheus metrics if enabled
    if enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

        // HTTP metrics from axum-prometheus followed by the ledger/job/webhook counters
        router = router
            .route(
                "/internal/metrics",
                get(|| async move {
                    use prometheus::{Encoder, TextEncoder};

                    let mut body = metric_handle.render();
                    let mut buffer = vec![];
                    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
                        tracing::error!("Failed to encode metrics: {}", e);
                    }
                    body.push_str(&String::from_utf8_lossy(&buffer));
                    body
                }),
            )
            .layer(prometheus_layer);
    }

    // Add tracing layer
    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application struct that owns the router and the storage connection.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] opens storage (running migrations) and builds providers
///    from configuration
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown signal is received, in-flight requests finish, then the
///    pool is closed and telemetry flushed
pub struct Application {
    router: Router,
    config: Config,
    pool: Option<PgPool>,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let (storage, pool) = setup_storage(&config).await?;
        let generator = providers::create_generation_provider(&config.generation);
        let upscaler = providers::create_upscale_provider(&config.upscale);
        info!(generation = generator.name(), upscale = upscaler.name(), "Configured image providers");

        Self::with_components(config, storage, generator, upscaler, pool)
    }

    /// Create an application over existing storage and providers
    pub fn with_components(
        config: Config,
        storage: Arc<dyn Storage>,
        generator: Arc<dyn GenerationProvider>,
        upscaler: Arc<dyn UpscaleProvider>,
        pool: Option<PgPool>,
    ) -> anyhow::Result<Self> {
        if config.payment.is_none() {
            warn!("No payment processor configured: payment webhooks will be refused");
        }

        let state = AppState::new(config.clone(), storage, generator, upscaler);
        let router = build_router(state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("skyctl listening on http://{}, available at http://localhost:{}", bind_addr, self.config.port);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use axum::http::{HeaderValue, header};

    use crate::config::CorsOrigin;
    use crate::test_utils::{StubGenerator, StubUpscaler, create_test_app, create_test_app_with, create_test_config};

    fn app_with_origins(origins: Vec<CorsOrigin>) -> axum_test::TestServer {
        let mut config = create_test_config();
        config.cors.allowed_origins = origins;
        create_test_app_with(config, Arc::new(StubGenerator::new(4)), Arc::new(StubUpscaler::new())).0
    }

    #[test_log::test(tokio::test)]
    async fn test_healthz() {
        let (app, _storage) = create_test_app();
        app.get("/healthz").await.assert_status_ok();
    }

    #[test_log::test(tokio::test)]
    async fn test_metrics_disabled() {
        let (app, _storage) = create_test_app();

        let response = app.get("/internal/metrics").await;

        response.assert_status_not_found();
    }

    #[test_log::test(tokio::test)]
    async fn test_metrics_enabled() {
        let mut config = create_test_config();
        config.enable_metrics = true;
        let (app, storage) = create_test_app_with(config, Arc::new(StubGenerator::new(4)), Arc::new(StubUpscaler::new()));

        // Touch the ledger so its counters exist
        let account = crate::test_utils::create_account(storage.as_ref(), 0).await;
        app.post("/enhance")
            .json(&serde_json::json!({
                "sourceImage": "https://img.example.com/house.jpg",
                "skySelection": "twilight",
                "accountId": account.to_string()
            }))
            .await;

        let response = app.get("/internal/metrics").await;

        response.assert_status_ok();
        let content = response.text();
        assert!(content.contains("# TYPE"));
        assert!(content.contains("skyctl_credits_insufficient_total"));
    }

    #[test_log::test(tokio::test)]
    async fn test_cors_allows_configured_origin() {
        let app = app_with_origins(vec![CorsOrigin::Url("https://app.example.com".parse().unwrap())]);

        let allowed = app
            .get("/healthz")
            .add_header(header::ORIGIN, HeaderValue::from_static("https://app.example.com"))
            .await;
        assert_eq!(
            allowed.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("https://app.example.com"))
        );

        let other = app
            .get("/healthz")
            .add_header(header::ORIGIN, HeaderValue::from_static("https://evil.example.com"))
            .await;
        assert!(other.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[test_log::test(tokio::test)]
    async fn test_cors_wildcard() {
        let app = app_with_origins(vec![
            CorsOrigin::Wildcard,
            CorsOrigin::Url("https://app.example.com".parse().unwrap()),
        ]);

        let response = app
            .get("/healthz")
            .add_header(header::ORIGIN, HeaderValue::from_static("https://anywhere.example.com"))
            .await;

        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("*"))
        );
    }
}
