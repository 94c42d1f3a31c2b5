//! Application setup and server configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::{get, post},
    Router,
};
use prelude_verify::{PreludeOptions, PreludeService};
use sqlx::PgPool;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::kernel::{
    AuthSettings, BaseDeliveryChannel, BaseVerificationProvider, NoopDeliveryChannel,
    PostgresAuthStore, PreludeAdapter, ServerDeps, SessionServiceClient, WebhookDeliveryChannel,
};
use crate::server::routes::{
    health_handler, reissue_session_handler, request_code_handler, verify_code_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AxumAppState {
    pub db_pool: PgPool,
    pub deps: Arc<ServerDeps>,
}

/// Build the Axum application router.
///
/// Wires the PostgreSQL store, the verification provider (when configured),
/// the delivery gateway, and the session backing service into [`ServerDeps`]
/// and mounts the auth routes behind a rate limiter.
pub fn build_app(pool: PgPool, config: &Config) -> Router {
    // External verification provider; absent key runs local-only.
    let provider: Option<Arc<dyn BaseVerificationProvider>> = config.prelude_api_key.clone().map(
        |api_key| -> Arc<dyn BaseVerificationProvider> {
            let service = Arc::new(PreludeService::new(PreludeOptions {
                api_key,
                base_url: config.prelude_base_url.clone(),
            }));
            Arc::new(PreludeAdapter::new(service))
        },
    );

    let delivery: Arc<dyn BaseDeliveryChannel> = match config.delivery_webhook_url.clone() {
        Some(url) => Arc::new(WebhookDeliveryChannel::new(url)),
        None => Arc::new(NoopDeliveryChannel),
    };

    let session_backend = Arc::new(SessionServiceClient::new(
        config.session_service_url.clone(),
        config.session_service_key.clone(),
    ));

    let settings = AuthSettings {
        provider_timeout: Duration::from_millis(config.provider_timeout_ms),
        provider_fail_open: config.provider_fail_open,
        resend_cooldown: chrono::Duration::seconds(config.resend_cooldown_secs),
        synthetic_address_domain: config.synthetic_address_domain.clone(),
    };

    let deps = ServerDeps::new(
        Arc::new(PostgresAuthStore::new(pool.clone())),
        provider,
        delivery,
        session_backend,
        settings,
    );

    let app_state = AxumAppState {
        db_pool: pool,
        deps: Arc::new(deps),
    };

    // CORS configuration - the dashboard and storefront call from the browser
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    // Rate limiting on the OTP endpoints: 5/sec per IP with a burst of 10.
    // Keeps code-request spam and brute-force attempts off the store.
    let rate_limit_config = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(5)
            .burst_size(10)
            .use_headers()
            .finish()
            .expect("Rate limiter configuration is valid and should never fail"),
    );
    let rate_limit_layer = GovernorLayer {
        config: rate_limit_config,
    };

    let auth_routes = Router::new()
        .route("/auth/code/request", post(request_code_handler))
        .route("/auth/code/verify", post(verify_code_handler))
        .route("/auth/session/reissue", post(reissue_session_handler))
        .layer(rate_limit_layer);

    auth_routes
        // Health check (no rate limit)
        .route("/health", get(health_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(Extension(app_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
