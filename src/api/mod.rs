use crate::credentials::{
    CredentialHasher, CredentialIssuer, CredentialStore, HostMismatchPolicy, MemoryStore,
    Notifier, Rotator, StoreError, StoredCredential, Subject,
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
mod openapi;
pub mod storage;

pub use openapi::ApiDoc;

use handlers::{cookies::CookieSettings, health, tokens};
use storage::PgCredentialStore;

/// Credential store selected at startup.
#[derive(Debug)]
pub enum StoreBackend {
    Postgres(PgCredentialStore),
    Memory(MemoryStore),
}

impl StoreBackend {
    /// # Errors
    /// Returns an error if the backing database is unreachable.
    pub async fn ping(&self) -> Result<()> {
        match self {
            Self::Postgres(store) => store.ping().await,
            Self::Memory(_) => Ok(()),
        }
    }
}

impl CredentialStore for StoreBackend {
    async fn update_credential(
        &self,
        subject: &Subject,
        credential: &StoredCredential,
        expected: Option<&StoredCredential>,
    ) -> Result<(), StoreError> {
        match self {
            Self::Postgres(store) => store.update_credential(subject, credential, expected).await,
            Self::Memory(store) => store.update_credential(subject, credential, expected).await,
        }
    }

    async fn current_credential(&self, subject: &Subject) -> Result<StoredCredential, StoreError> {
        match self {
            Self::Postgres(store) => store.current_credential(subject).await,
            Self::Memory(store) => store.current_credential(subject).await,
        }
    }

    async fn select_mail(&self, subject: &Subject) -> Result<String, StoreError> {
        match self {
            Self::Postgres(store) => store.select_mail(subject).await,
            Self::Memory(store) => store.select_mail(subject).await,
        }
    }
}

pub type AppRotator = Rotator<StoreBackend, Notifier>;

/// Everything the server needs except the store.
#[derive(Debug)]
pub struct ServiceConfig {
    pub issuer: CredentialIssuer,
    pub hasher: CredentialHasher,
    pub notifier: Notifier,
    pub host_policy: HostMismatchPolicy,
    pub cookie_secure: bool,
}

/// Shared handler state, injected as an `Extension<Arc<ApiState>>`.
#[derive(Debug)]
pub struct ApiState {
    rotator: AppRotator,
    cookies: CookieSettings,
}

impl ApiState {
    #[must_use]
    pub fn new(store: StoreBackend, config: ServiceConfig) -> Self {
        let cookies = CookieSettings {
            secure: config.cookie_secure,
            access_max_age: config.issuer.config().access_ttl().num_seconds(),
            refresh_max_age: config.issuer.config().refresh_ttl().num_seconds(),
        };
        let rotator = Rotator::new(config.issuer, config.hasher, store, config.notifier)
            .with_host_policy(config.host_policy);
        Self { rotator, cookies }
    }

    #[must_use]
    pub fn rotator(&self) -> &AppRotator {
        &self.rotator
    }

    #[must_use]
    pub fn cookies(&self) -> &CookieSettings {
        &self.cookies
    }
}

/// Build the application router with request-id, tracing and state layers.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health::health).head(health::health))
        .route("/v1/auth/tokens", post(tokens::issue))
        .route("/v1/auth/refresh", post(tokens::refresh))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state)),
        )
}

/// Connect to Postgres and serve until ctrl-c.
/// # Errors
/// Return error if the database is unreachable or the listener fails
pub async fn new(port: u16, dsn: String, config: ServiceConfig) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let store = StoreBackend::Postgres(PgCredentialStore::new(pool));
    let app = router(Arc::new(ApiState::new(store, config)));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Gracefully shutdown");
            }
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
