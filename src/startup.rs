use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract,
    http::{header, HeaderValue, Method, Request},
    Router,
};
use tower::ServiceExt;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::Level;

use crate::{
    configuration::Settings,
    domain::{ApiPrefix, ParseApiPrefixError},
    routes::{self, ApiRoute, RouteTable},
    static_assets::{AssetRootError, StaticAssets},
    telemetry,
};

#[derive(thiserror::Error)]
pub enum BuildError {
    #[error("Unable to parse socket address")]
    Address(#[source] std::io::Error),

    #[error(transparent)]
    ApiPrefix(#[from] ParseApiPrefixError),

    #[error(transparent)]
    StaticRoot(#[from] AssetRootError),

    #[error("Invalid CORS origin `{0}`")]
    CorsOrigin(String, #[source] header::InvalidHeaderValue),
}

impl std::fmt::Debug for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        telemetry::error_chain_fmt(self, f)
    }
}

pub struct Application {
    address: SocketAddr,
    router: Router,
}

impl Application {
    pub fn new(
        addr: SocketAddr,
        app_state: Arc<AppState>,
        cors_origins: Vec<HeaderValue>,
    ) -> Self {
        // Every request goes through the route table, axum only provides the
        // transport and the middleware stack
        let mut router: Router = Router::new()
            .fallback(routes::dispatch)
            .with_state(app_state);

        if !cors_origins.is_empty() {
            router = with_cors(router, cors_origins);
        }

        let router = router.layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let trace_id = uuid::Uuid::new_v4().to_string();
                    tracing::info_span!(
                        "request",
                        trace_id = trace_id,
                        method = ?request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                })
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        );

        Self {
            address: addr,
            router,
        }
    }

    /// Validates the settings and assembles the application.
    ///
    /// Fails if the static root is missing, so a misconfigured deployment
    /// does not come up answering 404 for everything.
    pub fn build(settings: &Settings) -> Result<Self, BuildError> {
        let address = settings.application.address().map_err(BuildError::Address)?;
        let api_prefix = settings.application.api_prefix()?;
        let assets = StaticAssets::new(&settings.assets)?;
        let cors_origins = settings
            .application
            .cors_allowed_origins
            .iter()
            .map(|o| {
                HeaderValue::from_str(o).map_err(|e| BuildError::CorsOrigin(o.clone(), e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            api_prefix = %api_prefix,
            static_root = %assets.root().display(),
            spa_fallback = assets.spa_fallback(),
            "Application configured"
        );
        let app_state = AppState::new(api_prefix, assets);

        Ok(Self::new(address, Arc::new(app_state), cors_origins))
    }

    pub async fn serve(self) -> Result<(), std::io::Error> {
        let listener = tokio::net::TcpListener::bind(self.address).await?;
        tracing::info!("Starting service on {}...", listener.local_addr()?);
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }

    pub fn router(self) -> Router {
        self.router
    }
}

pub struct AppState {
    pub route_table: RouteTable,
}

impl AppState {
    /// Registers the API routes under `api_prefix`. The static assets are
    /// always consulted last.
    pub fn new(api_prefix: ApiPrefix, assets: StaticAssets) -> Self {
        let route_table = RouteTable::new(api_prefix.clone(), assets)
            .route(ApiRoute::get(&api_prefix, "health", routes::health_check));

        Self { route_table }
    }
}

/// Adds CORS headers to responses for the allowed origins.
///
/// `CorsLayer` answers every `OPTIONS` request itself, so only genuine
/// preflights from an allowed origin are handed to it. Any other `OPTIONS`
/// request goes through the route table like every other method.
fn with_cors(router: Router, origins: Vec<HeaderValue>) -> Router {
    let with_cors = router.clone().layer(cors_layer(origins.clone()));

    Router::new().fallback_service(tower::service_fn(move |request: extract::Request| {
        let target = if request.method() == Method::OPTIONS && !is_preflight(&request, &origins) {
            router.clone()
        } else {
            with_cors.clone()
        };
        target.oneshot(request)
    }))
}

fn is_preflight<B>(request: &Request<B>, origins: &[HeaderValue]) -> bool {
    let headers = request.headers();
    headers.contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
        && headers
            .get(header::ORIGIN)
            .is_some_and(|origin| origins.contains(origin))
}

fn cors_layer(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(86400))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
