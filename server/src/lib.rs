use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::signal;
use tower_http::{
    classify::ServerErrorsFailureClass,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::Span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod config;
pub mod domain;
mod error;
mod handlers;
pub mod keys;
pub mod s3;

pub use handlers::AppState;

use crate::config::Config;
use crate::s3::S3Store;
use kernel::{
    DeleteResponse, DownloadUrlRequest, DownloadUrlResponse, ErrorBody, HealthResponse,
    ListResponse, StoredFile, UploadResponse, UploadUrlRequest, UploadUrlResponse,
};

/// Upload body cap, enforced by the limit layer before handler logic runs.
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::upload,
        handlers::upload_url,
        handlers::list_files,
        handlers::delete_file,
        handlers::download_url,
    ),
    components(schemas(
        StoredFile,
        HealthResponse,
        UploadResponse,
        UploadUrlRequest,
        UploadUrlResponse,
        ListResponse,
        DeleteResponse,
        DownloadUrlRequest,
        DownloadUrlResponse,
        ErrorBody,
    )),
    tags(
        (name = "service", description = "Service level endpoints"),
        (name = "files", description = "File upload, listing, deletion and link refresh")
    )
)]
struct ApiDoc;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "pail=debug,server=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Configuration from environment. Missing store settings abort startup
    // before the listener binds.
    let config = Config::from_env()?;
    let allowed_origin = match &config.allowed_origin {
        Some(origin) => Some(HeaderValue::from_str(origin)?),
        None => None,
    };

    let store = S3Store::new(&config).await;
    let state = AppState {
        store: Arc::new(store),
    };

    let socket: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    tracing::debug!("listening on {socket}");

    let listener = tokio::net::TcpListener::bind(socket).await?;
    let app = create_routes(state, allowed_origin);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn create_routes(state: AppState, allowed_origin: Option<HeaderValue>) -> Router {
    let cors = cors_layer(allowed_origin);
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/upload", post(handlers::upload))
        .route("/api/upload-url", post(handlers::upload_url))
        .route("/api/files", get(handlers::list_files))
        .route("/api/files/*key", delete(handlers::delete_file))
        .route("/api/download-url", post(handlers::download_url))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .layer(TraceLayer::new_for_http().on_failure(
            |error: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                tracing::error!("Server error: {error}");
            },
        ))
        .with_state(state)
}

fn cors_layer(allowed_origin: Option<HeaderValue>) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match allowed_origin {
        Some(origin) => cors.allow_origin(origin),
        None => cors.allow_origin(Any),
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    println!("signal received, starting graceful shutdown");
}
