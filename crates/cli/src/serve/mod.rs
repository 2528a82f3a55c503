//! `vendorflow serve` -- HTTP JSON API for procurement executions.
//!
//! Serves the execution manager and processing engine over `axum` + `tokio`.
//! Processing runs execute as background tasks while requests keep being
//! served.
//!
//! Endpoints (all JSON, API routes under `/api`):
//! - GET    /health                                  - Server status
//! - GET    /api/executions                          - List executions, newest first
//! - POST   /api/executions                          - Create an execution
//! - GET    /api/executions/status/{status}          - List executions with one status
//! - GET    /api/executions/{id}                     - Read one execution
//! - PUT    /api/executions/{id}                     - Merge changes into an execution
//! - DELETE /api/executions/{id}                     - Delete an execution
//! - POST   /api/executions/{id}/research            - Attach a vendor shortlist
//! - PUT    /api/executions/{id}/vendors/{index}     - Update one vendor's status
//! - POST   /api/process-materials/{id}              - Start a processing run
//! - GET    /api/process-materials/{id}/status       - Poll run progress
//! - POST   /api/process-materials/{id}/cancel       - Cancel a run
//! - GET    /api/recent-activity                     - Last 20 activity entries
//! - POST   /api/upload                              - Store up to 10 files
//! - POST   /api/import-materials-csv                - Parse materials from a CSV
//! - GET    /uploads/{file}                          - Stored uploads, read-only
//!
//! Errors use `{"success": false, "message": ..., "error": ...}`.

mod config;
mod error;
mod handlers;
mod processing;
mod state;
mod uploads;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use vendorflow_engine::Procurement;

pub(crate) use self::config::{ServeArgs, ServeConfig};
use self::error::ApiError;
use self::handlers::{
    handle_create_execution, handle_delete_execution, handle_get_execution, handle_health,
    handle_list_by_status, handle_list_executions, handle_not_found, handle_recent_activity,
    handle_update_execution, handle_update_vendor,
};
use self::processing::{
    handle_cancel_processing, handle_processing_status, handle_research, handle_start_processing,
};
use self::state::AppState;
use self::uploads::{handle_import_csv, handle_upload, UploadStore, MAX_FILES, MAX_FILE_SIZE};

/// Maximum JSON request body size: 10 MB.
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Multipart bodies may carry `MAX_FILES` full-size files plus framing.
const MAX_UPLOAD_BODY_SIZE: usize = MAX_FILES * MAX_FILE_SIZE + 1024 * 1024;

/// How long open HTTPS connections get to finish after Ctrl+C.
#[cfg(feature = "tls")]
const TLS_SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(10);

/// Convert a handler panic into the standard 500 envelope.
fn panic_response(_payload: Box<dyn std::any::Any + Send + 'static>) -> Response {
    tracing::error!("request handler panicked");
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong!").into_response()
}

/// Build the application router over `state`.
pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let api = Router::new()
        .route(
            "/executions",
            get(handle_list_executions).post(handle_create_execution),
        )
        .route("/executions/status/{status}", get(handle_list_by_status))
        .route(
            "/executions/{id}",
            get(handle_get_execution)
                .put(handle_update_execution)
                .delete(handle_delete_execution),
        )
        .route("/executions/{id}/research", post(handle_research))
        .route(
            "/executions/{id}/vendors/{index}",
            put(handle_update_vendor),
        )
        .route("/process-materials/{id}", post(handle_start_processing))
        .route(
            "/process-materials/{id}/status",
            get(handle_processing_status),
        )
        .route(
            "/process-materials/{id}/cancel",
            post(handle_cancel_processing),
        )
        .route("/recent-activity", get(handle_recent_activity))
        .route(
            "/upload",
            post(handle_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_SIZE)),
        )
        .route("/import-materials-csv", post(handle_import_csv));

    let uploads = ServeDir::new(state.uploads.dir());

    Router::new()
        .route("/health", get(handle_health))
        .nest("/api", api)
        .nest_service("/uploads", uploads)
        .fallback(handle_not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server with `config`.
///
/// When TLS cert/key paths are configured, the server listens over HTTPS
/// using `axum-server` with rustls. Otherwise it uses plain HTTP.
pub(crate) async fn start_server(config: ServeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let uploads = UploadStore::new(&config.uploads_dir);
    uploads.ensure_dir().await?;

    let procurement = Procurement::in_memory(config.engine);
    let state = Arc::new(AppState {
        procurement: procurement.clone(),
        uploads,
    });
    let app = build_router(state);

    tracing::info!(
        step_delay_ms = config.engine.step_delay.as_millis() as u64,
        research_delay_ms = config.engine.research_delay.as_millis() as u64,
        uploads_dir = %config.uploads_dir.display(),
        "processing engine ready"
    );

    let addr = format!("0.0.0.0:{}", config.port);

    // TLS support via axum-server + rustls (requires `tls` feature)
    #[cfg(feature = "tls")]
    if let Some((cert_path, key_path)) = &config.tls {
        let rustls =
            axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path).await?;
        let socket_addr: std::net::SocketAddr = addr.parse()?;
        let handle = axum_server::Handle::new();
        let signal_handle = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            signal_handle.graceful_shutdown(Some(TLS_SHUTDOWN_GRACE));
        });
        tracing::info!(%socket_addr, "vendorflow listening on https");
        let server = axum_server::bind_rustls(socket_addr, rustls)
            .handle(handle)
            .serve(app.into_make_service());
        serve_then_drain(server, &procurement).await?;
        return Ok(());
    }
    #[cfg(not(feature = "tls"))]
    if config.tls.is_some() {
        tracing::warn!("TLS requested but this build lacks the `tls` feature; serving plain HTTP");
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "vendorflow listening on http");
    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    serve_then_drain(server, &procurement).await?;
    Ok(())
}

/// Run `server` to completion, then cancel and join every processing run.
/// Runs are drained even when the server exits with an error.
async fn serve_then_drain<S>(server: S, procurement: &Procurement) -> std::io::Result<()>
where
    S: std::future::IntoFuture<Output = std::io::Result<()>>,
{
    let served = server.await;
    procurement.shutdown().await;
    tracing::info!("server shut down");
    served
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
