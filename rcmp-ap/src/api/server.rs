//! HTTP server setup and routing
//!
//! Builds the axum router over an [`AppContext`] and serves it until the
//! shutdown future resolves. When it does, long-lived responses (the SSE
//! feed) are told to finish so the graceful drain can complete.

use crate::error::{Error, Result};
use crate::library::Library;
use crate::playback::PlaybackSession;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rcmp_common::NotificationChannel;
use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub session: Arc<PlaybackSession>,
    pub library: Arc<Library>,
    pub notifications: NotificationChannel,
    /// Flipped to `true` once server shutdown begins
    pub shutdown: Arc<watch::Sender<bool>>,
}

impl AppContext {
    pub fn new(
        session: Arc<PlaybackSession>,
        library: Arc<Library>,
        notifications: NotificationChannel,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            session,
            library,
            notifications,
            shutdown: Arc::new(shutdown),
        }
    }
}

/// Build the router with every endpoint and the common layers
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(super::handlers::health))
        // Remote control
        .route("/command", post(super::handlers::command))
        .route("/select", post(super::handlers::select))
        .route("/state", get(super::handlers::state))
        // Playlist and catalog
        .route("/album", get(super::handlers::album))
        .route("/library", get(super::handlers::library))
        .route("/tags", post(super::handlers::edit_tags))
        .route("/filter", post(super::handlers::set_filter))
        .route("/rescan", post(super::handlers::rescan))
        // Notifications
        .route("/stream", get(super::sse::event_stream))
        .with_state(ctx)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve `ctx` on `bind_address:port` until `shutdown` resolves
pub async fn run<F>(ctx: AppContext, bind_address: &str, port: u16, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .map_err(|e| Error::Config(format!("Invalid bind address {}:{}: {}", bind_address, port, e)))?;

    info!("Starting HTTP server on {}", addr);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    serve(listener, ctx, shutdown).await
}

/// Serve `ctx` on an already bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let trigger = Arc::clone(&ctx.shutdown);
    let app = create_router(ctx);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Draining HTTP connections");
            trigger.send_replace(true);
        })
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    info!("HTTP server stopped");
    Ok(())
}

/// Turn a handler panic into a 500 with an `error` body
fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!("Handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": format!("Internal error: {}", detail) })),
    )
        .into_response()
}
