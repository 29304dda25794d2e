//! HTTP transport
//!
//! `POST /mcp` carries one JSON-RPC message per request, `GET /mcp` streams
//! list-changed notifications as server-sent events, and `GET /health`
//! reports what the server currently holds.

use crate::mcp::protocol::ServerHealthStatus;
use crate::mcp::server::{McpServer, MessageHandler};
use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::stream::{self, Stream};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Build the router serving `server`
#[inline]
pub fn router(server: Arc<McpServer>) -> Router {
    Router::new()
        .route("/mcp", get(handle_events).post(handle_message))
        .route("/health", get(handle_health))
        .with_state(server)
}

/// Bind `addr` and serve until ctrl-c
#[inline]
pub async fn serve_http(server: Arc<McpServer>, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(
        "Starting MCP server with HTTP transport at {}",
        listener.local_addr()?
    );

    axum::serve(listener, router(server))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("MCP HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn handle_message(State(server): State<Arc<McpServer>>, body: String) -> Response {
    let message = match server.validator().parse_message(&body) {
        Ok(message) => message,
        Err(e) => {
            e.log();
            return (StatusCode::BAD_REQUEST, Json(e.to_error_response(None))).into_response();
        }
    };

    match MessageHandler::new(server).handle_message(message).await {
        Some(reply) => (StatusCode::OK, Json(reply)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn handle_events(
    State(server): State<Arc<McpServer>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let subscription = server.store().notifier().subscribe();
    info!("Event stream {} opened", subscription.id());

    let events = stream::unfold(subscription, |mut subscription| async move {
        let change = subscription.recv().await?;
        debug!(
            "Streaming {} list change to {}",
            change.kind,
            subscription.id()
        );
        let event = Event::default()
            .event("message")
            .json_data(change.to_notification());
        Some((event, subscription))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

async fn handle_health(State(server): State<Arc<McpServer>>) -> Json<ServerHealthStatus> {
    Json(server.health_status().await)
}
