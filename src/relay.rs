//! HTTP relay into the channel hub
//!
//! Lets roll producers outside the process reach overlays:
//!
//! | Route | Effect |
//! |-------|--------|
//! | `POST /rooms/{room}/events/{event}` | publish the JSON body as-is |
//! | `POST /characters/{id}/rolls` | publish a `dice_roll` to that character's channel |
//! | `GET /health` | `ok` |

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::{dice_channel, Hub};
use crate::db::parse_character_id;
use crate::roll::DICE_ROLL_EVENT;

/// Build the relay routes over a shared hub
pub fn router(hub: Arc<Hub>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/rooms/{room}/events/{event}", post(publish_event))
        .route("/characters/{id}/rolls", post(publish_rolls))
        .with_state(hub)
}

async fn health() -> &'static str {
    "ok"
}

async fn publish_event(
    State(hub): State<Arc<Hub>>,
    Path((room, event)): Path<(String, String)>,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let delivered = hub.publish(&room, &event, payload);
    debug!(room = %room, event = %event, delivered, "relayed event");
    (StatusCode::ACCEPTED, Json(json!({ "delivered": delivered })))
}

async fn publish_rolls(
    State(hub): State<Arc<Hub>>,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let Some(id) = parse_character_id(&id) else {
        return bad_request("invalid character id");
    };

    if !payload.get("rolls").is_some_and(Value::is_array) {
        return bad_request("body must contain a rolls array");
    }

    let room = dice_channel(id);
    let delivered = hub.publish(&room, DICE_ROLL_EVENT, payload);
    debug!(room = %room, delivered, "relayed dice roll");
    (StatusCode::ACCEPTED, Json(json!({ "delivered": delivered })))
}

fn bad_request(message: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

/// Bind and serve the relay until `cancel` fires.
///
/// Returns the bound address (useful with port 0) and the server task.
pub async fn start_relay(
    addr: SocketAddr,
    hub: Arc<Hub>,
    cancel: CancellationToken,
) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind relay on {}", addr))?;
    let local = listener.local_addr().context("relay has no local address")?;
    info!(addr = %local, "relay listening");

    let app = router(hub);
    let handle = tokio::spawn(async move {
        let shutdown = async move { cancel.cancelled().await };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!("relay server error: {}", e);
        }
    });

    Ok((local, handle))
}

/// Wait for the relay task. Returns false if it panicked or was aborted.
pub async fn join_relay(task: JoinHandle<()>) -> bool {
    match task.await {
        Ok(()) => true,
        Err(e) => {
            warn!("relay task ended abnormally: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_relay_stops_cleanly_on_cancel() -> Result<()> {
        let cancel = CancellationToken::new();
        let (addr, task) =
            start_relay("127.0.0.1:0".parse()?, Arc::new(Hub::default()), cancel.clone()).await?;
        assert_ne!(addr.port(), 0);

        cancel.cancel();
        assert!(join_relay(task).await);
        Ok(())
    }

    #[tokio::test]
    async fn test_aborted_relay_reported() {
        let task = tokio::spawn(std::future::pending::<()>());
        task.abort();
        assert!(!join_relay(task).await);
    }
}
