//! End-to-end tests for dicecast
//!
//! Runs the HTTP relay on an ephemeral port and drives a mounted overlay
//! through it, the way a roll producer would in production.

use anyhow::Result;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use dicecast::channel::Hub;
use dicecast::db::Database;
use dicecast::overlay::Overlay;
use dicecast::relay;
use dicecast::render;
use dicecast::sequencer::{DisplaySnapshot, SequencerConfig, SequencerState};
use dicecast::OverlayError;

// ============================================================================
// Helpers
// ============================================================================

fn fast_timing() -> SequencerConfig {
    SequencerConfig {
        hide_after: Duration::from_millis(100),
        advance_after: Duration::from_millis(200),
        max_pending: None,
    }
}

async fn start_relay(hub: Arc<Hub>) -> Result<(SocketAddr, CancellationToken)> {
    let cancel = CancellationToken::new();
    let (addr, _task) =
        relay::start_relay("127.0.0.1:0".parse()?, hub, cancel.clone()).await?;
    Ok((addr, cancel))
}

/// Collect every face shown until the sequencer goes idle again
async fn faces_until_idle(rx: &mut watch::Receiver<DisplaySnapshot>) -> Result<Vec<i64>> {
    let mut faces = Vec::new();
    let mut shown = 0;
    loop {
        tokio::time::timeout(Duration::from_secs(5), rx.changed()).await??;
        let snapshot = rx.borrow_and_update().clone();
        // queue-length updates repeat the current roll; only count promotions
        if snapshot.shown > shown {
            shown = snapshot.shown;
            if let Some(roll) = &snapshot.current {
                faces.push(roll.rolled_number);
            }
        }
        if snapshot.state == SequencerState::Idle {
            return Ok(faces);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_health() -> Result<()> {
    let (addr, cancel) = start_relay(Arc::new(Hub::default())).await?;

    let body = reqwest::get(format!("http://{}/health", addr))
        .await?
        .text()
        .await?;
    assert_eq!(body, "ok");

    cancel.cancel();
    Ok(())
}

#[tokio::test]
async fn test_rolls_through_relay_reach_overlay() -> Result<()> {
    let db = Database::in_memory()?;
    let character = db.insert_character("Brom")?;
    let hub = Arc::new(Hub::default());
    let (addr, cancel) = start_relay(hub.clone()).await?;

    let overlay = Overlay::mount(&db, &hub, fast_timing(), &character.id.to_string())?;
    let mut rx = overlay.display();

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{}/characters/{}/rolls", addr, character.id))
        .json(&json!({
            "rolls": [
                { "rolled_number": 4, "dice": "d6" },
                { "rolled_number": "x" },
                { "rolled_number": 6, "dice": "d6" }
            ]
        }))
        .send()
        .await?;
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
    let body: Value = response.json().await?;
    assert_eq!(body["delivered"], 1);

    assert_eq!(faces_until_idle(&mut rx).await?, vec![4, 6]);
    assert_eq!(rx.borrow().shown, 2);

    overlay.unmount().await;
    cancel.cancel();
    Ok(())
}

#[tokio::test]
async fn test_batches_keep_arrival_order() -> Result<()> {
    let db = Database::in_memory()?;
    let character = db.insert_character("Ayla")?;
    let hub = Arc::new(Hub::default());
    let (addr, cancel) = start_relay(hub.clone()).await?;

    let overlay = Overlay::mount(&db, &hub, fast_timing(), &character.id.to_string())?;
    let mut rx = overlay.display();
    let client = reqwest::Client::new();
    let url = format!(
        "http://{}/rooms/dice_character_{}/events/dice_roll",
        addr, character.id
    );

    for batch in [vec![1, 2], vec![3], vec![4, 5]] {
        let rolls: Vec<Value> = batch
            .into_iter()
            .map(|n| json!({ "rolled_number": n }))
            .collect();
        client
            .post(&url)
            .json(&json!({ "rolls": rolls }))
            .send()
            .await?
            .error_for_status()?;
    }

    assert_eq!(faces_until_idle(&mut rx).await?, vec![1, 2, 3, 4, 5]);

    overlay.unmount().await;
    cancel.cancel();
    Ok(())
}

#[tokio::test]
async fn test_relay_rejects_bad_requests() -> Result<()> {
    let (addr, cancel) = start_relay(Arc::new(Hub::default())).await?;
    let client = reqwest::Client::new();

    let bad_id = client
        .post(format!("http://{}/characters/abc/rolls", addr))
        .json(&json!({ "rolls": [] }))
        .send()
        .await?;
    assert_eq!(bad_id.status(), reqwest::StatusCode::BAD_REQUEST);

    let no_rolls = client
        .post(format!("http://{}/characters/1/rolls", addr))
        .json(&json!({ "roll": 3 }))
        .send()
        .await?;
    assert_eq!(no_rolls.status(), reqwest::StatusCode::BAD_REQUEST);

    let not_json = client
        .post(format!("http://{}/characters/1/rolls", addr))
        .body("rolls=3")
        .send()
        .await?;
    assert!(not_json.status().is_client_error());

    cancel.cancel();
    Ok(())
}

#[tokio::test]
async fn test_generic_event_route() -> Result<()> {
    let hub = Arc::new(Hub::default());
    let (addr, cancel) = start_relay(hub.clone()).await?;
    let mut sub = hub.join("table");

    let body: Value = reqwest::Client::new()
        .post(format!("http://{}/rooms/table/events/chat", addr))
        .json(&json!({ "text": "hi" }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["delivered"], 1);

    let message = sub.try_recv().expect("message relayed");
    assert_eq!(message.event, "chat");
    assert_eq!(message.payload, json!({ "text": "hi" }));

    cancel.cancel();
    Ok(())
}

#[tokio::test]
async fn test_unknown_character_renders_fallback() -> Result<()> {
    let db = Database::in_memory()?;
    let hub = Hub::default();

    let result = Overlay::mount(&db, &hub, SequencerConfig::default(), "77");
    assert!(matches!(result, Err(OverlayError::CharacterNotFound(_))));
    assert!(hub.rooms().is_empty());

    let frame = render::frame(None, &DisplaySnapshot::default());
    assert!(frame.contains(render::NOT_FOUND_MESSAGE));
    Ok(())
}
