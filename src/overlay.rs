//! Dice overlay view for one character
//!
//! Mounting resolves the character, joins its dice channel and starts the
//! sequencer. Every `dice_roll` message on the channel is decoded and queued
//! for display; anything else on the channel is ignored. Unmounting (or
//! dropping the overlay) cancels both the listener and the sequencer.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::channel::{dice_channel, Hub, Subscription};
use crate::db::{parse_character_id, Character, CharacterStore};
use crate::error::{OverlayError, Result};
use crate::roll::{RollEvent, DICE_ROLL_EVENT};
use crate::sequencer::{DisplaySnapshot, RollSink, SequencerConfig, SequencerHandle};

/// Resolve a raw id to a stored character.
///
/// Unparseable ids and unknown ids both map to `CharacterNotFound`.
pub fn resolve_character(store: &dyn CharacterStore, raw_id: &str) -> Result<Character> {
    let id = parse_character_id(raw_id)
        .ok_or_else(|| OverlayError::CharacterNotFound(raw_id.to_string()))?;

    store
        .find_character(id)?
        .ok_or_else(|| OverlayError::CharacterNotFound(raw_id.to_string()))
}

/// A mounted overlay
pub struct Overlay {
    character: Character,
    room: String,
    sequencer: Option<SequencerHandle>,
    listener: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl Overlay {
    /// Mount an overlay for `raw_id`. Must be called inside a tokio runtime.
    ///
    /// On any error nothing is subscribed and no task is started.
    #[instrument(skip(store, hub, config))]
    pub fn mount(
        store: &dyn CharacterStore,
        hub: &Hub,
        config: SequencerConfig,
        raw_id: &str,
    ) -> Result<Self> {
        config.validate()?;
        let character = resolve_character(store, raw_id)?;

        let room = dice_channel(character.id);
        let subscription = hub.join(&room);

        let cancel = CancellationToken::new();
        let sequencer = SequencerHandle::spawn_with_token(config, cancel.child_token());
        let listener = tokio::spawn(listen(subscription, sequencer.sink(), cancel.clone()));

        info!(character = %character.name, room = %room, "overlay mounted");

        Ok(Self {
            character,
            room,
            sequencer: Some(sequencer),
            listener: Some(listener),
            cancel,
        })
    }

    pub fn character(&self) -> &Character {
        &self.character
    }

    /// Channel this overlay listens on
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Subscribe to what should be on screen
    pub fn display(&self) -> watch::Receiver<DisplaySnapshot> {
        match &self.sequencer {
            Some(sequencer) => sequencer.display(),
            None => watch::channel(DisplaySnapshot::default()).1,
        }
    }

    /// Stop listening and displaying, waiting for both tasks to exit
    pub async fn unmount(mut self) {
        self.cancel.cancel();

        if let Some(listener) = self.listener.take() {
            if let Err(e) = listener.await {
                warn!(room = %self.room, "listener ended abnormally: {}", e);
            }
        }
        if let Some(sequencer) = self.sequencer.take() {
            sequencer.shutdown().await;
        }

        info!(room = %self.room, "overlay unmounted");
    }
}

impl Drop for Overlay {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn listen(mut subscription: Subscription, sink: RollSink, cancel: CancellationToken) {
    loop {
        let message = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            message = subscription.recv() => match message {
                Some(message) => message,
                None => {
                    debug!(room = subscription.room(), "channel closed");
                    break;
                }
            },
        };

        if message.event != DICE_ROLL_EVENT {
            debug!(room = subscription.room(), event = %message.event, "ignoring event");
            continue;
        }

        route_rolls(subscription.room(), &message.payload, &sink);
    }
}

/// Decode a `dice_roll` payload and queue whatever survived validation
fn route_rolls(room: &str, payload: &serde_json::Value, sink: &RollSink) {
    let event = match RollEvent::decode(payload) {
        Ok(event) => event,
        Err(e) => {
            warn!(room, error = %e, "rejected dice roll event");
            return;
        }
    };

    for rejected in &event.rejected {
        warn!(room, error = %rejected, "rejected roll");
    }

    info!(room, rolls = event.rolls.len(), "dice roll received");
    sink.enqueue(event.rolls);
}
