//! Real-time channel hub
//!
//! Named rooms backed by `tokio::sync::broadcast`. Producers publish
//! `(event, payload)` messages to a room; every subscription joined to that
//! room receives them. Rooms are created on first join. Rooms nobody listens
//! to are pruned on the next join or publish.

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default per-room buffer before slow subscribers start lagging
pub const DEFAULT_ROOM_CAPACITY: usize = 64;

/// Room that carries dice rolls for one character
pub fn dice_channel(character_id: i64) -> String {
    format!("dice_character_{}", character_id)
}

/// One message delivered on a room
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    /// Event name (e.g., "dice_roll")
    pub event: String,
    pub payload: Value,
}

/// Set of named broadcast rooms.
///
/// Share it behind an `Arc`; all methods take `&self`.
pub struct Hub {
    rooms: DashMap<String, broadcast::Sender<ChannelMessage>>,
    capacity: usize,
}

impl Hub {
    /// Create a hub whose rooms buffer `capacity` messages per subscriber
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Join a room, creating it if needed
    pub fn join(&self, room: &str) -> Subscription {
        self.prune();

        // Subscribe under the entry lock so a concurrent prune cannot drop
        // the room between lookup and subscribe.
        let rx = self
            .rooms
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();

        debug!(room, subscribers = self.subscriber_count(room), "joined room");

        Subscription {
            room: room.to_string(),
            rx,
        }
    }

    /// Publish to a room. Returns how many subscriptions received it.
    pub fn publish(&self, room: &str, event: &str, payload: Value) -> usize {
        let Some(tx) = self.rooms.get(room).map(|entry| entry.value().clone()) else {
            debug!(room, event, "publish to room with no subscribers");
            return 0;
        };

        let message = ChannelMessage {
            event: event.to_string(),
            payload,
        };

        match tx.send(message) {
            Ok(delivered) => {
                debug!(room, event, delivered, "published");
                delivered
            }
            Err(_) => {
                self.rooms.remove_if(room, |_, tx| tx.receiver_count() == 0);
                debug!(room, event, "room empty, pruned");
                0
            }
        }
    }

    /// Drop rooms whose subscriptions are all gone. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let before = self.rooms.len();
        self.rooms.retain(|_, tx| tx.receiver_count() > 0);
        let removed = before.saturating_sub(self.rooms.len());
        if removed > 0 {
            debug!(removed, "pruned empty rooms");
        }
        removed
    }

    /// Number of live subscriptions on a room
    pub fn subscriber_count(&self, room: &str) -> usize {
        self.rooms
            .get(room)
            .map(|entry| entry.value().receiver_count())
            .unwrap_or(0)
    }

    /// Names of rooms currently tracked, sorted
    pub fn rooms(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rooms.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(DEFAULT_ROOM_CAPACITY)
    }
}

/// Membership in one room.
///
/// Dropping it leaves the room. A subscription that falls behind skips the
/// messages it missed and keeps going.
pub struct Subscription {
    room: String,
    rx: broadcast::Receiver<ChannelMessage>,
}

impl Subscription {
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Wait for the next message. `None` once the room is gone.
    pub async fn recv(&mut self) -> Option<ChannelMessage> {
        loop {
            match self.rx.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(room = %self.room, skipped, "subscription lagged, messages skipped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take a message if one is already buffered
    pub fn try_recv(&mut self) -> Option<ChannelMessage> {
        loop {
            match self.rx.try_recv() {
                Ok(message) => return Some(message),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(room = %self.room, skipped, "subscription lagged, messages skipped");
                    continue;
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Closed) => return None,
            }
        }
    }
}
