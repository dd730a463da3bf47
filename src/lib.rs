//! dicecast - dice roll overlay for tabletop sessions
//!
//! An overlay follows one character's dice channel and plays every roll it
//! receives, one at a time, on a fixed cadence. The main binary serves the
//! HTTP relay and draws the overlay in the terminal; `dicecast-admin`
//! manages characters.

pub mod channel;
pub mod config;
pub mod db;
pub mod error;
pub mod overlay;
pub mod paths;
pub mod relay;
pub mod render;
pub mod roll;
pub mod sequencer;

pub use error::{OverlayError, Result};
