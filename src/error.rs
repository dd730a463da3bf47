//! Error types for the overlay domain.
//!
//! Plumbing (database, config files, IO) reports through `anyhow`; the
//! variants here are the failures a caller is expected to branch on.

use thiserror::Error;

/// Errors surfaced while mounting an overlay or decoding roll events.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// The id was not a positive integer, or no character has that id.
    #[error("character does not exist: {0}")]
    CharacterNotFound(String),

    /// One entry of a roll batch could not be decoded.
    #[error("malformed roll at index {index}: {reason}")]
    MalformedRoll { index: usize, reason: String },

    /// The payload carried no usable `rolls` array.
    #[error("malformed roll event: {0}")]
    MalformedEvent(String),

    /// Display timing that the sequencer cannot honor.
    #[error("invalid display timing: {0}")]
    InvalidTiming(String),

    #[error("character store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, OverlayError>;
