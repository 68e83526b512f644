//! Binding Statements
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PAYLOAD                                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  claim.rs   - Action, Platform, Extra, Claim                 │
//! │  builder.rs - Canonical sign payload (byte-stable)           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A [`Claim`] is what a persona asserts; the builder turns it into the
//! exact string that gets signed. Two independent implementations must
//! produce the same bytes, so nothing in the builder may depend on map
//! iteration order, locale, or float formatting.

pub mod builder;
pub mod claim;

use thiserror::Error;

use crate::error::ErrorKind;

pub use builder::{build_sign_payload, PayloadFields};
pub use claim::{parse_timestamp, Action, Claim, Extra, Platform};

/// Payload / claim errors.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// Platform name is not known.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Action name is not known.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// `created_at` is not a decimal epoch-seconds string.
    #[error("invalid created_at: {0}")]
    InvalidTimestamp(String),

    /// A platform extra collides with a base payload field.
    #[error("extra field {0} collides with a payload field")]
    ReservedField(String),

    /// Malformed `extra` object in a request.
    #[error("invalid extra: {0}")]
    InvalidExtra(String),

    /// Serialization failed.
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PayloadError {
    /// Taxonomy classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedPlatform(_) => ErrorKind::UnsupportedPlatform,
            _ => ErrorKind::Param,
        }
    }
}
