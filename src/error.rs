//! Error Taxonomy
//!
//! Every module keeps its own error enum. They all classify into one
//! [`ErrorKind`], which is what the HTTP boundary maps to a status code.

use serde::Serialize;

/// Classification shared by all module errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or missing client input.
    Param,
    /// No validator registered for the requested platform.
    UnsupportedPlatform,
    /// The platform (or the renderer in front of it) could not be reached.
    ExternalUnavailable,
    /// Fetched content belongs to a different handle than claimed.
    IdentityMismatch,
    /// Malformed signature, bad recovery id, or recovered key mismatch.
    InvalidSignature,
    /// The declared previous signature is not in the persona's chain.
    ChainLinkNotFound,
    /// The declared previous entry is no longer the persona's head.
    ChainConflict,
    /// A queried record does not exist.
    NotFound,
    /// Persistence collaborator failure.
    Storage,
}

impl ErrorKind {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Param => "param_error",
            Self::UnsupportedPlatform => "unsupported_platform",
            Self::ExternalUnavailable => "external_unavailable",
            Self::IdentityMismatch => "identity_mismatch",
            Self::InvalidSignature => "invalid_signature",
            Self::ChainLinkNotFound => "chain_link_not_found",
            Self::ChainConflict => "chain_conflict",
            Self::NotFound => "not_found",
            Self::Storage => "storage_error",
        }
    }

    /// Whether the caller caused the failure (and may see its message).
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::ExternalUnavailable | Self::Storage)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
