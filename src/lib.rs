//! # Proof Chain Server
//!
//! Binds a persona (a secp256k1 public key) to identities on external
//! platforms through signed claims, kept as a per-persona chain.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PROOF CHAIN SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  crypto/         - Personal-sign primitives                  │
//! │  ├── personal_sign.rs - keccak digest, sign, recover         │
//! │  ├── keys.rs     - Compressed persona keys                   │
//! │  └── encoding.rs - Base64 signatures                         │
//! │                                                              │
//! │  payload/        - What gets signed (deterministic)          │
//! │  ├── claim.rs    - Action, Platform, Extra, Claim            │
//! │  └── builder.rs  - Canonical sign payload                    │
//! │                                                              │
//! │  validator/      - One adapter per platform + registry       │
//! │  kv.rs           - KV patch engine                           │
//! │  chain/          - Linkage, apply, revalidation              │
//! │  storage/        - Persistence collaborator                  │
//! │                                                              │
//! │  api/            - HTTP surface (axum)                       │
//! │  config.rs       - Environment configuration                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! `payload/` output is **byte-for-byte reproducible**:
//! - Keys emitted in sorted order (BTreeMap, never HashMap)
//! - Integers as decimal strings, no floats
//! - No locale-dependent formatting
//!
//! Any client that builds the same claim gets the same string to sign.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod api;
pub mod chain;
pub mod config;
pub mod crypto;
pub mod error;
pub mod kv;
pub mod payload;
pub mod storage;
pub mod validator;

// Re-export commonly used types
pub use chain::{ChainEngine, ChainError, Proof, ProofChainEntry};
pub use config::{ConfigError, ServiceConfig};
pub use crypto::{CryptoError, PublicKey};
pub use error::ErrorKind;
pub use kv::{apply_patch, KvPatch};
pub use payload::{build_sign_payload, Action, Claim, Extra, Platform};
pub use storage::{MemoryStorage, ProofStorage, StorageError};
pub use validator::{ContentSource, ValidationError, Validator, ValidatorRegistry};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
