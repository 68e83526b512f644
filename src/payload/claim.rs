//! Claim Types
//!
//! The statement a persona makes about one platform identity, plus the
//! closed sets of actions and platforms it can name.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::builder::PayloadFields;
use super::PayloadError;
use crate::crypto::encoding::{b64, decode_b64};
use crate::crypto::PublicKey;
use crate::kv::KvPatch;

/// What a chain entry does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Bind an identity to the persona.
    Create,
    /// Remove a binding.
    Delete,
    /// Patch the persona's KV document.
    KvSet,
}

impl Action {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::KvSet => "kv_set",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "delete" => Ok(Self::Delete),
            "kv_set" => Ok(Self::KvSet),
            other => Err(PayloadError::UnknownAction(other.to_string())),
        }
    }
}

/// Identity systems a persona can bind to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// twitter.com handles.
    Twitter,
    /// keybase.io users.
    Keybase,
    /// GitHub users (gist proofs).
    Github,
    /// Discord users.
    Discord,
    /// Domain names (TXT record proofs).
    Dns,
    /// Fediverse accounts, `user@instance`.
    Activitypub,
    /// Ethereum wallets, co-signed.
    Ethereum,
    /// Solana wallets, co-signed.
    Solana,
    /// Steam profiles.
    Steam,
    /// Another persona.
    #[serde(rename = "nextid")]
    NextId,
    /// The persona's own KV document.
    Kv,
}

impl Platform {
    /// Every platform, in declaration order.
    pub const ALL: [Platform; 11] = [
        Self::Twitter,
        Self::Keybase,
        Self::Github,
        Self::Discord,
        Self::Dns,
        Self::Activitypub,
        Self::Ethereum,
        Self::Solana,
        Self::Steam,
        Self::NextId,
        Self::Kv,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Twitter => "twitter",
            Self::Keybase => "keybase",
            Self::Github => "github",
            Self::Discord => "discord",
            Self::Dns => "dns",
            Self::Activitypub => "activitypub",
            Self::Ethereum => "ethereum",
            Self::Solana => "solana",
            Self::Steam => "steam",
            Self::NextId => "nextid",
            Self::Kv => "kv",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .find(|p| p.as_str() == wanted)
            .copied()
            .ok_or_else(|| PayloadError::UnsupportedPlatform(s.to_string()))
    }
}

/// Platform-specific extra data attached to a claim.
///
/// Signatures here authorize the claim but are never part of the signed
/// payload. Only [`Extra::KvPatch`] contributes payload fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Extra {
    /// Nothing extra.
    #[default]
    None,
    /// Detached persona signature (deletes, keyless platforms).
    PersonaSignature {
        /// Persona signature over the payload.
        #[serde(with = "b64")]
        signature: Vec<u8>,
    },
    /// Persona plus wallet co-signature.
    WalletSignature {
        /// Persona signature over the payload.
        #[serde(with = "b64")]
        signature: Vec<u8>,
        /// Wallet signature over the same payload.
        #[serde(with = "b64")]
        wallet_signature: Vec<u8>,
    },
    /// Persona plus target-persona co-signature.
    TargetSignature {
        /// Persona signature over the payload.
        #[serde(with = "b64")]
        signature: Vec<u8>,
        /// Target persona signature over the same payload.
        #[serde(with = "b64")]
        target_signature: Vec<u8>,
    },
    /// KV document patch.
    KvPatch(KvPatch),
}

impl Extra {
    /// Parse the loosely-shaped `extra` object of a request.
    ///
    /// Recognized keys: `signature`, `wallet_signature`,
    /// `target_signature`, all base64 strings.
    pub fn from_request(value: Option<&Value>) -> Result<Self, PayloadError> {
        let map = match value {
            None | Some(Value::Null) => return Ok(Self::None),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(PayloadError::InvalidExtra(format!(
                    "expected object, got {}",
                    other
                )))
            }
        };

        let field = |name: &str| -> Result<Option<Vec<u8>>, PayloadError> {
            match map.get(name) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) if s.is_empty() => Ok(None),
                Some(Value::String(s)) => decode_b64(s)
                    .map(Some)
                    .map_err(|e| PayloadError::InvalidExtra(format!("{}: {}", name, e))),
                Some(_) => Err(PayloadError::InvalidExtra(format!("{} must be a string", name))),
            }
        };

        let signature = field("signature")?;
        let wallet_signature = field("wallet_signature")?;
        let target_signature = field("target_signature")?;

        match (signature, wallet_signature, target_signature) {
            (None, None, None) => Ok(Self::None),
            (Some(signature), None, None) => Ok(Self::PersonaSignature { signature }),
            (Some(signature), Some(wallet_signature), None) => Ok(Self::WalletSignature {
                signature,
                wallet_signature,
            }),
            (Some(signature), None, Some(target_signature)) => Ok(Self::TargetSignature {
                signature,
                target_signature,
            }),
            (None, _, _) => Err(PayloadError::InvalidExtra(
                "co-signature given without persona signature".to_string(),
            )),
            (Some(_), Some(_), Some(_)) => Err(PayloadError::InvalidExtra(
                "wallet_signature and target_signature are exclusive".to_string(),
            )),
        }
    }

    /// Persona signature carried in the extra, if any.
    pub fn persona_signature(&self) -> Option<&[u8]> {
        match self {
            Self::PersonaSignature { signature }
            | Self::WalletSignature { signature, .. }
            | Self::TargetSignature { signature, .. } => Some(signature),
            Self::None | Self::KvPatch(_) => None,
        }
    }

    /// Fields this extra contributes to the sign payload.
    pub fn payload_fields(&self) -> Result<BTreeMap<String, Value>, PayloadError> {
        let mut fields = BTreeMap::new();
        if let Self::KvPatch(patch) = self {
            fields.insert("patch".to_string(), serde_json::to_value(patch)?);
        }
        Ok(fields)
    }
}

/// A binding statement made by a persona.
#[derive(Clone, Debug)]
pub struct Claim {
    /// What the claim does.
    pub action: Action,
    /// Target platform.
    pub platform: Platform,
    /// Human-readable handle on the platform (already normalized).
    pub identity: String,
    /// Stable platform-native id, filled by validation when available.
    pub alt_id: Option<String>,
    /// Where the published proof lives (post id, URL, ...).
    pub proof_location: String,
    /// Claiming persona.
    pub persona: PublicKey,
    /// Signature of the chain entry this claim links to.
    pub previous: Option<Vec<u8>>,
    /// Claim time, second precision.
    pub created_at: DateTime<Utc>,
    /// Signing-session nonce.
    pub uuid: Uuid,
    /// Platform-specific extra.
    pub extra: Extra,
    /// Persona signature over the payload, filled by validation.
    pub signature: Option<Vec<u8>>,
}

impl Claim {
    /// Fresh claim with a new nonce, stamped now.
    pub fn new(action: Action, platform: Platform, identity: impl Into<String>, persona: PublicKey) -> Self {
        let now = Utc::now();
        Self {
            action,
            platform,
            identity: identity.into(),
            alt_id: None,
            proof_location: String::new(),
            persona,
            previous: None,
            created_at: DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now),
            uuid: Uuid::new_v4(),
            extra: Extra::None,
            signature: None,
        }
    }

    /// Base payload fields for this claim.
    pub fn payload_fields(&self) -> Result<PayloadFields<'_>, PayloadError> {
        Ok(PayloadFields {
            action: self.action,
            platform: self.platform,
            identity: &self.identity,
            previous: self.previous.as_deref(),
            created_at: self.created_at.timestamp(),
            uuid: self.uuid,
            extra: self.extra.payload_fields()?,
        })
    }
}

/// Parse a decimal epoch-seconds string.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, PayloadError> {
    let secs: i64 = text
        .trim()
        .parse()
        .map_err(|_| PayloadError::InvalidTimestamp(text.to_string()))?;
    DateTime::from_timestamp(secs, 0).ok_or_else(|| PayloadError::InvalidTimestamp(text.to_string()))
}
