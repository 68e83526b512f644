//! Post-Based Platforms
//!
//! The user publishes the signed payload somewhere only the account owner
//! can write (a tweet, a gist, a TXT record). Validation is:
//!
//! ```text
//! fetch(location) ─► author == identity? ─► find "<marker><sig>"
//!                                               │
//!                     recover(payload, sig) == persona? ◄─┘
//! ```
//!
//! Platforms differ only in data: identity rule, marker and post text.
//! Those live in a [`PostPlatform`] descriptor so one adapter serves them all.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::source::{ContentSource, FetchRequest};
use super::{render_template, validate_detached, PostContent, ValidationError, Validator};
use crate::crypto::{decode_signature, ensure_signed_by};
use crate::payload::{Action, Claim, Platform};

/// How a platform compares identities.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityRule {
    /// Handles are case-insensitive; stored lowercase.
    CaseInsensitiveHandle,
    /// Handles are case-sensitive; stored as given.
    CaseSensitiveHandle,
    /// Domain names; lowercase, no trailing dot.
    Domain,
}

impl IdentityRule {
    /// Canonical form of `identity` under this rule.
    pub fn normalize(&self, identity: &str) -> Result<String, ValidationError> {
        let trimmed = identity.trim();
        let value = match self {
            Self::CaseInsensitiveHandle => trimmed.trim_start_matches('@').to_lowercase(),
            Self::CaseSensitiveHandle => trimmed.trim_start_matches('@').to_string(),
            Self::Domain => trimmed.trim_end_matches('.').to_ascii_lowercase(),
        };

        if value.is_empty() {
            return Err(ValidationError::InvalidIdentity("empty identity".to_string()));
        }
        if value.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidIdentity(format!(
                "whitespace in identity: {:?}",
                identity
            )));
        }
        if *self == Self::Domain && !value.contains('.') {
            return Err(ValidationError::InvalidIdentity(format!("not a domain: {}", value)));
        }
        Ok(value)
    }
}

/// Static description of a post-based platform.
#[derive(Clone, Copy, Debug)]
pub struct PostPlatform {
    /// Platform served.
    pub platform: Platform,
    /// Identity comparison rule.
    pub rule: IdentityRule,
    /// Text immediately preceding the base64 signature in published content.
    pub marker: &'static str,
    /// `(locale, template)` pairs for the post text.
    pub templates: &'static [(&'static str, &'static str)],
    /// Whether the client must say where the proof was published.
    pub needs_location: bool,
}

const SOCIAL_MARKER: &str = "Signature: ";

impl PostPlatform {
    /// twitter.com
    pub const TWITTER: Self = Self {
        platform: Platform::Twitter,
        rule: IdentityRule::CaseInsensitiveHandle,
        marker: SOCIAL_MARKER,
        templates: &[
            (
                "default",
                "Verifying my Twitter ID @{identity} for persona {persona}.\nSignature: %SIG_BASE64%",
            ),
            (
                "en_US",
                "Verifying my Twitter ID @{identity} for persona {persona}.\nSignature: %SIG_BASE64%",
            ),
            (
                "zh_CN",
                "正在验证我的 Twitter 账号 @{identity}，身份公钥 {persona}。\nSignature: %SIG_BASE64%",
            ),
        ],
        needs_location: true,
    };

    /// keybase.io, proof file under the user's public folder.
    pub const KEYBASE: Self = Self {
        platform: Platform::Keybase,
        rule: IdentityRule::CaseInsensitiveHandle,
        marker: SOCIAL_MARKER,
        templates: &[
            (
                "default",
                "Keybase user {identity} controls persona {persona}.\nSignature: %SIG_BASE64%",
            ),
            (
                "en_US",
                "Keybase user {identity} controls persona {persona}.\nSignature: %SIG_BASE64%",
            ),
            (
                "zh_CN",
                "Keybase 用户 {identity} 拥有身份公钥 {persona}。\nSignature: %SIG_BASE64%",
            ),
        ],
        needs_location: true,
    };

    /// GitHub, proof in a public gist.
    pub const GITHUB: Self = Self {
        platform: Platform::Github,
        rule: IdentityRule::CaseInsensitiveHandle,
        marker: SOCIAL_MARKER,
        templates: &[
            (
                "default",
                "GitHub user {identity} controls persona {persona}.\nSignature: %SIG_BASE64%",
            ),
            (
                "en_US",
                "GitHub user {identity} controls persona {persona}.\nSignature: %SIG_BASE64%",
            ),
            (
                "zh_CN",
                "GitHub 用户 {identity} 拥有身份公钥 {persona}。\nSignature: %SIG_BASE64%",
            ),
        ],
        needs_location: true,
    };

    /// Discord, message in a verification channel.
    pub const DISCORD: Self = Self {
        platform: Platform::Discord,
        rule: IdentityRule::CaseSensitiveHandle,
        marker: SOCIAL_MARKER,
        templates: &[
            (
                "default",
                "Verifying my Discord ID {identity} for persona {persona}.\nSignature: %SIG_BASE64%",
            ),
            (
                "en_US",
                "Verifying my Discord ID {identity} for persona {persona}.\nSignature: %SIG_BASE64%",
            ),
            (
                "zh_CN",
                "正在验证我的 Discord 账号 {identity}，身份公钥 {persona}。\nSignature: %SIG_BASE64%",
            ),
        ],
        needs_location: true,
    };

    /// DNS TXT record on the domain itself.
    pub const DNS: Self = Self {
        platform: Platform::Dns,
        rule: IdentityRule::Domain,
        marker: "nextid-signature=",
        templates: &[("default", "nextid-signature=%SIG_BASE64%")],
        needs_location: false,
    };

    /// Fediverse status, identity `user@instance`.
    pub const ACTIVITYPUB: Self = Self {
        platform: Platform::Activitypub,
        rule: IdentityRule::CaseInsensitiveHandle,
        marker: SOCIAL_MARKER,
        templates: &[
            (
                "default",
                "Verifying my Fediverse ID @{identity} for persona {persona}.\nSignature: %SIG_BASE64%",
            ),
            (
                "en_US",
                "Verifying my Fediverse ID @{identity} for persona {persona}.\nSignature: %SIG_BASE64%",
            ),
            (
                "zh_CN",
                "正在验证我的联邦宇宙账号 @{identity}，身份公钥 {persona}。\nSignature: %SIG_BASE64%",
            ),
        ],
        needs_location: true,
    };

    /// Steam profile summary.
    pub const STEAM: Self = Self {
        platform: Platform::Steam,
        rule: IdentityRule::CaseSensitiveHandle,
        marker: SOCIAL_MARKER,
        templates: &[
            (
                "default",
                "Steam user {identity} controls persona {persona}. Signature: %SIG_BASE64%",
            ),
            (
                "en_US",
                "Steam user {identity} controls persona {persona}. Signature: %SIG_BASE64%",
            ),
        ],
        needs_location: false,
    };

    /// Every post-based platform.
    pub const ALL: [Self; 7] = [
        Self::TWITTER,
        Self::KEYBASE,
        Self::GITHUB,
        Self::DISCORD,
        Self::DNS,
        Self::ACTIVITYPUB,
        Self::STEAM,
    ];
}

/// Pull the first signature token following `marker` out of `content`.
pub fn extract_signature<'a>(content: &'a str, marker: &str) -> Option<&'a str> {
    content.match_indices(marker).find_map(|(at, _)| {
        let rest = &content[at + marker.len()..];
        let token = rest.split(char::is_whitespace).next().unwrap_or("");
        let token = token.trim_matches(|c| c == '"' || c == '\'');
        (!token.is_empty()).then_some(token)
    })
}

/// Validator for one post-based platform.
pub struct PostValidator {
    descriptor: PostPlatform,
    source: Arc<dyn ContentSource>,
}

impl PostValidator {
    /// Adapter for `descriptor`, fetching through `source`.
    pub fn new(descriptor: PostPlatform, source: Arc<dyn ContentSource>) -> Self {
        Self { descriptor, source }
    }

    /// Platform descriptor.
    pub fn descriptor(&self) -> &PostPlatform {
        &self.descriptor
    }
}

#[async_trait]
impl Validator for PostValidator {
    fn platform(&self) -> Platform {
        self.descriptor.platform
    }

    fn normalize_identity(&self, identity: &str) -> Result<String, ValidationError> {
        self.descriptor.rule.normalize(identity)
    }

    fn generate_post_payload(&self, claim: &Claim) -> Option<PostContent> {
        if claim.action != Action::Create {
            return None;
        }
        let mut claim = claim.clone();
        if let Ok(identity) = self.normalize_identity(&claim.identity) {
            claim.identity = identity;
        }
        Some(
            self.descriptor
                .templates
                .iter()
                .map(|(locale, template)| (locale.to_string(), render_template(template, &claim)))
                .collect(),
        )
    }

    async fn validate(&self, claim: &mut Claim) -> Result<(), ValidationError> {
        match claim.action {
            Action::Create => {}
            Action::Delete => return validate_detached(self, claim),
            action => {
                return Err(ValidationError::UnsupportedAction {
                    platform: self.descriptor.platform,
                    action,
                })
            }
        }

        let identity = self.normalize_identity(&claim.identity)?;
        // Location-less platforms derive the address from the identity.
        let location = if self.descriptor.needs_location {
            claim.proof_location.trim().to_string()
        } else {
            String::new()
        };
        if self.descriptor.needs_location && location.is_empty() {
            return Err(ValidationError::Missing("proof_location"));
        }

        let request = FetchRequest {
            platform: self.descriptor.platform,
            identity: &identity,
            location: &location,
            marker: self.descriptor.marker,
        };
        let post = self.source.fetch(&request).await?;

        match &post.author {
            Some(author) => {
                let author = self.normalize_identity(author)?;
                if author != identity {
                    return Err(ValidationError::IdentityMismatch {
                        expected: identity,
                        actual: author,
                    });
                }
            }
            None if !self.descriptor.needs_location => {}
            None => {
                return Err(ValidationError::IdentityMismatch {
                    expected: identity,
                    actual: "unknown author".to_string(),
                })
            }
        }

        let encoded =
            extract_signature(&post.content, self.descriptor.marker).ok_or(ValidationError::SignatureNotFound)?;
        let signature = decode_signature(encoded)?;

        let payload = self.generate_sign_payload(claim)?;
        ensure_signed_by(payload.as_bytes(), &signature, &claim.persona)?;

        debug!("{} proof for {} verified at {:?}", self.descriptor.platform, identity, location);

        claim.identity = identity;
        claim.proof_location = location;
        claim.alt_id = post.author_alt_id;
        claim.signature = Some(signature);
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
