//! Content Sources
//!
//! How a post-based validator gets at the published proof. Fetch
//! mechanics (scraping, OAuth, DNS) belong to the source, not the
//! validator. Sources apply their own timeouts and report any failure to
//! reach the platform as [`ValidationError::ExternalUnavailable`].

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::ValidationError;
use crate::payload::Platform;

/// What a validator asks a source for.
#[derive(Clone, Debug)]
pub struct FetchRequest<'a> {
    /// Platform being checked.
    pub platform: Platform,
    /// Claimed (normalized) identity.
    pub identity: &'a str,
    /// Proof location supplied by the client.
    pub location: &'a str,
    /// Text that precedes the signature in the published content.
    pub marker: &'a str,
}

/// Published content as seen by a source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchedPost {
    /// Handle of the author, when the source can tell.
    pub author: Option<String>,
    /// Platform-native author id, when the source can tell.
    pub author_alt_id: Option<String>,
    /// Body text (or the matched excerpt of it).
    pub content: String,
}

impl FetchedPost {
    /// Post by a known author.
    pub fn by(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            author: Some(author.into()),
            author_alt_id: None,
            content: content.into(),
        }
    }

    /// Attach the author's platform-native id.
    pub fn with_alt_id(mut self, alt_id: impl Into<String>) -> Self {
        self.author_alt_id = Some(alt_id.into());
        self
    }
}

/// Fetches published proofs from a platform.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Whether this source can fetch proofs for `platform` at all.
    fn supports(&self, _platform: Platform) -> bool {
        true
    }

    /// Fetch the content at `request.location`.
    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<FetchedPost, ValidationError>;
}

/// In-process source: content is published by calling [`MemorySource::publish`].
///
/// Used for development and tests. Location-less platforms (DNS) are
/// keyed by identity.
#[derive(Debug, Default)]
pub struct MemorySource {
    posts: RwLock<HashMap<(Platform, String), FetchedPost>>,
}

impl MemorySource {
    /// Empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish content at a location.
    pub async fn publish(&self, platform: Platform, location: impl Into<String>, post: FetchedPost) {
        let mut posts = self.posts.write().await;
        posts.insert((platform, location.into()), post);
    }

    /// Take content down. Returns whether anything was there.
    pub async fn unpublish(&self, platform: Platform, location: &str) -> bool {
        let mut posts = self.posts.write().await;
        posts.remove(&(platform, location.to_string())).is_some()
    }

    fn key(request: &FetchRequest<'_>) -> (Platform, String) {
        let location = if request.location.is_empty() {
            request.identity
        } else {
            request.location
        };
        (request.platform, location.to_string())
    }
}

#[async_trait]
impl ContentSource for MemorySource {
    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<FetchedPost, ValidationError> {
        let posts = self.posts.read().await;
        let key = Self::key(request);
        posts.get(&key).cloned().ok_or_else(|| {
            ValidationError::ExternalUnavailable(format!("no content at {}:{}", key.0, key.1))
        })
    }
}
