//! Headless Renderer Client
//!
//! Some platforms only show post content after running JavaScript. A
//! separate headless-browser service renders the page and matches it:
//!
//! ```text
//! POST {endpoint}
//!   {"location": "...", "timeout": "10s",
//!    "match": {"type": "regexp", "value": "Signature: \\S+"}}
//! -> {"content": "...", "is_valid": true, "message": null}
//! ```
//!
//! The renderer cannot tell who authored a page. Ownership comes from the
//! page address instead: every location is resolved to a URL on the
//! platform's own host, and the account that URL belongs to is reported
//! as the post author.
//!
//! ```text
//! "123"                                    ─► twitter.com/<identity>/status/123
//! "https://x.com/alice/status/123"         ─► owner "alice"
//! "https://attacker.example/page"          ─► InvalidLocation
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::source::{ContentSource, FetchRequest, FetchedPost};
use super::ValidationError;
use crate::payload::Platform;

/// Slack between the render timeout and the HTTP client timeout.
const ROUND_TRIP_HEADROOM: Duration = Duration::from_secs(2);

const TWITTER_HOSTS: [&str; 5] = [
    "twitter.com",
    "www.twitter.com",
    "mobile.twitter.com",
    "x.com",
    "www.x.com",
];
const GIST_HOST: &str = "gist.github.com";
const KEYBASE_SUFFIX: &str = ".keybase.pub";
const STEAM_HOST: &str = "steamcommunity.com";

#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    location: &'a str,
    timeout: String,
    #[serde(rename = "match")]
    matcher: RenderMatch,
}

#[derive(Debug, Serialize)]
struct RenderMatch {
    #[serde(rename = "type")]
    kind: &'static str,
    value: String,
}

#[derive(Debug, Deserialize)]
struct RenderResponse {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    is_valid: Option<bool>,
    #[serde(default)]
    message: Option<String>,
}

/// A proof location resolved to a page on the platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofPage {
    /// Page to render.
    pub url: String,
    /// Account the page belongs to, as it appears in the address.
    pub owner: String,
}

/// [`ContentSource`] backed by the headless renderer.
#[derive(Debug, Clone)]
pub struct HeadlessSource {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HeadlessSource {
    /// Client for the renderer at `endpoint`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout + ROUND_TRIP_HEADROOM)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }
}

fn invalid(location: &str, platform: Platform) -> ValidationError {
    ValidationError::InvalidLocation(format!("{} is not a {} proof page", location, platform))
}

/// A location that must be a single path segment (status id, gist id).
fn path_segment(location: &str, platform: Platform) -> Result<&str, ValidationError> {
    let bad = location.is_empty()
        || location == "."
        || location == ".."
        || location
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '\\' | '?' | '#' | '@' | ':'));
    if bad {
        return Err(invalid(location, platform));
    }
    Ok(location)
}

/// Split a fediverse handle `user@instance`.
fn fediverse_parts(identity: &str) -> Result<(&str, &str), ValidationError> {
    match identity.split_once('@') {
        Some((user, instance)) if !user.is_empty() && instance.contains('.') => Ok((user, instance)),
        _ => Err(ValidationError::InvalidIdentity(format!(
            "expect user@instance, got {}",
            identity
        ))),
    }
}

/// Resolve a proof location to the platform page it names.
///
/// Short locations (a status or gist id) are placed under the claimed
/// identity. Full URLs must point at the platform's own host; their owner
/// is read from the address and checked by the validator.
pub fn resolve_page(
    platform: Platform,
    identity: &str,
    location: &str,
) -> Result<ProofPage, ValidationError> {
    let location = location.trim();
    if location.starts_with("https://") || location.starts_with("http://") {
        return page_from_url(platform, location);
    }

    let url = match platform {
        Platform::Steam => format!("https://{}/id/{}/", STEAM_HOST, identity),
        _ if location.is_empty() => return Err(ValidationError::Missing("proof_location")),
        Platform::Twitter => format!(
            "https://twitter.com/{}/status/{}",
            identity,
            path_segment(location, platform)?
        ),
        Platform::Github => format!(
            "https://{}/{}/{}",
            GIST_HOST,
            identity,
            path_segment(location, platform)?
        ),
        Platform::Keybase => {
            let path = location.trim_start_matches('/');
            if path.split('/').any(|part| path_segment(part, platform).is_err()) {
                return Err(invalid(location, platform));
            }
            format!("https://{}{}/{}", identity, KEYBASE_SUFFIX, path)
        }
        Platform::Activitypub => {
            let (user, instance) = fediverse_parts(identity)?;
            format!(
                "https://{}/@{}/{}",
                instance,
                user,
                path_segment(location, platform)?
            )
        }
        other => {
            return Err(ValidationError::InvalidLocation(format!(
                "{} proofs cannot be rendered",
                other
            )))
        }
    };

    Ok(ProofPage {
        url,
        owner: identity.to_string(),
    })
}

fn page_from_url(platform: Platform, text: &str) -> Result<ProofPage, ValidationError> {
    let url = Url::parse(text).map_err(|e| ValidationError::InvalidLocation(format!("{}: {}", text, e)))?;
    if !matches!(url.scheme(), "https" | "http") || !url.username().is_empty() || url.password().is_some() {
        return Err(invalid(text, platform));
    }

    let host = url
        .host_str()
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| invalid(text, platform))?;
    let segments: Vec<&str> = url
        .path_segments()
        .map(|parts| parts.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();

    let owner = match (platform, segments.as_slice()) {
        (Platform::Twitter, [owner, "status", _]) if TWITTER_HOSTS.contains(&host.as_str()) => {
            Some(owner.to_string())
        }
        (Platform::Github, [owner, _]) if host == GIST_HOST => Some(owner.to_string()),
        (Platform::Keybase, [_, ..]) => host
            .strip_suffix(KEYBASE_SUFFIX)
            .filter(|user| !user.is_empty() && !user.contains('.'))
            .map(str::to_string),
        (Platform::Activitypub, [handle, _]) => handle
            .strip_prefix('@')
            .filter(|user| !user.is_empty())
            .map(|user| format!("{}@{}", user, host)),
        (Platform::Steam, ["id", owner, ..]) if host == STEAM_HOST => Some(owner.to_string()),
        _ => None,
    };

    let owner = owner.ok_or_else(|| invalid(text, platform))?;
    Ok(ProofPage {
        url: url.to_string(),
        owner,
    })
}

#[async_trait]
impl ContentSource for HeadlessSource {
    fn supports(&self, platform: Platform) -> bool {
        !matches!(platform, Platform::Dns | Platform::Discord)
    }

    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<FetchedPost, ValidationError> {
        if !self.supports(request.platform) {
            return Err(ValidationError::ExternalUnavailable(format!(
                "{} proofs cannot be rendered",
                request.platform
            )));
        }

        let page = resolve_page(request.platform, request.identity, request.location)?;
        let body = RenderRequest {
            location: &page.url,
            timeout: format!("{}s", self.timeout.as_secs()),
            matcher: RenderMatch {
                kind: "regexp",
                value: format!("{}\\S+", request.marker),
            },
        };

        debug!("Rendering {} for {} proof", page.url, request.platform);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ValidationError::ExternalUnavailable(format!("render timed out: {}", page.url))
                } else {
                    ValidationError::ExternalUnavailable(format!("renderer unreachable: {}", e))
                }
            })?;

        if !response.status().is_success() {
            return Err(ValidationError::ExternalUnavailable(format!(
                "renderer returned {}",
                response.status()
            )));
        }

        let rendered: RenderResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ValidationError::ExternalUnavailable(format!("render timed out: {}", page.url))
            } else {
                ValidationError::ExternalUnavailable(format!("bad renderer response: {}", e))
            }
        })?;

        if rendered.is_valid == Some(false) {
            debug!(
                "Renderer found no match at {}: {}",
                page.url,
                rendered.message.as_deref().unwrap_or("")
            );
            return Err(ValidationError::SignatureNotFound);
        }

        let content = rendered.content.ok_or(ValidationError::SignatureNotFound)?;
        Ok(FetchedPost {
            author: Some(page.owner),
            author_alt_id: None,
            content,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::Arc;

    use axum::{extract::State, routing::post, Json, Router};
    use serde_json::{json, Value};
    use tokio::net::TcpListener;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct Renderer {
        reply: Value,
        delay: Duration,
        seen: Arc<Mutex<Vec<Value>>>,
    }

    async fn render(State(renderer): State<Renderer>, Json(body): Json<Value>) -> Json<Value> {
        renderer.seen.lock().await.push(body);
        tokio::time::sleep(renderer.delay).await;
        Json(renderer.reply.clone())
    }

    /// Local renderer answering every request with `reply` after `delay`.
    async fn start_renderer(reply: Value, delay: Duration) -> (SocketAddr, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().route("/render", post(render)).with_state(Renderer {
            reply,
            delay,
            seen: seen.clone(),
        });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, seen)
    }

    fn twitter_request<'a>(location: &'a str) -> FetchRequest<'a> {
        FetchRequest {
            platform: Platform::Twitter,
            identity: "alice",
            location,
            marker: "Signature: ",
        }
    }

    #[test]
    fn test_short_locations_use_identity() {
        let page = resolve_page(Platform::Twitter, "alice", "123").unwrap();
        assert_eq!(page.url, "https://twitter.com/alice/status/123");
        assert_eq!(page.owner, "alice");

        let page = resolve_page(Platform::Github, "alice", "abc").unwrap();
        assert_eq!(page.url, "https://gist.github.com/alice/abc");

        let page = resolve_page(Platform::Keybase, "alice", "NextID/p.json").unwrap();
        assert_eq!(page.url, "https://alice.keybase.pub/NextID/p.json");

        let page = resolve_page(Platform::Activitypub, "alice@mastodon.social", "42").unwrap();
        assert_eq!(page.url, "https://mastodon.social/@alice/42");

        let page = resolve_page(Platform::Steam, "alice", "").unwrap();
        assert_eq!(page.url, "https://steamcommunity.com/id/alice/");
    }

    #[test]
    fn test_short_locations_cannot_escape() {
        for location in ["../bob/status/1", "1?x=y", "1#frag", "evil.example:80", "a b"] {
            assert!(
                matches!(
                    resolve_page(Platform::Twitter, "alice", location),
                    Err(ValidationError::InvalidLocation(_))
                ),
                "{}",
                location
            );
        }
        assert!(matches!(
            resolve_page(Platform::Keybase, "alice", "ok/../../x"),
            Err(ValidationError::InvalidLocation(_))
        ));
        assert!(matches!(
            resolve_page(Platform::Twitter, "alice", " "),
            Err(ValidationError::Missing(_))
        ));
    }

    #[test]
    fn test_full_urls_report_owner() {
        let page = resolve_page(Platform::Twitter, "alice", "https://x.com/Bob/status/9").unwrap();
        assert_eq!(page.owner, "Bob");

        let page = resolve_page(Platform::Github, "alice", "https://gist.github.com/alice/abc").unwrap();
        assert_eq!(page.owner, "alice");

        let page = resolve_page(Platform::Keybase, "alice", "https://alice.keybase.pub/p.json").unwrap();
        assert_eq!(page.owner, "alice");

        let page = resolve_page(
            Platform::Activitypub,
            "alice@mastodon.social",
            "https://evil.example/@alice/1",
        )
        .unwrap();
        assert_eq!(page.owner, "alice@evil.example");
    }

    #[test]
    fn test_off_platform_urls_rejected() {
        let cases = [
            (Platform::Twitter, "https://attacker.example/my-own-page"),
            (Platform::Twitter, "https://twitter.com.attacker.example/alice/status/1"),
            (Platform::Twitter, "https://alice@attacker.example/alice/status/1"),
            (Platform::Twitter, "https://twitter.com/alice"),
            (Platform::Github, "https://github.com/alice/repo"),
            (Platform::Keybase, "https://keybase.pub/p.json"),
            (Platform::Keybase, "https://alice.keybase.pub.attacker.example/p.json"),
            (Platform::Steam, "https://attacker.example/id/alice/"),
            (Platform::Twitter, "ftp://twitter.com/alice/status/1"),
        ];
        for (platform, location) in cases {
            assert!(
                matches!(
                    resolve_page(platform, "alice", location),
                    Err(ValidationError::InvalidLocation(_))
                ),
                "{}",
                location
            );
        }
    }

    #[test]
    fn test_render_request_shape() {
        let body = RenderRequest {
            location: "https://example.com",
            timeout: "10s".to_string(),
            matcher: RenderMatch {
                kind: "regexp",
                value: "Signature: \\S+".to_string(),
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["match"]["type"], "regexp");
        assert_eq!(json["timeout"], "10s");
    }

    #[tokio::test]
    async fn test_fetch_returns_content_and_owner() {
        let (addr, seen) = start_renderer(
            json!({"content": "Signature: QUJD", "is_valid": true}),
            Duration::ZERO,
        )
        .await;
        let source = HeadlessSource::new(format!("http://{}/render", addr), Duration::from_secs(5)).unwrap();

        let post = source.fetch(&twitter_request("123")).await.unwrap();
        assert_eq!(post.content, "Signature: QUJD");
        assert_eq!(post.author.as_deref(), Some("alice"));

        let seen = seen.lock().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["location"], "https://twitter.com/alice/status/123");
        assert_eq!(seen[0]["timeout"], "5s");
        assert_eq!(seen[0]["match"]["value"], "Signature: \\S+");
    }

    #[tokio::test]
    async fn test_fetch_no_match_is_signature_not_found() {
        let (addr, _) = start_renderer(
            json!({"content": null, "is_valid": false, "message": "no match"}),
            Duration::ZERO,
        )
        .await;
        let source = HeadlessSource::new(format!("http://{}/render", addr), Duration::from_secs(5)).unwrap();

        assert!(matches!(
            source.fetch(&twitter_request("123")).await,
            Err(ValidationError::SignatureNotFound)
        ));
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_external_unavailable() {
        let (addr, _) = start_renderer(
            json!({"content": "Signature: QUJD", "is_valid": true}),
            ROUND_TRIP_HEADROOM + Duration::from_secs(3),
        )
        .await;
        let source = HeadlessSource::new(format!("http://{}/render", addr), Duration::ZERO).unwrap();

        let err = source.fetch(&twitter_request("123")).await.unwrap_err();
        assert!(matches!(err, ValidationError::ExternalUnavailable(_)));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_off_platform_url_never_rendered() {
        let (addr, seen) = start_renderer(json!({"content": "x"}), Duration::ZERO).await;
        let source = HeadlessSource::new(format!("http://{}/render", addr), Duration::from_secs(5)).unwrap();

        let err = source
            .fetch(&twitter_request("https://attacker.example/my-own-page"))
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidLocation(_)));
        assert!(seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_unrenderable_platforms() {
        let source = HeadlessSource::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        assert!(!source.supports(Platform::Dns));
        assert!(!source.supports(Platform::Discord));
        assert!(source.supports(Platform::Twitter));

        let request = FetchRequest {
            platform: Platform::Dns,
            identity: "example.com",
            location: "",
            marker: "nextid-signature=",
        };
        assert!(matches!(
            source.fetch(&request).await,
            Err(ValidationError::ExternalUnavailable(_))
        ));
    }
}
