//! Service configuration, read from `PROOF_*` environment variables.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Service configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Allow cross-origin requests from anywhere.
    pub enable_cors: bool,
    /// Proofs unchecked for longer than this are revalidated on lookup.
    pub revalidate_after: Duration,
    /// Chain entries per `/proofchain` page.
    pub page_size: usize,
    /// Headless renderer endpoint. Without one, proofs are fetched from
    /// the in-process source.
    pub headless_url: Option<String>,
    /// Timeout for one external fetch.
    pub fetch_timeout: Duration,
    /// Server version string.
    pub version: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9800)),
            enable_cors: false,
            revalidate_after: Duration::from_secs(3600),
            page_size: 20,
            headless_url: None,
            fetch_timeout: Duration::from_secs(10),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("invalid value for {var}: {value:?}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
}

impl ServiceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Create config from any variable source. Unset variables keep their
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let secs = |var: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            Ok(parse_var::<u64, _>(&lookup, var)?
                .map(Duration::from_secs)
                .unwrap_or(default))
        };

        let page_size = parse_var::<usize, _>(&lookup, "PROOF_PAGE_SIZE")?.unwrap_or(defaults.page_size);
        if page_size == 0 {
            return Err(ConfigError::Invalid {
                var: "PROOF_PAGE_SIZE",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            bind_addr: parse_var(&lookup, "PROOF_BIND_ADDR")?.unwrap_or(defaults.bind_addr),
            enable_cors: match lookup("PROOF_ENABLE_CORS") {
                None => defaults.enable_cors,
                Some(v) => match v.trim() {
                    "1" | "true" | "yes" => true,
                    "0" | "false" | "no" | "" => false,
                    _ => {
                        return Err(ConfigError::Invalid {
                            var: "PROOF_ENABLE_CORS",
                            value: v.clone(),
                        })
                    }
                },
            },
            revalidate_after: secs("PROOF_REVALIDATE_AFTER_SECS", defaults.revalidate_after)?,
            page_size,
            headless_url: lookup("PROOF_HEADLESS_URL").filter(|v| !v.trim().is_empty()),
            fetch_timeout: secs("PROOF_FETCH_TIMEOUT_SECS", defaults.fetch_timeout)?,
            version: defaults.version,
        })
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
