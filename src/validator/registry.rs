//! Validator Registry
//!
//! Built once at startup and shared read-only behind an `Arc`. There is
//! no global: the registry is passed to whatever needs platform lookup.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::kv::KvValidator;
use super::persona::PersonaValidator;
use super::post::{PostPlatform, PostValidator};
use super::source::ContentSource;
use super::wallet::{EthereumValidator, SolanaValidator};
use super::{ValidationError, Validator};
use crate::payload::Platform;

/// Immutable platform → validator table.
#[derive(Clone)]
pub struct ValidatorRegistry {
    validators: BTreeMap<Platform, Arc<dyn Validator>>,
}

impl ValidatorRegistry {
    /// Start an empty registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Every built-in platform, with post-based ones fetching via `source`.
    ///
    /// Post platforms `source` cannot fetch are left out, so claims for
    /// them fail as unsupported instead of as unreachable.
    pub fn standard(source: Arc<dyn ContentSource>) -> Self {
        let mut builder = Self::builder();
        for descriptor in PostPlatform::ALL {
            if !source.supports(descriptor.platform) {
                debug!("Content source cannot fetch {} proofs, skipping", descriptor.platform);
                continue;
            }
            builder = builder.register(PostValidator::new(descriptor, source.clone()));
        }
        builder
            .register(EthereumValidator)
            .register(SolanaValidator)
            .register(PersonaValidator)
            .register(KvValidator)
            .build()
    }

    /// Validator for a platform.
    pub fn get(&self, platform: Platform) -> Result<Arc<dyn Validator>, ValidationError> {
        self.validators
            .get(&platform)
            .cloned()
            .ok_or_else(|| ValidationError::UnsupportedPlatform(platform.to_string()))
    }

    /// Validator for a platform named on the wire.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Validator>, ValidationError> {
        let platform: Platform = name
            .parse()
            .map_err(|_| ValidationError::UnsupportedPlatform(name.to_string()))?;
        self.get(platform)
    }

    /// Registered platforms, in order.
    pub fn platforms(&self) -> Vec<Platform> {
        self.validators.keys().copied().collect()
    }
}

impl std::fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("platforms", &self.platforms())
            .finish()
    }
}

/// Collects validators before freezing them into a [`ValidatorRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    validators: BTreeMap<Platform, Arc<dyn Validator>>,
}

impl RegistryBuilder {
    /// Add a validator. A later registration for the same platform wins.
    pub fn register<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validators.insert(validator.platform(), Arc::new(validator));
        self
    }

    /// Freeze.
    pub fn build(self) -> ValidatorRegistry {
        ValidatorRegistry {
            validators: self.validators,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::headless::HeadlessSource;
    use crate::validator::source::MemorySource;
    use std::time::Duration;

    #[test]
    fn test_standard_covers_every_platform() {
        let registry = ValidatorRegistry::standard(Arc::new(MemorySource::new()));
        assert_eq!(registry.platforms(), Platform::ALL.to_vec());
        for platform in Platform::ALL {
            assert_eq!(registry.get(platform).unwrap().platform(), platform);
        }
    }

    #[test]
    fn test_standard_skips_unfetchable_platforms() {
        let source = HeadlessSource::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        let registry = ValidatorRegistry::standard(Arc::new(source));

        for platform in [Platform::Dns, Platform::Discord] {
            assert!(matches!(
                registry.get(platform),
                Err(ValidationError::UnsupportedPlatform(_))
            ));
        }
        assert!(registry.get(Platform::Twitter).is_ok());
        assert!(registry.get(Platform::Ethereum).is_ok());
    }

    #[test]
    fn test_registry_miss() {
        let registry = ValidatorRegistry::builder().register(KvValidator).build();
        assert!(registry.resolve("kv").is_ok());

        let err = registry.get(Platform::Twitter).err().unwrap();
        assert!(matches!(err, ValidationError::UnsupportedPlatform(_)));

        let err = registry.resolve("myspace").err().unwrap();
        assert_eq!(err.to_string(), "unsupported platform: myspace");
    }
}
