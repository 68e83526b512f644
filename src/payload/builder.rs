//! Canonical Sign Payload
//!
//! The payload is a compact JSON object whose keys are emitted in
//! ascending byte order:
//!
//! ```text
//! {"action":"create","created_at":"1700000000","identity":"alice",
//!  "platform":"twitter","prev":null,"uuid":"..."}
//! ```
//!
//! plus any platform extras (`patch`, `persona`). `prev` is the base64 of
//! the previous entry's signature. `created_at` is a decimal string so
//! no client ever formats it as a float. The persona key is deliberately
//! absent from the base fields: the signer is recovered, not declared.

use std::collections::BTreeMap;

use serde_json::Value;
use uuid::Uuid;

use super::claim::{Action, Platform};
use super::PayloadError;
use crate::crypto::encode_b64;

/// Base keys every payload carries.
const BASE_KEYS: [&str; 6] = ["action", "created_at", "identity", "platform", "prev", "uuid"];

/// Inputs to the payload builder.
#[derive(Clone, Debug)]
pub struct PayloadFields<'a> {
    /// Claim action.
    pub action: Action,
    /// Target platform.
    pub platform: Platform,
    /// Normalized identity.
    pub identity: &'a str,
    /// Previous entry signature, if any.
    pub previous: Option<&'a [u8]>,
    /// Epoch seconds.
    pub created_at: i64,
    /// Session nonce.
    pub uuid: Uuid,
    /// Platform-specific additions.
    pub extra: BTreeMap<String, Value>,
}

impl<'a> PayloadFields<'a> {
    /// Add a platform-specific field.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Build the exact string a persona signs.
pub fn build_sign_payload(fields: &PayloadFields<'_>) -> Result<String, PayloadError> {
    let mut object: BTreeMap<&str, Value> = BTreeMap::new();

    for (key, value) in &fields.extra {
        if BASE_KEYS.contains(&key.as_str()) {
            return Err(PayloadError::ReservedField(key.clone()));
        }
        object.insert(key.as_str(), value.clone());
    }

    object.insert("action", Value::String(fields.action.as_str().to_string()));
    object.insert("created_at", Value::String(fields.created_at.to_string()));
    object.insert("identity", Value::String(fields.identity.to_string()));
    object.insert("platform", Value::String(fields.platform.as_str().to_string()));
    object.insert(
        "prev",
        fields
            .previous
            .map(|sig| Value::String(encode_b64(sig)))
            .unwrap_or(Value::Null),
    );
    object.insert("uuid", Value::String(fields.uuid.hyphenated().to_string()));

    Ok(serde_json::to_string(&object)?)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::KvPatch;
    use crate::payload::Extra;
    use proptest::prelude::*;
    use serde_json::json;

    fn fields(identity: &str) -> PayloadFields<'_> {
        PayloadFields {
            action: Action::Create,
            platform: Platform::Twitter,
            identity,
            previous: None,
            created_at: 1_700_000_000,
            uuid: Uuid::parse_str("6c9d1e3a-2f1b-4f7a-9a55-0c6b2f0f4e11").unwrap(),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_exact_bytes() {
        let payload = build_sign_payload(&fields("alice")).unwrap();
        assert_eq!(
            payload,
            r#"{"action":"create","created_at":"1700000000","identity":"alice","platform":"twitter","prev":null,"uuid":"6c9d1e3a-2f1b-4f7a-9a55-0c6b2f0f4e11"}"#
        );
    }

    #[test]
    fn test_previous_is_base64() {
        let prev = [9u8; 65];
        let mut f = fields("alice");
        f.previous = Some(&prev);
        let payload = build_sign_payload(&f).unwrap();
        assert!(payload.contains(&format!("\"prev\":\"{}\"", encode_b64(&prev))));
    }

    #[test]
    fn test_kv_patch_fields_sorted() {
        let patch = KvPatch::setting([("bio", json!("hi")), ("avatar", json!({"z": 1, "a": 2}))]);
        let mut f = fields("02abc");
        f.platform = Platform::Kv;
        f.action = Action::KvSet;
        f.extra = Extra::KvPatch(patch).payload_fields().unwrap();

        let payload = build_sign_payload(&f).unwrap();
        assert!(payload.contains(r#""patch":{"del":[],"set":{"avatar":{"a":2,"z":1},"bio":"hi"}}"#));
        assert!(payload.contains(r#""prev":null"#));
    }

    #[test]
    fn test_reserved_extra_rejected() {
        let f = fields("alice").with_extra("prev", json!("forged"));
        assert!(matches!(
            build_sign_payload(&f),
            Err(PayloadError::ReservedField(k)) if k == "prev"
        ));
    }

    #[test]
    fn test_unicode_identity_not_escaped() {
        let payload = build_sign_payload(&fields("名前🙂")).unwrap();
        assert!(payload.contains("\"identity\":\"名前🙂\""));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn prop_build_is_deterministic(
            identity in "\\PC{0,40}",
            created_at in 0i64..4_000_000_000,
            uuid_bytes in proptest::array::uniform16(any::<u8>()),
            prev in proptest::option::of(proptest::collection::vec(any::<u8>(), 65)),
            keys in proptest::collection::btree_map("[a-z]{1,8}", "\\PC{0,12}", 0..5),
            platform_idx in 0usize..Platform::ALL.len(),
        ) {
            let set = keys.into_iter().map(|(k, v)| (k, Value::String(v)));
            let extra = Extra::KvPatch(KvPatch::setting(set)).payload_fields().unwrap();
            let make = || PayloadFields {
                action: Action::Create,
                platform: Platform::ALL[platform_idx],
                identity: &identity,
                previous: prev.as_deref(),
                created_at,
                uuid: Uuid::from_bytes(uuid_bytes),
                extra: extra.clone(),
            };

            let first = build_sign_payload(&make()).unwrap();
            let second = build_sign_payload(&make()).unwrap();
            prop_assert_eq!(&first, &second);

            // Always valid JSON with the identity intact.
            let parsed: Value = serde_json::from_str(&first).unwrap();
            prop_assert_eq!(parsed["identity"].as_str(), Some(identity.as_str()));
        }
    }
}
