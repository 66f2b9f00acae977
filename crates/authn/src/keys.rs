//! Logical key types, their namespaces and typed key-material values.
//!
//! The session engine reads and writes six kinds of key material. Each kind
//! lives in its own namespace of the [`KeyMaterialStore`](crate::KeyMaterialStore):
//!
//! | [`KeyType`] | Name | Namespace | Value |
//! |---|---|---|---|
//! | `PreKey` | `pre-key` | `preKeys` | [`KeyPair`] |
//! | `Session` | `session` | `sessions` | [`Buffer`] |
//! | `SenderKey` | `sender-key` | `senderKeys` | [`Buffer`] |
//! | `AppStateSyncKey` | `app-state-sync-key` | `appStateSyncKeys` | [`AppStateSyncKeyData`] |
//! | `AppStateSyncVersion` | `app-state-sync-version` | `appStateVersions` | [`LtHashState`] |
//! | `SenderKeyMemory` | `sender-key-memory` | `senderKeyMemory` | participant → bool |
//!
//! Values are a tagged union ([`KeyMaterial`]); a value always knows its own
//! type, so a batch can never file a session record under `preKeys`.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
    codec::Buffer,
    error::{AuthError, Result},
};

/// The closed set of logical key types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyType {
    /// One-time pre-keys.
    PreKey,
    /// Pairwise session records.
    Session,
    /// Group sender keys.
    SenderKey,
    /// App-state sync keys.
    AppStateSyncKey,
    /// App-state collection versions.
    AppStateSyncVersion,
    /// Which participants already received our sender key.
    SenderKeyMemory,
}

impl KeyType {
    /// Every key type, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::PreKey,
        Self::Session,
        Self::SenderKey,
        Self::AppStateSyncKey,
        Self::AppStateSyncVersion,
        Self::SenderKeyMemory,
    ];

    /// Logical name used by the session engine.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PreKey => "pre-key",
            Self::Session => "session",
            Self::SenderKey => "sender-key",
            Self::AppStateSyncKey => "app-state-sync-key",
            Self::AppStateSyncVersion => "app-state-sync-version",
            Self::SenderKeyMemory => "sender-key-memory",
        }
    }

    /// Storage namespace this type maps to.
    #[must_use]
    pub const fn namespace(self) -> &'static str {
        match self {
            Self::PreKey => "preKeys",
            Self::Session => "sessions",
            Self::SenderKey => "senderKeys",
            Self::AppStateSyncKey => "appStateSyncKeys",
            Self::AppStateSyncVersion => "appStateVersions",
            Self::SenderKeyMemory => "senderKeyMemory",
        }
    }

    /// Reverse lookup from a namespace name.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownKeyType`] for names outside the map.
    pub fn from_namespace(namespace: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.namespace() == namespace)
            .ok_or_else(|| AuthError::unknown_key_type(namespace))
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = AuthError;

    fn from_str(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str() == name)
            .ok_or_else(|| AuthError::unknown_key_type(name))
    }
}

/// Curve key pair. The private half is scrubbed on drop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    /// Public key bytes.
    pub public: Buffer,
    /// Private key bytes.
    pub private: Buffer,
}

/// Fingerprint of an app-state sync key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStateSyncKeyFingerprint {
    /// Raw key id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_id: Option<u32>,
    /// Current key index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_index: Option<u32>,
    /// Device indexes the key was shared with.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub device_indexes: Vec<u32>,
}

/// Structured app-state sync key data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStateSyncKeyData {
    /// The key itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_data: Option<Buffer>,
    /// Key fingerprint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<AppStateSyncKeyFingerprint>,
    /// Creation time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// MAC of one value in an app-state collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueMac {
    /// The value MAC.
    pub value_mac: Buffer,
}

/// Version and LT-hash of one app-state collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LtHashState {
    /// Collection version.
    pub version: u64,
    /// Rolling LT-hash.
    pub hash: Buffer,
    /// Index MAC (base64) → value MAC.
    #[serde(default)]
    pub index_value_map: BTreeMap<String, ValueMac>,
}

/// One key-material value, tagged with its logical type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum KeyMaterial {
    /// A one-time pre-key pair.
    PreKey(KeyPair),
    /// A serialized session record.
    Session(Buffer),
    /// A serialized sender-key record.
    SenderKey(Buffer),
    /// App-state sync key data.
    AppStateSyncKey(AppStateSyncKeyData),
    /// App-state collection version.
    AppStateSyncVersion(LtHashState),
    /// Participant → already-distributed flag.
    SenderKeyMemory(BTreeMap<String, bool>),
}

impl KeyMaterial {
    /// The logical type this value belongs to.
    #[must_use]
    pub fn key_type(&self) -> KeyType {
        match self {
            Self::PreKey(_) => KeyType::PreKey,
            Self::Session(_) => KeyType::Session,
            Self::SenderKey(_) => KeyType::SenderKey,
            Self::AppStateSyncKey(_) => KeyType::AppStateSyncKey,
            Self::AppStateSyncVersion(_) => KeyType::AppStateSyncVersion,
            Self::SenderKeyMemory(_) => KeyType::SenderKeyMemory,
        }
    }

    /// Materializes an untyped value as the shape `key_type` requires.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Decode`] if `value` does not have that shape.
    pub fn from_json(key_type: KeyType, value: serde_json::Value) -> Result<Self> {
        fn typed<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T> {
            serde_json::from_value(value)
                .map_err(|e| AuthError::Decode(crate::codec::CodecError::Parse(e)))
        }

        Ok(match key_type {
            KeyType::PreKey => Self::PreKey(typed(value)?),
            KeyType::Session => Self::Session(typed(value)?),
            KeyType::SenderKey => Self::SenderKey(typed(value)?),
            KeyType::AppStateSyncKey => Self::AppStateSyncKey(typed(value)?),
            KeyType::AppStateSyncVersion => Self::AppStateSyncVersion(typed(value)?),
            KeyType::SenderKeyMemory => Self::SenderKeyMemory(typed(value)?),
        })
    }

    /// Binary payload for the buffer-valued types.
    #[must_use]
    pub fn as_buffer(&self) -> Option<&Buffer> {
        match self {
            Self::Session(buffer) | Self::SenderKey(buffer) => Some(buffer),
            _ => None,
        }
    }

    /// App-state sync key data, if this is one.
    #[must_use]
    pub fn as_app_state_sync_key(&self) -> Option<&AppStateSyncKeyData> {
        match self {
            Self::AppStateSyncKey(data) => Some(data),
            _ => None,
        }
    }
}

/// A batch of key-material writes grouped by type.
///
/// `Some(value)` writes an entry; `None` removes it. Ids not mentioned are
/// left untouched when the batch is applied.
///
/// ```
/// use linkauth_authn::{Buffer, KeyBatch, KeyMaterial, KeyType};
///
/// let mut batch = KeyBatch::new();
/// batch
///     .insert("abc", KeyMaterial::SenderKey(Buffer::from([1u8; 10])))
///     .remove(KeyType::PreKey, "7");
/// assert_eq!(batch.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyBatch {
    entries: BTreeMap<KeyType, BTreeMap<String, Option<KeyMaterial>>>,
}

impl KeyBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a write; the namespace is taken from the value's type.
    pub fn insert(&mut self, id: impl Into<String>, value: KeyMaterial) -> &mut Self {
        self.entries.entry(value.key_type()).or_default().insert(id.into(), Some(value));
        self
    }

    /// Adds a removal of `id` from `key_type`'s namespace.
    pub fn remove(&mut self, key_type: KeyType, id: impl Into<String>) -> &mut Self {
        self.entries.entry(key_type).or_default().insert(id.into(), None);
        self
    }

    /// Builds a batch from the session engine's untyped form.
    ///
    /// Outer keys are logical type names (`"pre-key"`, ...); `null` values
    /// are removals.
    ///
    /// # Errors
    ///
    /// - [`AuthError::UnknownKeyType`] for a type name outside the fixed map
    /// - [`AuthError::Decode`] for a value of the wrong shape
    pub fn from_json(
        raw: BTreeMap<String, BTreeMap<String, Option<serde_json::Value>>>,
    ) -> Result<Self> {
        let mut batch = Self::new();
        for (name, entries) in raw {
            let key_type: KeyType = name.parse()?;
            for (id, value) in entries {
                match value {
                    Some(value) => batch.insert(id, KeyMaterial::from_json(key_type, value)?),
                    None => batch.remove(key_type, id),
                };
            }
        }
        Ok(batch)
    }

    /// Total number of writes and removals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    /// Returns `true` if the batch holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consumes the batch, yielding per-type entries.
    pub fn into_entries(
        self,
    ) -> impl Iterator<Item = (KeyType, BTreeMap<String, Option<KeyMaterial>>)> {
        self.entries.into_iter()
    }
}
