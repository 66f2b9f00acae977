//! In-memory key-material store.
//!
//! [`KeyMaterialStore`] maps each [`KeyType`] namespace to its entries.
//! It is a plain value: persistence and locking are layered on top by
//! [`AuthStateManager`](crate::AuthStateManager).
//!
//! Serialized form is keyed by namespace name:
//!
//! ```json
//! { "preKeys": { "1": { "public": {...}, "private": {...} } },
//!   "senderKeys": { "abc": { "type": "Buffer", "data": "..." } } }
//! ```

use std::collections::BTreeMap;

use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::Error as _,
    ser::SerializeMap,
};

use crate::keys::{KeyBatch, KeyMaterial, KeyType};

/// Namespaced key material.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMaterialStore {
    namespaces: BTreeMap<KeyType, BTreeMap<String, KeyMaterial>>,
}

impl KeyMaterialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up `ids` in `key_type`'s namespace.
    ///
    /// Only ids that are present appear in the result. Missing ids are
    /// omitted, never filled with a placeholder.
    pub fn get<I, S>(&self, key_type: KeyType, ids: I) -> BTreeMap<String, KeyMaterial>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(entries) = self.namespaces.get(&key_type) else {
            return BTreeMap::new();
        };
        ids.into_iter()
            .filter_map(|id| {
                let id = id.as_ref();
                entries.get(id).map(|value| (id.to_owned(), value.clone()))
            })
            .collect()
    }

    /// Merges `batch` into the store.
    ///
    /// Writes overwrite their id, removals delete it, and every other id in
    /// the namespace is retained.
    pub fn apply(&mut self, batch: KeyBatch) {
        for (key_type, entries) in batch.into_entries() {
            let namespace = self.namespaces.entry(key_type).or_default();
            for (id, value) in entries {
                match value {
                    Some(value) => {
                        namespace.insert(id, value);
                    },
                    None => {
                        namespace.remove(&id);
                    },
                }
            }
            if namespace.is_empty() {
                self.namespaces.remove(&key_type);
            }
        }
    }

    /// All entries of one namespace, if it holds any.
    #[must_use]
    pub fn namespace(&self, key_type: KeyType) -> Option<&BTreeMap<String, KeyMaterial>> {
        self.namespaces.get(&key_type)
    }

    /// Total number of entries across namespaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.namespaces.values().map(BTreeMap::len).sum()
    }

    /// Returns `true` if no namespace holds an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}

impl Serialize for KeyMaterialStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.namespaces.len()))?;
        for (key_type, entries) in &self.namespaces {
            map.serialize_entry(key_type.namespace(), entries)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for KeyMaterialStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, BTreeMap<String, serde_json::Value>>::deserialize(deserializer)?;
        let mut namespaces = BTreeMap::new();
        for (name, entries) in raw {
            let key_type = KeyType::from_namespace(&name).map_err(D::Error::custom)?;
            let typed = entries
                .into_iter()
                .map(|(id, value)| {
                    KeyMaterial::from_json(key_type, value)
                        .map(|material| (id, material))
                        .map_err(D::Error::custom)
                })
                .collect::<Result<BTreeMap<_, _>, _>>()?;
            if !typed.is_empty() {
                namespaces.insert(key_type, typed);
            }
        }
        Ok(Self { namespaces })
    }
}
