//! The identity credential record.
//!
//! One [`AuthenticationCreds`] identifies one linked device. It is created
//! once by a [`CredentialsFactory`] and afterwards only ever replaced whole
//! with the record the session engine delivers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{codec::Buffer, keys::KeyPair};

/// A key pair signed by the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedKeyPair {
    /// The signed key pair.
    pub key_pair: KeyPair,
    /// Signature over the public key.
    pub signature: Buffer,
    /// Key id.
    pub key_id: u32,
    /// Signing time in seconds, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_s: Option<u64>,
}

/// The account this device is linked to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Account address.
    pub id: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Address of a remote signal identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolAddress {
    /// User part.
    pub name: String,
    /// Device number.
    pub device_id: u32,
}

/// A trusted remote identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalIdentity {
    /// Whose key this is.
    pub identifier: ProtocolAddress,
    /// The identity key.
    pub identifier_key: Buffer,
}

/// Per-account settings mirrored from the primary device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSettings {
    /// Whether new messages unarchive chats.
    #[serde(default)]
    pub unarchive_chats: bool,
}

/// Complete credential record of one linked device.
///
/// Fields this crate does not model are kept in [`extra`](Self::extra) and
/// written back unchanged, so a newer session engine does not lose data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationCreds {
    /// Noise protocol static key.
    pub noise_key: KeyPair,
    /// Ephemeral key used while pairing.
    pub pairing_ephemeral_key_pair: KeyPair,
    /// Long-term identity key.
    pub signed_identity_key: KeyPair,
    /// Current signed pre-key.
    pub signed_pre_key: SignedKeyPair,
    /// Registration id.
    pub registration_id: u32,
    /// Secret for device-identity HMACs (base64).
    pub adv_secret_key: String,
    /// History sync notifications already processed.
    #[serde(default)]
    pub processed_history_messages: Vec<serde_json::Value>,
    /// Next pre-key id to generate.
    pub next_pre_key_id: u32,
    /// First pre-key id not yet uploaded.
    pub first_unuploaded_pre_key_id: u32,
    /// Account sync counter.
    #[serde(default)]
    pub account_sync_counter: u32,
    /// Account settings.
    #[serde(default)]
    pub account_settings: AccountSettings,
    /// Whether the server already holds our pre-keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_has_pre_keys: Option<bool>,
    /// Linked account, once paired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub me: Option<Contact>,
    /// Signed device identity, once paired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<serde_json::Value>,
    /// Trusted identities.
    #[serde(default)]
    pub signal_identities: Vec<SignalIdentity>,
    /// Id of the app-state key in use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub my_app_state_key_id: Option<String>,
    /// Last full account sync, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_account_sync_timestamp: Option<i64>,
    /// Platform reported by the primary device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Whether pairing completed.
    #[serde(default)]
    pub registered: bool,
    /// Unmodelled fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl AuthenticationCreds {
    /// Returns `true` once the device has been paired with an account.
    #[must_use]
    pub fn is_paired(&self) -> bool {
        self.me.is_some()
    }
}

/// Produces a fresh credential record for an identity with no stored state.
///
/// Key generation is the implementor's concern; this crate never creates key
/// material itself.
pub trait CredentialsFactory: Send + Sync {
    /// Generates a brand-new credential record.
    fn init_auth_creds(&self) -> AuthenticationCreds;
}

impl<F> CredentialsFactory for F
where
    F: Fn() -> AuthenticationCreds + Send + Sync,
{
    fn init_auth_creds(&self) -> AuthenticationCreds {
        self()
    }
}
