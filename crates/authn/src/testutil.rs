//! Credential fixtures for tests.
//!
//! Feature-gated behind `testutil`:
//!
//! ```toml
//! [dev-dependencies]
//! linkauth-authn = { path = "../authn", features = ["testutil"] }
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use crate::{
    codec::Buffer,
    creds::{AuthenticationCreds, CredentialsFactory, SignedKeyPair},
    keys::KeyPair,
};

/// Builds a deterministic credential record. Different seeds give records
/// that compare unequal.
#[must_use]
pub fn sample_creds(seed: u8) -> AuthenticationCreds {
    let pair = |offset: u8| KeyPair {
        public: Buffer::new(vec![seed.wrapping_add(offset); 32]),
        private: Buffer::new(vec![seed.wrapping_add(offset).wrapping_add(0x80); 32]),
    };
    AuthenticationCreds {
        noise_key: pair(1),
        pairing_ephemeral_key_pair: pair(2),
        signed_identity_key: pair(3),
        signed_pre_key: SignedKeyPair {
            key_pair: pair(4),
            signature: Buffer::new(vec![seed; 64]),
            key_id: 1,
            timestamp_s: None,
        },
        registration_id: u32::from(seed) + 1,
        adv_secret_key: format!("secret-{seed}"),
        processed_history_messages: Vec::new(),
        next_pre_key_id: 1,
        first_unuploaded_pre_key_id: 1,
        account_sync_counter: 0,
        account_settings: Default::default(),
        server_has_pre_keys: None,
        me: None,
        account: None,
        signal_identities: Vec::new(),
        my_app_state_key_id: None,
        last_account_sync_timestamp: None,
        platform: None,
        registered: false,
        extra: Default::default(),
    }
}

/// [`CredentialsFactory`] returning [`sample_creds`] for a fixed seed and
/// counting how often it was asked.
#[derive(Debug, Clone, Default)]
pub struct FixedCredentials {
    seed: u8,
    calls: Arc<AtomicUsize>,
}

impl FixedCredentials {
    /// Factory for `sample_creds(seed)`.
    #[must_use]
    pub fn new(seed: u8) -> Self {
        Self { seed, calls: Arc::default() }
    }

    /// Number of records generated so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CredentialsFactory for FixedCredentials {
    fn init_auth_creds(&self) -> AuthenticationCreds {
        self.calls.fetch_add(1, Ordering::SeqCst);
        sample_creds(self.seed)
    }
}
