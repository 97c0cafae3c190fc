//! Key stores consulted by entity authentication and key exchange.
//!
//! Stores are shared between authentication factories and may be updated
//! while requests are in flight, so the in-memory implementations use
//! interior locking and hand out clones.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use ed25519_dalek::{SigningKey, VerifyingKey};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::keys::KeySet;

/// Preshared key sets by entity identity.
pub trait PresharedKeyStore: Send + Sync {
    /// Key set for an identity, if one is provisioned.
    fn keys(&self, identity: &str) -> Option<KeySet>;
}

/// RSA keys by key pair id.
pub trait RsaStore: Send + Sync {
    fn identities(&self) -> HashSet<String>;
    fn public_key(&self, id: &str) -> Option<RsaPublicKey>;
    fn private_key(&self, id: &str) -> Option<RsaPrivateKey>;
}

/// Ed25519 keys by key pair id.
pub trait EccStore: Send + Sync {
    fn identities(&self) -> HashSet<String>;
    fn public_key(&self, id: &str) -> Option<VerifyingKey>;
    fn private_key(&self, id: &str) -> Option<SigningKey>;
}

/// In-memory [`PresharedKeyStore`].
#[derive(Default)]
pub struct MemoryPresharedKeyStore {
    keys: RwLock<HashMap<String, KeySet>>,
}

impl MemoryPresharedKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision keys for an identity, replacing any existing set.
    pub fn add_keys(&self, identity: impl Into<String>, keys: KeySet) {
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.into(), keys);
    }

    pub fn remove(&self, identity: &str) -> Option<KeySet> {
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identity)
    }

    pub fn clear(&self) {
        self.keys.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl PresharedKeyStore for MemoryPresharedKeyStore {
    fn keys(&self, identity: &str) -> Option<KeySet> {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .cloned()
    }
}

/// In-memory asymmetric key store.
///
/// Public and private halves are stored separately: a verifier typically
/// holds only public keys, while a key pair id that also has a private key
/// is the local entity's own identity.
pub struct MemoryKeyStore<P, S> {
    public_keys: RwLock<HashMap<String, P>>,
    private_keys: RwLock<HashMap<String, S>>,
}

impl<P, S> Default for MemoryKeyStore<P, S> {
    fn default() -> Self {
        Self {
            public_keys: RwLock::new(HashMap::new()),
            private_keys: RwLock::new(HashMap::new()),
        }
    }
}

impl<P: Clone, S: Clone> MemoryKeyStore<P, S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_public_key(&self, id: impl Into<String>, key: P) {
        self.public_keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.into(), key);
    }

    pub fn add_private_key(&self, id: impl Into<String>, key: S) {
        self.private_keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.into(), key);
    }

    pub fn add_key_pair(&self, id: impl Into<String>, public_key: P, private_key: S) {
        let id = id.into();
        self.add_public_key(id.clone(), public_key);
        self.add_private_key(id, private_key);
    }

    pub fn clear(&self) {
        self.public_keys.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.private_keys.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn all_ids(&self) -> HashSet<String> {
        let mut ids: HashSet<String> = self
            .public_keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.extend(
            self.private_keys
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .keys()
                .cloned(),
        );
        ids
    }

    fn get_public(&self, id: &str) -> Option<P> {
        self.public_keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn get_private(&self, id: &str) -> Option<S> {
        self.private_keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }
}

pub type MemoryRsaStore = MemoryKeyStore<RsaPublicKey, RsaPrivateKey>;
pub type MemoryEccStore = MemoryKeyStore<VerifyingKey, SigningKey>;

impl RsaStore for MemoryRsaStore {
    fn identities(&self) -> HashSet<String> {
        self.all_ids()
    }

    fn public_key(&self, id: &str) -> Option<RsaPublicKey> {
        self.get_public(id)
    }

    fn private_key(&self, id: &str) -> Option<RsaPrivateKey> {
        self.get_private(id)
    }
}

impl EccStore for MemoryEccStore {
    fn identities(&self) -> HashSet<String> {
        self.all_ids()
    }

    fn public_key(&self, id: &str) -> Option<VerifyingKey> {
        self.get_public(id)
    }

    fn private_key(&self, id: &str) -> Option<SigningKey> {
        self.get_private(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecc::generate_key_pair;
    use rand::rngs::OsRng;

    #[test]
    fn test_preshared_store() {
        let store = MemoryPresharedKeyStore::new();
        let keys = KeySet::generate(&mut OsRng);
        store.add_keys("device-1", keys.clone());

        assert_eq!(store.keys("device-1"), Some(keys));
        assert!(store.keys("device-2").is_none());

        store.remove("device-1");
        assert!(store.keys("device-1").is_none());
    }

    #[test]
    fn test_ecc_store_halves_are_independent() {
        let store = MemoryEccStore::new();
        let (signing_key, verifying_key) = generate_key_pair(&mut OsRng);
        store.add_public_key("remote", verifying_key);
        store.add_key_pair("local", verifying_key, signing_key);

        assert!(store.private_key("remote").is_none());
        assert!(store.private_key("local").is_some());
        assert_eq!(store.public_key("remote"), Some(verifying_key));

        let ids = store.identities();
        assert!(ids.contains("remote") && ids.contains("local"));

        store.clear();
        assert!(store.identities().is_empty());
    }
}
