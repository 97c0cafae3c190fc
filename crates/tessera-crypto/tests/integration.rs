//! Integration tests for crypto contexts resolved from key stores.

use std::sync::Arc;

use rand::rngs::OsRng;
use tessera_crypto::{
    agreement, ecc, CryptoContext, EccCryptoContext, EccStore, KeySet, MemoryEccStore,
    MemoryPresharedKeyStore, PresharedKeyStore, SecretKey, SymmetricCryptoContext,
};

/// Both ends of a preshared-key relationship build equivalent contexts
#[test]
fn test_preshared_contexts_interoperate() {
    let keys = KeySet::generate(&mut OsRng);
    let issuer_store = MemoryPresharedKeyStore::new();
    let device_store = MemoryPresharedKeyStore::new();
    issuer_store.add_keys("device-7", keys.clone());
    device_store.add_keys("device-7", keys);

    let context_for = |store: &MemoryPresharedKeyStore| {
        let keys = store.keys("device-7").unwrap();
        SymmetricCryptoContext::new(
            "device-7",
            Some(keys.encryption_key),
            Some(keys.hmac_key),
            Some(keys.wrapping_key),
        )
    };
    let issuer = context_for(&issuer_store);
    let device = context_for(&device_store);

    let ciphertext = device.encrypt(b"session request").unwrap();
    assert_eq!(issuer.decrypt(&ciphertext).unwrap(), b"session request");

    let signature = issuer.sign(&ciphertext).unwrap();
    assert!(device.verify(&ciphertext, &signature).unwrap());

    let session_key = SecretKey::generate(&mut OsRng);
    let wrapped = issuer.wrap(&session_key).unwrap();
    assert_eq!(device.unwrap(&wrapped).unwrap(), session_key);
}

/// A verifier holding only the public half accepts the signer's signatures
#[test]
fn test_ecc_contexts_from_store() {
    let (signing_key, verifying_key) = ecc::generate_key_pair(&mut OsRng);
    let id = ecc::key_id(&verifying_key);

    let local: Arc<MemoryEccStore> = Arc::new(MemoryEccStore::new());
    local.add_key_pair(id.clone(), verifying_key, signing_key);
    let remote = MemoryEccStore::new();
    remote.add_public_key(id.clone(), verifying_key);

    let signer = EccCryptoContext::new(&id, local.private_key(&id), None);
    let verifier = EccCryptoContext::new(&id, None, remote.public_key(&id));

    let signature = signer.sign(b"entity auth").unwrap();
    assert!(verifier.verify(b"entity auth", &signature).unwrap());
    assert!(verifier.sign(b"entity auth").is_err());
}

/// Shared secrets from Diffie-Hellman drive symmetric session contexts
#[test]
fn test_agreement_feeds_symmetric_context() {
    let (a_secret, a_public) = agreement::generate_key_pair(&mut OsRng);
    let (b_secret, b_public) = agreement::generate_key_pair(&mut OsRng);

    let (a_enc, a_mac) =
        agreement::derive_session_keys(&agreement::agree(&a_secret, &b_public).unwrap(), b"mt")
            .unwrap();
    let (b_enc, b_mac) =
        agreement::derive_session_keys(&agreement::agree(&b_secret, &a_public).unwrap(), b"mt")
            .unwrap();

    let a = SymmetricCryptoContext::new("a", Some(a_enc), Some(a_mac), None);
    let b = SymmetricCryptoContext::new("b", Some(b_enc), Some(b_mac), None);

    let ciphertext = a.encrypt(b"hello").unwrap();
    assert_eq!(b.decrypt(&ciphertext).unwrap(), b"hello");
}
