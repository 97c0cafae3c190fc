//! Cryptographic capability contexts for Tessera.
//!
//! This crate provides:
//! - The [`CryptoContext`] contract every token, authentication scheme and
//!   key exchange relies on
//! - Symmetric contexts (XChaCha20-Poly1305 + HMAC-SHA256) for preshared and
//!   session keys
//! - Ed25519 and RSA signature contexts resolved from key stores
//! - X25519 key wrapping and session-key derivation for key exchange
//! - Null and client-token contexts for parties without key material
//! - A shared [`RandomSource`] for nonces and generated keys
//!
//! # Design
//!
//! A context is bound to specific key material at construction and may be
//! asymmetric in capability: a context holding only a remote party's public
//! key can verify but not sign. Unsupported operations fail with a crypto
//! error naming the operation rather than silently succeeding.

#![forbid(unsafe_code)]

pub mod agreement;
pub mod context;
pub mod ecc;
pub mod keys;
pub mod null;
pub mod random;
pub mod rsassa;
pub mod store;
pub mod symmetric;

pub use agreement::{derive_session_keys, derive_wrapping_key, EciesCryptoContext};
pub use context::CryptoContext;
pub use ecc::EccCryptoContext;
pub use keys::{KeySet, SecretKey};
pub use null::{ClientTokenCryptoContext, NullCryptoContext};
pub use random::{RandomSource, SecureRandom};
pub use rsassa::RsaCryptoContext;
pub use store::{
    EccStore, MemoryEccStore, MemoryKeyStore, MemoryPresharedKeyStore, MemoryRsaStore,
    PresharedKeyStore, RsaStore,
};
pub use symmetric::SymmetricCryptoContext;
