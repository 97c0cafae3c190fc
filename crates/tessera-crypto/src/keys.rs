//! Symmetric key material.

use std::fmt;

use rand::RngCore;
use tessera_common::helpers::constant_time_eq;
use tessera_common::{Error, ErrorCode, Result};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length in bytes of every symmetric key (encryption, HMAC, wrapping).
pub const SECRET_KEY_LEN: usize = 32;

/// 256-bit symmetric key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; SECRET_KEY_LEN]);

impl SecretKey {
    /// Generate a fresh key from the given random source.
    pub fn generate<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; SECRET_KEY_LEN];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw key bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; SECRET_KEY_LEN] = bytes.try_into().map_err(|_| {
            Error::crypto(
                ErrorCode::InvalidSymmetricKey,
                format!("expected {SECRET_KEY_LEN} bytes, got {}", bytes.len()),
            )
        })?;
        Ok(Self(bytes))
    }

    /// Get the raw key bytes.
    ///
    /// # Security
    /// Handle with care! Never log these bytes.
    pub fn as_bytes(&self) -> &[u8; SECRET_KEY_LEN] {
        &self.0
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(&self.0, &other.0)
    }
}

impl Eq for SecretKey {}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Preshared key set for one entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeySet {
    pub encryption_key: SecretKey,
    pub hmac_key: SecretKey,
    pub wrapping_key: SecretKey,
}

impl KeySet {
    pub fn new(encryption_key: SecretKey, hmac_key: SecretKey, wrapping_key: SecretKey) -> Self {
        Self {
            encryption_key,
            hmac_key,
            wrapping_key,
        }
    }

    /// Generate three independent keys.
    pub fn generate<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        Self {
            encryption_key: SecretKey::generate(rng),
            hmac_key: SecretKey::generate(rng),
            wrapping_key: SecretKey::generate(rng),
        }
    }
}
