//! Symmetric crypto context.
//!
//! Used for preshared keys and for master token session keys.
//!
//! # Wire Format
//!
//! Ciphertext and wrapped keys share one envelope:
//! ```text
//! [24 bytes: random XChaCha20 nonce] [ciphertext] [16 bytes: Poly1305 tag]
//! ```
//!
//! A fresh nonce per call makes encryption non-deterministic; callers must
//! never compare ciphertexts for equality.
//!
//! Signatures are HMAC-SHA256 over the data with the HMAC key.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    Key, XChaCha20Poly1305, XNonce,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tessera_common::{Error, ErrorCode, Result};

use crate::context::CryptoContext;
use crate::keys::SecretKey;
use crate::random::RandomSource;

type HmacSha256 = Hmac<Sha256>;

/// XChaCha20 nonce length.
const NONCE_LEN: usize = 24;

/// Encrypt with XChaCha20-Poly1305 under a nonce drawn from `random`.
pub(crate) fn seal(
    key: &SecretKey,
    plaintext: &[u8],
    code: ErrorCode,
    random: &RandomSource,
) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let mut nonce_bytes = [0u8; NONCE_LEN];
    random.fill_bytes(&mut nonce_bytes);
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| Error::crypto(code, "aead seal failed"))?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Reverse of [`seal`].
pub(crate) fn open(key: &SecretKey, blob: &[u8], code: ErrorCode) -> Result<Vec<u8>> {
    if blob.len() < NONCE_LEN {
        return Err(Error::crypto(code, "ciphertext envelope is too short"));
    }

    let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::crypto(code, "aead open failed"))
}

fn hmac(key: &SecretKey) -> Result<HmacSha256> {
    <HmacSha256 as Mac>::new_from_slice(key.as_bytes())
        .map_err(|e| Error::crypto(ErrorCode::InvalidSymmetricKey, e))
}

/// Symmetric crypto context.
///
/// Each key is optional so that, for example, a wrap-only context can be
/// built for key exchange.
pub struct SymmetricCryptoContext {
    id: String,
    encryption_key: Option<SecretKey>,
    hmac_key: Option<SecretKey>,
    wrapping_key: Option<SecretKey>,
    random: RandomSource,
}

impl SymmetricCryptoContext {
    pub fn new(
        id: impl Into<String>,
        encryption_key: Option<SecretKey>,
        hmac_key: Option<SecretKey>,
        wrapping_key: Option<SecretKey>,
    ) -> Self {
        Self {
            id: id.into(),
            encryption_key,
            hmac_key,
            wrapping_key,
            random: RandomSource::os(),
        }
    }

    /// Draw nonces from `random` instead of the OS generator.
    pub fn with_random(mut self, random: RandomSource) -> Self {
        self.random = random;
        self
    }

    /// Context that can only wrap and unwrap keys.
    pub fn wrap_only(id: impl Into<String>, wrapping_key: SecretKey) -> Self {
        Self::new(id, None, None, Some(wrapping_key))
    }

    /// Key set identifier.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl CryptoContext for SymmetricCryptoContext {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let key = self.encryption_key.as_ref().ok_or_else(|| {
            Error::crypto(ErrorCode::EncryptNotSupported, format!("no encryption key: {}", self.id))
        })?;
        seal(key, data, ErrorCode::EncryptError, &self.random)
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let key = self.encryption_key.as_ref().ok_or_else(|| {
            Error::crypto(ErrorCode::DecryptNotSupported, format!("no encryption key: {}", self.id))
        })?;
        open(key, data, ErrorCode::DecryptError)
    }

    fn wrap(&self, key: &SecretKey) -> Result<Vec<u8>> {
        let wrapping_key = self.wrapping_key.as_ref().ok_or_else(|| {
            Error::crypto(ErrorCode::WrapNotSupported, format!("no wrapping key: {}", self.id))
        })?;
        seal(wrapping_key, key.as_bytes(), ErrorCode::WrapError, &self.random)
    }

    fn unwrap(&self, data: &[u8]) -> Result<SecretKey> {
        let wrapping_key = self.wrapping_key.as_ref().ok_or_else(|| {
            Error::crypto(ErrorCode::UnwrapNotSupported, format!("no wrapping key: {}", self.id))
        })?;
        let bytes = open(wrapping_key, data, ErrorCode::UnwrapError)?;
        SecretKey::from_bytes(&bytes)
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let key = self.hmac_key.as_ref().ok_or_else(|| {
            Error::crypto(ErrorCode::SignNotSupported, format!("no HMAC key: {}", self.id))
        })?;
        let mut mac = hmac(key)?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool> {
        let key = self.hmac_key.as_ref().ok_or_else(|| {
            Error::crypto(ErrorCode::VerifyNotSupported, format!("no HMAC key: {}", self.id))
        })?;
        let mut mac = hmac(key)?;
        mac.update(data);
        Ok(mac.verify_slice(signature).is_ok())
    }
}
