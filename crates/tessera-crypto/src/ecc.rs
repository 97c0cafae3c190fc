//! Ed25519 signature context.
//!
//! A key id is the base64url-encoded public key (32 bytes, 43 characters,
//! no padding), so any party holding the public key can name it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::{CryptoRng, RngCore};
use tessera_common::{Error, ErrorCode, Result};

use crate::context::CryptoContext;
use crate::keys::SecretKey;

/// Generate a new random Ed25519 key pair.
pub fn generate_key_pair<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> (SigningKey, VerifyingKey) {
    let signing_key = SigningKey::generate(&mut &mut *rng);
    let verifying_key = signing_key.verifying_key();
    (signing_key, verifying_key)
}

/// Key id for a public key.
pub fn key_id(public_key: &VerifyingKey) -> String {
    URL_SAFE_NO_PAD.encode(public_key.as_bytes())
}

/// Parse a public key from raw bytes.
pub fn public_key_from_bytes(bytes: &[u8]) -> Result<VerifyingKey> {
    let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
        Error::crypto(
            ErrorCode::InvalidPublicKey,
            format!("invalid Ed25519 public key length: {}", bytes.len()),
        )
    })?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| Error::crypto(ErrorCode::InvalidPublicKey, e))
}

/// Ed25519 sign/verify context.
///
/// Encryption is the identity transform; ECC entity authentication provides
/// integrity only. Key wrapping is not supported.
pub struct EccCryptoContext {
    id: String,
    signing_key: Option<SigningKey>,
    verifying_key: Option<VerifyingKey>,
}

impl EccCryptoContext {
    /// If only the private key is given, the public key is derived from it.
    pub fn new(
        id: impl Into<String>,
        signing_key: Option<SigningKey>,
        verifying_key: Option<VerifyingKey>,
    ) -> Self {
        let verifying_key = verifying_key.or_else(|| signing_key.as_ref().map(SigningKey::verifying_key));
        Self {
            id: id.into(),
            signing_key,
            verifying_key,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl CryptoContext for EccCryptoContext {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn wrap(&self, _key: &SecretKey) -> Result<Vec<u8>> {
        Err(Error::crypto(ErrorCode::WrapNotSupported, format!("ECC context {}", self.id)))
    }

    fn unwrap(&self, _data: &[u8]) -> Result<SecretKey> {
        Err(Error::crypto(ErrorCode::UnwrapNotSupported, format!("ECC context {}", self.id)))
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let key = self.signing_key.as_ref().ok_or_else(|| {
            Error::crypto(ErrorCode::SignNotSupported, format!("no private key: {}", self.id))
        })?;
        Ok(key.sign(data).to_bytes().to_vec())
    }

    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool> {
        let key = self.verifying_key.as_ref().ok_or_else(|| {
            Error::crypto(ErrorCode::VerifyNotSupported, format!("no public key: {}", self.id))
        })?;
        let sig = match Signature::from_slice(signature) {
            Ok(s) => s,
            Err(_) => return Ok(false),
        };
        Ok(key.verify(data, &sig).is_ok())
    }
}
