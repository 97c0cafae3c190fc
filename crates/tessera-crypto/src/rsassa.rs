//! RSASSA-PKCS1-v1_5 (SHA-256) signature context.

use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tessera_common::{Error, ErrorCode, Result};

use crate::context::CryptoContext;
use crate::keys::SecretKey;

/// Parse an RSA public key from SPKI DER.
pub fn public_key_from_der(der: &[u8]) -> Result<RsaPublicKey> {
    RsaPublicKey::from_public_key_der(der).map_err(|e| Error::crypto(ErrorCode::InvalidPublicKey, e))
}

/// Encode an RSA public key as SPKI DER.
pub fn public_key_to_der(key: &RsaPublicKey) -> Result<Vec<u8>> {
    key.to_public_key_der()
        .map(|doc| doc.into_vec())
        .map_err(|e| Error::crypto(ErrorCode::InvalidPublicKey, e))
}

/// RSA sign/verify context.
///
/// Like the ECC context, encryption is the identity transform and wrapping
/// is unsupported.
pub struct RsaCryptoContext {
    id: String,
    signing_key: Option<SigningKey<Sha256>>,
    verifying_key: Option<VerifyingKey<Sha256>>,
}

impl RsaCryptoContext {
    /// If only the private key is given, the public key is derived from it.
    pub fn new(
        id: impl Into<String>,
        private_key: Option<RsaPrivateKey>,
        public_key: Option<RsaPublicKey>,
    ) -> Self {
        let public_key = public_key.or_else(|| private_key.as_ref().map(RsaPublicKey::from));
        Self {
            id: id.into(),
            signing_key: private_key.map(SigningKey::<Sha256>::new),
            verifying_key: public_key.map(VerifyingKey::<Sha256>::new),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl CryptoContext for RsaCryptoContext {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn wrap(&self, _key: &SecretKey) -> Result<Vec<u8>> {
        Err(Error::crypto(ErrorCode::WrapNotSupported, format!("RSA context {}", self.id)))
    }

    fn unwrap(&self, _data: &[u8]) -> Result<SecretKey> {
        Err(Error::crypto(ErrorCode::UnwrapNotSupported, format!("RSA context {}", self.id)))
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let key = self.signing_key.as_ref().ok_or_else(|| {
            Error::crypto(ErrorCode::SignNotSupported, format!("no private key: {}", self.id))
        })?;
        let signature = key
            .try_sign(data)
            .map_err(|e| Error::crypto(ErrorCode::SignatureError, e))?;
        Ok(signature.to_vec())
    }

    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool> {
        let key = self.verifying_key.as_ref().ok_or_else(|| {
            Error::crypto(ErrorCode::VerifyNotSupported, format!("no public key: {}", self.id))
        })?;
        let sig = match Signature::try_from(signature) {
            Ok(s) => s,
            Err(_) => return Ok(false),
        };
        Ok(key.verify(data, &sig).is_ok())
    }
}
