//! Contexts for parties without key material.

use tessera_common::{Error, ErrorCode, Result};

use crate::context::CryptoContext;
use crate::keys::SecretKey;

/// Performs no cryptography at all.
///
/// Encrypt, decrypt, wrap and unwrap return their input, signatures are
/// empty and every signature verifies. Only for unauthenticated entities.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCryptoContext;

impl CryptoContext for NullCryptoContext {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn wrap(&self, key: &SecretKey) -> Result<Vec<u8>> {
        Ok(key.as_bytes().to_vec())
    }

    fn unwrap(&self, data: &[u8]) -> Result<SecretKey> {
        SecretKey::from_bytes(data)
    }

    fn sign(&self, _data: &[u8]) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    fn verify(&self, _data: &[u8], _signature: &[u8]) -> Result<bool> {
        Ok(true)
    }
}

/// Context a client uses for tokens it cannot decrypt.
///
/// Token data is carried through unchanged so it can be returned to the
/// issuer, but nothing can be signed and no signature verifies.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClientTokenCryptoContext;

impl CryptoContext for ClientTokenCryptoContext {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn wrap(&self, _key: &SecretKey) -> Result<Vec<u8>> {
        Err(Error::crypto(ErrorCode::WrapNotSupported, "client token context"))
    }

    fn unwrap(&self, _data: &[u8]) -> Result<SecretKey> {
        Err(Error::crypto(ErrorCode::UnwrapNotSupported, "client token context"))
    }

    fn sign(&self, _data: &[u8]) -> Result<Vec<u8>> {
        Err(Error::crypto(ErrorCode::SignNotSupported, "client token context"))
    }

    fn verify(&self, _data: &[u8], _signature: &[u8]) -> Result<bool> {
        Ok(false)
    }
}
