//! The crypto context capability contract.

use tessera_common::Result;

use crate::keys::SecretKey;

/// Uniform encrypt/decrypt/sign/verify/wrap/unwrap capability bound to
/// specific key material.
///
/// Every method fails with [`tessera_common::Error::Crypto`] when the key
/// material it needs is absent or malformed, or when the operation is not
/// supported for the context's role.
pub trait CryptoContext: Send + Sync {
    /// Encrypt plaintext.
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt ciphertext produced by [`CryptoContext::encrypt`].
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Wrap a secret key for transport.
    fn wrap(&self, key: &SecretKey) -> Result<Vec<u8>>;

    /// Recover a secret key from [`CryptoContext::wrap`] output.
    fn unwrap(&self, data: &[u8]) -> Result<SecretKey>;

    /// Compute a signature (or MAC) over data.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Check a signature over data.
    ///
    /// A signature that does not match is `Ok(false)`; `Err` is reserved for
    /// contexts that cannot verify at all.
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool>;
}
