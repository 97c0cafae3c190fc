//! Crypto context bound to a master token's session keys.

use tessera_common::{Error, ErrorCode, Result};
use tessera_crypto::{CryptoContext, SecretKey, SymmetricCryptoContext};

use crate::context::MslContext;
use crate::tokens::MasterToken;

pub struct SessionCryptoContext {
    inner: SymmetricCryptoContext,
}

impl SessionCryptoContext {
    /// Context from the keys inside a decrypted master token.
    pub fn from_master_token(ctx: &MslContext, master_token: &MasterToken) -> Result<Self> {
        let (Some(identity), Some(encryption_key), Some(hmac_key)) = (
            master_token.identity(),
            master_token.encryption_key(),
            master_token.hmac_key(),
        ) else {
            return Err(Error::master_token(
                ErrorCode::MasterTokenUntrusted,
                format!("master token {master_token} is not decrypted"),
            ));
        };
        Ok(Self::with_keys(
            ctx,
            master_token,
            identity,
            encryption_key.clone(),
            hmac_key.clone(),
        ))
    }

    /// Context from keys obtained elsewhere, typically by a client from a
    /// key exchange, for a master token it cannot decrypt.
    pub fn with_keys(
        ctx: &MslContext,
        master_token: &MasterToken,
        identity: &str,
        encryption_key: SecretKey,
        hmac_key: SecretKey,
    ) -> Self {
        let id = format!("{identity}_{}", master_token.sequence_number());
        Self {
            inner: SymmetricCryptoContext::new(id, Some(encryption_key), Some(hmac_key), None)
                .with_random(ctx.random().clone()),
        }
    }

    pub fn id(&self) -> &str {
        self.inner.id()
    }
}

impl CryptoContext for SessionCryptoContext {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.inner.encrypt(data)
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.inner.decrypt(data)
    }

    fn wrap(&self, key: &SecretKey) -> Result<Vec<u8>> {
        self.inner.wrap(key)
    }

    fn unwrap(&self, data: &[u8]) -> Result<SecretKey> {
        self.inner.unwrap(data)
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.inner.sign(data)
    }

    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool> {
        self.inner.verify(data, signature)
    }
}
