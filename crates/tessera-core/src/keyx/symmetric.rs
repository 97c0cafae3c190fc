//! Symmetric wrapped key exchange.
//!
//! New session keys are wrapped either with the entity's preshared wrapping
//! key or with a key derived from the session of the master token the
//! request was sent under.
//!
//! # Wire Format
//!
//! ```text
//! request  keydata = { "keyid": "PSK" | "SESSION" }
//! response keydata = { "keyid", "encryptionkey": <bytes>, "hmackey": <bytes> }
//! ```

use std::fmt;
use std::sync::Arc;

use tessera_common::{Error, ErrorCode, Result};
use tessera_crypto::{derive_wrapping_key, CryptoContext, PresharedKeyStore, SymmetricCryptoContext};
use tracing::warn;

use crate::authutils::AuthenticationUtils;
use crate::context::MslContext;
use crate::keyx::{
    check_permitted, incorrect_request_type, incorrect_response_type, issue_master_token,
    KeyExchangeData, KeyExchangeEntity, KeyExchangeFactory, KeyExchangeScheme, KeyRequestData,
    KeyResponseData, ResponseKeyData,
};
use crate::object::MslObject;
use crate::tokens::{MasterToken, SessionCryptoContext};

const KEY_KEY_ID: &str = "keyid";
const KEY_ENCRYPTION_KEY: &str = "encryptionkey";
const KEY_HMAC_KEY: &str = "hmackey";

/// Which key wraps the new session keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyId {
    /// The entity's preshared wrapping key.
    Psk,
    /// A key derived from the current master token's session keys.
    Session,
}

impl KeyId {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Psk => "PSK",
            Self::Session => "SESSION",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "PSK" => Some(Self::Psk),
            "SESSION" => Some(Self::Session),
            _ => None,
        }
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn key_id_from_object(mo: &MslObject) -> Result<KeyId> {
    let name = mo.get_string(KEY_KEY_ID)?;
    KeyId::from_name(&name)
        .ok_or_else(|| Error::key_exchange(ErrorCode::UnidentifiedKeyxKeyId, &name))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymmetricWrappedRequestData {
    key_id: KeyId,
}

impl SymmetricWrappedRequestData {
    pub fn new(key_id: KeyId) -> Self {
        Self { key_id }
    }

    pub fn from_object(mo: &MslObject) -> Result<Self> {
        Ok(Self::new(key_id_from_object(mo)?))
    }

    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub fn to_object(&self) -> MslObject {
        let mut mo = MslObject::new();
        mo.put(KEY_KEY_ID, self.key_id.name());
        mo
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymmetricWrappedResponseData {
    key_id: KeyId,
    encryption_key: Vec<u8>,
    hmac_key: Vec<u8>,
}

impl SymmetricWrappedResponseData {
    pub fn new(key_id: KeyId, encryption_key: Vec<u8>, hmac_key: Vec<u8>) -> Self {
        Self {
            key_id,
            encryption_key,
            hmac_key,
        }
    }

    pub fn from_object(mo: &MslObject) -> Result<Self> {
        Ok(Self::new(
            key_id_from_object(mo)?,
            mo.get_bytes(KEY_ENCRYPTION_KEY)?,
            mo.get_bytes(KEY_HMAC_KEY)?,
        ))
    }

    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    /// Wrapped encryption key.
    pub fn encryption_key(&self) -> &[u8] {
        &self.encryption_key
    }

    /// Wrapped HMAC key.
    pub fn hmac_key(&self) -> &[u8] {
        &self.hmac_key
    }

    pub fn to_object(&self) -> MslObject {
        let mut mo = MslObject::new();
        mo.put(KEY_KEY_ID, self.key_id.name());
        mo.put_bytes(KEY_ENCRYPTION_KEY, &self.encryption_key);
        mo.put_bytes(KEY_HMAC_KEY, &self.hmac_key);
        mo
    }
}

pub struct SymmetricWrappedExchange {
    store: Arc<dyn PresharedKeyStore>,
    utils: Arc<dyn AuthenticationUtils>,
}

impl SymmetricWrappedExchange {
    pub fn new(store: Arc<dyn PresharedKeyStore>, utils: Arc<dyn AuthenticationUtils>) -> Self {
        Self { store, utils }
    }

    /// Wrapping context for `key_id`. The session key id needs a decrypted
    /// master token.
    fn wrap_context(
        &self,
        ctx: &MslContext,
        key_id: KeyId,
        identity: &str,
        entity: KeyExchangeEntity<'_>,
    ) -> Result<SymmetricCryptoContext> {
        match key_id {
            KeyId::Psk => {
                let keys = self.store.keys(identity).ok_or_else(|| {
                    warn!(identity, "no preshared keys for key exchange");
                    Error::key_exchange(ErrorCode::KeyxPresharedKeysNotFound, identity)
                })?;
                Ok(SymmetricCryptoContext::wrap_only(identity, keys.wrapping_key)
                    .with_random(ctx.random().clone()))
            }
            KeyId::Session => {
                let master_token = entity.master_token().ok_or_else(|| {
                    Error::key_exchange(ErrorCode::KeyxMasterTokenMissing, key_id)
                })?;
                let (Some(encryption_key), Some(hmac_key)) =
                    (master_token.encryption_key(), master_token.hmac_key())
                else {
                    return Err(Error::master_token(
                        ErrorCode::MasterTokenUntrusted,
                        format!("master token {master_token} is not decrypted"),
                    ));
                };
                let wrapping_key = derive_wrapping_key(encryption_key, hmac_key)?;
                Ok(SymmetricCryptoContext::wrap_only(
                    format!("{identity}_{}", master_token.sequence_number()),
                    wrapping_key,
                )
                .with_random(ctx.random().clone()))
            }
        }
    }
}

impl KeyExchangeFactory for SymmetricWrappedExchange {
    fn scheme(&self) -> KeyExchangeScheme {
        KeyExchangeScheme::SymmetricWrapped
    }

    fn create_request_data(&self, _ctx: &MslContext, key_data: &MslObject) -> Result<KeyRequestData> {
        Ok(KeyRequestData::SymmetricWrapped(
            SymmetricWrappedRequestData::from_object(key_data)?,
        ))
    }

    fn create_response_data(
        &self,
        _ctx: &MslContext,
        master_token: &MasterToken,
        key_data: &MslObject,
    ) -> Result<KeyResponseData> {
        Ok(KeyResponseData::new(
            master_token.clone(),
            ResponseKeyData::SymmetricWrapped(SymmetricWrappedResponseData::from_object(key_data)?),
        ))
    }

    fn generate_response(
        &self,
        ctx: &MslContext,
        request: &KeyRequestData,
        entity: KeyExchangeEntity<'_>,
    ) -> Result<KeyExchangeData> {
        let KeyRequestData::SymmetricWrapped(request) = request else {
            return Err(incorrect_request_type(self.scheme(), request));
        };
        let identity = check_permitted(self.utils.as_ref(), entity, self.scheme())?;
        let wrap = self.wrap_context(ctx, request.key_id(), &identity, entity)?;

        let encryption_key = ctx.generate_secret_key();
        let hmac_key = ctx.generate_secret_key();
        let wrapped_encryption_key = wrap.wrap(&encryption_key)?;
        let wrapped_hmac_key = wrap.wrap(&hmac_key)?;

        let master_token = issue_master_token(ctx, entity, encryption_key, hmac_key)?;
        let crypto_context = SessionCryptoContext::from_master_token(ctx, &master_token)?;

        let key_data =
            SymmetricWrappedResponseData::new(request.key_id(), wrapped_encryption_key, wrapped_hmac_key);
        Ok(KeyExchangeData {
            response: KeyResponseData::new(master_token, ResponseKeyData::SymmetricWrapped(key_data)),
            crypto_context: Box::new(crypto_context),
        })
    }

    fn crypto_context(
        &self,
        ctx: &MslContext,
        request: &KeyRequestData,
        response: &KeyResponseData,
        entity: KeyExchangeEntity<'_>,
    ) -> Result<Box<dyn CryptoContext>> {
        let KeyRequestData::SymmetricWrapped(request) = request else {
            return Err(incorrect_request_type(self.scheme(), request));
        };
        let ResponseKeyData::SymmetricWrapped(key_data) = response.key_data() else {
            return Err(incorrect_response_type(self.scheme(), response));
        };

        if request.key_id() != key_data.key_id() {
            return Err(Error::key_exchange(
                ErrorCode::KeyxResponseRequestMismatch,
                format!("request {}; response {}", request.key_id(), key_data.key_id()),
            ));
        }

        let identity = entity.identity()?;
        let unwrap = self.wrap_context(ctx, key_data.key_id(), &identity, entity)?;
        let encryption_key = unwrap.unwrap(key_data.encryption_key())?;
        let hmac_key = unwrap.unwrap(key_data.hmac_key())?;

        Ok(Box::new(SessionCryptoContext::with_keys(
            ctx,
            response.master_token(),
            &identity,
            encryption_key,
            hmac_key,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_id_names() {
        assert_eq!(KeyId::from_name("PSK"), Some(KeyId::Psk));
        assert_eq!(KeyId::from_name("SESSION"), Some(KeyId::Session));
        assert_eq!(KeyId::from_name("psk"), None);
    }

    #[test]
    fn test_unidentified_key_id() {
        let mut mo = MslObject::new();
        mo.put(KEY_KEY_ID, "x");
        let err = SymmetricWrappedRequestData::from_object(&mo).unwrap_err();
        assert!(matches!(err, Error::KeyExchange(ErrorCode::UnidentifiedKeyxKeyId, _)));
    }
}
