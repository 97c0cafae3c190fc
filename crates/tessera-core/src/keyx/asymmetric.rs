//! Asymmetric wrapped key exchange.
//!
//! The requester generates an ephemeral X25519 key pair and sends the public
//! half. The responder wraps the new session keys to it.
//!
//! # Wire Format
//!
//! ```text
//! request  keydata = { "keypairid", "mechanism", "publickey": <bytes> }
//! response keydata = { "keypairid", "encryptionkey": <bytes>, "hmackey": <bytes> }
//! ```

use std::fmt;
use std::sync::Arc;

use tessera_common::{Error, ErrorCode, Result};
use tessera_crypto::agreement::{self, public_key_from_bytes};
use tessera_crypto::{CryptoContext, EciesCryptoContext};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::authutils::AuthenticationUtils;
use crate::context::MslContext;
use crate::keyx::{
    check_permitted, incorrect_request_type, incorrect_response_type, issue_master_token,
    KeyExchangeData, KeyExchangeEntity, KeyExchangeFactory, KeyExchangeScheme, KeyRequestData,
    KeyResponseData, ResponseKeyData,
};
use crate::object::MslObject;
use crate::tokens::{MasterToken, SessionCryptoContext};

const KEY_KEY_PAIR_ID: &str = "keypairid";
const KEY_MECHANISM: &str = "mechanism";
const KEY_PUBLIC_KEY: &str = "publickey";
const KEY_ENCRYPTION_KEY: &str = "encryptionkey";
const KEY_HMAC_KEY: &str = "hmackey";

/// Key wrapping mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mechanism {
    /// X25519 agreement with an ephemeral responder key, then AEAD.
    Ecc,
}

impl Mechanism {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ecc => "ECC",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ECC" => Some(Self::Ecc),
            _ => None,
        }
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The private key never leaves the requester: it is not encoded and takes
/// no part in equality.
#[derive(Clone)]
pub struct AsymmetricWrappedRequestData {
    key_pair_id: String,
    mechanism: Mechanism,
    public_key: PublicKey,
    private_key: Option<StaticSecret>,
}

impl AsymmetricWrappedRequestData {
    pub fn new(
        key_pair_id: impl Into<String>,
        mechanism: Mechanism,
        public_key: PublicKey,
        private_key: Option<StaticSecret>,
    ) -> Self {
        Self {
            key_pair_id: key_pair_id.into(),
            mechanism,
            public_key,
            private_key,
        }
    }

    /// Request with a fresh key pair drawn from the context's random source.
    pub fn generate(ctx: &MslContext, key_pair_id: impl Into<String>) -> Self {
        let (private_key, public_key) = ctx.random().with(|rng| agreement::generate_key_pair(rng));
        Self::new(key_pair_id, Mechanism::Ecc, public_key, Some(private_key))
    }

    pub fn from_object(mo: &MslObject) -> Result<Self> {
        let key_pair_id = mo.get_string(KEY_KEY_PAIR_ID)?;
        let mechanism_name = mo.get_string(KEY_MECHANISM)?;
        let public_key_bytes = mo.get_bytes(KEY_PUBLIC_KEY)?;

        let mechanism = Mechanism::from_name(&mechanism_name).ok_or_else(|| {
            Error::key_exchange(ErrorCode::UnidentifiedKeyxMechanism, &mechanism_name)
        })?;
        let public_key = public_key_from_bytes(&public_key_bytes)
            .map_err(|e| Error::key_exchange(ErrorCode::KeyxInvalidPublicKey, e))?;

        Ok(Self::new(key_pair_id, mechanism, public_key, None))
    }

    pub fn key_pair_id(&self) -> &str {
        &self.key_pair_id
    }

    pub fn mechanism(&self) -> Mechanism {
        self.mechanism
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn private_key(&self) -> Option<&StaticSecret> {
        self.private_key.as_ref()
    }

    pub fn to_object(&self) -> MslObject {
        let mut mo = MslObject::new();
        mo.put(KEY_KEY_PAIR_ID, self.key_pair_id.as_str());
        mo.put(KEY_MECHANISM, self.mechanism.name());
        mo.put_bytes(KEY_PUBLIC_KEY, self.public_key.as_bytes());
        mo
    }
}

impl PartialEq for AsymmetricWrappedRequestData {
    fn eq(&self, other: &Self) -> bool {
        self.key_pair_id == other.key_pair_id
            && self.mechanism == other.mechanism
            && self.public_key == other.public_key
    }
}

impl Eq for AsymmetricWrappedRequestData {}

impl fmt::Debug for AsymmetricWrappedRequestData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsymmetricWrappedRequestData")
            .field("key_pair_id", &self.key_pair_id)
            .field("mechanism", &self.mechanism)
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsymmetricWrappedResponseData {
    key_pair_id: String,
    encryption_key: Vec<u8>,
    hmac_key: Vec<u8>,
}

impl AsymmetricWrappedResponseData {
    pub fn new(key_pair_id: impl Into<String>, encryption_key: Vec<u8>, hmac_key: Vec<u8>) -> Self {
        Self {
            key_pair_id: key_pair_id.into(),
            encryption_key,
            hmac_key,
        }
    }

    pub fn from_object(mo: &MslObject) -> Result<Self> {
        Ok(Self::new(
            mo.get_string(KEY_KEY_PAIR_ID)?,
            mo.get_bytes(KEY_ENCRYPTION_KEY)?,
            mo.get_bytes(KEY_HMAC_KEY)?,
        ))
    }

    pub fn key_pair_id(&self) -> &str {
        &self.key_pair_id
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
        mo.put(KEY_KEY_PAIR_ID, self.key_pair_id.as_str());
        mo.put_bytes(KEY_ENCRYPTION_KEY, &self.encryption_key);
        mo.put_bytes(KEY_HMAC_KEY, &self.hmac_key);
        mo
    }
}

pub struct AsymmetricWrappedExchange {
    utils: Arc<dyn AuthenticationUtils>,
}

impl AsymmetricWrappedExchange {
    pub fn new(utils: Arc<dyn AuthenticationUtils>) -> Self {
        Self { utils }
    }
}

impl KeyExchangeFactory for AsymmetricWrappedExchange {
    fn scheme(&self) -> KeyExchangeScheme {
        KeyExchangeScheme::AsymmetricWrapped
    }

    fn create_request_data(&self, _ctx: &MslContext, key_data: &MslObject) -> Result<KeyRequestData> {
        Ok(KeyRequestData::AsymmetricWrapped(
            AsymmetricWrappedRequestData::from_object(key_data)?,
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
            ResponseKeyData::AsymmetricWrapped(AsymmetricWrappedResponseData::from_object(key_data)?),
        ))
    }

    fn generate_response(
        &self,
        ctx: &MslContext,
        request: &KeyRequestData,
        entity: KeyExchangeEntity<'_>,
    ) -> Result<KeyExchangeData> {
        let KeyRequestData::AsymmetricWrapped(request) = request else {
            return Err(incorrect_request_type(self.scheme(), request));
        };
        check_permitted(self.utils.as_ref(), entity, self.scheme())?;

        let encryption_key = ctx.generate_secret_key();
        let hmac_key = ctx.generate_secret_key();

        let wrap = EciesCryptoContext::new(request.key_pair_id(), None, Some(*request.public_key()))
            .with_random(ctx.random().clone());
        let wrapped_encryption_key = wrap.wrap(&encryption_key)?;
        let wrapped_hmac_key = wrap.wrap(&hmac_key)?;

        let master_token = issue_master_token(ctx, entity, encryption_key, hmac_key)?;
        let crypto_context = SessionCryptoContext::from_master_token(ctx, &master_token)?;

        let key_data = AsymmetricWrappedResponseData::new(
            request.key_pair_id(),
            wrapped_encryption_key,
            wrapped_hmac_key,
        );
        Ok(KeyExchangeData {
            response: KeyResponseData::new(master_token, ResponseKeyData::AsymmetricWrapped(key_data)),
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
        let KeyRequestData::AsymmetricWrapped(request) = request else {
            return Err(incorrect_request_type(self.scheme(), request));
        };
        let ResponseKeyData::AsymmetricWrapped(key_data) = response.key_data() else {
            return Err(incorrect_response_type(self.scheme(), response));
        };

        if request.key_pair_id() != key_data.key_pair_id() {
            return Err(Error::key_exchange(
                ErrorCode::KeyxResponseRequestMismatch,
                format!(
                    "request {}; response {}",
                    request.key_pair_id(),
                    key_data.key_pair_id()
                ),
            ));
        }
        let private_key = request.private_key().cloned().ok_or_else(|| {
            Error::key_exchange(ErrorCode::KeyxPrivateKeyMissing, request.key_pair_id())
        })?;
        let identity = entity.identity()?;

        let unwrap = EciesCryptoContext::new(request.key_pair_id(), Some(private_key), None);
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
