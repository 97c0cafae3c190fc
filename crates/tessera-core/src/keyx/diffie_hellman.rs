//! Diffie-Hellman key exchange over X25519.
//!
//! Both sides contribute a public key; the session keys are derived from the
//! shared secret and never travel on the wire. The parameters id names the
//! agreement group and must be one the factory accepts.
//!
//! # Wire Format
//!
//! ```text
//! request  keydata = { "parametersid", "publickey": <bytes> }
//! response keydata = { "parametersid", "publickey": <bytes> }
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tessera_common::{Error, ErrorCode, Result};
use tessera_crypto::agreement::{self, public_key_from_bytes};
use tessera_crypto::{derive_session_keys, CryptoContext, SecretKey};
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

const KEY_PARAMETERS_ID: &str = "parametersid";
const KEY_PUBLIC_KEY: &str = "publickey";

/// Parameters id accepted by [`DiffieHellmanExchange::new`].
pub const X25519_PARAMETERS_ID: &str = "X25519";

fn public_key_from_object(mo: &MslObject) -> Result<PublicKey> {
    let bytes = mo.get_bytes(KEY_PUBLIC_KEY)?;
    public_key_from_bytes(&bytes).map_err(|e| Error::key_exchange(ErrorCode::KeyxInvalidPublicKey, e))
}

/// Session keys from both public keys, bound to the exchange transcript.
fn session_keys(
    private_key: &StaticSecret,
    peer: &PublicKey,
    request_public_key: &PublicKey,
    response_public_key: &PublicKey,
) -> Result<(SecretKey, SecretKey)> {
    let shared = agreement::agree(private_key, peer)
        .map_err(|e| Error::key_exchange(ErrorCode::KeyxInvalidPublicKey, e))?;
    let mut info = Vec::with_capacity(64);
    info.extend_from_slice(request_public_key.as_bytes());
    info.extend_from_slice(response_public_key.as_bytes());
    derive_session_keys(&shared, &info)
}

/// The private key stays with the requester: it is not encoded and takes
/// no part in equality.
#[derive(Clone)]
pub struct DiffieHellmanRequestData {
    parameters_id: String,
    public_key: PublicKey,
    private_key: Option<StaticSecret>,
}

impl DiffieHellmanRequestData {
    pub fn new(
        parameters_id: impl Into<String>,
        public_key: PublicKey,
        private_key: Option<StaticSecret>,
    ) -> Self {
        Self {
            parameters_id: parameters_id.into(),
            public_key,
            private_key,
        }
    }

    /// Request with a fresh key pair drawn from the context's random source.
    pub fn generate(ctx: &MslContext, parameters_id: impl Into<String>) -> Self {
        let (private_key, public_key) = ctx.random().with(|rng| agreement::generate_key_pair(rng));
        Self::new(parameters_id, public_key, Some(private_key))
    }

    pub fn from_object(mo: &MslObject) -> Result<Self> {
        let parameters_id = mo.get_string(KEY_PARAMETERS_ID)?;
        let public_key = public_key_from_object(mo)?;
        Ok(Self::new(parameters_id, public_key, None))
    }

    pub fn parameters_id(&self) -> &str {
        &self.parameters_id
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn private_key(&self) -> Option<&StaticSecret> {
        self.private_key.as_ref()
    }

    pub fn to_object(&self) -> MslObject {
        let mut mo = MslObject::new();
        mo.put(KEY_PARAMETERS_ID, self.parameters_id.as_str());
        mo.put_bytes(KEY_PUBLIC_KEY, self.public_key.as_bytes());
        mo
    }
}

impl PartialEq for DiffieHellmanRequestData {
    fn eq(&self, other: &Self) -> bool {
        self.parameters_id == other.parameters_id && self.public_key == other.public_key
    }
}

impl Eq for DiffieHellmanRequestData {}

impl fmt::Debug for DiffieHellmanRequestData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffieHellmanRequestData")
            .field("parameters_id", &self.parameters_id)
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffieHellmanResponseData {
    parameters_id: String,
    public_key: PublicKey,
}

impl DiffieHellmanResponseData {
    pub fn new(parameters_id: impl Into<String>, public_key: PublicKey) -> Self {
        Self {
            parameters_id: parameters_id.into(),
            public_key,
        }
    }

    pub fn from_object(mo: &MslObject) -> Result<Self> {
        let parameters_id = mo.get_string(KEY_PARAMETERS_ID)?;
        let public_key = public_key_from_object(mo)?;
        Ok(Self::new(parameters_id, public_key))
    }

    pub fn parameters_id(&self) -> &str {
        &self.parameters_id
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn to_object(&self) -> MslObject {
        let mut mo = MslObject::new();
        mo.put(KEY_PARAMETERS_ID, self.parameters_id.as_str());
        mo.put_bytes(KEY_PUBLIC_KEY, self.public_key.as_bytes());
        mo
    }
}

pub struct DiffieHellmanExchange {
    parameters_ids: HashSet<String>,
    utils: Arc<dyn AuthenticationUtils>,
}

impl DiffieHellmanExchange {
    /// Accepts [`X25519_PARAMETERS_ID`] only.
    pub fn new(utils: Arc<dyn AuthenticationUtils>) -> Self {
        Self::with_parameters_ids([X25519_PARAMETERS_ID], utils)
    }

    pub fn with_parameters_ids<I, S>(parameters_ids: I, utils: Arc<dyn AuthenticationUtils>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parameters_ids: parameters_ids.into_iter().map(Into::into).collect(),
            utils,
        }
    }

    fn check_parameters_id(&self, parameters_id: &str) -> Result<()> {
        if !self.parameters_ids.contains(parameters_id) {
            return Err(Error::key_exchange(ErrorCode::UnknownKeyxParametersId, parameters_id));
        }
        Ok(())
    }
}

impl KeyExchangeFactory for DiffieHellmanExchange {
    fn scheme(&self) -> KeyExchangeScheme {
        KeyExchangeScheme::DiffieHellman
    }

    fn create_request_data(&self, _ctx: &MslContext, key_data: &MslObject) -> Result<KeyRequestData> {
        let request = DiffieHellmanRequestData::from_object(key_data)?;
        self.check_parameters_id(request.parameters_id())?;
        Ok(KeyRequestData::DiffieHellman(request))
    }

    fn create_response_data(
        &self,
        _ctx: &MslContext,
        master_token: &MasterToken,
        key_data: &MslObject,
    ) -> Result<KeyResponseData> {
        let response = DiffieHellmanResponseData::from_object(key_data)?;
        self.check_parameters_id(response.parameters_id())?;
        Ok(KeyResponseData::new(
            master_token.clone(),
            ResponseKeyData::DiffieHellman(response),
        ))
    }

    fn generate_response(
        &self,
        ctx: &MslContext,
        request: &KeyRequestData,
        entity: KeyExchangeEntity<'_>,
    ) -> Result<KeyExchangeData> {
        let KeyRequestData::DiffieHellman(request) = request else {
            return Err(incorrect_request_type(self.scheme(), request));
        };
        check_permitted(self.utils.as_ref(), entity, self.scheme())?;
        self.check_parameters_id(request.parameters_id())?;

        let (private_key, public_key) = ctx.random().with(|rng| agreement::generate_key_pair(rng));
        let (encryption_key, hmac_key) =
            session_keys(&private_key, request.public_key(), request.public_key(), &public_key)?;

        let master_token = issue_master_token(ctx, entity, encryption_key, hmac_key)?;
        let crypto_context = SessionCryptoContext::from_master_token(ctx, &master_token)?;

        let key_data = DiffieHellmanResponseData::new(request.parameters_id(), public_key);
        Ok(KeyExchangeData {
            response: KeyResponseData::new(master_token, ResponseKeyData::DiffieHellman(key_data)),
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
        let KeyRequestData::DiffieHellman(request) = request else {
            return Err(incorrect_request_type(self.scheme(), request));
        };
        let ResponseKeyData::DiffieHellman(key_data) = response.key_data() else {
            return Err(incorrect_response_type(self.scheme(), response));
        };

        if request.parameters_id() != key_data.parameters_id() {
            return Err(Error::key_exchange(
                ErrorCode::KeyxResponseRequestMismatch,
                format!(
                    "request {}; response {}",
                    request.parameters_id(),
                    key_data.parameters_id()
                ),
            ));
        }
        let private_key = request.private_key().ok_or_else(|| {
            Error::key_exchange(ErrorCode::KeyxPrivateKeyMissing, request.parameters_id())
        })?;
        let identity = entity.identity()?;

        let (encryption_key, hmac_key) = session_keys(
            private_key,
            key_data.public_key(),
            request.public_key(),
            key_data.public_key(),
        )?;

        Ok(Box::new(SessionCryptoContext::with_keys(
            ctx,
            response.master_token(),
            &identity,
            encryption_key,
            hmac_key,
        )))
    }
}
