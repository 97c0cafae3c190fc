//! Key exchange.
//!
//! A requester sends key request data; the responder answers with a new or
//! renewed master token and response data from which only the requester can
//! recover the token's session keys.
//!
//! # Wire Format
//!
//! ```text
//! request  = { "scheme": <scheme name>, "keydata": <scheme-specific object> }
//! response = { "mastertoken": <master token object>,
//!              "scheme": <scheme name>, "keydata": <scheme-specific object> }
//! ```

pub mod asymmetric;
pub mod diffie_hellman;
pub mod symmetric;

use std::fmt;
use std::sync::Arc;

use tessera_common::{Error, ErrorCode, Result};
use tessera_crypto::{CryptoContext, SecretKey};
use tracing::{info, warn};

use crate::authutils::AuthenticationUtils;
use crate::context::MslContext;
use crate::entityauth::EntityAuthenticationData;
use crate::object::MslObject;
use crate::tokens::MasterToken;

pub use self::asymmetric::{
    AsymmetricWrappedExchange, AsymmetricWrappedRequestData, AsymmetricWrappedResponseData,
    Mechanism,
};
pub use self::diffie_hellman::{
    DiffieHellmanExchange, DiffieHellmanRequestData, DiffieHellmanResponseData,
    X25519_PARAMETERS_ID,
};
pub use self::symmetric::{
    KeyId, SymmetricWrappedExchange, SymmetricWrappedRequestData, SymmetricWrappedResponseData,
};

const KEY_SCHEME: &str = "scheme";
const KEY_KEYDATA: &str = "keydata";
const KEY_MASTER_TOKEN: &str = "mastertoken";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyExchangeScheme {
    /// Session keys wrapped to an ephemeral public key from the requester.
    AsymmetricWrapped,
    /// Session keys wrapped with preshared or current session keys.
    SymmetricWrapped,
    /// Session keys derived from an X25519 agreement.
    DiffieHellman,
}

impl KeyExchangeScheme {
    pub const ALL: [Self; 3] = [Self::AsymmetricWrapped, Self::SymmetricWrapped, Self::DiffieHellman];

    /// Wire name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AsymmetricWrapped => "ASYMMETRIC_WRAPPED",
            Self::SymmetricWrapped => "SYMMETRIC_WRAPPED",
            Self::DiffieHellman => "DIFFIE_HELLMAN",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|scheme| scheme.name() == name)
    }
}

impl fmt::Display for KeyExchangeScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn resolve_factory(ctx: &MslContext, name: &str) -> Result<Arc<dyn KeyExchangeFactory>> {
    let scheme = KeyExchangeScheme::from_name(name).ok_or_else(|| {
        warn!(scheme = %name, "unidentified key exchange scheme");
        Error::key_exchange(ErrorCode::UnidentifiedKeyxScheme, name)
    })?;
    ctx.key_exchange_factory(scheme).ok_or_else(|| {
        warn!(%scheme, "no key exchange factory registered");
        Error::key_exchange(ErrorCode::KeyxFactoryNotFound, scheme)
    })
}

/// Scheme-tagged key request data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRequestData {
    AsymmetricWrapped(AsymmetricWrappedRequestData),
    SymmetricWrapped(SymmetricWrappedRequestData),
    DiffieHellman(DiffieHellmanRequestData),
}

impl KeyRequestData {
    /// Parse `{scheme, keydata}` through the context's registered factories.
    pub fn parse(ctx: &MslContext, mo: &MslObject) -> Result<Self> {
        let name = mo.get_string(KEY_SCHEME)?;
        let key_data = mo.get_object(KEY_KEYDATA)?;
        let factory = resolve_factory(ctx, &name)?;
        factory.create_request_data(ctx, &key_data)
    }

    pub fn scheme(&self) -> KeyExchangeScheme {
        match self {
            Self::AsymmetricWrapped(_) => KeyExchangeScheme::AsymmetricWrapped,
            Self::SymmetricWrapped(_) => KeyExchangeScheme::SymmetricWrapped,
            Self::DiffieHellman(_) => KeyExchangeScheme::DiffieHellman,
        }
    }

    pub fn key_data(&self) -> MslObject {
        match self {
            Self::AsymmetricWrapped(data) => data.to_object(),
            Self::SymmetricWrapped(data) => data.to_object(),
            Self::DiffieHellman(data) => data.to_object(),
        }
    }

    /// Encoded form, `{scheme, keydata}`.
    pub fn to_object(&self) -> MslObject {
        let mut mo = MslObject::new();
        mo.put(KEY_SCHEME, self.scheme().name());
        mo.put_object(KEY_KEYDATA, self.key_data());
        mo
    }
}

/// Scheme-specific part of a key response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseKeyData {
    AsymmetricWrapped(AsymmetricWrappedResponseData),
    SymmetricWrapped(SymmetricWrappedResponseData),
    DiffieHellman(DiffieHellmanResponseData),
}

impl ResponseKeyData {
    pub fn scheme(&self) -> KeyExchangeScheme {
        match self {
            Self::AsymmetricWrapped(_) => KeyExchangeScheme::AsymmetricWrapped,
            Self::SymmetricWrapped(_) => KeyExchangeScheme::SymmetricWrapped,
            Self::DiffieHellman(_) => KeyExchangeScheme::DiffieHellman,
        }
    }

    pub fn to_object(&self) -> MslObject {
        match self {
            Self::AsymmetricWrapped(data) => data.to_object(),
            Self::SymmetricWrapped(data) => data.to_object(),
            Self::DiffieHellman(data) => data.to_object(),
        }
    }
}

/// A key response: the issued master token plus the scheme's key data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyResponseData {
    master_token: MasterToken,
    key_data: ResponseKeyData,
}

impl KeyResponseData {
    pub fn new(master_token: MasterToken, key_data: ResponseKeyData) -> Self {
        Self {
            master_token,
            key_data,
        }
    }

    /// Parse `{mastertoken, scheme, keydata}` through the context's
    /// registered factories.
    pub fn parse(ctx: &MslContext, mo: &MslObject) -> Result<Self> {
        let master_token_mo = mo.get_object(KEY_MASTER_TOKEN)?;
        let name = mo.get_string(KEY_SCHEME)?;
        let key_data = mo.get_object(KEY_KEYDATA)?;

        let factory = resolve_factory(ctx, &name)?;
        let master_token = MasterToken::parse(ctx, &master_token_mo)?;
        factory.create_response_data(ctx, &master_token, &key_data)
    }

    pub fn master_token(&self) -> &MasterToken {
        &self.master_token
    }

    pub fn key_data(&self) -> &ResponseKeyData {
        &self.key_data
    }

    pub fn scheme(&self) -> KeyExchangeScheme {
        self.key_data.scheme()
    }

    /// Encoded form, `{mastertoken, scheme, keydata}`.
    pub fn to_object(&self) -> MslObject {
        let mut mo = MslObject::new();
        mo.put_object(KEY_MASTER_TOKEN, self.master_token.to_object());
        mo.put(KEY_SCHEME, self.scheme().name());
        mo.put_object(KEY_KEYDATA, self.key_data.to_object());
        mo
    }
}

/// Who a key exchange is for.
#[derive(Debug, Clone, Copy)]
pub enum KeyExchangeEntity<'a> {
    /// An entity renewing the session of an existing master token.
    MasterToken(&'a MasterToken),
    /// An entity without a master token, identified by its authentication
    /// data.
    EntityAuthData(&'a EntityAuthenticationData),
}

impl KeyExchangeEntity<'_> {
    /// The entity identity. A master token must be decrypted to reveal it.
    pub fn identity(&self) -> Result<String> {
        match self {
            Self::MasterToken(master_token) => master_token
                .identity()
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::master_token(
                        ErrorCode::MasterTokenUntrusted,
                        format!("master token {master_token} is not decrypted"),
                    )
                }),
            Self::EntityAuthData(data) => Ok(data.identity()),
        }
    }

    pub fn master_token(&self) -> Option<&MasterToken> {
        match self {
            Self::MasterToken(master_token) => Some(*master_token),
            Self::EntityAuthData(_) => None,
        }
    }
}

/// What the responder sends back, plus the crypto context for the new
/// session.
pub struct KeyExchangeData {
    pub response: KeyResponseData,
    pub crypto_context: Box<dyn CryptoContext>,
}

impl fmt::Debug for KeyExchangeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyExchangeData")
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

/// Both halves of one key exchange scheme.
pub trait KeyExchangeFactory: Send + Sync {
    fn scheme(&self) -> KeyExchangeScheme;

    /// Build request data from its `keydata` object.
    fn create_request_data(&self, ctx: &MslContext, key_data: &MslObject) -> Result<KeyRequestData>;

    /// Build response data from its `keydata` object and the issued master
    /// token.
    fn create_response_data(
        &self,
        ctx: &MslContext,
        master_token: &MasterToken,
        key_data: &MslObject,
    ) -> Result<KeyResponseData>;

    /// Responder side: issue or renew a master token for `entity` and
    /// answer `request`.
    fn generate_response(
        &self,
        ctx: &MslContext,
        request: &KeyRequestData,
        entity: KeyExchangeEntity<'_>,
    ) -> Result<KeyExchangeData>;

    /// Requester side: recover the session keys from `response` and return
    /// the crypto context for the new master token.
    fn crypto_context(
        &self,
        ctx: &MslContext,
        request: &KeyRequestData,
        response: &KeyResponseData,
        entity: KeyExchangeEntity<'_>,
    ) -> Result<Box<dyn CryptoContext>>;
}

pub(crate) fn incorrect_request_type(expected: KeyExchangeScheme, actual: &KeyRequestData) -> Error {
    Error::internal(format!(
        "incorrect key request data type: expected {expected}, got {}",
        actual.scheme()
    ))
}

pub(crate) fn incorrect_response_type(expected: KeyExchangeScheme, actual: &KeyResponseData) -> Error {
    Error::internal(format!(
        "incorrect key response data type: expected {expected}, got {}",
        actual.scheme()
    ))
}

/// Responder-side checks shared by every scheme. Returns the entity
/// identity.
pub(crate) fn check_permitted(
    utils: &dyn AuthenticationUtils,
    entity: KeyExchangeEntity<'_>,
    scheme: KeyExchangeScheme,
) -> Result<String> {
    let identity = entity.identity()?;
    if !utils.is_keyx_scheme_permitted(&identity, scheme) {
        warn!(identity, %scheme, "key exchange scheme not permitted");
        return Err(Error::key_exchange(
            ErrorCode::IncorrectKeyxData,
            format!("scheme not permitted {identity}:{scheme}"),
        ));
    }
    Ok(identity)
}

/// Issue a master token for a new entity, or renew the entity's current
/// one, carrying the given session keys.
pub(crate) fn issue_master_token(
    ctx: &MslContext,
    entity: KeyExchangeEntity<'_>,
    encryption_key: SecretKey,
    hmac_key: SecretKey,
) -> Result<MasterToken> {
    let factory = ctx.token_factory();
    let master_token = match entity {
        KeyExchangeEntity::MasterToken(master_token) => {
            factory.renew_master_token(ctx, master_token, encryption_key, hmac_key, None)?
        }
        KeyExchangeEntity::EntityAuthData(data) => {
            factory.create_master_token(ctx, data, encryption_key, hmac_key, None)?
        }
    };
    info!(%master_token, "key exchange issued master token");
    Ok(master_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_names() {
        for scheme in KeyExchangeScheme::ALL {
            assert_eq!(KeyExchangeScheme::from_name(scheme.name()), Some(scheme));
        }
        assert_eq!(KeyExchangeScheme::from_name("JWE_LADDER"), None);
    }
}
