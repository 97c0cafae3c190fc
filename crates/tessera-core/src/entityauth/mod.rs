//! Entity authentication.
//!
//! # Wire Format
//!
//! ```text
//! { "scheme": <scheme name>, "authdata": <scheme-specific object> }
//! ```
//!
//! [`EntityAuthenticationData::parse`] reads the scheme name, resolves it,
//! and hands `authdata` to the factory registered for that scheme on the
//! [`MslContext`]. Unknown scheme names and schemes without a registered
//! factory are rejected.

pub mod ecc;
pub mod mt_protected;
pub mod preshared;
pub mod rsa;
pub mod unauthenticated;

use std::fmt;

use tessera_common::{Error, ErrorCode, Result};
use tessera_crypto::CryptoContext;
use tracing::warn;

use crate::context::MslContext;
use crate::object::MslObject;

pub use self::ecc::{EccAuthenticationData, EccAuthenticationFactory};
pub use self::mt_protected::{
    MasterTokenProtectedAuthenticationData, MasterTokenProtectedAuthenticationFactory,
};
pub use self::preshared::{PresharedAuthenticationData, PresharedAuthenticationFactory};
pub use self::rsa::{RsaAuthenticationData, RsaAuthenticationFactory};
pub use self::unauthenticated::{
    UnauthenticatedAuthenticationData, UnauthenticatedAuthenticationFactory,
    UnauthenticatedSuffixedAuthenticationData, UnauthenticatedSuffixedAuthenticationFactory,
};

const KEY_SCHEME: &str = "scheme";
const KEY_AUTHDATA: &str = "authdata";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityAuthenticationScheme {
    /// Preshared keys.
    Psk,
    /// RSA signature over the message.
    Rsa,
    /// Ed25519 signature over the message.
    Ecc,
    /// Claimed identity, no proof.
    Unauthenticated,
    /// Claimed `root.suffix` identity, no proof.
    UnauthenticatedSuffixed,
    /// Another scheme's data sealed under a master token.
    MasterTokenProtected,
}

impl EntityAuthenticationScheme {
    pub const ALL: [Self; 6] = [
        Self::Psk,
        Self::Rsa,
        Self::Ecc,
        Self::Unauthenticated,
        Self::UnauthenticatedSuffixed,
        Self::MasterTokenProtected,
    ];

    /// Wire name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Psk => "PSK",
            Self::Rsa => "RSA",
            Self::Ecc => "ECC",
            Self::Unauthenticated => "NONE",
            Self::UnauthenticatedSuffixed => "NONE_SUFFIXED",
            Self::MasterTokenProtected => "MT_PROTECTED",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|scheme| scheme.name() == name)
    }

    /// Whether messages authenticated with this scheme can be encrypted.
    pub fn encrypts(&self) -> bool {
        matches!(self, Self::Psk | Self::MasterTokenProtected)
    }

    /// Whether messages authenticated with this scheme are integrity
    /// protected.
    pub fn protects_integrity(&self) -> bool {
        matches!(
            self,
            Self::Psk | Self::Rsa | Self::Ecc | Self::MasterTokenProtected
        )
    }
}

impl fmt::Display for EntityAuthenticationScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scheme-tagged entity authentication data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityAuthenticationData {
    Psk(PresharedAuthenticationData),
    Rsa(RsaAuthenticationData),
    Ecc(EccAuthenticationData),
    Unauthenticated(UnauthenticatedAuthenticationData),
    UnauthenticatedSuffixed(UnauthenticatedSuffixedAuthenticationData),
    MasterTokenProtected(MasterTokenProtectedAuthenticationData),
}

impl EntityAuthenticationData {
    /// Parse `{scheme, authdata}` through the context's registered factories.
    pub fn parse(ctx: &MslContext, mo: &MslObject) -> Result<Self> {
        let name = mo.get_string(KEY_SCHEME)?;
        let auth_data = mo.get_object(KEY_AUTHDATA)?;

        let scheme = EntityAuthenticationScheme::from_name(&name).ok_or_else(|| {
            warn!(scheme = %name, "unidentified entity authentication scheme");
            Error::entity_auth(ErrorCode::UnidentifiedEntityAuthScheme, &name)
        })?;
        let factory = ctx.entity_auth_factory(scheme).ok_or_else(|| {
            warn!(%scheme, "no entity authentication factory registered");
            Error::entity_auth(ErrorCode::EntityAuthFactoryNotFound, scheme)
        })?;

        factory.create_data(ctx, &auth_data)
    }

    pub fn scheme(&self) -> EntityAuthenticationScheme {
        match self {
            Self::Psk(_) => EntityAuthenticationScheme::Psk,
            Self::Rsa(_) => EntityAuthenticationScheme::Rsa,
            Self::Ecc(_) => EntityAuthenticationScheme::Ecc,
            Self::Unauthenticated(_) => EntityAuthenticationScheme::Unauthenticated,
            Self::UnauthenticatedSuffixed(_) => EntityAuthenticationScheme::UnauthenticatedSuffixed,
            Self::MasterTokenProtected(_) => EntityAuthenticationScheme::MasterTokenProtected,
        }
    }

    /// The authenticated entity's identity. For master token protected data
    /// this is the encapsulated data's identity.
    pub fn identity(&self) -> String {
        match self {
            Self::Psk(data) => data.identity().to_string(),
            Self::Rsa(data) => data.identity().to_string(),
            Self::Ecc(data) => data.identity().to_string(),
            Self::Unauthenticated(data) => data.identity().to_string(),
            Self::UnauthenticatedSuffixed(data) => data.identity(),
            Self::MasterTokenProtected(data) => data.identity(),
        }
    }

    /// The scheme-specific `authdata` object.
    pub fn auth_data(&self) -> MslObject {
        match self {
            Self::Psk(data) => data.to_object(),
            Self::Rsa(data) => data.to_object(),
            Self::Ecc(data) => data.to_object(),
            Self::Unauthenticated(data) => data.to_object(),
            Self::UnauthenticatedSuffixed(data) => data.to_object(),
            Self::MasterTokenProtected(data) => data.to_object(),
        }
    }

    /// Encoded form, `{scheme, authdata}`.
    pub fn to_object(&self) -> MslObject {
        let mut mo = MslObject::new();
        mo.put(KEY_SCHEME, self.scheme().name());
        mo.put_object(KEY_AUTHDATA, self.auth_data());
        mo
    }

    /// Crypto context from the factory registered for this data's scheme.
    pub fn crypto_context(&self, ctx: &MslContext) -> Result<Box<dyn CryptoContext>> {
        let scheme = self.scheme();
        let factory = ctx
            .entity_auth_factory(scheme)
            .ok_or_else(|| Error::entity_auth(ErrorCode::EntityAuthFactoryNotFound, scheme))?;
        factory.crypto_context(ctx, self)
    }
}

/// Creates and checks entity authentication data for one scheme.
pub trait EntityAuthenticationFactory: Send + Sync {
    fn scheme(&self) -> EntityAuthenticationScheme;

    /// Build the data from its `authdata` object.
    fn create_data(&self, ctx: &MslContext, auth_data: &MslObject) -> Result<EntityAuthenticationData>;

    /// Crypto context for the authenticated entity.
    ///
    /// Fails with an internal error if `auth_data` is of another scheme.
    fn crypto_context(
        &self,
        ctx: &MslContext,
        auth_data: &EntityAuthenticationData,
    ) -> Result<Box<dyn CryptoContext>>;
}

pub(crate) fn incorrect_data_type(
    expected: EntityAuthenticationScheme,
    actual: &EntityAuthenticationData,
) -> Error {
    Error::internal(format!(
        "incorrect authentication data type: expected {expected}, got {}",
        actual.scheme()
    ))
}
