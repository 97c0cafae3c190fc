//! Unauthenticated entities.
//!
//! The identity is taken on trust. Messages carry no integrity protection,
//! so these schemes get a [`NullCryptoContext`].

use std::sync::Arc;

use tessera_common::{Error, ErrorCode, Result};
use tessera_crypto::{CryptoContext, NullCryptoContext};
use tracing::warn;

use crate::authutils::AuthenticationUtils;
use crate::context::MslContext;
use crate::entityauth::{
    incorrect_data_type, EntityAuthenticationData, EntityAuthenticationFactory,
    EntityAuthenticationScheme,
};
use crate::object::MslObject;

const KEY_IDENTITY: &str = "identity";
const KEY_ROOT: &str = "root";
const KEY_SUFFIX: &str = "suffix";

const SUFFIX_SEPARATOR: char = '.';

/// `{ "identity" }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnauthenticatedAuthenticationData {
    identity: String,
}

impl UnauthenticatedAuthenticationData {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
        }
    }

    pub fn from_object(mo: &MslObject) -> Result<Self> {
        Ok(Self::new(mo.get_string(KEY_IDENTITY)?))
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn to_object(&self) -> MslObject {
        let mut mo = MslObject::new();
        mo.put(KEY_IDENTITY, self.identity.as_str());
        mo
    }
}

/// `{ "root", "suffix" }`, identity `root.suffix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnauthenticatedSuffixedAuthenticationData {
    root: String,
    suffix: String,
}

impl UnauthenticatedSuffixedAuthenticationData {
    pub fn new(root: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            suffix: suffix.into(),
        }
    }

    pub fn from_object(mo: &MslObject) -> Result<Self> {
        Ok(Self::new(mo.get_string(KEY_ROOT)?, mo.get_string(KEY_SUFFIX)?))
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn identity(&self) -> String {
        format!("{}{SUFFIX_SEPARATOR}{}", self.root, self.suffix)
    }

    pub fn to_object(&self) -> MslObject {
        let mut mo = MslObject::new();
        mo.put(KEY_ROOT, self.root.as_str());
        mo.put(KEY_SUFFIX, self.suffix.as_str());
        mo
    }
}

fn check_entity(
    utils: &dyn AuthenticationUtils,
    identity: &str,
    scheme: EntityAuthenticationScheme,
) -> Result<()> {
    if utils.is_entity_revoked(identity) {
        warn!(identity, "revoked entity");
        return Err(Error::entity_auth(ErrorCode::EntityRevoked, format!("none {identity}")));
    }
    if !utils.is_entity_scheme_permitted(identity, scheme) {
        return Err(Error::entity_auth(
            ErrorCode::IncorrectEntityAuthData,
            format!("scheme not permitted {identity}:{scheme}"),
        ));
    }
    Ok(())
}

pub struct UnauthenticatedAuthenticationFactory {
    utils: Arc<dyn AuthenticationUtils>,
}

impl UnauthenticatedAuthenticationFactory {
    pub fn new(utils: Arc<dyn AuthenticationUtils>) -> Self {
        Self { utils }
    }
}

impl EntityAuthenticationFactory for UnauthenticatedAuthenticationFactory {
    fn scheme(&self) -> EntityAuthenticationScheme {
        EntityAuthenticationScheme::Unauthenticated
    }

    fn create_data(&self, _ctx: &MslContext, auth_data: &MslObject) -> Result<EntityAuthenticationData> {
        Ok(EntityAuthenticationData::Unauthenticated(
            UnauthenticatedAuthenticationData::from_object(auth_data)?,
        ))
    }

    fn crypto_context(
        &self,
        _ctx: &MslContext,
        auth_data: &EntityAuthenticationData,
    ) -> Result<Box<dyn CryptoContext>> {
        let EntityAuthenticationData::Unauthenticated(data) = auth_data else {
            return Err(incorrect_data_type(self.scheme(), auth_data));
        };
        check_entity(self.utils.as_ref(), data.identity(), self.scheme())?;
        Ok(Box::new(NullCryptoContext))
    }
}

pub struct UnauthenticatedSuffixedAuthenticationFactory {
    utils: Arc<dyn AuthenticationUtils>,
}

impl UnauthenticatedSuffixedAuthenticationFactory {
    pub fn new(utils: Arc<dyn AuthenticationUtils>) -> Self {
        Self { utils }
    }
}

impl EntityAuthenticationFactory for UnauthenticatedSuffixedAuthenticationFactory {
    fn scheme(&self) -> EntityAuthenticationScheme {
        EntityAuthenticationScheme::UnauthenticatedSuffixed
    }

    fn create_data(&self, _ctx: &MslContext, auth_data: &MslObject) -> Result<EntityAuthenticationData> {
        Ok(EntityAuthenticationData::UnauthenticatedSuffixed(
            UnauthenticatedSuffixedAuthenticationData::from_object(auth_data)?,
        ))
    }

    /// Revocation and permissions apply to the root identity, covering
    /// every suffix under it.
    fn crypto_context(
        &self,
        _ctx: &MslContext,
        auth_data: &EntityAuthenticationData,
    ) -> Result<Box<dyn CryptoContext>> {
        let EntityAuthenticationData::UnauthenticatedSuffixed(data) = auth_data else {
            return Err(incorrect_data_type(self.scheme(), auth_data));
        };
        check_entity(self.utils.as_ref(), data.root(), self.scheme())?;
        Ok(Box::new(NullCryptoContext))
    }
}
