//! Preshared key entity authentication.

use std::sync::Arc;

use tessera_common::{Error, ErrorCode, Result};
use tessera_crypto::{CryptoContext, PresharedKeyStore, SymmetricCryptoContext};
use tracing::warn;

use crate::authutils::AuthenticationUtils;
use crate::context::MslContext;
use crate::entityauth::{
    incorrect_data_type, EntityAuthenticationData, EntityAuthenticationFactory,
    EntityAuthenticationScheme,
};
use crate::object::MslObject;

const KEY_IDENTITY: &str = "identity";

/// `{ "identity" }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresharedAuthenticationData {
    identity: String,
}

impl PresharedAuthenticationData {
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

pub struct PresharedAuthenticationFactory {
    store: Arc<dyn PresharedKeyStore>,
    utils: Arc<dyn AuthenticationUtils>,
}

impl PresharedAuthenticationFactory {
    pub fn new(store: Arc<dyn PresharedKeyStore>, utils: Arc<dyn AuthenticationUtils>) -> Self {
        Self { store, utils }
    }
}

impl EntityAuthenticationFactory for PresharedAuthenticationFactory {
    fn scheme(&self) -> EntityAuthenticationScheme {
        EntityAuthenticationScheme::Psk
    }

    fn create_data(&self, _ctx: &MslContext, auth_data: &MslObject) -> Result<EntityAuthenticationData> {
        Ok(EntityAuthenticationData::Psk(PresharedAuthenticationData::from_object(auth_data)?))
    }

    fn crypto_context(
        &self,
        ctx: &MslContext,
        auth_data: &EntityAuthenticationData,
    ) -> Result<Box<dyn CryptoContext>> {
        let EntityAuthenticationData::Psk(data) = auth_data else {
            return Err(incorrect_data_type(self.scheme(), auth_data));
        };
        let identity = data.identity();

        if self.utils.is_entity_revoked(identity) {
            warn!(identity, "revoked entity");
            return Err(Error::entity_auth(ErrorCode::EntityRevoked, format!("psk {identity}")));
        }
        if !self.utils.is_entity_scheme_permitted(identity, self.scheme()) {
            return Err(Error::entity_auth(
                ErrorCode::IncorrectEntityAuthData,
                format!("scheme not permitted {identity}:{}", self.scheme()),
            ));
        }

        let keys = self
            .store
            .keys(identity)
            .ok_or_else(|| Error::entity_auth(ErrorCode::EntityNotFound, format!("psk {identity}")))?;

        Ok(Box::new(SymmetricCryptoContext::new(
            identity,
            Some(keys.encryption_key),
            Some(keys.hmac_key),
            Some(keys.wrapping_key),
        )
        .with_random(ctx.random().clone())))
    }
}
