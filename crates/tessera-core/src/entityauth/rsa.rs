//! RSA entity authentication.
//!
//! Key resolution follows the same local/remote split as the ECC scheme.

use std::sync::Arc;

use tessera_common::{Error, ErrorCode, Result};
use tessera_crypto::{CryptoContext, RsaCryptoContext, RsaStore};
use tracing::warn;

use crate::authutils::AuthenticationUtils;
use crate::context::MslContext;
use crate::entityauth::{
    incorrect_data_type, EntityAuthenticationData, EntityAuthenticationFactory,
    EntityAuthenticationScheme,
};
use crate::object::MslObject;

const KEY_IDENTITY: &str = "identity";
const KEY_PUBKEY_ID: &str = "pubkeyid";

/// `{ "identity", "pubkeyid" }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaAuthenticationData {
    identity: String,
    public_key_id: String,
}

impl RsaAuthenticationData {
    pub fn new(identity: impl Into<String>, public_key_id: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            public_key_id: public_key_id.into(),
        }
    }

    pub fn from_object(mo: &MslObject) -> Result<Self> {
        Ok(Self::new(mo.get_string(KEY_IDENTITY)?, mo.get_string(KEY_PUBKEY_ID)?))
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn public_key_id(&self) -> &str {
        &self.public_key_id
    }

    pub fn to_object(&self) -> MslObject {
        let mut mo = MslObject::new();
        mo.put(KEY_IDENTITY, self.identity.as_str());
        mo.put(KEY_PUBKEY_ID, self.public_key_id.as_str());
        mo
    }
}

pub struct RsaAuthenticationFactory {
    key_pair_id: Option<String>,
    store: Arc<dyn RsaStore>,
    utils: Arc<dyn AuthenticationUtils>,
}

impl RsaAuthenticationFactory {
    pub fn new(store: Arc<dyn RsaStore>, utils: Arc<dyn AuthenticationUtils>) -> Self {
        Self {
            key_pair_id: None,
            store,
            utils,
        }
    }

    pub fn with_key_pair_id(
        key_pair_id: impl Into<String>,
        store: Arc<dyn RsaStore>,
        utils: Arc<dyn AuthenticationUtils>,
    ) -> Self {
        Self {
            key_pair_id: Some(key_pair_id.into()),
            store,
            utils,
        }
    }
}

impl EntityAuthenticationFactory for RsaAuthenticationFactory {
    fn scheme(&self) -> EntityAuthenticationScheme {
        EntityAuthenticationScheme::Rsa
    }

    fn create_data(&self, _ctx: &MslContext, auth_data: &MslObject) -> Result<EntityAuthenticationData> {
        Ok(EntityAuthenticationData::Rsa(RsaAuthenticationData::from_object(auth_data)?))
    }

    fn crypto_context(
        &self,
        _ctx: &MslContext,
        auth_data: &EntityAuthenticationData,
    ) -> Result<Box<dyn CryptoContext>> {
        let EntityAuthenticationData::Rsa(data) = auth_data else {
            return Err(incorrect_data_type(self.scheme(), auth_data));
        };
        let identity = data.identity();

        if self.utils.is_entity_revoked(identity) {
            warn!(identity, "revoked entity");
            return Err(Error::entity_auth(ErrorCode::EntityRevoked, format!("rsa {identity}")));
        }
        if !self.utils.is_entity_scheme_permitted(identity, self.scheme()) {
            return Err(Error::entity_auth(
                ErrorCode::IncorrectEntityAuthData,
                format!("scheme not permitted {identity}:{}", self.scheme()),
            ));
        }

        let pubkeyid = data.public_key_id();
        let public_key = self.store.public_key(pubkeyid);
        let private_key = self.store.private_key(pubkeyid);

        if self.key_pair_id.as_deref() == Some(pubkeyid) {
            if private_key.is_none() {
                return Err(Error::entity_auth(ErrorCode::RsaPrivateKeyNotFound, pubkeyid));
            }
        } else if public_key.is_none() {
            return Err(Error::entity_auth(ErrorCode::RsaPublicKeyNotFound, pubkeyid));
        }

        Ok(Box::new(RsaCryptoContext::new(identity, private_key, public_key)))
    }
}
