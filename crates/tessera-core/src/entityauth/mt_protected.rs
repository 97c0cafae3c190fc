//! Entity authentication data sealed under a master token.
//!
//! Lets an entity authenticate with some other scheme while hiding that
//! scheme's fields from everyone but the issuer: the encapsulated data is
//! encrypted and then signed with the master token's session keys.
//!
//! # Wire Format
//!
//! ```text
//! {
//!   "mastertoken": <master token object>,
//!   "authdata":    <bytes: encrypted encoding of the encapsulated data>,
//!   "signature":   <bytes: signature over authdata>
//! }
//! ```

use std::fmt;

use tessera_common::{Error, ErrorCode, Result};
use tessera_crypto::CryptoContext;
use tracing::warn;

use crate::context::MslContext;
use crate::entityauth::{
    incorrect_data_type, EntityAuthenticationData, EntityAuthenticationFactory,
    EntityAuthenticationScheme,
};
use crate::object::MslObject;
use crate::tokens::{MasterToken, SessionCryptoContext};

const KEY_MASTER_TOKEN: &str = "mastertoken";
const KEY_AUTHDATA: &str = "authdata";
const KEY_SIGNATURE: &str = "signature";

#[derive(Clone)]
pub struct MasterTokenProtectedAuthenticationData {
    master_token: MasterToken,
    encapsulated: Box<EntityAuthenticationData>,
    ciphertext: Vec<u8>,
    signature: Vec<u8>,
}

impl MasterTokenProtectedAuthenticationData {
    /// Seal `auth_data` under `master_token`, which must be decrypted.
    pub fn create(
        ctx: &MslContext,
        master_token: &MasterToken,
        auth_data: EntityAuthenticationData,
    ) -> Result<Self> {
        let crypto = SessionCryptoContext::from_master_token(ctx, master_token)?;
        let plaintext = auth_data.to_object().to_bytes()?;
        let ciphertext = crypto.encrypt(&plaintext)?;
        let signature = crypto.sign(&ciphertext)?;

        Ok(Self {
            master_token: master_token.clone(),
            encapsulated: Box::new(auth_data),
            ciphertext,
            signature,
        })
    }

    /// Open sealed data. The signature is checked before anything is
    /// decrypted.
    pub fn parse(ctx: &MslContext, mo: &MslObject) -> Result<Self> {
        let master_token_mo = mo.get_object(KEY_MASTER_TOKEN)?;
        let ciphertext = mo.get_bytes(KEY_AUTHDATA)?;
        let signature = mo.get_bytes(KEY_SIGNATURE)?;

        let master_token = MasterToken::parse(ctx, &master_token_mo)
            .map_err(|e| Error::entity_auth(ErrorCode::EntityAuthMasterTokenInvalid, e))?;
        if !master_token.is_decrypted() {
            warn!(%master_token, "protecting master token is not decrypted");
            return Err(Error::entity_auth(
                ErrorCode::EntityAuthMasterTokenNotDecrypted,
                &master_token,
            ));
        }
        let crypto = SessionCryptoContext::from_master_token(ctx, &master_token)?;

        let verified = crypto
            .verify(&ciphertext, &signature)
            .map_err(|e| Error::entity_auth(ErrorCode::EntityAuthSignatureInvalid, e))?;
        if !verified {
            return Err(Error::entity_auth(
                ErrorCode::EntityAuthSignatureInvalid,
                format!("master token {master_token}"),
            ));
        }

        let plaintext = crypto
            .decrypt(&ciphertext)
            .map_err(|e| Error::entity_auth(ErrorCode::EntityAuthCiphertextInvalid, e))?;
        let encapsulated_mo = MslObject::parse(&plaintext)?;
        let encapsulated = EntityAuthenticationData::parse(ctx, &encapsulated_mo)?;

        Ok(Self {
            master_token,
            encapsulated: Box::new(encapsulated),
            ciphertext,
            signature,
        })
    }

    pub fn master_token(&self) -> &MasterToken {
        &self.master_token
    }

    pub fn encapsulated(&self) -> &EntityAuthenticationData {
        &self.encapsulated
    }

    pub fn identity(&self) -> String {
        self.encapsulated.identity()
    }

    pub fn to_object(&self) -> MslObject {
        let mut mo = MslObject::new();
        mo.put_object(KEY_MASTER_TOKEN, self.master_token.to_object());
        mo.put_bytes(KEY_AUTHDATA, &self.ciphertext);
        mo.put_bytes(KEY_SIGNATURE, &self.signature);
        mo
    }
}

/// Ciphertext and signature differ on every seal, so equality compares the
/// protecting master token and the encapsulated data.
impl PartialEq for MasterTokenProtectedAuthenticationData {
    fn eq(&self, other: &Self) -> bool {
        self.master_token == other.master_token && self.encapsulated == other.encapsulated
    }
}

impl Eq for MasterTokenProtectedAuthenticationData {}

impl fmt::Debug for MasterTokenProtectedAuthenticationData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterTokenProtectedAuthenticationData")
            .field("master_token", &self.master_token)
            .field("encapsulated", &self.encapsulated)
            .finish_non_exhaustive()
    }
}

/// Delegates crypto context creation to the encapsulated scheme's factory.
#[derive(Debug, Default, Clone, Copy)]
pub struct MasterTokenProtectedAuthenticationFactory;

impl EntityAuthenticationFactory for MasterTokenProtectedAuthenticationFactory {
    fn scheme(&self) -> EntityAuthenticationScheme {
        EntityAuthenticationScheme::MasterTokenProtected
    }

    fn create_data(&self, ctx: &MslContext, auth_data: &MslObject) -> Result<EntityAuthenticationData> {
        Ok(EntityAuthenticationData::MasterTokenProtected(
            MasterTokenProtectedAuthenticationData::parse(ctx, auth_data)?,
        ))
    }

    fn crypto_context(
        &self,
        ctx: &MslContext,
        auth_data: &EntityAuthenticationData,
    ) -> Result<Box<dyn CryptoContext>> {
        let EntityAuthenticationData::MasterTokenProtected(data) = auth_data else {
            return Err(incorrect_data_type(self.scheme(), auth_data));
        };
        data.encapsulated().crypto_context(ctx)
    }
}
