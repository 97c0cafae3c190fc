//! User authentication by a previously issued user ID token.
//!
//! Lets an entity vouch for a user it authenticated under an earlier master
//! token, for example after switching to a new entity identity.
//!
//! # Wire Format
//!
//! ```text
//! { "mastertoken": <master token object>, "useridtoken": <user ID token object> }
//! ```

use std::sync::Arc;

use tessera_common::{Error, ErrorCode, Result};
use tracing::warn;

use crate::authutils::AuthenticationUtils;
use crate::context::MslContext;
use crate::object::MslObject;
use crate::tokens::{MasterToken, MslUser, UserIdToken};
use crate::userauth::{
    check_user_id_token, incorrect_data_type, UserAuthenticationData, UserAuthenticationFactory,
    UserAuthenticationScheme,
};

const KEY_MASTER_TOKEN: &str = "mastertoken";
const KEY_USER_ID_TOKEN: &str = "useridtoken";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdTokenAuthenticationData {
    master_token: MasterToken,
    user_id_token: UserIdToken,
}

impl UserIdTokenAuthenticationData {
    /// Fails if the user ID token is not bound to the master token.
    pub fn new(master_token: MasterToken, user_id_token: UserIdToken) -> Result<Self> {
        if !user_id_token.is_bound_to(&master_token) {
            return Err(Error::user_auth(
                ErrorCode::UserAuthUserIdTokenInvalid,
                format!("uit {user_id_token} not bound to mt {master_token}"),
            ));
        }
        Ok(Self {
            master_token,
            user_id_token,
        })
    }

    pub fn from_object(ctx: &MslContext, mo: &MslObject) -> Result<Self> {
        let master_token_mo = mo.get_object(KEY_MASTER_TOKEN)?;
        let user_id_token_mo = mo.get_object(KEY_USER_ID_TOKEN)?;

        let master_token = MasterToken::parse(ctx, &master_token_mo)
            .map_err(|e| Error::user_auth(ErrorCode::UserAuthMasterTokenInvalid, e))?;
        let user_id_token = UserIdToken::parse(ctx, &user_id_token_mo, &master_token)
            .map_err(|e| Error::user_auth(ErrorCode::UserAuthUserIdTokenInvalid, e))?;

        Ok(Self {
            master_token,
            user_id_token,
        })
    }

    pub fn master_token(&self) -> &MasterToken {
        &self.master_token
    }

    pub fn user_id_token(&self) -> &UserIdToken {
        &self.user_id_token
    }

    pub fn to_object(&self) -> MslObject {
        let mut mo = MslObject::new();
        mo.put_object(KEY_MASTER_TOKEN, self.master_token.to_object());
        mo.put_object(KEY_USER_ID_TOKEN, self.user_id_token.to_object());
        mo
    }
}

pub struct UserIdTokenAuthenticationFactory {
    utils: Arc<dyn AuthenticationUtils>,
}

impl UserIdTokenAuthenticationFactory {
    pub fn new(utils: Arc<dyn AuthenticationUtils>) -> Self {
        Self { utils }
    }
}

impl UserAuthenticationFactory for UserIdTokenAuthenticationFactory {
    fn scheme(&self) -> UserAuthenticationScheme {
        UserAuthenticationScheme::UserIdToken
    }

    fn create_data(
        &self,
        ctx: &MslContext,
        _master_token: Option<&MasterToken>,
        auth_data: &MslObject,
    ) -> Result<UserAuthenticationData> {
        Ok(UserAuthenticationData::UserIdToken(
            UserIdTokenAuthenticationData::from_object(ctx, auth_data)?,
        ))
    }

    fn authenticate(
        &self,
        _ctx: &MslContext,
        identity: &str,
        data: &UserAuthenticationData,
        user_id_token: Option<&UserIdToken>,
    ) -> Result<MslUser> {
        let UserAuthenticationData::UserIdToken(data) = data else {
            return Err(incorrect_data_type(self.scheme(), data));
        };

        let master_token = data.master_token();
        let Some(mt_identity) = master_token.identity() else {
            return Err(Error::user_auth(
                ErrorCode::UserAuthMasterTokenNotDecrypted,
                master_token,
            ));
        };
        if mt_identity != identity {
            warn!(identity, mt_identity, "user authentication master token issued to another entity");
            return Err(Error::user_auth(
                ErrorCode::UserAuthEntityMismatch,
                format!("entity {identity}; mt {mt_identity}"),
            ));
        }

        let uad_token = data.user_id_token();
        let Some(user) = uad_token.user() else {
            return Err(Error::user_auth(
                ErrorCode::UserAuthUserIdTokenNotDecrypted,
                uad_token,
            ));
        };
        if !uad_token.is_bound_to(master_token) {
            return Err(Error::user_auth(
                ErrorCode::UserAuthUserIdTokenInvalid,
                format!("uit {uad_token} not bound to mt {master_token}"),
            ));
        }

        check_user_id_token(user, user_id_token)?;

        if !self.utils.is_user_scheme_permitted(identity, Some(user), self.scheme()) {
            warn!(identity, %user, "user ID token authentication not permitted");
            return Err(Error::user_auth(
                ErrorCode::IncorrectUserAuthData,
                format!("scheme not permitted {identity}:{user}:{}", self.scheme()),
            ));
        }

        Ok(user.clone())
    }
}
