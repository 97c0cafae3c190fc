//! Email/password user authentication.

use std::fmt;
use std::sync::Arc;

use tessera_common::helpers::is_blank;
use tessera_common::{Error, ErrorCode, Result};
use tracing::{debug, warn};

use crate::authutils::AuthenticationUtils;
use crate::context::MslContext;
use crate::object::MslObject;
use crate::tokens::{MasterToken, MslUser, UserIdToken};
use crate::userauth::{
    check_user_id_token, incorrect_data_type, EmailPasswordStore, UserAuthenticationData,
    UserAuthenticationFactory, UserAuthenticationScheme,
};

const KEY_EMAIL: &str = "email";
const KEY_PASSWORD: &str = "password";

/// `{ "email", "password" }`
#[derive(Clone, PartialEq, Eq)]
pub struct EmailPasswordAuthenticationData {
    email: String,
    password: String,
}

impl EmailPasswordAuthenticationData {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn from_object(mo: &MslObject) -> Result<Self> {
        Ok(Self::new(mo.get_string(KEY_EMAIL)?, mo.get_string(KEY_PASSWORD)?))
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn to_object(&self) -> MslObject {
        let mut mo = MslObject::new();
        mo.put(KEY_EMAIL, self.email.as_str());
        mo.put(KEY_PASSWORD, self.password.as_str());
        mo
    }
}

impl fmt::Debug for EmailPasswordAuthenticationData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailPasswordAuthenticationData")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

pub struct EmailPasswordAuthenticationFactory {
    store: Arc<dyn EmailPasswordStore>,
    utils: Arc<dyn AuthenticationUtils>,
}

impl EmailPasswordAuthenticationFactory {
    pub fn new(store: Arc<dyn EmailPasswordStore>, utils: Arc<dyn AuthenticationUtils>) -> Self {
        Self { store, utils }
    }
}

impl UserAuthenticationFactory for EmailPasswordAuthenticationFactory {
    fn scheme(&self) -> UserAuthenticationScheme {
        UserAuthenticationScheme::EmailPassword
    }

    fn create_data(
        &self,
        _ctx: &MslContext,
        _master_token: Option<&MasterToken>,
        auth_data: &MslObject,
    ) -> Result<UserAuthenticationData> {
        Ok(UserAuthenticationData::EmailPassword(
            EmailPasswordAuthenticationData::from_object(auth_data)?,
        ))
    }

    fn authenticate(
        &self,
        _ctx: &MslContext,
        identity: &str,
        data: &UserAuthenticationData,
        user_id_token: Option<&UserIdToken>,
    ) -> Result<MslUser> {
        let UserAuthenticationData::EmailPassword(data) = data else {
            return Err(incorrect_data_type(self.scheme(), data));
        };

        let email = data.email().trim();
        let password = data.password();
        if is_blank(email) || is_blank(password) {
            return Err(Error::user_auth(ErrorCode::EmailPasswordBlank, email));
        }

        let user = self.store.is_user(email, password).ok_or_else(|| {
            debug!(email, "email/password lookup failed");
            Error::user_auth(ErrorCode::EmailPasswordIncorrect, email)
        })?;

        check_user_id_token(&user, user_id_token)?;

        if !self.utils.is_user_scheme_permitted(identity, Some(&user), self.scheme()) {
            warn!(identity, %user, "email/password authentication not permitted");
            return Err(Error::user_auth(
                ErrorCode::IncorrectUserAuthData,
                format!("scheme not permitted {identity}:{user}:{}", self.scheme()),
            ));
        }

        Ok(user)
    }
}
