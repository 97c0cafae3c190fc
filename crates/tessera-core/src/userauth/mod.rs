//! User authentication.
//!
//! # Wire Format
//!
//! ```text
//! { "scheme": <scheme name>, "authdata": <scheme-specific object> }
//! ```
//!
//! Parsing mirrors entity authentication: the scheme name is resolved and
//! `authdata` is handed to the factory registered on the [`MslContext`].
//! Some schemes embed tokens and need the master token the message was
//! received under.

pub mod email_password;
pub mod store;
pub mod user_id_token;

use std::fmt;

use tessera_common::{Error, ErrorCode, Result};
use tracing::warn;

use crate::context::MslContext;
use crate::object::MslObject;
use crate::tokens::{MasterToken, MslUser, UserIdToken};

pub use self::email_password::{
    EmailPasswordAuthenticationData, EmailPasswordAuthenticationFactory,
};
pub use self::store::{EmailPasswordStore, MemoryEmailPasswordStore};
pub use self::user_id_token::{
    UserIdTokenAuthenticationData, UserIdTokenAuthenticationFactory,
};

const KEY_SCHEME: &str = "scheme";
const KEY_AUTHDATA: &str = "authdata";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserAuthenticationScheme {
    /// Email address and password.
    EmailPassword,
    /// A master token and user ID token issued earlier.
    UserIdToken,
}

impl UserAuthenticationScheme {
    pub const ALL: [Self; 2] = [Self::EmailPassword, Self::UserIdToken];

    /// Wire name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::EmailPassword => "EMAIL_PASSWORD",
            Self::UserIdToken => "USER_ID_TOKEN",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|scheme| scheme.name() == name)
    }
}

impl fmt::Display for UserAuthenticationScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scheme-tagged user authentication data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAuthenticationData {
    EmailPassword(EmailPasswordAuthenticationData),
    UserIdToken(UserIdTokenAuthenticationData),
}

impl UserAuthenticationData {
    /// Parse `{scheme, authdata}` through the context's registered
    /// factories. `master_token` is the token the enclosing message was
    /// received under, if any.
    pub fn parse(
        ctx: &MslContext,
        master_token: Option<&MasterToken>,
        mo: &MslObject,
    ) -> Result<Self> {
        let name = mo.get_string(KEY_SCHEME)?;
        let auth_data = mo.get_object(KEY_AUTHDATA)?;

        let scheme = UserAuthenticationScheme::from_name(&name).ok_or_else(|| {
            warn!(scheme = %name, "unidentified user authentication scheme");
            Error::user_auth(ErrorCode::UnidentifiedUserAuthScheme, &name)
        })?;
        let factory = ctx.user_auth_factory(scheme).ok_or_else(|| {
            warn!(%scheme, "no user authentication factory registered");
            Error::user_auth(ErrorCode::UserAuthFactoryNotFound, scheme)
        })?;

        factory.create_data(ctx, master_token, &auth_data)
    }

    pub fn scheme(&self) -> UserAuthenticationScheme {
        match self {
            Self::EmailPassword(_) => UserAuthenticationScheme::EmailPassword,
            Self::UserIdToken(_) => UserAuthenticationScheme::UserIdToken,
        }
    }

    pub fn auth_data(&self) -> MslObject {
        match self {
            Self::EmailPassword(data) => data.to_object(),
            Self::UserIdToken(data) => data.to_object(),
        }
    }

    /// Encoded form, `{scheme, authdata}`.
    pub fn to_object(&self) -> MslObject {
        let mut mo = MslObject::new();
        mo.put(KEY_SCHEME, self.scheme().name());
        mo.put_object(KEY_AUTHDATA, self.auth_data());
        mo
    }

    /// Authenticate through the factory registered for this data's scheme.
    pub fn authenticate(
        &self,
        ctx: &MslContext,
        identity: &str,
        user_id_token: Option<&UserIdToken>,
    ) -> Result<MslUser> {
        let scheme = self.scheme();
        let factory = ctx
            .user_auth_factory(scheme)
            .ok_or_else(|| Error::user_auth(ErrorCode::UserAuthFactoryNotFound, scheme))?;
        factory.authenticate(ctx, identity, self, user_id_token)
    }
}

/// Creates and checks user authentication data for one scheme.
pub trait UserAuthenticationFactory: Send + Sync {
    fn scheme(&self) -> UserAuthenticationScheme;

    /// Build the data from its `authdata` object.
    fn create_data(
        &self,
        ctx: &MslContext,
        master_token: Option<&MasterToken>,
        auth_data: &MslObject,
    ) -> Result<UserAuthenticationData>;

    /// Authenticate the user on behalf of the entity `identity`.
    ///
    /// If the message also carried a user ID token, the authenticated user
    /// must be the user that token is bound to.
    fn authenticate(
        &self,
        ctx: &MslContext,
        identity: &str,
        data: &UserAuthenticationData,
        user_id_token: Option<&UserIdToken>,
    ) -> Result<MslUser>;
}

pub(crate) fn incorrect_data_type(
    expected: UserAuthenticationScheme,
    actual: &UserAuthenticationData,
) -> Error {
    Error::internal(format!(
        "incorrect user authentication data type: expected {expected}, got {}",
        actual.scheme()
    ))
}

/// The user must match the one a presented user ID token is bound to.
pub(crate) fn check_user_id_token(user: &MslUser, user_id_token: Option<&UserIdToken>) -> Result<()> {
    let Some(user_id_token) = user_id_token else {
        return Ok(());
    };
    let Some(token_user) = user_id_token.user() else {
        return Err(Error::user_auth(ErrorCode::UserIdTokenNotDecrypted, user_id_token));
    };
    if token_user != user {
        warn!(%user, token_user = %token_user, "user ID token bound to another user");
        return Err(Error::user_auth(
            ErrorCode::UserIdTokenUserAuthDataMismatch,
            format!("uad user {user}; uit user {token_user}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_names() {
        for scheme in UserAuthenticationScheme::ALL {
            assert_eq!(UserAuthenticationScheme::from_name(scheme.name()), Some(scheme));
        }
        assert_eq!(UserAuthenticationScheme::from_name("EMAIL"), None);
    }
}
