//! Revocation and scheme permission hooks shared by the authentication
//! factories.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use crate::entityauth::EntityAuthenticationScheme;
use crate::keyx::KeyExchangeScheme;
use crate::tokens::MslUser;
use crate::userauth::UserAuthenticationScheme;

pub trait AuthenticationUtils: Send + Sync {
    fn is_entity_revoked(&self, identity: &str) -> bool;

    fn is_entity_scheme_permitted(&self, identity: &str, scheme: EntityAuthenticationScheme) -> bool;

    fn is_user_scheme_permitted(
        &self,
        identity: &str,
        user: Option<&MslUser>,
        scheme: UserAuthenticationScheme,
    ) -> bool;

    fn is_keyx_scheme_permitted(&self, identity: &str, scheme: KeyExchangeScheme) -> bool;
}

/// Everything is permitted until revoked or disallowed.
#[derive(Default)]
pub struct SimpleAuthenticationUtils {
    revoked: RwLock<HashSet<String>>,
    entity_schemes: RwLock<HashSet<(String, EntityAuthenticationScheme)>>,
    user_schemes: RwLock<HashSet<(String, UserAuthenticationScheme)>>,
    keyx_schemes: RwLock<HashSet<(String, KeyExchangeScheme)>>,
}

impl SimpleAuthenticationUtils {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoke_entity(&self, identity: impl Into<String>) {
        self.revoked
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.into());
    }

    pub fn disallow_entity_scheme(&self, identity: impl Into<String>, scheme: EntityAuthenticationScheme) {
        self.entity_schemes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((identity.into(), scheme));
    }

    pub fn disallow_user_scheme(&self, identity: impl Into<String>, scheme: UserAuthenticationScheme) {
        self.user_schemes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((identity.into(), scheme));
    }

    pub fn disallow_keyx_scheme(&self, identity: impl Into<String>, scheme: KeyExchangeScheme) {
        self.keyx_schemes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((identity.into(), scheme));
    }

    pub fn reset(&self) {
        self.revoked.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.entity_schemes.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.user_schemes.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.keyx_schemes.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl AuthenticationUtils for SimpleAuthenticationUtils {
    fn is_entity_revoked(&self, identity: &str) -> bool {
        self.revoked
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(identity)
    }

    fn is_entity_scheme_permitted(&self, identity: &str, scheme: EntityAuthenticationScheme) -> bool {
        !self
            .entity_schemes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(identity.to_string(), scheme))
    }

    fn is_user_scheme_permitted(
        &self,
        identity: &str,
        _user: Option<&MslUser>,
        scheme: UserAuthenticationScheme,
    ) -> bool {
        !self
            .user_schemes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(identity.to_string(), scheme))
    }

    fn is_keyx_scheme_permitted(&self, identity: &str, scheme: KeyExchangeScheme) -> bool {
        !self
            .keyx_schemes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(identity.to_string(), scheme))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissions() {
        let utils = SimpleAuthenticationUtils::new();
        assert!(!utils.is_entity_revoked("a"));
        assert!(utils.is_entity_scheme_permitted("a", EntityAuthenticationScheme::Psk));

        utils.revoke_entity("a");
        utils.disallow_entity_scheme("a", EntityAuthenticationScheme::Psk);
        utils.disallow_keyx_scheme("a", KeyExchangeScheme::DiffieHellman);
        assert!(utils.is_entity_revoked("a"));
        assert!(!utils.is_entity_scheme_permitted("a", EntityAuthenticationScheme::Psk));
        assert!(utils.is_entity_scheme_permitted("b", EntityAuthenticationScheme::Psk));
        assert!(!utils.is_keyx_scheme_permitted("a", KeyExchangeScheme::DiffieHellman));

        utils.reset();
        assert!(!utils.is_entity_revoked("a"));
    }
}
