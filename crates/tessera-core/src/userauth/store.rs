//! Email/password credential lookup.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tessera_common::helpers::constant_time_eq;

use crate::tokens::MslUser;

pub trait EmailPasswordStore: Send + Sync {
    /// The user for a matching email and password, `None` if either is
    /// wrong.
    fn is_user(&self, email: &str, password: &str) -> Option<MslUser>;
}

struct Credential {
    password: String,
    user: MslUser,
}

/// In-memory [`EmailPasswordStore`]. Passwords are compared in constant
/// time.
#[derive(Default)]
pub struct MemoryEmailPasswordStore {
    credentials: RwLock<HashMap<String, Credential>>,
}

impl MemoryEmailPasswordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, email: impl Into<String>, password: impl Into<String>, user: MslUser) {
        self.credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                email.into(),
                Credential {
                    password: password.into(),
                    user,
                },
            );
    }

    pub fn remove_user(&self, email: &str) {
        self.credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(email);
    }

    pub fn clear(&self) {
        self.credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EmailPasswordStore for MemoryEmailPasswordStore {
    fn is_user(&self, email: &str, password: &str) -> Option<MslUser> {
        let credentials = self.credentials.read().unwrap_or_else(PoisonError::into_inner);
        let credential = credentials.get(email)?;
        constant_time_eq(credential.password.as_bytes(), password.as_bytes())
            .then(|| credential.user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let store = MemoryEmailPasswordStore::new();
        store.add_user("alice@example.com", "hunter2", MslUser::new("alice"));

        assert_eq!(
            store.is_user("alice@example.com", "hunter2"),
            Some(MslUser::new("alice"))
        );
        assert_eq!(store.is_user("alice@example.com", "hunter3"), None);
        assert_eq!(store.is_user("bob@example.com", "hunter2"), None);

        store.remove_user("alice@example.com");
        assert_eq!(store.is_user("alice@example.com", "hunter2"), None);
    }
}
