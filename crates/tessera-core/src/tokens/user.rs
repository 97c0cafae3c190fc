use std::fmt;

/// An authenticated user.
///
/// Opaque to the protocol; the token factory decides what the encoded form
/// means.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MslUser(String);

impl MslUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Encoded form carried inside user ID tokens.
    pub fn encode(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MslUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
