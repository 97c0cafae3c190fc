//! Common error types for Tessera.
//!
//! Errors are split along two axes. [`Error`] is the *kind* of failure
//! (encoding, crypto, entity authentication, ...), which decides how a caller
//! maps it onto a protocol rejection. [`ErrorCode`] names the specific
//! condition and is also what revocation and replay checks hand back when
//! they reject without failing.

use std::fmt;

use thiserror::Error;

/// Result type alias using Tessera's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Specific failure conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    // Encoding
    MslParseError,
    MasterTokenTokenDataParseError,
    MasterTokenSessionDataParseError,
    MasterTokenIssuerDataEncodeError,
    UserIdTokenTokenDataParseError,
    UserIdTokenUserDataParseError,

    // Crypto
    EncryptNotSupported,
    DecryptNotSupported,
    WrapNotSupported,
    UnwrapNotSupported,
    SignNotSupported,
    VerifyNotSupported,
    EncryptError,
    DecryptError,
    WrapError,
    UnwrapError,
    SignatureError,
    InvalidSymmetricKey,
    InvalidPublicKey,
    InvalidPrivateKey,
    KeyDerivationError,

    // Entity authentication
    UnidentifiedEntityAuthScheme,
    EntityAuthFactoryNotFound,
    IncorrectEntityAuthData,
    EntityRevoked,
    EntityNotFound,
    RsaPublicKeyNotFound,
    RsaPrivateKeyNotFound,
    EccPublicKeyNotFound,
    EccPrivateKeyNotFound,
    EntityAuthMasterTokenInvalid,
    EntityAuthMasterTokenNotDecrypted,
    EntityAuthSignatureInvalid,
    EntityAuthCiphertextInvalid,

    // User authentication
    UnidentifiedUserAuthScheme,
    UserAuthFactoryNotFound,
    EmailPasswordBlank,
    EmailPasswordIncorrect,
    UserIdTokenUserAuthDataMismatch,
    UserAuthMasterTokenInvalid,
    UserAuthUserIdTokenInvalid,
    UserAuthMasterTokenNotDecrypted,
    UserAuthUserIdTokenNotDecrypted,
    UserAuthEntityMismatch,
    IncorrectUserAuthData,

    // Key exchange
    UnidentifiedKeyxScheme,
    KeyxFactoryNotFound,
    UnidentifiedKeyxKeyId,
    UnidentifiedKeyxMechanism,
    KeyxResponseRequestMismatch,
    KeyxMasterTokenMissing,
    KeyxPresharedKeysNotFound,
    KeyxPrivateKeyMissing,
    KeyxInvalidPublicKey,
    UnknownKeyxParametersId,
    IncorrectKeyxData,

    // Master tokens
    MasterTokenUntrusted,
    MasterTokenIdentityRevoked,
    MasterTokenExpiresBeforeRenewal,
    MasterTokenSequenceNumberOutOfRange,
    MasterTokenSerialNumberOutOfRange,

    // User ID tokens
    UserIdTokenNotDecrypted,
    UserIdTokenRevoked,
    UserIdTokenMasterTokenMismatch,
    UserIdTokenExpiresBeforeRenewal,
    UserIdTokenSerialNumberOutOfRange,
    UserIdTokenMasterTokenSerialNumberOutOfRange,
    UserIdTokenIdentityInvalid,

    // Messages
    NonReplayableIdOutOfRange,
    MessageReplayed,
    MessageReplayedUnrecoverable,
}

impl ErrorCode {
    /// Human-readable description of the condition.
    pub fn message(&self) -> &'static str {
        use ErrorCode::*;
        match self {
            MslParseError => "error parsing encoded data",
            MasterTokenTokenDataParseError => "error parsing master token data",
            MasterTokenSessionDataParseError => "error parsing master token session data",
            MasterTokenIssuerDataEncodeError => "error encoding master token issuer data",
            UserIdTokenTokenDataParseError => "error parsing user ID token data",
            UserIdTokenUserDataParseError => "error parsing user ID token user data",

            EncryptNotSupported => "encryption not supported",
            DecryptNotSupported => "decryption not supported",
            WrapNotSupported => "key wrapping not supported",
            UnwrapNotSupported => "key unwrapping not supported",
            SignNotSupported => "signing not supported",
            VerifyNotSupported => "verification not supported",
            EncryptError => "error encrypting plaintext",
            DecryptError => "error decrypting ciphertext",
            WrapError => "error wrapping key",
            UnwrapError => "error unwrapping key",
            SignatureError => "error computing signature",
            InvalidSymmetricKey => "invalid symmetric key",
            InvalidPublicKey => "invalid public key",
            InvalidPrivateKey => "invalid private key",
            KeyDerivationError => "error deriving keys",

            UnidentifiedEntityAuthScheme => "unable to identify entity authentication scheme",
            EntityAuthFactoryNotFound => "no factory registered for entity authentication scheme",
            IncorrectEntityAuthData => "entity authentication scheme not permitted for entity",
            EntityRevoked => "entity is revoked",
            EntityNotFound => "entity not recognized",
            RsaPublicKeyNotFound => "RSA public key not found",
            RsaPrivateKeyNotFound => "RSA private key not found",
            EccPublicKeyNotFound => "ECC public key not found",
            EccPrivateKeyNotFound => "ECC private key not found",
            EntityAuthMasterTokenInvalid => "entity authentication master token is invalid",
            EntityAuthMasterTokenNotDecrypted => {
                "entity authentication master token is not decrypted"
            }
            EntityAuthSignatureInvalid => "invalid entity authentication data signature",
            EntityAuthCiphertextInvalid => "invalid entity authentication data ciphertext",

            UnidentifiedUserAuthScheme => "unable to identify user authentication scheme",
            UserAuthFactoryNotFound => "no factory registered for user authentication scheme",
            EmailPasswordBlank => "email or password is blank",
            EmailPasswordIncorrect => "email or password is incorrect",
            UserIdTokenUserAuthDataMismatch => {
                "user ID token and user authentication data user identities do not match"
            }
            UserAuthMasterTokenInvalid => "user authentication master token is invalid",
            UserAuthUserIdTokenInvalid => "user authentication user ID token is invalid",
            UserAuthMasterTokenNotDecrypted => "user authentication master token is not decrypted",
            UserAuthUserIdTokenNotDecrypted => {
                "user authentication user ID token is not decrypted"
            }
            UserAuthEntityMismatch => "user authentication master token entity mismatch",
            IncorrectUserAuthData => "user authentication scheme not permitted for entity",

            UnidentifiedKeyxScheme => "unable to identify key exchange scheme",
            KeyxFactoryNotFound => "no factory registered for key exchange scheme",
            UnidentifiedKeyxKeyId => "unable to identify key exchange key ID",
            UnidentifiedKeyxMechanism => "unable to identify key exchange mechanism",
            KeyxResponseRequestMismatch => "key exchange response does not match request",
            KeyxMasterTokenMissing => "master token required for key exchange",
            KeyxPresharedKeysNotFound => "preshared keys not found for key exchange",
            KeyxPrivateKeyMissing => "key exchange private key missing",
            KeyxInvalidPublicKey => "key exchange public key is invalid",
            UnknownKeyxParametersId => "key exchange parameters ID unknown",
            IncorrectKeyxData => "key exchange scheme not permitted for entity",

            MasterTokenUntrusted => "master token is not trusted",
            MasterTokenIdentityRevoked => "master token entity identity is revoked",
            MasterTokenExpiresBeforeRenewal => "master token expiration before renewal window",
            MasterTokenSequenceNumberOutOfRange => "master token sequence number out of range",
            MasterTokenSerialNumberOutOfRange => "master token serial number out of range",

            UserIdTokenNotDecrypted => "user ID token is not decrypted",
            UserIdTokenRevoked => "user ID token is revoked",
            UserIdTokenMasterTokenMismatch => "user ID token is not bound to master token",
            UserIdTokenExpiresBeforeRenewal => "user ID token expiration before renewal window",
            UserIdTokenSerialNumberOutOfRange => "user ID token serial number out of range",
            UserIdTokenMasterTokenSerialNumberOutOfRange => {
                "user ID token master token serial number out of range"
            }
            UserIdTokenIdentityInvalid => "user ID token user identity is invalid",

            NonReplayableIdOutOfRange => "non-replayable ID out of range",
            MessageReplayed => "message replayed",
            MessageReplayedUnrecoverable => "message replayed; sender cannot recover",
        }
    }

    /// Whether the sender can recover from this rejection by retrying with
    /// adjusted message state.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ErrorCode::MessageReplayed)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Top-level error type for Tessera operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A required field is missing or has the wrong shape.
    #[error("encoding error: {0} ({1})")]
    Encoding(ErrorCode, String),

    /// A cryptographic primitive failed or is unsupported by the context.
    #[error("crypto error: {0} ({1})")]
    Crypto(ErrorCode, String),

    /// Entity authentication failed.
    #[error("entity authentication error: {0} ({1})")]
    EntityAuth(ErrorCode, String),

    /// User authentication failed.
    #[error("user authentication error: {0} ({1})")]
    UserAuth(ErrorCode, String),

    /// Key exchange failed.
    #[error("key exchange error: {0} ({1})")]
    KeyExchange(ErrorCode, String),

    /// A master token cannot be used as presented.
    #[error("master token error: {0} ({1})")]
    MasterToken(ErrorCode, String),

    /// A user ID token cannot be used as presented.
    #[error("user ID token error: {0} ({1})")]
    UserIdToken(ErrorCode, String),

    /// Message-level protocol violation.
    #[error("message error: {0} ({1})")]
    Message(ErrorCode, String),

    /// Caller misuse or broken internal invariant.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an encoding error from any displayable detail.
    pub fn encoding(code: ErrorCode, detail: impl fmt::Display) -> Self {
        Self::Encoding(code, detail.to_string())
    }

    /// Create a crypto error from any displayable detail.
    pub fn crypto(code: ErrorCode, detail: impl fmt::Display) -> Self {
        Self::Crypto(code, detail.to_string())
    }

    /// Create an entity authentication error from any displayable detail.
    pub fn entity_auth(code: ErrorCode, detail: impl fmt::Display) -> Self {
        Self::EntityAuth(code, detail.to_string())
    }

    /// Create a user authentication error from any displayable detail.
    pub fn user_auth(code: ErrorCode, detail: impl fmt::Display) -> Self {
        Self::UserAuth(code, detail.to_string())
    }

    /// Create a key exchange error from any displayable detail.
    pub fn key_exchange(code: ErrorCode, detail: impl fmt::Display) -> Self {
        Self::KeyExchange(code, detail.to_string())
    }

    /// Create a master token error from any displayable detail.
    pub fn master_token(code: ErrorCode, detail: impl fmt::Display) -> Self {
        Self::MasterToken(code, detail.to_string())
    }

    /// Create a user ID token error from any displayable detail.
    pub fn user_id_token(code: ErrorCode, detail: impl fmt::Display) -> Self {
        Self::UserIdToken(code, detail.to_string())
    }

    /// Create a message error from any displayable detail.
    pub fn message(code: ErrorCode, detail: impl fmt::Display) -> Self {
        Self::Message(code, detail.to_string())
    }

    /// Create an internal error from any displayable type.
    pub fn internal(msg: impl fmt::Display) -> Self {
        Self::Internal(msg.to_string())
    }

    /// The specific condition, if this is not an internal error.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Error::Encoding(code, _)
            | Error::Crypto(code, _)
            | Error::EntityAuth(code, _)
            | Error::UserAuth(code, _)
            | Error::KeyExchange(code, _)
            | Error::MasterToken(code, _)
            | Error::UserIdToken(code, _)
            | Error::Message(code, _) => Some(*code),
            Error::Internal(_) => None,
        }
    }
}
