//! Master tokens.
//!
//! # Wire Format
//!
//! ```text
//! { "tokendata": <bytes>, "signature": <bytes> }
//!
//! tokendata = {
//!   "renewalwindow", "expiration"      seconds since the epoch
//!   "sequencenumber", "serialnumber"
//!   "issuerdata"?                      object
//!   "sessiondata"                      encrypted { identity, encryptionkey, hmackey }
//! }
//! ```
//!
//! The signature and the session data ciphertext are both produced by the
//! token crypto context of the issuing [`MslContext`].

use std::fmt;

use chrono::{DateTime, Utc};
use tessera_common::{Error, ErrorCode, Result};
use tessera_crypto::SecretKey;
use tracing::debug;

use crate::context::MslContext;
use crate::object::MslObject;
use crate::tokens::{from_seconds, truncate_to_seconds};
use crate::MAX_LONG_VALUE;

const KEY_TOKENDATA: &str = "tokendata";
const KEY_SIGNATURE: &str = "signature";
const KEY_RENEWAL_WINDOW: &str = "renewalwindow";
const KEY_EXPIRATION: &str = "expiration";
const KEY_SEQUENCE_NUMBER: &str = "sequencenumber";
const KEY_SERIAL_NUMBER: &str = "serialnumber";
const KEY_ISSUER_DATA: &str = "issuerdata";
const KEY_SESSIONDATA: &str = "sessiondata";
const KEY_IDENTITY: &str = "identity";
const KEY_ENCRYPTION_KEY: &str = "encryptionkey";
const KEY_HMAC_KEY: &str = "hmackey";

/// Sequence numbers this far below the maximum count as wrapped.
const SEQUENCE_WRAP_CUTOFF: i64 = 127;

/// Everything needed to issue a master token.
pub struct MasterTokenFields {
    pub renewal_window: DateTime<Utc>,
    pub expiration: DateTime<Utc>,
    pub sequence_number: i64,
    pub serial_number: i64,
    pub issuer_data: Option<MslObject>,
    pub identity: String,
    pub encryption_key: SecretKey,
    pub hmac_key: SecretKey,
}

/// Binds an entity identity to a pair of session keys.
#[derive(Clone)]
pub struct MasterToken {
    renewal_window: DateTime<Utc>,
    expiration: DateTime<Utc>,
    sequence_number: i64,
    serial_number: i64,
    issuer_data: Option<MslObject>,
    session: Option<SessionData>,
    tokendata: Vec<u8>,
    signature: Vec<u8>,
    verified: bool,
}

#[derive(Clone)]
struct SessionData {
    identity: String,
    encryption_key: SecretKey,
    hmac_key: SecretKey,
}

fn check_range(value: i64, code: ErrorCode, name: &str) -> Result<()> {
    if !(0..=MAX_LONG_VALUE).contains(&value) {
        return Err(Error::master_token(code, format!("{name} {value} out of range")));
    }
    Ok(())
}

fn tokendata_error(e: Error) -> Error {
    Error::encoding(ErrorCode::MasterTokenTokenDataParseError, e)
}

fn sessiondata_error(e: Error) -> Error {
    Error::encoding(ErrorCode::MasterTokenSessionDataParseError, e)
}

impl MasterToken {
    /// Issue a new master token sealed with the context's token crypto
    /// context.
    pub fn create(ctx: &MslContext, fields: MasterTokenFields) -> Result<Self> {
        let renewal_window = truncate_to_seconds(fields.renewal_window);
        let expiration = truncate_to_seconds(fields.expiration);
        if expiration <= renewal_window {
            return Err(Error::master_token(
                ErrorCode::MasterTokenExpiresBeforeRenewal,
                format!("renewal window {renewal_window}, expiration {expiration}"),
            ));
        }
        check_range(
            fields.sequence_number,
            ErrorCode::MasterTokenSequenceNumberOutOfRange,
            "sequence number",
        )?;
        check_range(
            fields.serial_number,
            ErrorCode::MasterTokenSerialNumberOutOfRange,
            "serial number",
        )?;

        let crypto = ctx.token_crypto_context();

        let mut session = MslObject::new();
        session.put(KEY_IDENTITY, fields.identity.as_str());
        session.put_bytes(KEY_ENCRYPTION_KEY, fields.encryption_key.as_bytes());
        session.put_bytes(KEY_HMAC_KEY, fields.hmac_key.as_bytes());
        let ciphertext = crypto.encrypt(&session.to_bytes()?)?;

        let mut tokendata = MslObject::new();
        tokendata.put(KEY_RENEWAL_WINDOW, renewal_window.timestamp());
        tokendata.put(KEY_EXPIRATION, expiration.timestamp());
        tokendata.put(KEY_SEQUENCE_NUMBER, fields.sequence_number);
        tokendata.put(KEY_SERIAL_NUMBER, fields.serial_number);
        if let Some(issuer_data) = &fields.issuer_data {
            tokendata.put_object(KEY_ISSUER_DATA, issuer_data.clone());
        }
        tokendata.put_bytes(KEY_SESSIONDATA, &ciphertext);
        let tokendata = tokendata.to_bytes()?;
        let signature = crypto.sign(&tokendata)?;

        Ok(Self {
            renewal_window,
            expiration,
            sequence_number: fields.sequence_number,
            serial_number: fields.serial_number,
            issuer_data: fields.issuer_data,
            session: Some(SessionData {
                identity: fields.identity,
                encryption_key: fields.encryption_key,
                hmac_key: fields.hmac_key,
            }),
            tokendata,
            signature,
            verified: true,
        })
    }

    /// Reconstruct a master token from its encoded form.
    ///
    /// If the signature does not verify the token is returned untrusted,
    /// without its session data.
    pub fn parse(ctx: &MslContext, mo: &MslObject) -> Result<Self> {
        let crypto = ctx.token_crypto_context();

        let tokendata = mo.get_bytes(KEY_TOKENDATA)?;
        let signature = mo.get_bytes(KEY_SIGNATURE)?;
        let verified = crypto.verify(&tokendata, &signature)?;

        let fields = MslObject::parse(&tokendata).map_err(tokendata_error)?;
        let renewal_window = from_seconds(
            fields.get_long(KEY_RENEWAL_WINDOW).map_err(tokendata_error)?,
            ErrorCode::MasterTokenTokenDataParseError,
        )?;
        let expiration = from_seconds(
            fields.get_long(KEY_EXPIRATION).map_err(tokendata_error)?,
            ErrorCode::MasterTokenTokenDataParseError,
        )?;
        if expiration <= renewal_window {
            return Err(Error::master_token(
                ErrorCode::MasterTokenExpiresBeforeRenewal,
                format!("renewal window {renewal_window}, expiration {expiration}"),
            ));
        }
        let sequence_number = fields.get_long(KEY_SEQUENCE_NUMBER).map_err(tokendata_error)?;
        check_range(
            sequence_number,
            ErrorCode::MasterTokenSequenceNumberOutOfRange,
            "sequence number",
        )?;
        let serial_number = fields.get_long(KEY_SERIAL_NUMBER).map_err(tokendata_error)?;
        check_range(
            serial_number,
            ErrorCode::MasterTokenSerialNumberOutOfRange,
            "serial number",
        )?;
        let issuer_data = fields.opt_object(KEY_ISSUER_DATA).map_err(tokendata_error)?;
        let ciphertext = fields.get_bytes(KEY_SESSIONDATA).map_err(tokendata_error)?;

        let session = if verified {
            let plaintext = crypto.decrypt(&ciphertext)?;
            let session = MslObject::parse(&plaintext).map_err(sessiondata_error)?;
            let identity = session.get_string(KEY_IDENTITY).map_err(sessiondata_error)?;
            let encryption_key =
                SecretKey::from_bytes(&session.get_bytes(KEY_ENCRYPTION_KEY).map_err(sessiondata_error)?)?;
            let hmac_key =
                SecretKey::from_bytes(&session.get_bytes(KEY_HMAC_KEY).map_err(sessiondata_error)?)?;
            Some(SessionData {
                identity,
                encryption_key,
                hmac_key,
            })
        } else {
            debug!(serial_number, sequence_number, "master token signature did not verify");
            None
        };

        Ok(Self {
            renewal_window,
            expiration,
            sequence_number,
            serial_number,
            issuer_data,
            session,
            tokendata,
            signature,
            verified,
        })
    }

    /// Encoded form.
    pub fn to_object(&self) -> MslObject {
        let mut mo = MslObject::new();
        mo.put_bytes(KEY_TOKENDATA, &self.tokendata);
        mo.put_bytes(KEY_SIGNATURE, &self.signature);
        mo
    }

    pub fn renewal_window(&self) -> DateTime<Utc> {
        self.renewal_window
    }

    pub fn expiration(&self) -> DateTime<Utc> {
        self.expiration
    }

    pub fn sequence_number(&self) -> i64 {
        self.sequence_number
    }

    pub fn serial_number(&self) -> i64 {
        self.serial_number
    }

    pub fn issuer_data(&self) -> Option<&MslObject> {
        self.issuer_data.as_ref()
    }

    /// Entity identity, only available once decrypted.
    pub fn identity(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.identity.as_str())
    }

    pub fn encryption_key(&self) -> Option<&SecretKey> {
        self.session.as_ref().map(|s| &s.encryption_key)
    }

    pub fn hmac_key(&self) -> Option<&SecretKey> {
        self.session.as_ref().map(|s| &s.hmac_key)
    }

    pub fn is_decrypted(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Both verified and decrypted.
    pub fn is_trusted(&self) -> bool {
        self.verified && self.is_decrypted()
    }

    /// True once the renewal window has opened.
    pub fn is_renewable(&self, now: DateTime<Utc>) -> bool {
        self.renewal_window <= now
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration <= now
    }

    /// Whether this token supersedes `other` in the same lineage.
    ///
    /// Sequence numbers wrap, so a small number beats one within
    /// [`SEQUENCE_WRAP_CUTOFF`] of the maximum. Equal sequence numbers fall
    /// back to comparing expiration.
    pub fn is_newer_than(&self, other: &MasterToken) -> bool {
        if self.sequence_number == other.sequence_number {
            return self.expiration > other.expiration;
        }

        if self.sequence_number > other.sequence_number {
            let cutoff = self.sequence_number - MAX_LONG_VALUE + SEQUENCE_WRAP_CUTOFF;
            return other.sequence_number >= cutoff;
        }

        let cutoff = other.sequence_number - MAX_LONG_VALUE + SEQUENCE_WRAP_CUTOFF;
        self.sequence_number < cutoff
    }
}

impl PartialEq for MasterToken {
    fn eq(&self, other: &Self) -> bool {
        self.serial_number == other.serial_number
            && self.sequence_number == other.sequence_number
            && self.expiration == other.expiration
    }
}

impl Eq for MasterToken {}

impl fmt::Debug for MasterToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterToken")
            .field("serial_number", &self.serial_number)
            .field("sequence_number", &self.sequence_number)
            .field("renewal_window", &self.renewal_window)
            .field("expiration", &self.expiration)
            .field("identity", &self.identity())
            .field("verified", &self.verified)
            .field("decrypted", &self.is_decrypted())
            .finish()
    }
}

impl fmt::Display for MasterToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.serial_number, self.sequence_number)
    }
}
