//! User ID tokens.
//!
//! # Wire Format
//!
//! ```text
//! { "tokendata": <bytes>, "signature": <bytes> }
//!
//! tokendata = {
//!   "renewalwindow", "expiration"      seconds since the epoch
//!   "mtserialnumber"                   serial number of the bound master token
//!   "serialnumber"
//!   "userdata"                         encrypted { issuerdata?, identity }
//! }
//! ```
//!
//! The master token binding is a plain serial number so a user ID token can
//! be stored and compared without holding on to its master token.

use std::fmt;

use chrono::{DateTime, Utc};
use tessera_common::helpers::is_blank;
use tessera_common::{Error, ErrorCode, Result};
use tracing::debug;

use crate::context::MslContext;
use crate::object::MslObject;
use crate::tokens::{from_seconds, truncate_to_seconds, MasterToken, MslUser};
use crate::MAX_LONG_VALUE;

const KEY_TOKENDATA: &str = "tokendata";
const KEY_SIGNATURE: &str = "signature";
const KEY_RENEWAL_WINDOW: &str = "renewalwindow";
const KEY_EXPIRATION: &str = "expiration";
const KEY_MASTER_TOKEN_SERIAL_NUMBER: &str = "mtserialnumber";
const KEY_SERIAL_NUMBER: &str = "serialnumber";
const KEY_USERDATA: &str = "userdata";
const KEY_ISSUER_DATA: &str = "issuerdata";
const KEY_IDENTITY: &str = "identity";

/// Everything needed to issue a user ID token, apart from the master token
/// it is bound to.
pub struct UserIdTokenFields {
    pub renewal_window: DateTime<Utc>,
    pub expiration: DateTime<Utc>,
    pub serial_number: i64,
    pub issuer_data: Option<MslObject>,
    pub user: MslUser,
}

/// Binds a user to one master token lineage.
#[derive(Clone)]
pub struct UserIdToken {
    renewal_window: DateTime<Utc>,
    expiration: DateTime<Utc>,
    mt_serial_number: i64,
    serial_number: i64,
    issuer_data: Option<MslObject>,
    user: Option<MslUser>,
    tokendata: Vec<u8>,
    signature: Vec<u8>,
    verified: bool,
}

fn check_range(value: i64, code: ErrorCode, name: &str) -> Result<()> {
    if !(0..=MAX_LONG_VALUE).contains(&value) {
        return Err(Error::user_id_token(code, format!("{name} {value} out of range")));
    }
    Ok(())
}

fn tokendata_error(e: Error) -> Error {
    Error::encoding(ErrorCode::UserIdTokenTokenDataParseError, e)
}

fn userdata_error(e: Error) -> Error {
    Error::encoding(ErrorCode::UserIdTokenUserDataParseError, e)
}

impl UserIdToken {
    pub fn create(ctx: &MslContext, fields: UserIdTokenFields, master_token: &MasterToken) -> Result<Self> {
        let renewal_window = truncate_to_seconds(fields.renewal_window);
        let expiration = truncate_to_seconds(fields.expiration);
        if expiration <= renewal_window {
            return Err(Error::user_id_token(
                ErrorCode::UserIdTokenExpiresBeforeRenewal,
                format!("renewal window {renewal_window}, expiration {expiration}"),
            ));
        }
        check_range(
            fields.serial_number,
            ErrorCode::UserIdTokenSerialNumberOutOfRange,
            "serial number",
        )?;
        let mt_serial_number = master_token.serial_number();

        let crypto = ctx.token_crypto_context();

        let mut userdata = MslObject::new();
        if let Some(issuer_data) = &fields.issuer_data {
            userdata.put_object(KEY_ISSUER_DATA, issuer_data.clone());
        }
        userdata.put(KEY_IDENTITY, fields.user.encode());
        let ciphertext = crypto.encrypt(&userdata.to_bytes()?)?;

        let mut tokendata = MslObject::new();
        tokendata.put(KEY_RENEWAL_WINDOW, renewal_window.timestamp());
        tokendata.put(KEY_EXPIRATION, expiration.timestamp());
        tokendata.put(KEY_MASTER_TOKEN_SERIAL_NUMBER, mt_serial_number);
        tokendata.put(KEY_SERIAL_NUMBER, fields.serial_number);
        tokendata.put_bytes(KEY_USERDATA, &ciphertext);
        let tokendata = tokendata.to_bytes()?;
        let signature = crypto.sign(&tokendata)?;

        Ok(Self {
            renewal_window,
            expiration,
            mt_serial_number,
            serial_number: fields.serial_number,
            issuer_data: fields.issuer_data,
            user: Some(fields.user),
            tokendata,
            signature,
            verified: true,
        })
    }

    /// Reconstruct a user ID token, checking it is bound to `master_token`.
    pub fn parse(ctx: &MslContext, mo: &MslObject, master_token: &MasterToken) -> Result<Self> {
        let crypto = ctx.token_crypto_context();

        let tokendata = mo.get_bytes(KEY_TOKENDATA)?;
        let signature = mo.get_bytes(KEY_SIGNATURE)?;
        let verified = crypto.verify(&tokendata, &signature)?;

        let fields = MslObject::parse(&tokendata).map_err(tokendata_error)?;
        let renewal_window = from_seconds(
            fields.get_long(KEY_RENEWAL_WINDOW).map_err(tokendata_error)?,
            ErrorCode::UserIdTokenTokenDataParseError,
        )?;
        let expiration = from_seconds(
            fields.get_long(KEY_EXPIRATION).map_err(tokendata_error)?,
            ErrorCode::UserIdTokenTokenDataParseError,
        )?;
        if expiration <= renewal_window {
            return Err(Error::user_id_token(
                ErrorCode::UserIdTokenExpiresBeforeRenewal,
                format!("renewal window {renewal_window}, expiration {expiration}"),
            ));
        }
        let mt_serial_number = fields
            .get_long(KEY_MASTER_TOKEN_SERIAL_NUMBER)
            .map_err(tokendata_error)?;
        check_range(
            mt_serial_number,
            ErrorCode::UserIdTokenMasterTokenSerialNumberOutOfRange,
            "master token serial number",
        )?;
        let serial_number = fields.get_long(KEY_SERIAL_NUMBER).map_err(tokendata_error)?;
        check_range(
            serial_number,
            ErrorCode::UserIdTokenSerialNumberOutOfRange,
            "serial number",
        )?;
        let ciphertext = fields.get_bytes(KEY_USERDATA).map_err(tokendata_error)?;

        if mt_serial_number != master_token.serial_number() {
            return Err(Error::user_id_token(
                ErrorCode::UserIdTokenMasterTokenMismatch,
                format!(
                    "bound to {mt_serial_number}, master token is {}",
                    master_token.serial_number()
                ),
            ));
        }

        let (issuer_data, user) = if verified {
            let plaintext = crypto.decrypt(&ciphertext)?;
            let userdata = MslObject::parse(&plaintext).map_err(userdata_error)?;
            let issuer_data = userdata.opt_object(KEY_ISSUER_DATA).map_err(userdata_error)?;
            let identity = userdata.get_string(KEY_IDENTITY).map_err(userdata_error)?;
            if is_blank(&identity) {
                return Err(Error::user_id_token(
                    ErrorCode::UserIdTokenIdentityInvalid,
                    "blank user identity",
                ));
            }
            let user = ctx.token_factory().create_user(ctx, &identity)?;
            (issuer_data, Some(user))
        } else {
            debug!(serial_number, mt_serial_number, "user ID token signature did not verify");
            (None, None)
        };

        Ok(Self {
            renewal_window,
            expiration,
            mt_serial_number,
            serial_number,
            issuer_data,
            user,
            tokendata,
            signature,
            verified,
        })
    }

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

    pub fn serial_number(&self) -> i64 {
        self.serial_number
    }

    pub fn master_token_serial_number(&self) -> i64 {
        self.mt_serial_number
    }

    pub fn issuer_data(&self) -> Option<&MslObject> {
        self.issuer_data.as_ref()
    }

    /// The user, only available once decrypted.
    pub fn user(&self) -> Option<&MslUser> {
        self.user.as_ref()
    }

    pub fn is_decrypted(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub fn is_trusted(&self) -> bool {
        self.verified && self.is_decrypted()
    }

    pub fn is_renewable(&self, now: DateTime<Utc>) -> bool {
        self.renewal_window <= now
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration <= now
    }

    pub fn is_bound_to(&self, master_token: &MasterToken) -> bool {
        self.mt_serial_number == master_token.serial_number()
    }
}

impl PartialEq for UserIdToken {
    fn eq(&self, other: &Self) -> bool {
        self.serial_number == other.serial_number && self.mt_serial_number == other.mt_serial_number
    }
}

impl Eq for UserIdToken {}

impl fmt::Debug for UserIdToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserIdToken")
            .field("serial_number", &self.serial_number)
            .field("mt_serial_number", &self.mt_serial_number)
            .field("renewal_window", &self.renewal_window)
            .field("expiration", &self.expiration)
            .field("user", &self.user)
            .field("verified", &self.verified)
            .finish()
    }
}

impl fmt::Display for UserIdToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.mt_serial_number, self.serial_number)
    }
}
