//! Master tokens, user ID tokens and the policy that issues them.

pub mod factory;
pub mod master_token;
pub mod policy;
pub mod replay;
pub mod session;
pub mod simple;
pub mod user;
pub mod user_id_token;

pub use factory::TokenFactory;
pub use master_token::{MasterToken, MasterTokenFields};
pub use policy::TokenPolicy;
pub use replay::NonReplayableIdWindow;
pub use session::SessionCryptoContext;
pub use simple::SimpleTokenFactory;
pub use user::MslUser;
pub use user_id_token::{UserIdToken, UserIdTokenFields};

use chrono::{DateTime, Timelike, Utc};
use tessera_common::{Error, ErrorCode, Result};

/// Token times are carried in whole seconds.
pub(crate) fn truncate_to_seconds(time: DateTime<Utc>) -> DateTime<Utc> {
    time.with_nanosecond(0).unwrap_or(time)
}

pub(crate) fn from_seconds(seconds: i64, code: ErrorCode) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| Error::encoding(code, format!("timestamp {seconds} out of range")))
}
