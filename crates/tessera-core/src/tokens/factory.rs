//! Token issuance and trust policy.

use tessera_common::{ErrorCode, Result};
use tessera_crypto::SecretKey;

use crate::context::MslContext;
use crate::entityauth::EntityAuthenticationData;
use crate::object::MslObject;
use crate::tokens::{MasterToken, MslUser, UserIdToken};

/// Policy consulted wherever a token is issued or a trust decision is made.
///
/// Checks return `Ok(None)` to accept, `Ok(Some(code))` to reject with a
/// condition the caller maps onto a protocol response, and `Err` when the
/// check could not be made at all (for example an undecrypted token).
pub trait TokenFactory: Send + Sync {
    /// Fails with [`ErrorCode::MasterTokenUntrusted`] if the token is not
    /// decrypted.
    fn is_master_token_revoked(
        &self,
        ctx: &MslContext,
        master_token: &MasterToken,
    ) -> Result<Option<ErrorCode>>;

    /// Replay check for a non-replayable message ID sent under
    /// `master_token`. Accepting an ID records it.
    fn accept_non_replayable_id(
        &self,
        ctx: &MslContext,
        master_token: &MasterToken,
        non_replayable_id: i64,
    ) -> Result<Option<ErrorCode>>;

    /// Issue a fresh master token for an authenticated entity.
    fn create_master_token(
        &self,
        ctx: &MslContext,
        entity_auth_data: &EntityAuthenticationData,
        encryption_key: SecretKey,
        hmac_key: SecretKey,
        issuer_data: Option<&MslObject>,
    ) -> Result<MasterToken>;

    fn is_master_token_renewable(
        &self,
        ctx: &MslContext,
        master_token: &MasterToken,
    ) -> Result<Option<ErrorCode>>;

    /// Issue the next token in `master_token`'s lineage with new keys and
    /// `issuer_data` merged over the existing issuer data.
    fn renew_master_token(
        &self,
        ctx: &MslContext,
        master_token: &MasterToken,
        encryption_key: SecretKey,
        hmac_key: SecretKey,
        issuer_data: Option<&MslObject>,
    ) -> Result<MasterToken>;

    /// Fails with [`ErrorCode::UserIdTokenNotDecrypted`] if the token is not
    /// decrypted.
    fn is_user_id_token_revoked(
        &self,
        ctx: &MslContext,
        master_token: &MasterToken,
        user_id_token: &UserIdToken,
    ) -> Result<Option<ErrorCode>>;

    fn create_user_id_token(
        &self,
        ctx: &MslContext,
        user: &MslUser,
        master_token: &MasterToken,
    ) -> Result<UserIdToken>;

    /// Reissue a user ID token, keeping its serial number, bound to
    /// `master_token`.
    fn renew_user_id_token(
        &self,
        ctx: &MslContext,
        user_id_token: &UserIdToken,
        master_token: &MasterToken,
    ) -> Result<UserIdToken>;

    /// Reconstruct a user from the encoded form inside a user ID token.
    fn create_user(&self, ctx: &MslContext, user_data: &str) -> Result<MslUser>;
}
