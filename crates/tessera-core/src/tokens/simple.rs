//! Reference token factory.
//!
//! Keeps one revoked master token identity, one revoked user ID token and a
//! single non-replayable ID window. Intended for tests and single-entity
//! deployments; a production issuer backs these with shared storage.

use std::sync::{Mutex, PoisonError};

use tessera_common::{Error, ErrorCode, Result};
use tessera_crypto::SecretKey;
use tracing::{debug, info, warn};

use crate::context::MslContext;
use crate::entityauth::EntityAuthenticationData;
use crate::object::MslObject;
use crate::tokens::master_token::MasterTokenFields;
use crate::tokens::user_id_token::UserIdTokenFields;
use crate::tokens::{
    MasterToken, MslUser, NonReplayableIdWindow, TokenFactory, TokenPolicy, UserIdToken,
};
use crate::MAX_LONG_VALUE;

#[derive(Default)]
struct FactoryState {
    /// Forced sequence numbering, see [`SimpleTokenFactory::set_newest_master_token`].
    newest_sequence_number: Option<i64>,
    revoked_master_token_identity: Option<String>,
    revoked_user_id_token: Option<UserIdToken>,
    replay: NonReplayableIdWindow,
}

pub struct SimpleTokenFactory {
    policy: TokenPolicy,
    state: Mutex<FactoryState>,
}

impl Default for SimpleTokenFactory {
    fn default() -> Self {
        Self::with_valid_policy(TokenPolicy::default())
    }
}

fn next_sequence_number(sequence_number: i64) -> i64 {
    if sequence_number == MAX_LONG_VALUE {
        0
    } else {
        sequence_number + 1
    }
}

fn require_decrypted(master_token: &MasterToken) -> Result<&str> {
    master_token.identity().ok_or_else(|| {
        Error::master_token(
            ErrorCode::MasterTokenUntrusted,
            format!("master token {master_token} is not decrypted"),
        )
    })
}

/// Largest encoded issuer data a master token will carry.
pub const MAX_ISSUER_DATA_LEN: usize = 8 * 1024;

fn check_issuer_data(issuer_data: &MslObject) -> Result<()> {
    let encoded = issuer_data
        .to_bytes()
        .map_err(|e| Error::encoding(ErrorCode::MasterTokenIssuerDataEncodeError, e))?;
    if encoded.len() > MAX_ISSUER_DATA_LEN {
        return Err(Error::encoding(
            ErrorCode::MasterTokenIssuerDataEncodeError,
            format!("issuer data is {} bytes", encoded.len()),
        ));
    }
    Ok(())
}

fn require_user(user_id_token: &UserIdToken) -> Result<&MslUser> {
    user_id_token.user().ok_or_else(|| {
        Error::user_id_token(
            ErrorCode::UserIdTokenNotDecrypted,
            format!("user ID token {} is not decrypted", user_id_token.serial_number()),
        )
    })
}

impl SimpleTokenFactory {
    /// Factory issuing tokens under `policy`, which must be valid.
    pub fn new(policy: TokenPolicy) -> anyhow::Result<Self> {
        policy.validate()?;
        Ok(Self::with_valid_policy(policy))
    }

    fn with_valid_policy(policy: TokenPolicy) -> Self {
        let state = FactoryState {
            replay: NonReplayableIdWindow::new(policy.non_replayable_id_window),
            ..FactoryState::default()
        };
        Self {
            policy,
            state: Mutex::new(state),
        }
    }

    pub fn policy(&self) -> &TokenPolicy {
        &self.policy
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FactoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Force renewals to continue from `sequence_number` instead of from
    /// the renewed token's own sequence number. `None` restores normal
    /// numbering.
    pub fn set_newest_master_token(&self, sequence_number: Option<i64>) {
        self.state().newest_sequence_number = sequence_number;
    }

    /// Revoke every master token with the same identity as `master_token`.
    pub fn set_revoked_master_token(&self, master_token: Option<&MasterToken>) {
        self.state().revoked_master_token_identity =
            master_token.and_then(|mt| mt.identity().map(str::to_string));
    }

    pub fn set_revoked_user_id_token(&self, user_id_token: Option<&UserIdToken>) {
        self.state().revoked_user_id_token = user_id_token.cloned();
    }

    /// Continue the replay window from `largest`. `-1` puts the window
    /// before ID 0, so the first ID accepted may be anything from 0 up to
    /// the window size.
    pub fn set_largest_non_replayable_id(&self, largest: i64) {
        let window = self.policy.non_replayable_id_window;
        self.state().replay = NonReplayableIdWindow::with_largest(window, largest);
    }

    pub fn largest_non_replayable_id(&self) -> i64 {
        self.state().replay.largest()
    }

    /// Clear all revocations, forced numbering and replay state.
    pub fn reset(&self) {
        let mut state = self.state();
        *state = FactoryState {
            replay: NonReplayableIdWindow::new(self.policy.non_replayable_id_window),
            ..FactoryState::default()
        };
    }
}

impl TokenFactory for SimpleTokenFactory {
    fn is_master_token_revoked(
        &self,
        _ctx: &MslContext,
        master_token: &MasterToken,
    ) -> Result<Option<ErrorCode>> {
        let identity = require_decrypted(master_token)?;
        if self.state().revoked_master_token_identity.as_deref() == Some(identity) {
            warn!(identity, "master token identity revoked");
            return Ok(Some(ErrorCode::MasterTokenIdentityRevoked));
        }
        Ok(None)
    }

    fn accept_non_replayable_id(
        &self,
        _ctx: &MslContext,
        master_token: &MasterToken,
        non_replayable_id: i64,
    ) -> Result<Option<ErrorCode>> {
        require_decrypted(master_token)?;
        let rejection = self.state().replay.accept(non_replayable_id)?;
        if let Some(code) = rejection {
            warn!(non_replayable_id, %code, "non-replayable ID rejected");
        }
        Ok(rejection)
    }

    fn create_master_token(
        &self,
        ctx: &MslContext,
        entity_auth_data: &EntityAuthenticationData,
        encryption_key: SecretKey,
        hmac_key: SecretKey,
        issuer_data: Option<&MslObject>,
    ) -> Result<MasterToken> {
        if let Some(issuer_data) = issuer_data {
            check_issuer_data(issuer_data)?;
        }
        let (renewal_window, expiration) = self.policy.validity(ctx.now())?;
        let identity = entity_auth_data.identity();
        let token = MasterToken::create(
            ctx,
            MasterTokenFields {
                renewal_window,
                expiration,
                sequence_number: 0,
                serial_number: ctx.random_long(),
                issuer_data: issuer_data.cloned(),
                identity,
                encryption_key,
                hmac_key,
            },
        )?;
        info!(serial_number = token.serial_number(), "issued master token");
        Ok(token)
    }

    fn is_master_token_renewable(
        &self,
        _ctx: &MslContext,
        master_token: &MasterToken,
    ) -> Result<Option<ErrorCode>> {
        require_decrypted(master_token)?;
        Ok(None)
    }

    fn renew_master_token(
        &self,
        ctx: &MslContext,
        master_token: &MasterToken,
        encryption_key: SecretKey,
        hmac_key: SecretKey,
        issuer_data: Option<&MslObject>,
    ) -> Result<MasterToken> {
        let identity = require_decrypted(master_token)?.to_string();

        let merged = MslObject::merge(master_token.issuer_data(), issuer_data);
        if let Some(merged) = &merged {
            check_issuer_data(merged)?;
        }

        let sequence_number = {
            let mut state = self.state();
            match state.newest_sequence_number {
                Some(newest) => {
                    let next = next_sequence_number(newest);
                    state.newest_sequence_number = Some(next);
                    next
                }
                None => next_sequence_number(master_token.sequence_number()),
            }
        };

        let (renewal_window, expiration) = self.policy.validity(ctx.now())?;
        let token = MasterToken::create(
            ctx,
            MasterTokenFields {
                renewal_window,
                expiration,
                sequence_number,
                serial_number: master_token.serial_number(),
                issuer_data: merged,
                identity,
                encryption_key,
                hmac_key,
            },
        )?;
        debug!(
            serial_number = token.serial_number(),
            sequence_number, "renewed master token"
        );
        Ok(token)
    }

    fn is_user_id_token_revoked(
        &self,
        _ctx: &MslContext,
        _master_token: &MasterToken,
        user_id_token: &UserIdToken,
    ) -> Result<Option<ErrorCode>> {
        require_user(user_id_token)?;
        if self.state().revoked_user_id_token.as_ref() == Some(user_id_token) {
            warn!(serial_number = user_id_token.serial_number(), "user ID token revoked");
            return Ok(Some(ErrorCode::UserIdTokenRevoked));
        }
        Ok(None)
    }

    fn create_user_id_token(
        &self,
        ctx: &MslContext,
        user: &MslUser,
        master_token: &MasterToken,
    ) -> Result<UserIdToken> {
        let (renewal_window, expiration) = self.policy.validity(ctx.now())?;
        UserIdToken::create(
            ctx,
            UserIdTokenFields {
                renewal_window,
                expiration,
                serial_number: ctx.random_long(),
                issuer_data: None,
                user: user.clone(),
            },
            master_token,
        )
    }

    fn renew_user_id_token(
        &self,
        ctx: &MslContext,
        user_id_token: &UserIdToken,
        master_token: &MasterToken,
    ) -> Result<UserIdToken> {
        let user = require_user(user_id_token)?.clone();
        let (renewal_window, expiration) = self.policy.validity(ctx.now())?;
        UserIdToken::create(
            ctx,
            UserIdTokenFields {
                renewal_window,
                expiration,
                serial_number: user_id_token.serial_number(),
                issuer_data: None,
                user,
            },
            master_token,
        )
    }

    fn create_user(&self, _ctx: &MslContext, user_data: &str) -> Result<MslUser> {
        if user_data.trim().is_empty() {
            return Err(Error::user_id_token(
                ErrorCode::UserIdTokenIdentityInvalid,
                "blank user data",
            ));
        }
        Ok(MslUser::new(user_data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entityauth::unauthenticated::UnauthenticatedAuthenticationData;
    use chrono::{DateTime, Utc};
    use std::sync::Arc;
    use tessera_crypto::SymmetricCryptoContext;

    fn setup() -> (Arc<SimpleTokenFactory>, MslContext) {
        let factory = Arc::new(SimpleTokenFactory::default());
        let ctx = MslContext::new(
            Arc::new(SymmetricCryptoContext::new(
                "token",
                Some(SecretKey::from_bytes(&[5u8; 32]).unwrap()),
                Some(SecretKey::from_bytes(&[6u8; 32]).unwrap()),
                None,
            )),
            factory.clone(),
        );
        (factory, ctx)
    }

    fn entity(identity: &str) -> EntityAuthenticationData {
        EntityAuthenticationData::Unauthenticated(UnauthenticatedAuthenticationData::new(identity))
    }

    fn issue(factory: &SimpleTokenFactory, ctx: &MslContext, identity: &str) -> MasterToken {
        factory
            .create_master_token(
                ctx,
                &entity(identity),
                ctx.generate_secret_key(),
                ctx.generate_secret_key(),
                None,
            )
            .unwrap()
    }

    #[test]
    fn test_renewal_increments_and_wraps() {
        let (factory, ctx) = setup();
        let mt = issue(&factory, &ctx, "entity");
        assert_eq!(mt.sequence_number(), 0);

        let renewed = factory
            .renew_master_token(&ctx, &mt, ctx.generate_secret_key(), ctx.generate_secret_key(), None)
            .unwrap();
        assert_eq!(renewed.sequence_number(), 1);
        assert_eq!(renewed.serial_number(), mt.serial_number());
        assert_eq!(renewed.identity(), Some("entity"));

        let at_max = MasterToken::create(
            &ctx,
            MasterTokenFields {
                renewal_window: mt.renewal_window(),
                expiration: mt.expiration(),
                sequence_number: MAX_LONG_VALUE,
                serial_number: mt.serial_number(),
                issuer_data: None,
                identity: "entity".to_string(),
                encryption_key: ctx.generate_secret_key(),
                hmac_key: ctx.generate_secret_key(),
            },
        )
        .unwrap();
        let wrapped = factory
            .renew_master_token(&ctx, &at_max, ctx.generate_secret_key(), ctx.generate_secret_key(), None)
            .unwrap();
        assert_eq!(wrapped.sequence_number(), 0);
    }

    #[test]
    fn test_forced_sequence_numbering() {
        let (factory, ctx) = setup();
        let mt = issue(&factory, &ctx, "entity");
        factory.set_newest_master_token(Some(10));

        let first = factory
            .renew_master_token(&ctx, &mt, ctx.generate_secret_key(), ctx.generate_secret_key(), None)
            .unwrap();
        let second = factory
            .renew_master_token(&ctx, &mt, ctx.generate_secret_key(), ctx.generate_secret_key(), None)
            .unwrap();
        assert_eq!(first.sequence_number(), 11);
        assert_eq!(second.sequence_number(), 12);
    }

    #[test]
    fn test_renewal_merges_issuer_data() {
        let (factory, ctx) = setup();
        let mut original = MslObject::new();
        original.put("a", 1);
        original.put("b", 1);
        let mt = factory
            .create_master_token(
                &ctx,
                &entity("entity"),
                ctx.generate_secret_key(),
                ctx.generate_secret_key(),
                Some(&original),
            )
            .unwrap();

        let mut update = MslObject::new();
        update.put("b", 2);
        let renewed = factory
            .renew_master_token(&ctx, &mt, ctx.generate_secret_key(), ctx.generate_secret_key(), Some(&update))
            .unwrap();
        let issuer_data = renewed.issuer_data().unwrap();
        assert_eq!(issuer_data.get_long("a").unwrap(), 1);
        assert_eq!(issuer_data.get_long("b").unwrap(), 2);
    }

    #[test]
    fn test_identity_revocation() {
        let (factory, ctx) = setup();
        let revoked = issue(&factory, &ctx, "bad");
        let other = issue(&factory, &ctx, "good");
        let same_identity = issue(&factory, &ctx, "bad");

        factory.set_revoked_master_token(Some(&revoked));
        assert_eq!(
            factory.is_master_token_revoked(&ctx, &same_identity).unwrap(),
            Some(ErrorCode::MasterTokenIdentityRevoked)
        );
        assert_eq!(factory.is_master_token_revoked(&ctx, &other).unwrap(), None);

        factory.reset();
        assert_eq!(factory.is_master_token_revoked(&ctx, &revoked).unwrap(), None);
    }

    #[test]
    fn test_user_id_token_revocation_compares_token() {
        let (factory, ctx) = setup();
        let mt = issue(&factory, &ctx, "entity");
        let user = MslUser::new("alice");
        let revoked = factory.create_user_id_token(&ctx, &user, &mt).unwrap();
        let fresh = factory.create_user_id_token(&ctx, &user, &mt).unwrap();

        factory.set_revoked_user_id_token(Some(&revoked));
        assert_eq!(
            factory.is_user_id_token_revoked(&ctx, &mt, &revoked).unwrap(),
            Some(ErrorCode::UserIdTokenRevoked)
        );
        assert_eq!(factory.is_user_id_token_revoked(&ctx, &mt, &fresh).unwrap(), None);

        let renewed = factory.renew_user_id_token(&ctx, &revoked, &mt).unwrap();
        assert_eq!(renewed.serial_number(), revoked.serial_number());
        assert_eq!(renewed.user(), Some(&user));
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let unbounded = TokenPolicy {
            expiration_offset_secs: i64::MAX,
            ..TokenPolicy::default()
        };
        assert!(SimpleTokenFactory::new(unbounded).is_err());
    }

    #[test]
    fn test_expiration_past_calendar_end_is_an_error() {
        let policy = TokenPolicy {
            expiration_offset_secs: crate::tokens::policy::MAX_OFFSET_SECS,
            ..TokenPolicy::default()
        };
        let factory = Arc::new(SimpleTokenFactory::new(policy).unwrap());
        let late = DateTime::<Utc>::MAX_UTC - chrono::Duration::days(1);
        let ctx = MslContext::new(
            Arc::new(SymmetricCryptoContext::new(
                "token",
                Some(SecretKey::from_bytes(&[5u8; 32]).unwrap()),
                Some(SecretKey::from_bytes(&[6u8; 32]).unwrap()),
                None,
            )),
            factory.clone(),
        )
        .with_clock(move || late);

        let err = factory
            .create_master_token(
                &ctx,
                &entity("entity"),
                ctx.generate_secret_key(),
                ctx.generate_secret_key(),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn test_replay_state_is_per_factory() {
        let (factory, ctx) = setup();
        let mt = issue(&factory, &ctx, "entity");
        factory.set_largest_non_replayable_id(100);

        assert_eq!(factory.accept_non_replayable_id(&ctx, &mt, 100).unwrap(), Some(ErrorCode::MessageReplayed));
        assert_eq!(factory.accept_non_replayable_id(&ctx, &mt, 101).unwrap(), None);
        assert_eq!(factory.largest_non_replayable_id(), 101);

        let (other, _) = setup();
        assert_eq!(other.largest_non_replayable_id(), 0);
    }

    #[test]
    fn test_window_before_first_id() {
        let (factory, ctx) = setup();
        let mt = issue(&factory, &ctx, "entity");

        factory.set_largest_non_replayable_id(-1);
        assert_eq!(factory.accept_non_replayable_id(&ctx, &mt, 0).unwrap(), None);
        assert_eq!(factory.largest_non_replayable_id(), 0);

        let window = factory.policy().non_replayable_id_window;
        factory.set_largest_non_replayable_id(-1);
        assert_eq!(factory.accept_non_replayable_id(&ctx, &mt, window - 1).unwrap(), None);

        factory.set_largest_non_replayable_id(-1);
        assert_eq!(
            factory.accept_non_replayable_id(&ctx, &mt, window).unwrap(),
            Some(ErrorCode::MessageReplayedUnrecoverable)
        );
    }
}
