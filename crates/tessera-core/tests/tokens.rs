//! Token issuance, trust, renewal, revocation and replay through the
//! reference token factory.

mod common;

use chrono::Duration;
use common::{Fixture, PSK_IDENTITY, USER};
use tessera_common::{Error, ErrorCode};
use tessera_core::tokens::simple::MAX_ISSUER_DATA_LEN;
use tessera_core::tokens::MasterTokenFields;
use tessera_core::{MasterToken, MslObject, MslUser, TokenFactory, UserIdToken, MAX_LONG_VALUE};

#[test]
fn test_master_token_trusted_only_by_issuer() {
    let server = Fixture::server();
    let client = Fixture::client_of(&server);
    let mt = server.master_token();
    let encoded = mt.to_object();

    let on_server = MasterToken::parse(&server.ctx, &encoded).unwrap();
    assert!(on_server.is_trusted());
    assert_eq!(on_server.identity(), Some(PSK_IDENTITY));
    assert_eq!(on_server.encryption_key(), mt.encryption_key());

    let on_client = MasterToken::parse(&client.ctx, &encoded).unwrap();
    assert!(!on_client.is_verified());
    assert!(!on_client.is_decrypted());
    assert_eq!(on_client.identity(), None);
    assert!(on_client.hmac_key().is_none());
    // Identity fields are still comparable
    assert_eq!(on_client, mt);
    assert_eq!(on_client.serial_number(), mt.serial_number());
}

#[test]
fn test_tampered_master_token_is_untrusted() {
    let server = Fixture::server();
    let mt = server.master_token();

    let mut encoded = mt.to_object();
    let mut signature = encoded.get_bytes("signature").unwrap();
    signature[0] ^= 0xff;
    encoded.put_bytes("signature", &signature);

    let parsed = MasterToken::parse(&server.ctx, &encoded).unwrap();
    assert!(!parsed.is_verified());
    assert!(parsed.identity().is_none());
}

#[test]
fn test_master_token_missing_tokendata() {
    let server = Fixture::server();
    let mut encoded = server.master_token().to_object();
    encoded.remove("tokendata");
    let err = MasterToken::parse(&server.ctx, &encoded).unwrap_err();
    assert!(matches!(err, Error::Encoding(ErrorCode::MslParseError, _)));
}

#[test]
fn test_renewal_keeps_serial_and_advances_sequence() {
    let server = Fixture::server();
    let mt = server.master_token();

    let mut issuer_data = MslObject::new();
    issuer_data.put("region", "eu");
    let renewed = server
        .token_factory
        .renew_master_token(
            &server.ctx,
            &mt,
            server.ctx.generate_secret_key(),
            server.ctx.generate_secret_key(),
            Some(&issuer_data),
        )
        .unwrap();

    assert_eq!(renewed.serial_number(), mt.serial_number());
    assert_eq!(renewed.sequence_number(), mt.sequence_number() + 1);
    assert_eq!(renewed.identity(), Some(PSK_IDENTITY));
    assert_eq!(renewed.issuer_data(), Some(&issuer_data));
    assert!(renewed.is_newer_than(&mt));
    assert!(!mt.is_newer_than(&renewed));
}

#[test]
fn test_renewal_wraps_sequence_number() {
    let server = Fixture::server();
    let now = server.ctx.now();
    let mt = MasterToken::create(
        &server.ctx,
        MasterTokenFields {
            renewal_window: now + Duration::seconds(10),
            expiration: now + Duration::seconds(20),
            sequence_number: MAX_LONG_VALUE,
            serial_number: 42,
            issuer_data: None,
            identity: PSK_IDENTITY.to_string(),
            encryption_key: server.ctx.generate_secret_key(),
            hmac_key: server.ctx.generate_secret_key(),
        },
    )
    .unwrap();

    let renewed = server
        .token_factory
        .renew_master_token(
            &server.ctx,
            &mt,
            server.ctx.generate_secret_key(),
            server.ctx.generate_secret_key(),
            None,
        )
        .unwrap();
    assert_eq!(renewed.sequence_number(), 0);
    assert!(renewed.is_newer_than(&mt));
}

#[test]
fn test_forced_newest_sequence_number() {
    let server = Fixture::server();
    let mt = server.master_token();
    server.token_factory.set_newest_master_token(Some(40));

    let renew = || {
        server
            .token_factory
            .renew_master_token(
                &server.ctx,
                &mt,
                server.ctx.generate_secret_key(),
                server.ctx.generate_secret_key(),
                None,
            )
            .unwrap()
    };
    assert_eq!(renew().sequence_number(), 41);
    assert_eq!(renew().sequence_number(), 42);
}

#[test]
fn test_untrusted_master_token_cannot_be_renewed() {
    let server = Fixture::server();
    let client = Fixture::client_of(&server);
    let untrusted = MasterToken::parse(&client.ctx, &server.master_token().to_object()).unwrap();

    let err = server
        .token_factory
        .renew_master_token(
            &server.ctx,
            &untrusted,
            server.ctx.generate_secret_key(),
            server.ctx.generate_secret_key(),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, Error::MasterToken(ErrorCode::MasterTokenUntrusted, _)));
}

#[test]
fn test_master_token_revocation() {
    let server = Fixture::server();
    let mt = server.master_token();
    assert_eq!(server.token_factory.is_master_token_revoked(&server.ctx, &mt).unwrap(), None);

    server.token_factory.set_revoked_master_token(Some(&mt));
    assert_eq!(
        server.token_factory.is_master_token_revoked(&server.ctx, &mt).unwrap(),
        Some(ErrorCode::MasterTokenIdentityRevoked)
    );

    server.token_factory.set_revoked_master_token(None);
    assert_eq!(server.token_factory.is_master_token_revoked(&server.ctx, &mt).unwrap(), None);
}

#[test]
fn test_user_id_token_lifecycle() {
    let server = Fixture::server();
    let client = Fixture::client_of(&server);
    let mt = server.master_token();
    let user = MslUser::new(USER);

    let uit = server.token_factory.create_user_id_token(&server.ctx, &user, &mt).unwrap();
    assert!(uit.is_bound_to(&mt));
    assert_eq!(uit.user(), Some(&user));

    let parsed = UserIdToken::parse(&server.ctx, &uit.to_object(), &mt).unwrap();
    assert!(parsed.is_trusted());
    assert_eq!(parsed, uit);

    let on_client = UserIdToken::parse(&client.ctx, &uit.to_object(), &mt).unwrap();
    assert!(on_client.user().is_none());

    let renewed = server.token_factory.renew_user_id_token(&server.ctx, &uit, &mt).unwrap();
    assert_eq!(renewed.serial_number(), uit.serial_number());
    assert_eq!(renewed.user(), Some(&user));

    assert_eq!(
        server.token_factory.is_user_id_token_revoked(&server.ctx, &mt, &uit).unwrap(),
        None
    );
    server.token_factory.set_revoked_user_id_token(Some(&uit));
    assert_eq!(
        server.token_factory.is_user_id_token_revoked(&server.ctx, &mt, &renewed).unwrap(),
        Some(ErrorCode::UserIdTokenRevoked)
    );
}

#[test]
fn test_user_id_token_bound_to_other_master_token() {
    let server = Fixture::server();
    let mt = server.master_token();
    let other = server.master_token();
    let uit = server
        .token_factory
        .create_user_id_token(&server.ctx, &MslUser::new(USER), &mt)
        .unwrap();

    let err = UserIdToken::parse(&server.ctx, &uit.to_object(), &other).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::UserIdTokenMasterTokenMismatch));
}

#[test]
fn test_non_replayable_ids() {
    let server = Fixture::server();
    let mt = server.master_token();
    let factory = &server.token_factory;
    let accept = |id| factory.accept_non_replayable_id(&server.ctx, &mt, id).unwrap();

    factory.set_largest_non_replayable_id(100);
    assert_eq!(accept(101), None);
    assert_eq!(factory.largest_non_replayable_id(), 101);

    // Recent IDs are recoverable replays
    assert_eq!(accept(101), Some(ErrorCode::MessageReplayed));
    assert_eq!(accept(96), Some(ErrorCode::MessageReplayed));
    // Older ones are not
    assert_eq!(accept(95), Some(ErrorCode::MessageReplayedUnrecoverable));
    // Nor are IDs beyond the window
    assert_eq!(accept(101 + 65536 + 1), Some(ErrorCode::MessageReplayedUnrecoverable));
    assert_eq!(accept(101 + 65536), None);
    assert_eq!(factory.largest_non_replayable_id(), 101 + 65536);

    let err = factory
        .accept_non_replayable_id(&server.ctx, &mt, MAX_LONG_VALUE + 1)
        .unwrap_err();
    assert!(matches!(err, Error::Message(ErrorCode::NonReplayableIdOutOfRange, _)));
    let err = factory.accept_non_replayable_id(&server.ctx, &mt, -1).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NonReplayableIdOutOfRange));
}

#[test]
fn test_non_replayable_id_wraparound() {
    let server = Fixture::server();
    let mt = server.master_token();
    server.token_factory.set_largest_non_replayable_id(MAX_LONG_VALUE - 10);

    assert_eq!(
        server.token_factory.accept_non_replayable_id(&server.ctx, &mt, 5).unwrap(),
        None
    );
    assert_eq!(server.token_factory.largest_non_replayable_id(), 5);
}

#[test]
fn test_untrusted_master_token_checks() {
    let server = Fixture::server();
    let client = Fixture::client_of(&server);
    let untrusted = MasterToken::parse(&client.ctx, &server.master_token().to_object()).unwrap();
    let factory = &server.token_factory;

    let err = factory.is_master_token_revoked(&server.ctx, &untrusted).unwrap_err();
    assert!(matches!(err, Error::MasterToken(ErrorCode::MasterTokenUntrusted, _)));

    factory.set_largest_non_replayable_id(100);
    let err = factory
        .accept_non_replayable_id(&server.ctx, &untrusted, 101)
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::MasterTokenUntrusted));
    // The window is untouched
    assert_eq!(factory.largest_non_replayable_id(), 100);
}

#[test]
fn test_undecrypted_user_id_token_revocation_check() {
    let server = Fixture::server();
    let client = Fixture::client_of(&server);
    let mt = server.master_token();
    let uit = server
        .token_factory
        .create_user_id_token(&server.ctx, &MslUser::new(USER), &mt)
        .unwrap();
    let sealed = UserIdToken::parse(&client.ctx, &uit.to_object(), &mt).unwrap();

    let err = server
        .token_factory
        .is_user_id_token_revoked(&server.ctx, &mt, &sealed)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::UserIdToken(ErrorCode::UserIdTokenNotDecrypted, _)
    ));
}

#[test]
fn test_renewal_with_oversized_issuer_data() {
    let server = Fixture::server();
    let mt = server.master_token();

    let mut issuer_data = MslObject::new();
    issuer_data.put("blob", "x".repeat(MAX_ISSUER_DATA_LEN));
    let err = server
        .token_factory
        .renew_master_token(
            &server.ctx,
            &mt,
            server.ctx.generate_secret_key(),
            server.ctx.generate_secret_key(),
            Some(&issuer_data),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Encoding(ErrorCode::MasterTokenIssuerDataEncodeError, _)
    ));
}
