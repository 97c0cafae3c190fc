//! User authentication through the registered scheme factories.

mod common;

use common::{Fixture, EMAIL, PASSWORD, PSK_IDENTITY, USER};
use tessera_common::{Error, ErrorCode};
use tessera_core::userauth::{EmailPasswordAuthenticationData, UserIdTokenAuthenticationData};
use tessera_core::{
    MslObject, MslUser, TokenFactory, UserAuthenticationData, UserAuthenticationScheme,
};

fn email_password(email: &str, password: &str) -> UserAuthenticationData {
    UserAuthenticationData::EmailPassword(EmailPasswordAuthenticationData::new(email, password))
}

#[test]
fn test_email_password() {
    let server = Fixture::server();
    let data = email_password(EMAIL, PASSWORD);

    let parsed = UserAuthenticationData::parse(&server.ctx, None, &data.to_object()).unwrap();
    assert_eq!(parsed.scheme(), UserAuthenticationScheme::EmailPassword);

    let user = parsed.authenticate(&server.ctx, PSK_IDENTITY, None).unwrap();
    assert_eq!(user, MslUser::new(USER));

    // Surrounding whitespace in the email is ignored
    let padded = email_password(&format!("  {EMAIL} "), PASSWORD);
    assert_eq!(padded.authenticate(&server.ctx, PSK_IDENTITY, None).unwrap(), user);
}

#[test]
fn test_email_password_blank() {
    let server = Fixture::server();
    for data in [email_password("   ", PASSWORD), email_password(EMAIL, "")] {
        let err = data.authenticate(&server.ctx, PSK_IDENTITY, None).unwrap_err();
        assert!(matches!(err, Error::UserAuth(ErrorCode::EmailPasswordBlank, _)));
    }
}

#[test]
fn test_email_password_incorrect() {
    let server = Fixture::server();
    let err = email_password(EMAIL, "wrong")
        .authenticate(&server.ctx, PSK_IDENTITY, None)
        .unwrap_err();
    assert!(matches!(err, Error::UserAuth(ErrorCode::EmailPasswordIncorrect, _)));

    let err = email_password("bob@example.com", PASSWORD)
        .authenticate(&server.ctx, PSK_IDENTITY, None)
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::EmailPasswordIncorrect));
}

#[test]
fn test_email_password_with_user_id_token() {
    let server = Fixture::server();
    let client = Fixture::client_of(&server);
    let mt = server.master_token();
    let data = email_password(EMAIL, PASSWORD);

    let alice = server
        .token_factory
        .create_user_id_token(&server.ctx, &MslUser::new(USER), &mt)
        .unwrap();
    assert!(data.authenticate(&server.ctx, PSK_IDENTITY, Some(&alice)).is_ok());

    let bob = server
        .token_factory
        .create_user_id_token(&server.ctx, &MslUser::new("bob"), &mt)
        .unwrap();
    let err = data.authenticate(&server.ctx, PSK_IDENTITY, Some(&bob)).unwrap_err();
    assert!(matches!(
        err,
        Error::UserAuth(ErrorCode::UserIdTokenUserAuthDataMismatch, _)
    ));

    // A token the receiver could not open names no user to compare
    let sealed = tessera_core::UserIdToken::parse(&client.ctx, &alice.to_object(), &mt).unwrap();
    let err = data.authenticate(&server.ctx, PSK_IDENTITY, Some(&sealed)).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::UserIdTokenNotDecrypted));
}

#[test]
fn test_email_password_scheme_not_permitted() {
    let server = Fixture::server();
    server
        .utils
        .disallow_user_scheme(PSK_IDENTITY, UserAuthenticationScheme::EmailPassword);

    let err = email_password(EMAIL, PASSWORD)
        .authenticate(&server.ctx, PSK_IDENTITY, None)
        .unwrap_err();
    assert!(matches!(err, Error::UserAuth(ErrorCode::IncorrectUserAuthData, _)));
    assert!(email_password(EMAIL, PASSWORD)
        .authenticate(&server.ctx, "other-device", None)
        .is_ok());
}

#[test]
fn test_parse_errors() {
    let server = Fixture::server();

    let mut mo = MslObject::new();
    mo.put("scheme", "SSO");
    mo.put_object("authdata", MslObject::new());
    let err = UserAuthenticationData::parse(&server.ctx, None, &mo).unwrap_err();
    assert!(matches!(err, Error::UserAuth(ErrorCode::UnidentifiedUserAuthScheme, _)));

    let mut mo = email_password(EMAIL, PASSWORD).to_object();
    mo.remove("authdata");
    let err = UserAuthenticationData::parse(&server.ctx, None, &mo).unwrap_err();
    assert!(matches!(err, Error::Encoding(ErrorCode::MslParseError, _)));

    let mut server = server;
    server
        .ctx
        .remove_user_auth_factory(UserAuthenticationScheme::EmailPassword);
    let err = UserAuthenticationData::parse(&server.ctx, None, &email_password(EMAIL, PASSWORD).to_object())
        .unwrap_err();
    assert!(matches!(err, Error::UserAuth(ErrorCode::UserAuthFactoryNotFound, _)));
}

#[test]
fn test_user_id_token_scheme() {
    let server = Fixture::server();
    let mt = server.master_token();
    let uit = server
        .token_factory
        .create_user_id_token(&server.ctx, &MslUser::new(USER), &mt)
        .unwrap();
    let data = UserAuthenticationData::UserIdToken(
        UserIdTokenAuthenticationData::new(mt.clone(), uit.clone()).unwrap(),
    );

    let parsed = UserAuthenticationData::parse(&server.ctx, None, &data.to_object()).unwrap();
    assert_eq!(parsed, data);
    assert_eq!(
        parsed.authenticate(&server.ctx, PSK_IDENTITY, None).unwrap(),
        MslUser::new(USER)
    );
    assert!(parsed.authenticate(&server.ctx, PSK_IDENTITY, Some(&uit)).is_ok());

    let err = parsed.authenticate(&server.ctx, "other-device", None).unwrap_err();
    assert!(matches!(err, Error::UserAuth(ErrorCode::UserAuthEntityMismatch, _)));
}

#[test]
fn test_user_id_token_scheme_binding() {
    let server = Fixture::server();
    let mt = server.master_token();
    let other = server.master_token();
    let uit = server
        .token_factory
        .create_user_id_token(&server.ctx, &MslUser::new(USER), &mt)
        .unwrap();

    let err = UserIdTokenAuthenticationData::new(other, uit).unwrap_err();
    assert!(matches!(err, Error::UserAuth(ErrorCode::UserAuthUserIdTokenInvalid, _)));
}

#[test]
fn test_user_id_token_scheme_undecrypted() {
    let server = Fixture::server();
    let client = Fixture::client_of(&server);
    let mt = server.master_token();
    let uit = server
        .token_factory
        .create_user_id_token(&server.ctx, &MslUser::new(USER), &mt)
        .unwrap();
    let encoded = UserIdTokenAuthenticationData::new(mt, uit).unwrap().to_object();

    // Only the issuer can open the tokens it checks
    let on_client = UserIdTokenAuthenticationData::from_object(&client.ctx, &encoded).unwrap();
    let err = UserAuthenticationData::UserIdToken(on_client)
        .authenticate(&client.ctx, PSK_IDENTITY, None)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::UserAuth(ErrorCode::UserAuthMasterTokenNotDecrypted, _)
    ));
}

#[test]
fn test_user_id_token_scheme_invalid_tokens() {
    let server = Fixture::server();
    let mt = server.master_token();
    let uit = server
        .token_factory
        .create_user_id_token(&server.ctx, &MslUser::new(USER), &mt)
        .unwrap();
    let encoded = UserIdTokenAuthenticationData::new(mt, uit).unwrap().to_object();

    let mut mo = encoded.clone();
    mo.put_object("mastertoken", MslObject::new());
    let err = UserIdTokenAuthenticationData::from_object(&server.ctx, &mo).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::UserAuthMasterTokenInvalid));

    let mut mo = encoded;
    mo.put_object("useridtoken", MslObject::new());
    let err = UserIdTokenAuthenticationData::from_object(&server.ctx, &mo).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::UserAuthUserIdTokenInvalid));
}

#[test]
fn test_user_id_token_scheme_not_permitted() {
    let server = Fixture::server();
    let mt = server.master_token();
    let uit = server
        .token_factory
        .create_user_id_token(&server.ctx, &MslUser::new(USER), &mt)
        .unwrap();
    server
        .utils
        .disallow_user_scheme(PSK_IDENTITY, UserAuthenticationScheme::UserIdToken);

    let data = UserAuthenticationData::UserIdToken(UserIdTokenAuthenticationData::new(mt, uit).unwrap());
    let err = data.authenticate(&server.ctx, PSK_IDENTITY, None).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::IncorrectUserAuthData));
}
