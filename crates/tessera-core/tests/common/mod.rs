//! Shared fixtures: an issuer context with every scheme registered and a
//! client context that cannot open the issuer's tokens.

#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use tessera_core::entityauth::{
    EccAuthenticationFactory, MasterTokenProtectedAuthenticationFactory,
    PresharedAuthenticationData, PresharedAuthenticationFactory, RsaAuthenticationFactory,
    UnauthenticatedAuthenticationFactory, UnauthenticatedSuffixedAuthenticationFactory,
};
use tessera_core::keyx::{AsymmetricWrappedExchange, DiffieHellmanExchange, SymmetricWrappedExchange};
use tessera_core::userauth::{
    EmailPasswordAuthenticationFactory, MemoryEmailPasswordStore, UserIdTokenAuthenticationFactory,
};
use tessera_core::{
    EntityAuthenticationData, MasterToken, MslContext, MslUser, SimpleAuthenticationUtils,
    SimpleTokenFactory, TokenFactory,
};
use tessera_crypto::{
    ecc, ClientTokenCryptoContext, KeySet, MemoryEccStore, MemoryPresharedKeyStore, MemoryRsaStore,
    SecretKey, SymmetricCryptoContext,
};

pub const PSK_IDENTITY: &str = "psk-device";
pub const ECC_IDENTITY: &str = "ecc-device";
pub const RSA_IDENTITY: &str = "rsa-device";
pub const RSA_KEY_ID: &str = "rsa-issuer";

pub const EMAIL: &str = "alice@example.com";
pub const PASSWORD: &str = "correct horse";
pub const USER: &str = "alice";

/// RSA key generation is slow; share one key across tests.
pub fn rsa_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 1024).unwrap())
}

pub struct Fixture {
    pub ctx: MslContext,
    pub token_factory: Arc<SimpleTokenFactory>,
    pub utils: Arc<SimpleAuthenticationUtils>,
    pub psk_store: Arc<MemoryPresharedKeyStore>,
    pub ecc_store: Arc<MemoryEccStore>,
    pub rsa_store: Arc<MemoryRsaStore>,
    pub email_store: Arc<MemoryEmailPasswordStore>,
    pub psk_keys: KeySet,
    pub ecc_key_id: String,
}

fn token_crypto_context() -> SymmetricCryptoContext {
    SymmetricCryptoContext::new(
        "issuer",
        Some(SecretKey::generate(&mut OsRng)),
        Some(SecretKey::generate(&mut OsRng)),
        None,
    )
}

/// Register every scheme factory on `ctx`.
fn register_all(
    ctx: MslContext,
    utils: &Arc<SimpleAuthenticationUtils>,
    psk_store: &Arc<MemoryPresharedKeyStore>,
    ecc_store: &Arc<MemoryEccStore>,
    ecc_key_id: &str,
    rsa_store: &Arc<MemoryRsaStore>,
    email_store: &Arc<MemoryEmailPasswordStore>,
) -> MslContext {
    ctx.with_entity_auth_factory(Arc::new(PresharedAuthenticationFactory::new(
        psk_store.clone(),
        utils.clone(),
    )))
    .with_entity_auth_factory(Arc::new(EccAuthenticationFactory::with_key_pair_id(
        ecc_key_id,
        ecc_store.clone(),
        utils.clone(),
    )))
    .with_entity_auth_factory(Arc::new(RsaAuthenticationFactory::with_key_pair_id(
        RSA_KEY_ID,
        rsa_store.clone(),
        utils.clone(),
    )))
    .with_entity_auth_factory(Arc::new(UnauthenticatedAuthenticationFactory::new(utils.clone())))
    .with_entity_auth_factory(Arc::new(UnauthenticatedSuffixedAuthenticationFactory::new(
        utils.clone(),
    )))
    .with_entity_auth_factory(Arc::new(MasterTokenProtectedAuthenticationFactory))
    .with_user_auth_factory(Arc::new(EmailPasswordAuthenticationFactory::new(
        email_store.clone(),
        utils.clone(),
    )))
    .with_user_auth_factory(Arc::new(UserIdTokenAuthenticationFactory::new(utils.clone())))
    .with_key_exchange_factory(Arc::new(AsymmetricWrappedExchange::new(utils.clone())))
    .with_key_exchange_factory(Arc::new(SymmetricWrappedExchange::new(
        psk_store.clone(),
        utils.clone(),
    )))
    .with_key_exchange_factory(Arc::new(DiffieHellmanExchange::new(utils.clone())))
}

impl Fixture {
    /// Issuer side: opens its own tokens.
    pub fn server() -> Self {
        Self::build(Arc::new(token_crypto_context()))
    }

    /// Client side sharing the server's preshared keys and credentials, but
    /// unable to verify or decrypt tokens.
    pub fn client_of(server: &Fixture) -> Self {
        let token_factory = Arc::new(SimpleTokenFactory::default());
        let utils = Arc::new(SimpleAuthenticationUtils::new());
        let psk_store = Arc::new(MemoryPresharedKeyStore::new());
        psk_store.add_keys(PSK_IDENTITY, server.psk_keys.clone());
        let ecc_store = Arc::new(MemoryEccStore::new());
        let rsa_store = Arc::new(MemoryRsaStore::new());
        let email_store = Arc::new(MemoryEmailPasswordStore::new());

        let ctx = register_all(
            MslContext::new(Arc::new(ClientTokenCryptoContext), token_factory.clone()),
            &utils,
            &psk_store,
            &ecc_store,
            &server.ecc_key_id,
            &rsa_store,
            &email_store,
        );
        Self {
            ctx,
            token_factory,
            utils,
            psk_store,
            ecc_store,
            rsa_store,
            email_store,
            psk_keys: server.psk_keys.clone(),
            ecc_key_id: server.ecc_key_id.clone(),
        }
    }

    fn build(token_crypto_context: Arc<SymmetricCryptoContext>) -> Self {
        let token_factory = Arc::new(SimpleTokenFactory::default());
        let utils = Arc::new(SimpleAuthenticationUtils::new());

        let psk_keys = KeySet::generate(&mut OsRng);
        let psk_store = Arc::new(MemoryPresharedKeyStore::new());
        psk_store.add_keys(PSK_IDENTITY, psk_keys.clone());

        let (signing_key, verifying_key) = ecc::generate_key_pair(&mut OsRng);
        let ecc_key_id = ecc::key_id(&verifying_key);
        let ecc_store = Arc::new(MemoryEccStore::new());
        ecc_store.add_key_pair(ecc_key_id.clone(), verifying_key, signing_key);

        let rsa_private = rsa_key().clone();
        let rsa_store = Arc::new(MemoryRsaStore::new());
        rsa_store.add_key_pair(RSA_KEY_ID, rsa_private.to_public_key(), rsa_private);

        let email_store = Arc::new(MemoryEmailPasswordStore::new());
        email_store.add_user(EMAIL, PASSWORD, MslUser::new(USER));

        let ctx = register_all(
            MslContext::new(token_crypto_context, token_factory.clone()),
            &utils,
            &psk_store,
            &ecc_store,
            &ecc_key_id,
            &rsa_store,
            &email_store,
        );
        Self {
            ctx,
            token_factory,
            utils,
            psk_store,
            ecc_store,
            rsa_store,
            email_store,
            psk_keys,
            ecc_key_id,
        }
    }

    pub fn psk_entity(&self) -> EntityAuthenticationData {
        EntityAuthenticationData::Psk(PresharedAuthenticationData::new(PSK_IDENTITY))
    }

    /// A fresh master token for the PSK entity.
    pub fn master_token(&self) -> MasterToken {
        self.token_factory
            .create_master_token(
                &self.ctx,
                &self.psk_entity(),
                self.ctx.generate_secret_key(),
                self.ctx.generate_secret_key(),
                None,
            )
            .unwrap()
    }
}
