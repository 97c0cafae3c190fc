//! Execution context shared by every token and authentication operation.
//!
//! Scheme factories are registered per context rather than globally, so a
//! context can disable a scheme simply by not registering its factory.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tessera_crypto::{CryptoContext, RandomSource, SecretKey, SecureRandom};

use crate::entityauth::{EntityAuthenticationFactory, EntityAuthenticationScheme};
use crate::keyx::{KeyExchangeFactory, KeyExchangeScheme};
use crate::tokens::TokenFactory;
use crate::userauth::{UserAuthenticationFactory, UserAuthenticationScheme};
use crate::MAX_LONG_VALUE;

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct MslContext {
    token_crypto_context: Arc<dyn CryptoContext>,
    token_factory: Arc<dyn TokenFactory>,
    entity_auth_factories: HashMap<EntityAuthenticationScheme, Arc<dyn EntityAuthenticationFactory>>,
    user_auth_factories: HashMap<UserAuthenticationScheme, Arc<dyn UserAuthenticationFactory>>,
    key_exchange_factories: HashMap<KeyExchangeScheme, Arc<dyn KeyExchangeFactory>>,
    random: RandomSource,
    clock: Clock,
}

impl MslContext {
    /// Context with the OS random source, the system clock and no factories.
    ///
    /// `token_crypto_context` seals and opens tokens. A client that cannot
    /// read the issuer's tokens uses
    /// [`tessera_crypto::ClientTokenCryptoContext`].
    pub fn new(
        token_crypto_context: Arc<dyn CryptoContext>,
        token_factory: Arc<dyn TokenFactory>,
    ) -> Self {
        Self {
            token_crypto_context,
            token_factory,
            entity_auth_factories: HashMap::new(),
            user_auth_factories: HashMap::new(),
            key_exchange_factories: HashMap::new(),
            random: RandomSource::os(),
            clock: Box::new(Utc::now),
        }
    }

    /// Replace the random source. Keys, nonces and serial numbers
    /// generated under this context all draw from it.
    pub fn with_random(mut self, random: impl SecureRandom + 'static) -> Self {
        self.random = RandomSource::new(random);
        self
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_entity_auth_factory(mut self, factory: Arc<dyn EntityAuthenticationFactory>) -> Self {
        self.add_entity_auth_factory(factory);
        self
    }

    pub fn with_user_auth_factory(mut self, factory: Arc<dyn UserAuthenticationFactory>) -> Self {
        self.add_user_auth_factory(factory);
        self
    }

    pub fn with_key_exchange_factory(mut self, factory: Arc<dyn KeyExchangeFactory>) -> Self {
        self.add_key_exchange_factory(factory);
        self
    }

    pub fn token_crypto_context(&self) -> &dyn CryptoContext {
        self.token_crypto_context.as_ref()
    }

    pub fn token_factory(&self) -> &dyn TokenFactory {
        self.token_factory.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn random(&self) -> &RandomSource {
        &self.random
    }

    /// Uniformly random value in `[0, MAX_LONG_VALUE)`.
    pub fn random_long(&self) -> i64 {
        (self.random.next_u64() & (MAX_LONG_VALUE as u64 - 1)) as i64
    }

    pub fn generate_secret_key(&self) -> SecretKey {
        self.random.with(|random| SecretKey::generate(random))
    }

    pub fn add_entity_auth_factory(&mut self, factory: Arc<dyn EntityAuthenticationFactory>) {
        self.entity_auth_factories.insert(factory.scheme(), factory);
    }

    pub fn remove_entity_auth_factory(
        &mut self,
        scheme: EntityAuthenticationScheme,
    ) -> Option<Arc<dyn EntityAuthenticationFactory>> {
        self.entity_auth_factories.remove(&scheme)
    }

    pub fn entity_auth_factory(
        &self,
        scheme: EntityAuthenticationScheme,
    ) -> Option<Arc<dyn EntityAuthenticationFactory>> {
        self.entity_auth_factories.get(&scheme).cloned()
    }

    pub fn add_user_auth_factory(&mut self, factory: Arc<dyn UserAuthenticationFactory>) {
        self.user_auth_factories.insert(factory.scheme(), factory);
    }

    pub fn remove_user_auth_factory(
        &mut self,
        scheme: UserAuthenticationScheme,
    ) -> Option<Arc<dyn UserAuthenticationFactory>> {
        self.user_auth_factories.remove(&scheme)
    }

    pub fn user_auth_factory(
        &self,
        scheme: UserAuthenticationScheme,
    ) -> Option<Arc<dyn UserAuthenticationFactory>> {
        self.user_auth_factories.get(&scheme).cloned()
    }

    pub fn add_key_exchange_factory(&mut self, factory: Arc<dyn KeyExchangeFactory>) {
        self.key_exchange_factories.insert(factory.scheme(), factory);
    }

    pub fn remove_key_exchange_factory(
        &mut self,
        scheme: KeyExchangeScheme,
    ) -> Option<Arc<dyn KeyExchangeFactory>> {
        self.key_exchange_factories.remove(&scheme)
    }

    pub fn key_exchange_factory(&self, scheme: KeyExchangeScheme) -> Option<Arc<dyn KeyExchangeFactory>> {
        self.key_exchange_factories.get(&scheme).cloned()
    }
}

impl fmt::Debug for MslContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MslContext")
            .field("entity_auth_schemes", &self.entity_auth_factories.keys().collect::<Vec<_>>())
            .field("user_auth_schemes", &self.user_auth_factories.keys().collect::<Vec<_>>())
            .field("key_exchange_schemes", &self.key_exchange_factories.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::SimpleTokenFactory;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tessera_crypto::NullCryptoContext;

    fn context() -> MslContext {
        MslContext::new(Arc::new(NullCryptoContext), Arc::new(SimpleTokenFactory::default()))
    }

    #[test]
    fn test_random_long_in_range() {
        let ctx = context();
        for _ in 0..1000 {
            let value = ctx.random_long();
            assert!((0..MAX_LONG_VALUE).contains(&value));
        }
    }

    #[test]
    fn test_injected_random_is_deterministic() {
        let a = context().with_random(StdRng::seed_from_u64(7));
        let b = context().with_random(StdRng::seed_from_u64(7));
        assert_eq!(a.random_long(), b.random_long());
        assert_eq!(a.generate_secret_key(), b.generate_secret_key());
    }

    #[test]
    fn test_injected_clock() {
        let fixed = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let ctx = context().with_clock(move || fixed);
        assert_eq!(ctx.now(), fixed);
    }
}
