//! Shared random source for nonces and generated keys.
//!
//! Contexts draw from a [`RandomSource`] instead of the OS generator
//! directly, so an execution context can swap in a seeded generator and
//! every nonce and key it causes to be generated follows from that seed.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

/// Cryptographically secure generator that can be shared across threads.
pub trait SecureRandom: RngCore + CryptoRng + Send {}

impl<T: RngCore + CryptoRng + Send> SecureRandom for T {}

/// Cloneable handle to one generator. Clones draw from the same stream.
#[derive(Clone)]
pub struct RandomSource(Arc<Mutex<Box<dyn SecureRandom>>>);

impl RandomSource {
    /// Handle to the OS generator.
    pub fn os() -> Self {
        Self::new(OsRng)
    }

    pub fn new(random: impl SecureRandom + 'static) -> Self {
        Self(Arc::new(Mutex::new(Box::new(random))))
    }

    /// Run `f` with exclusive access to the generator.
    pub fn with<T>(&self, f: impl FnOnce(&mut dyn SecureRandom) -> T) -> T {
        let mut random = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(random.as_mut())
    }

    pub fn fill_bytes(&self, dest: &mut [u8]) {
        self.with(|random| random.fill_bytes(dest));
    }

    pub fn next_u64(&self) -> u64 {
        self.with(|random| random.next_u64())
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::os()
    }
}

impl fmt::Debug for RandomSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomSource").finish_non_exhaustive()
    }
}
