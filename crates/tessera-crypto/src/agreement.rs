//! X25519 key agreement.
//!
//! Two uses in key exchange:
//! - [`EciesCryptoContext`] wraps session keys to a recipient's public key
//!   (asymmetric-wrapped key exchange)
//! - [`agree`] and [`derive_session_keys`] turn a Diffie-Hellman shared
//!   secret into an encryption and HMAC key pair
//! - [`derive_wrapping_key`] turns an existing session into a wrapping key
//!
//! # Wrapped Key Format
//!
//! ```text
//! [32 bytes: ephemeral X25519 public key] [24 bytes: nonce] [ciphertext + tag]
//! ```

use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use tessera_common::{Error, ErrorCode, Result};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::context::CryptoContext;
use crate::keys::{SecretKey, SECRET_KEY_LEN};
use crate::random::RandomSource;
use crate::symmetric::{open, seal};

const WRAP_DOMAIN: &[u8] = b"tessera.keyx.wrap.v1";
const SESSION_DOMAIN: &[u8] = b"tessera.keyx.session.v1";
const SESSION_WRAP_DOMAIN: &[u8] = b"tessera.keyx.session-wrap.v1";

const PUBLIC_KEY_LEN: usize = 32;

/// Parse an X25519 public key from raw bytes.
pub fn public_key_from_bytes(bytes: &[u8]) -> Result<PublicKey> {
    let bytes: [u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|_| {
        Error::crypto(
            ErrorCode::InvalidPublicKey,
            format!("invalid X25519 public key length: {}", bytes.len()),
        )
    })?;
    Ok(PublicKey::from(bytes))
}

/// Generate a new random X25519 key pair.
pub fn generate_key_pair<R: RngCore + CryptoRng + ?Sized>(rng: &mut R) -> (StaticSecret, PublicKey) {
    let secret = StaticSecret::random_from_rng(&mut *rng);
    let public = PublicKey::from(&secret);
    (secret, public)
}

/// Compute the shared secret with a peer.
///
/// Rejects low-order peer keys that would produce an all-zero secret.
pub fn agree(secret: &StaticSecret, peer: &PublicKey) -> Result<[u8; 32]> {
    let shared = secret.diffie_hellman(peer);
    if !shared.was_contributory() {
        return Err(Error::crypto(
            ErrorCode::KeyDerivationError,
            "non-contributory X25519 public key",
        ));
    }
    Ok(*shared.as_bytes())
}

/// Derive an (encryption, HMAC) key pair from a shared secret.
pub fn derive_session_keys(shared_secret: &[u8], info: &[u8]) -> Result<(SecretKey, SecretKey)> {
    let hkdf = Hkdf::<Sha256>::new(Some(SESSION_DOMAIN), shared_secret);
    let mut output = [0u8; SECRET_KEY_LEN * 2];
    hkdf.expand(info, &mut output)
        .map_err(|_| Error::crypto(ErrorCode::KeyDerivationError, "HKDF expansion failed"))?;

    let (enc, mac) = output.split_at(SECRET_KEY_LEN);
    let keys = (SecretKey::from_bytes(enc)?, SecretKey::from_bytes(mac)?);
    output.zeroize();
    Ok(keys)
}

/// Derive a key-wrapping key from an existing session's key pair.
pub fn derive_wrapping_key(encryption_key: &SecretKey, hmac_key: &SecretKey) -> Result<SecretKey> {
    let mut ikm = [0u8; SECRET_KEY_LEN * 2];
    ikm[..SECRET_KEY_LEN].copy_from_slice(encryption_key.as_bytes());
    ikm[SECRET_KEY_LEN..].copy_from_slice(hmac_key.as_bytes());

    let hkdf = Hkdf::<Sha256>::new(Some(SESSION_WRAP_DOMAIN), &ikm);
    ikm.zeroize();
    let mut output = [0u8; SECRET_KEY_LEN];
    hkdf.expand(b"wrap", &mut output)
        .map_err(|_| Error::crypto(ErrorCode::KeyDerivationError, "HKDF expansion failed"))?;
    let key = SecretKey::from_bytes(&output);
    output.zeroize();
    key
}

fn wrapping_key(shared_secret: &[u8; 32], ephemeral: &PublicKey, recipient: &PublicKey) -> Result<SecretKey> {
    let mut info = Vec::with_capacity(PUBLIC_KEY_LEN * 2);
    info.extend_from_slice(ephemeral.as_bytes());
    info.extend_from_slice(recipient.as_bytes());

    let hkdf = Hkdf::<Sha256>::new(Some(WRAP_DOMAIN), shared_secret);
    let mut output = [0u8; SECRET_KEY_LEN];
    hkdf.expand(&info, &mut output)
        .map_err(|_| Error::crypto(ErrorCode::KeyDerivationError, "HKDF expansion failed"))?;
    let key = SecretKey::from_bytes(&output);
    output.zeroize();
    key
}

/// Wraps keys to an X25519 public key.
///
/// The requester holds the private half and unwraps; the responder holds
/// only the public key and wraps. Encryption and signing are unsupported.
pub struct EciesCryptoContext {
    id: String,
    secret: Option<StaticSecret>,
    public: Option<PublicKey>,
    random: RandomSource,
}

impl EciesCryptoContext {
    /// If only the private key is given, the public key is derived from it.
    pub fn new(id: impl Into<String>, secret: Option<StaticSecret>, public: Option<PublicKey>) -> Self {
        let public = public.or_else(|| secret.as_ref().map(PublicKey::from));
        Self {
            id: id.into(),
            secret,
            public,
            random: RandomSource::os(),
        }
    }

    /// Draw ephemeral keys and nonces from `random`.
    pub fn with_random(mut self, random: RandomSource) -> Self {
        self.random = random;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl CryptoContext for EciesCryptoContext {
    fn encrypt(&self, _data: &[u8]) -> Result<Vec<u8>> {
        Err(Error::crypto(ErrorCode::EncryptNotSupported, format!("wrap context {}", self.id)))
    }

    fn decrypt(&self, _data: &[u8]) -> Result<Vec<u8>> {
        Err(Error::crypto(ErrorCode::DecryptNotSupported, format!("wrap context {}", self.id)))
    }

    fn wrap(&self, key: &SecretKey) -> Result<Vec<u8>> {
        let recipient = self.public.as_ref().ok_or_else(|| {
            Error::crypto(ErrorCode::WrapNotSupported, format!("no public key: {}", self.id))
        })?;

        let (ephemeral_secret, ephemeral_public) = self.random.with(|rng| generate_key_pair(rng));
        let shared = agree(&ephemeral_secret, recipient)
            .map_err(|e| Error::crypto(ErrorCode::WrapError, e))?;
        let kek = wrapping_key(&shared, &ephemeral_public, recipient)?;
        let sealed = seal(&kek, key.as_bytes(), ErrorCode::WrapError, &self.random)?;

        let mut blob = Vec::with_capacity(PUBLIC_KEY_LEN + sealed.len());
        blob.extend_from_slice(ephemeral_public.as_bytes());
        blob.extend_from_slice(&sealed);
        Ok(blob)
    }

    fn unwrap(&self, data: &[u8]) -> Result<SecretKey> {
        let secret = self.secret.as_ref().ok_or_else(|| {
            Error::crypto(ErrorCode::UnwrapNotSupported, format!("no private key: {}", self.id))
        })?;
        if data.len() < PUBLIC_KEY_LEN {
            return Err(Error::crypto(ErrorCode::UnwrapError, "wrapped key is too short"));
        }

        let (ephemeral, sealed) = data.split_at(PUBLIC_KEY_LEN);
        let ephemeral = public_key_from_bytes(ephemeral)?;
        let recipient = PublicKey::from(secret);
        let shared = agree(secret, &ephemeral).map_err(|e| Error::crypto(ErrorCode::UnwrapError, e))?;
        let kek = wrapping_key(&shared, &ephemeral, &recipient)?;
        let bytes = open(&kek, sealed, ErrorCode::UnwrapError)?;
        SecretKey::from_bytes(&bytes)
    }

    fn sign(&self, _data: &[u8]) -> Result<Vec<u8>> {
        Err(Error::crypto(ErrorCode::SignNotSupported, format!("wrap context {}", self.id)))
    }

    fn verify(&self, _data: &[u8], _signature: &[u8]) -> Result<bool> {
        Err(Error::crypto(ErrorCode::VerifyNotSupported, format!("wrap context {}", self.id)))
    }
}
