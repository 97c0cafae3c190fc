//! Tessera trust-token core.
//!
//! This crate provides:
//! - [`MasterToken`] and [`UserIdToken`], sealed by the issuer's token crypto
//!   context and parsed back into trusted or untrusted values
//! - The [`TokenFactory`] policy contract and a reference
//!   [`SimpleTokenFactory`] with revocation and replay bookkeeping
//! - Scheme registries for entity authentication, user authentication and
//!   key exchange, dispatched through the factories registered on an
//!   [`MslContext`]
//!
//! # Trust
//!
//! A token parsed with a context that cannot verify its signature is still
//! returned, but untrusted: it carries no identity or session keys and is
//! rejected by every operation that makes a trust decision.

#![forbid(unsafe_code)]

pub mod authutils;
pub mod context;
pub mod entityauth;
pub mod keyx;
pub mod object;
pub mod tokens;
pub mod userauth;

pub use authutils::{AuthenticationUtils, SimpleAuthenticationUtils};
pub use context::MslContext;
pub use entityauth::{
    EntityAuthenticationData, EntityAuthenticationFactory, EntityAuthenticationScheme,
};
pub use keyx::{
    KeyExchangeData, KeyExchangeEntity, KeyExchangeFactory, KeyExchangeScheme, KeyRequestData,
    KeyResponseData, ResponseKeyData,
};
pub use object::MslObject;
pub use tokens::{
    MasterToken, MslUser, NonReplayableIdWindow, SessionCryptoContext, SimpleTokenFactory,
    TokenFactory, TokenPolicy, UserIdToken,
};
pub use userauth::{
    UserAuthenticationData, UserAuthenticationFactory, UserAuthenticationScheme,
};

/// Largest sequence number, serial number or non-replayable ID.
pub const MAX_LONG_VALUE: i64 = 1 << 53;

/// Maximum number of messages a sender may have in flight.
pub const MAX_MESSAGES: i64 = 12;
