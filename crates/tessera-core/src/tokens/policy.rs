//! Token issuance policy.

use anyhow::{bail, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tessera_common::config::env_parsed;
use tessera_common::Error;

use crate::tokens::replay::NonReplayableIdWindow;

pub const ENV_RENEWAL_OFFSET: &str = "TESSERA_RENEWAL_OFFSET_SECS";
pub const ENV_EXPIRATION_OFFSET: &str = "TESSERA_EXPIRATION_OFFSET_SECS";
pub const ENV_NON_REPLAYABLE_ID_WINDOW: &str = "TESSERA_NON_REPLAYABLE_ID_WINDOW";

/// Largest accepted renewal or expiration offset, one hundred years.
pub const MAX_OFFSET_SECS: i64 = 100 * 365 * 24 * 60 * 60;

/// Offsets applied to newly issued tokens and the replay window size.
///
/// Owned by a token factory instance, so differently configured factories
/// can coexist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenPolicy {
    /// Seconds from issuance until the token may be renewed.
    pub renewal_offset_secs: i64,
    /// Seconds from issuance until the token expires.
    pub expiration_offset_secs: i64,
    pub non_replayable_id_window: i64,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            renewal_offset_secs: 60,
            expiration_offset_secs: 120,
            non_replayable_id_window: NonReplayableIdWindow::DEFAULT_WINDOW,
        }
    }
}

impl TokenPolicy {
    /// Load from `TESSERA_*` environment variables, falling back to the
    /// defaults for unset values. A malformed value is an error.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let policy = Self {
            renewal_offset_secs: env_parsed(ENV_RENEWAL_OFFSET)?
                .unwrap_or(defaults.renewal_offset_secs),
            expiration_offset_secs: env_parsed(ENV_EXPIRATION_OFFSET)?
                .unwrap_or(defaults.expiration_offset_secs),
            non_replayable_id_window: env_parsed(ENV_NON_REPLAYABLE_ID_WINDOW)?
                .unwrap_or(defaults.non_replayable_id_window),
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.renewal_offset_secs < 0 {
            bail!("renewal offset must not be negative: {}", self.renewal_offset_secs);
        }
        if self.expiration_offset_secs <= self.renewal_offset_secs {
            bail!(
                "expiration offset ({}) must be greater than renewal offset ({})",
                self.expiration_offset_secs,
                self.renewal_offset_secs
            );
        }
        if self.expiration_offset_secs > MAX_OFFSET_SECS {
            bail!(
                "expiration offset ({}) exceeds {MAX_OFFSET_SECS} seconds",
                self.expiration_offset_secs
            );
        }
        if self.non_replayable_id_window <= 0 {
            bail!(
                "non-replayable ID window must be positive: {}",
                self.non_replayable_id_window
            );
        }
        Ok(())
    }

    /// Renewal window and expiration of a token issued at `now`.
    ///
    /// Fails rather than overflowing when an offset lands outside the
    /// representable time range.
    pub fn validity(
        &self,
        now: DateTime<Utc>,
    ) -> tessera_common::Result<(DateTime<Utc>, DateTime<Utc>)> {
        let offset = |secs: i64| {
            Duration::try_seconds(secs)
                .and_then(|delta| now.checked_add_signed(delta))
                .ok_or_else(|| Error::internal(format!("token offset of {secs}s is out of range")))
        };
        Ok((
            offset(self.renewal_offset_secs)?,
            offset(self.expiration_offset_secs)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let policy = TokenPolicy::default();
        policy.validate().unwrap();
        assert_eq!(policy.non_replayable_id_window, 65536);

        let now = Utc::now();
        let (renewal_window, expiration) = policy.validity(now).unwrap();
        assert_eq!(renewal_window - now, Duration::seconds(60));
        assert_eq!(expiration - now, Duration::seconds(120));
    }

    #[test]
    fn test_huge_offsets_rejected() {
        let huge = TokenPolicy {
            expiration_offset_secs: i64::MAX,
            ..TokenPolicy::default()
        };
        assert!(huge.validate().is_err());
        let err = huge.validity(Utc::now()).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));

        // In range for the duration type but past the end of the calendar
        let far = TokenPolicy {
            expiration_offset_secs: MAX_OFFSET_SECS,
            ..TokenPolicy::default()
        };
        far.validate().unwrap();
        assert!(far.validity(DateTime::<Utc>::MAX_UTC - Duration::days(1)).is_err());
        assert!(far.validity(Utc::now()).is_ok());
    }

    #[test]
    fn test_invalid_policies_rejected() {
        let inverted = TokenPolicy {
            renewal_offset_secs: 120,
            expiration_offset_secs: 60,
            ..TokenPolicy::default()
        };
        assert!(inverted.validate().is_err());

        let no_window = TokenPolicy {
            non_replayable_id_window: 0,
            ..TokenPolicy::default()
        };
        assert!(no_window.validate().is_err());
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let policy: TokenPolicy = serde_json::from_str(r#"{"renewal_offset_secs": 10}"#).unwrap();
        assert_eq!(policy.renewal_offset_secs, 10);
        assert_eq!(policy.expiration_offset_secs, 120);
    }

    #[test]
    fn test_from_env() {
        // Only this test touches these variables.
        std::env::set_var(ENV_RENEWAL_OFFSET, "30");
        std::env::set_var(ENV_EXPIRATION_OFFSET, "90");
        let policy = TokenPolicy::from_env().unwrap();
        assert_eq!(policy.renewal_offset_secs, 30);
        assert_eq!(policy.expiration_offset_secs, 90);

        std::env::set_var(ENV_EXPIRATION_OFFSET, "10");
        assert!(TokenPolicy::from_env().is_err());

        std::env::set_var(ENV_EXPIRATION_OFFSET, "ninety");
        assert!(TokenPolicy::from_env().is_err());

        std::env::set_var(ENV_EXPIRATION_OFFSET, i64::MAX.to_string());
        assert!(TokenPolicy::from_env().is_err());

        std::env::remove_var(ENV_RENEWAL_OFFSET);
        std::env::remove_var(ENV_EXPIRATION_OFFSET);
    }
}
