//! Environment-driven configuration helpers.

use std::str::FromStr;

use anyhow::{anyhow, Context};

/// Read and parse an environment variable.
///
/// Returns `Ok(None)` when the variable is unset or blank and an error when
/// it is set to something that does not parse.
pub fn env_parsed<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = match std::env::var(name) {
        Ok(raw) => raw,
        Err(std::env::VarError::NotPresent) => return Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => {
            return Err(anyhow!("{name} is not valid unicode"))
        }
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    trimmed
        .parse::<T>()
        .map(Some)
        .with_context(|| format!("{name} has an invalid value: {trimmed:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_and_blank() {
        assert_eq!(env_parsed::<u64>("TESSERA_TEST_STRICT_UNSET").unwrap(), None);

        std::env::set_var("TESSERA_TEST_STRICT_BLANK", "  ");
        assert_eq!(env_parsed::<i64>("TESSERA_TEST_STRICT_BLANK").unwrap(), None);
    }

    #[test]
    fn test_parse() {
        std::env::set_var("TESSERA_TEST_STRICT_SET", " 90 ");
        assert_eq!(env_parsed::<u64>("TESSERA_TEST_STRICT_SET").unwrap(), Some(90));

        std::env::set_var("TESSERA_TEST_STRICT_BAD", "ninety");
        assert!(env_parsed::<u64>("TESSERA_TEST_STRICT_BAD").is_err());
    }
}
