use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use pantry_claims::{ArbiterConfig, RetryPolicy};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub arbiter: ArbiterConfig,
    pub retry: RetryPolicy,
    pub sweep_every: Duration,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let arbiter = ArbiterConfig {
            settling_interval: Duration::from_millis(parsed("PANTRY_SETTLING_MS", 1000)?),
            intent_ttl_factor: parsed("PANTRY_INTENT_TTL_FACTOR", 10)?,
        };
        let retry = RetryPolicy {
            max_attempts: parsed("PANTRY_CLAIM_MAX_ATTEMPTS", 3)?,
            jitter: Duration::from_millis(parsed("PANTRY_CLAIM_JITTER_MS", 250)?),
        };

        if arbiter.settling_interval.is_zero() {
            anyhow::bail!("PANTRY_SETTLING_MS must be greater than zero");
        }
        if arbiter.intent_ttl_factor < 2 {
            anyhow::bail!("PANTRY_INTENT_TTL_FACTOR must be at least 2");
        }
        if retry.max_attempts == 0 {
            anyhow::bail!("PANTRY_CLAIM_MAX_ATTEMPTS must be at least 1");
        }

        Ok(Self {
            host: std::env::var("PANTRY_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parsed("PANTRY_PORT", 3000)?,
            db_path: std::env::var("PANTRY_DB_PATH")
                .unwrap_or_else(|_| "pantry.db".into())
                .into(),
            jwt_secret: std::env::var("PANTRY_JWT_SECRET").unwrap_or_default(),
            arbiter,
            retry,
            sweep_every: Duration::from_secs(parsed("PANTRY_SWEEP_INTERVAL_SECS", 30)?),
        })
    }

    pub fn has_usable_secret(&self) -> bool {
        !self.jwt_secret.is_empty() && !PLACEHOLDER_SECRETS.contains(&self.jwt_secret.as_str())
    }
}

fn parsed<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().with_context(|| format!("invalid {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_secrets_are_rejected() {
        let mut config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 3000,
            db_path: "pantry.db".into(),
            jwt_secret: "dev-secret-change-me".into(),
            arbiter: ArbiterConfig::default(),
            retry: RetryPolicy::default(),
            sweep_every: Duration::from_secs(30),
        };
        assert!(!config.has_usable_secret());

        config.jwt_secret.clear();
        assert!(!config.has_usable_secret());

        config.jwt_secret = "9f2c1e7a-long-random".into();
        assert!(config.has_usable_secret());
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        assert_eq!(parsed::<u64>("PANTRY_TEST_SURELY_UNSET", 42).unwrap(), 42);
    }
}
