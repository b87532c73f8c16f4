//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use doubt_forum_core::EscalationPolicy;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Preset escalation timings. Individual variables override the preset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscalationProfile {
    /// 30 minutes to seniors, 2 hours to a professor, swept every minute.
    Production,
    /// 30 seconds to seniors, 2 minutes to a professor, swept every 10 seconds.
    Demo,
}

impl EscalationProfile {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "demo" | "test" => Ok(Self::Demo),
            other => Err(ConfigError::InvalidValue(
                "ESCALATION_PROFILE".to_string(),
                format!("'{}' is not one of production, demo", other),
            )),
        }
    }

    /// (senior_after, professor_after, sweep_interval)
    fn timings(self) -> (Duration, Duration, Duration) {
        match self {
            Self::Production => (
                Duration::from_secs(30 * 60),
                Duration::from_secs(2 * 60 * 60),
                Duration::from_secs(60),
            ),
            Self::Demo => (
                Duration::from_secs(30),
                Duration::from_secs(2 * 60),
                Duration::from_secs(10),
            ),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub answer_model: String,
    pub answer_timeout: Duration,
    pub escalation_profile: EscalationProfile,
    pub senior_after: Duration,
    pub professor_after: Duration,
    pub sweep_interval: Duration,
    pub cors_allowed_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address_str =
            lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Answer Model ---
        let openai_api_key = lookup("OPENAI_API_KEY");
        let answer_model = lookup("ANSWER_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());
        let answer_timeout =
            seconds(&lookup, "ANSWER_TIMEOUT_SECS")?.unwrap_or(Duration::from_secs(30));

        // --- Escalation Timings ---
        let escalation_profile = match lookup("ESCALATION_PROFILE") {
            Some(value) => EscalationProfile::parse(&value)?,
            None => EscalationProfile::Production,
        };
        let (senior_default, professor_default, sweep_default) = escalation_profile.timings();
        let senior_after =
            seconds(&lookup, "ESCALATION_SENIOR_AFTER_SECS")?.unwrap_or(senior_default);
        let professor_after =
            seconds(&lookup, "ESCALATION_PROFESSOR_AFTER_SECS")?.unwrap_or(professor_default);
        let sweep_interval =
            seconds(&lookup, "ESCALATION_SWEEP_INTERVAL_SECS")?.unwrap_or(sweep_default);

        let cors_allowed_origin = lookup("CORS_ALLOWED_ORIGIN")
            .unwrap_or_else(|| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            answer_model,
            answer_timeout,
            escalation_profile,
            senior_after,
            professor_after,
            sweep_interval,
            cors_allowed_origin,
        })
    }

    /// The thresholds handed to the escalation engine.
    pub fn escalation_policy(&self) -> EscalationPolicy {
        EscalationPolicy {
            senior_after: chrono::Duration::seconds(self.senior_after.as_secs() as i64),
            professor_after: chrono::Duration::seconds(self.professor_after.as_secs() as i64),
            answer_timeout: self.answer_timeout,
        }
    }
}

/// The largest duration `chrono` can represent, in whole seconds.
const MAX_SECONDS: u64 = (i64::MAX / 1000) as u64;

/// Reads an optional positive number of seconds.
fn seconds<F>(lookup: &F, key: &str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 && secs <= MAX_SECONDS => Ok(Some(Duration::from_secs(secs))),
        _ => Err(ConfigError::InvalidValue(
            key.to_string(),
            format!(
                "'{}' is not a number of seconds between 1 and {}",
                raw, MAX_SECONDS
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_use_production_timings_and_memory_store() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert!(config.database_url.is_none());
        assert_eq!(config.escalation_profile, EscalationProfile::Production);
        assert_eq!(config.senior_after, Duration::from_secs(1800));
        assert_eq!(config.professor_after, Duration::from_secs(7200));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.log_level, Level::INFO);

        let policy = config.escalation_policy();
        assert_eq!(policy.senior_after, chrono::Duration::minutes(30));
        assert_eq!(policy.professor_after, chrono::Duration::hours(2));
    }

    #[test]
    fn demo_profile_with_override() {
        let config = load(&[
            ("ESCALATION_PROFILE", "demo"),
            ("ESCALATION_PROFESSOR_AFTER_SECS", "90"),
            ("DATABASE_URL", "postgres://localhost/forum"),
        ])
        .unwrap();
        assert_eq!(config.senior_after, Duration::from_secs(30));
        assert_eq!(config.professor_after, Duration::from_secs(90));
        assert_eq!(config.sweep_interval, Duration::from_secs(10));
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/forum")
        );
    }

    #[test]
    fn largest_accepted_threshold_converts_without_overflow() {
        let max = MAX_SECONDS.to_string();
        let config = load(&[("ESCALATION_SENIOR_AFTER_SECS", max.as_str())]).unwrap();
        let policy = config.escalation_policy();
        assert!(policy.senior_after > chrono::Duration::zero());
        assert_eq!(policy.senior_after.num_seconds(), MAX_SECONDS as i64);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            load(&[("ESCALATION_SENIOR_AFTER_SECS", "0")]),
            Err(ConfigError::InvalidValue(key, _)) if key == "ESCALATION_SENIOR_AFTER_SECS"
        ));
        assert!(matches!(
            load(&[("ESCALATION_SWEEP_INTERVAL_SECS", "soon")]),
            Err(ConfigError::InvalidValue(_, _))
        ));
        assert!(matches!(
            load(&[("ESCALATION_PROFILE", "staging")]),
            Err(ConfigError::InvalidValue(key, _)) if key == "ESCALATION_PROFILE"
        ));
        assert!(matches!(
            load(&[("ESCALATION_SENIOR_AFTER_SECS", "18446744073709551615")]),
            Err(ConfigError::InvalidValue(key, _)) if key == "ESCALATION_SENIOR_AFTER_SECS"
        ));
        assert!(matches!(
            load(&[("ESCALATION_PROFESSOR_AFTER_SECS", "10000000000000000")]),
            Err(ConfigError::InvalidValue(key, _)) if key == "ESCALATION_PROFESSOR_AFTER_SECS"
        ));
        assert!(matches!(
            load(&[("BIND_ADDRESS", "not-an-address")]),
            Err(ConfigError::InvalidValue(_, _))
        ));
    }
}
