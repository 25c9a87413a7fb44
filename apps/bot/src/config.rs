use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::caption::FontLoadError;

/// The token shipped in sample configs; refusing it catches an unedited copy.
const PLACEHOLDER_TOKEN: &str = "Your token here";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Required environment variable '{0}' is not set")]
    Missing(&'static str),

    #[error("Environment variable '{key}' is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("TELEGRAM_BOT_TOKEN still holds the sample value, copy the config and fill in a real token")]
    PlaceholderToken,

    #[error("Number of workers must be positive")]
    NoWorkers,

    #[error("At least one caption phrase is required")]
    NoPhrases,

    #[error("Font error: {0}")]
    Font(#[from] FontLoadError),
}

/// What a worker does when handling an event fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Log the error, drop the event and keep serving.
    Isolate,
    /// Stop the worker and shut the whole pool down on the first error.
    Strict,
}

impl FromStr for FailureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "isolate" => Ok(FailureMode::Isolate),
            "strict" => Ok(FailureMode::Strict),
            other => Err(format!("expected 'isolate' or 'strict', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroupConfig {
    pub enabled: bool,
    pub activation_phrase: Option<String>,
    pub activation_probability: f64,
}

/// Bot configuration loaded from environment variables.
/// Startup fails on missing or invalid values.
#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub debug: bool,
    pub workers: usize,
    pub whitelist: Option<Vec<i64>>,
    pub blacklist: Option<Vec<i64>>,
    pub font_path: PathBuf,
    pub phrases: Vec<String>,
    pub group: GroupConfig,
    pub failure_mode: FailureMode,
    pub poll_timeout_secs: u64,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // a missing .env is fine

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key → value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let token = require("TELEGRAM_BOT_TOKEN")?;
        if token.trim() == PLACEHOLDER_TOKEN {
            return Err(ConfigError::PlaceholderToken);
        }

        let debug = parse_or("BOT_DEBUG", get("BOT_DEBUG"), false, parse_bool)?;

        let workers = parse_or("BOT_WORKERS", get("BOT_WORKERS"), 4usize, |v| {
            v.trim().parse::<usize>().map_err(|e| e.to_string())
        })?;
        if workers == 0 {
            return Err(ConfigError::NoWorkers);
        }

        let whitelist = get("BOT_WHITELIST")
            .map(|v| parse_id_list("BOT_WHITELIST", &v))
            .transpose()?;
        let blacklist = get("BOT_BLACKLIST")
            .map(|v| parse_id_list("BOT_BLACKLIST", &v))
            .transpose()?;

        let font_path = PathBuf::from(require("BOT_FONT_PATH")?);

        let phrases: Vec<String> = require("BOT_PHRASES")
            .map_err(|_| ConfigError::NoPhrases)?
            .split('|')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        if phrases.is_empty() {
            return Err(ConfigError::NoPhrases);
        }

        let activation_probability = parse_or(
            "BOT_GROUP_ACTIVATION_PROBABILITY",
            get("BOT_GROUP_ACTIVATION_PROBABILITY"),
            0.0_f64,
            |v| v.trim().parse::<f64>().map_err(|e| e.to_string()),
        )?;
        if !(0.0..=1.0).contains(&activation_probability) {
            return Err(ConfigError::Invalid {
                key: "BOT_GROUP_ACTIVATION_PROBABILITY",
                reason: format!("{activation_probability} is outside [0, 1]"),
            });
        }

        let group = GroupConfig {
            enabled: parse_or(
                "BOT_GROUP_ENABLED",
                get("BOT_GROUP_ENABLED"),
                false,
                parse_bool,
            )?,
            activation_phrase: get("BOT_GROUP_ACTIVATION_PHRASE"),
            activation_probability,
        };

        let failure_mode = parse_or(
            "BOT_FAILURE_MODE",
            get("BOT_FAILURE_MODE"),
            FailureMode::Isolate,
            |v| v.parse(),
        )?;

        let poll_timeout_secs = parse_or(
            "BOT_POLL_TIMEOUT_SECS",
            get("BOT_POLL_TIMEOUT_SECS"),
            60u64,
            |v| v.trim().parse::<u64>().map_err(|e| e.to_string()),
        )?;

        let default_level = if debug { "debug" } else { "info" };

        Ok(Config {
            token,
            debug,
            workers,
            whitelist,
            blacklist,
            font_path,
            phrases,
            group,
            failure_mode,
            poll_timeout_secs,
            rust_log: get("RUST_LOG").unwrap_or_else(|| default_level.to_string()),
        })
    }
}

fn parse_or<T, P>(
    key: &'static str,
    value: Option<String>,
    default: T,
    parse: P,
) -> Result<T, ConfigError>
where
    P: Fn(&str) -> Result<T, String>,
{
    match value {
        Some(v) => parse(&v).map_err(|reason| ConfigError::Invalid { key, reason }),
        None => Ok(default),
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("expected a boolean, got '{other}'")),
    }
}

fn parse_id_list(key: &'static str, value: &str) -> Result<Vec<i64>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<i64>().map_err(|e| ConfigError::Invalid {
                key,
                reason: format!("'{id}' is not a chat id: {e}"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("TELEGRAM_BOT_TOKEN", "123:abc".to_string()),
            ("BOT_FONT_PATH", "/fonts/impact.ttf".to_string()),
            ("BOT_PHRASES", "one | two |three".to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<Config, ConfigError> {
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_minimal_env_uses_defaults() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.token, "123:abc");
        assert_eq!(config.workers, 4);
        assert!(!config.debug);
        assert!(config.whitelist.is_none());
        assert!(config.blacklist.is_none());
        assert_eq!(config.phrases, vec!["one", "two", "three"]);
        assert!(!config.group.enabled);
        assert!(config.group.activation_phrase.is_none());
        assert_eq!(config.group.activation_probability, 0.0);
        assert_eq!(config.failure_mode, FailureMode::Isolate);
        assert_eq!(config.poll_timeout_secs, 60);
        assert_eq!(config.rust_log, "info");
    }

    #[test]
    fn test_missing_token_rejected() {
        let mut env = base_env();
        env.remove("TELEGRAM_BOT_TOKEN");
        assert!(matches!(
            load(&env),
            Err(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))
        ));
    }

    #[test]
    fn test_placeholder_token_rejected() {
        let mut env = base_env();
        env.insert("TELEGRAM_BOT_TOKEN", "Your token here".to_string());
        assert!(matches!(load(&env), Err(ConfigError::PlaceholderToken)));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut env = base_env();
        env.insert("BOT_WORKERS", "0".to_string());
        assert!(matches!(load(&env), Err(ConfigError::NoWorkers)));
    }

    #[test]
    fn test_negative_workers_rejected() {
        let mut env = base_env();
        env.insert("BOT_WORKERS", "-2".to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid {
                key: "BOT_WORKERS",
                ..
            })
        ));
    }

    #[test]
    fn test_empty_phrase_list_rejected() {
        let mut env = base_env();
        env.insert("BOT_PHRASES", " | |".to_string());
        assert!(matches!(load(&env), Err(ConfigError::NoPhrases)));
        env.remove("BOT_PHRASES");
        assert!(matches!(load(&env), Err(ConfigError::NoPhrases)));
    }

    #[test]
    fn test_id_lists_parse() {
        let mut env = base_env();
        env.insert("BOT_WHITELIST", "1, 2,-1001234".to_string());
        env.insert("BOT_BLACKLIST", "99".to_string());
        let config = load(&env).unwrap();
        assert_eq!(config.whitelist, Some(vec![1, 2, -1001234]));
        assert_eq!(config.blacklist, Some(vec![99]));
    }

    #[test]
    fn test_blank_list_means_absent() {
        let mut env = base_env();
        env.insert("BOT_WHITELIST", "  ".to_string());
        assert!(load(&env).unwrap().whitelist.is_none());
    }

    #[test]
    fn test_bad_id_rejected() {
        let mut env = base_env();
        env.insert("BOT_BLACKLIST", "12,abc".to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid {
                key: "BOT_BLACKLIST",
                ..
            })
        ));
    }

    #[test]
    fn test_probability_out_of_range_rejected() {
        let mut env = base_env();
        env.insert("BOT_GROUP_ACTIVATION_PROBABILITY", "1.5".to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid {
                key: "BOT_GROUP_ACTIVATION_PROBABILITY",
                ..
            })
        ));
    }

    #[test]
    fn test_group_settings_parse() {
        let mut env = base_env();
        env.insert("BOT_GROUP_ENABLED", "true".to_string());
        env.insert("BOT_GROUP_ACTIVATION_PHRASE", "caption this".to_string());
        env.insert("BOT_GROUP_ACTIVATION_PROBABILITY", "0.1".to_string());
        let config = load(&env).unwrap();
        assert!(config.group.enabled);
        assert_eq!(
            config.group.activation_phrase.as_deref(),
            Some("caption this")
        );
        assert!((config.group.activation_probability - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_failure_mode_parse() {
        let mut env = base_env();
        env.insert("BOT_FAILURE_MODE", "STRICT".to_string());
        assert_eq!(load(&env).unwrap().failure_mode, FailureMode::Strict);
        env.insert("BOT_FAILURE_MODE", "sometimes".to_string());
        assert!(load(&env).is_err());
    }

    #[test]
    fn test_debug_raises_default_log_level() {
        let mut env = base_env();
        env.insert("BOT_DEBUG", "1".to_string());
        let config = load(&env).unwrap();
        assert!(config.debug);
        assert_eq!(config.rust_log, "debug");
    }
}
