use std::{env, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const DEFAULT_TELEGRAM_TIMEOUT_MILLIS: u64 = 10_000;
const DEFAULT_UPLOADS_DIR: &str = "uploads";
const DEFAULT_RATE_LIMIT_MAX: usize = 60;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 15 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotCredentials {
    pub token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// `None` when either `BOT_TOKEN` or `ADMIN_CHAT_ID` is missing or empty.
    pub bot: Option<BotCredentials>,
    pub telegram_api_base: String,
    pub telegram_timeout: Duration,
    pub uploads_dir: PathBuf,
    pub rate_limit_max: usize,
    pub rate_limit_window: Duration,
    pub statsd_host: String,
    pub statsd_port: u16,
    pub statsd_prefix: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bot = match (non_empty("BOT_TOKEN"), non_empty("ADMIN_CHAT_ID")) {
            (Some(token), Some(chat_id)) => Some(BotCredentials { token, chat_id }),
            _ => None,
        };

        Ok(Self {
            host: non_empty("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            bot,
            telegram_api_base: non_empty("TELEGRAM_API_BASE")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            telegram_timeout: Duration::from_millis(parse_or(
                &lookup,
                "TELEGRAM_TIMEOUT_MILLIS",
                DEFAULT_TELEGRAM_TIMEOUT_MILLIS,
            )?),
            uploads_dir: PathBuf::from(
                non_empty("UPLOADS_DIR").unwrap_or_else(|| DEFAULT_UPLOADS_DIR.to_string()),
            ),
            rate_limit_max: parse_or(&lookup, "RATE_LIMIT_MAX", DEFAULT_RATE_LIMIT_MAX)?,
            rate_limit_window: Duration::from_secs(parse_or(
                &lookup,
                "RATE_LIMIT_WINDOW_SECS",
                DEFAULT_RATE_LIMIT_WINDOW_SECS,
            )?),
            statsd_host: non_empty("STATSD_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            statsd_port: parse_or(&lookup, "STATSD_PORT", 8125)?,
            statsd_prefix: non_empty("STATSD_PREFIX")
                .unwrap_or_else(|| "payment_confirm".to_string()),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} must be a valid number, got {:?}", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert!(config.bot.is_none());
        assert_eq!(config.telegram_api_base, "https://api.telegram.org");
        assert_eq!(config.telegram_timeout, Duration::from_secs(10));
        assert_eq!(config.uploads_dir, PathBuf::from("uploads"));
        assert_eq!(config.rate_limit_max, 60);
        assert_eq!(config.rate_limit_window, Duration::from_secs(900));
    }

    #[test]
    fn bot_credentials_need_both_values() {
        let config = config_from(&[("BOT_TOKEN", "123:abc")]).unwrap();
        assert!(config.bot.is_none());

        let config = config_from(&[("BOT_TOKEN", "123:abc"), ("ADMIN_CHAT_ID", "  ")]).unwrap();
        assert!(config.bot.is_none());

        let config = config_from(&[("BOT_TOKEN", "123:abc"), ("ADMIN_CHAT_ID", "42")]).unwrap();
        assert_eq!(
            config.bot,
            Some(BotCredentials {
                token: "123:abc".to_string(),
                chat_id: "42".to_string(),
            })
        );
    }

    #[test]
    fn invalid_port_is_reported() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn api_base_trailing_slash_is_dropped() {
        let config = config_from(&[("TELEGRAM_API_BASE", "http://localhost:9000/")]).unwrap();
        assert_eq!(config.telegram_api_base, "http://localhost:9000");
    }
}
