use std::env;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;
use thiserror::Error;

const DEFAULT_DATABASE_URL: &str = "sqlite:paper_ledger.db";
const DEFAULT_UNIVERSE: &[&str; 3] = &["BTC", "ETH", "SOL"];

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID must be set together")]
    PartialTelegram,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelegramSettings {
    pub token: String,
    pub chat_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_url: String,
    pub universe: Vec<String>,
    pub scan_interval: Duration,
    pub scan_eval_timeout: Duration,
    pub scan_lookback: usize,
    pub scan_autostart: bool,
    pub alert_capacity: usize,
    /// Used when the oracle has no price and the caller gave none.
    pub fallback_price: Option<f64>,
    pub starting_balance: f64,
    pub status_log_interval: Duration,
    pub telegram: Option<TelegramSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            universe: DEFAULT_UNIVERSE.iter().map(|s| s.to_string()).collect(),
            scan_interval: Duration::from_secs(60),
            scan_eval_timeout: Duration::from_millis(5_000),
            scan_lookback: 50,
            scan_autostart: false,
            alert_capacity: 500,
            fallback_price: None,
            starting_balance: 10_000.0,
            status_log_interval: Duration::from_secs(30),
            telegram: None,
        }
    }
}

impl Settings {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();

        let database_url = lookup("DATABASE_URL").unwrap_or(defaults.database_url);

        let universe = lookup("SCAN_UNIVERSE")
            .map(|s| {
                s.split(',')
                    .map(|x| x.trim())
                    .filter(|x| !x.is_empty())
                    .map(|x| x.to_ascii_uppercase())
                    .collect::<Vec<_>>()
            })
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.universe);

        let scan_interval_secs: u64 = parse_or(&lookup, "SCAN_INTERVAL_SECS", 60)?;
        if scan_interval_secs == 0 {
            return Err(ConfigError::Zero("SCAN_INTERVAL_SECS"));
        }

        let eval_timeout_ms: u64 = parse_or(&lookup, "SCAN_EVAL_TIMEOUT_MS", 5_000)?;
        if eval_timeout_ms == 0 {
            return Err(ConfigError::Zero("SCAN_EVAL_TIMEOUT_MS"));
        }

        let scan_lookback: usize = parse_or(&lookup, "SCAN_LOOKBACK", defaults.scan_lookback)?;
        if scan_lookback == 0 {
            return Err(ConfigError::Zero("SCAN_LOOKBACK"));
        }

        let scan_autostart = parse_bool(&lookup, "SCAN_AUTOSTART", defaults.scan_autostart)?;

        let alert_capacity: usize =
            parse_or(&lookup, "ALERT_FEED_CAPACITY", defaults.alert_capacity)?;
        if alert_capacity == 0 {
            return Err(ConfigError::Zero("ALERT_FEED_CAPACITY"));
        }

        let fallback_price = match lookup("PAPER_FALLBACK_PRICE") {
            Some(raw) => {
                let price: f64 = parse_value("PAPER_FALLBACK_PRICE", &raw)?;
                if !price.is_finite() || price <= 0.0 {
                    return Err(ConfigError::Invalid {
                        key: "PAPER_FALLBACK_PRICE",
                        value: raw,
                    });
                }
                Some(price)
            }
            None => None,
        };

        let starting_balance: f64 =
            parse_or(&lookup, "PAPER_STARTING_BALANCE", defaults.starting_balance)?;

        let status_log_secs: u64 = parse_or(&lookup, "STATUS_LOG_SECS", 30)?;
        if status_log_secs == 0 {
            return Err(ConfigError::Zero("STATUS_LOG_SECS"));
        }

        let telegram = match (lookup("TELEGRAM_BOT_TOKEN"), lookup("TELEGRAM_CHAT_ID")) {
            (Some(token), Some(chat)) => Some(TelegramSettings {
                token,
                chat_id: parse_value("TELEGRAM_CHAT_ID", &chat)?,
            }),
            (None, None) => None,
            _ => return Err(ConfigError::PartialTelegram),
        };

        Ok(Self {
            database_url,
            universe,
            scan_interval: Duration::from_secs(scan_interval_secs),
            scan_eval_timeout: Duration::from_millis(eval_timeout_ms),
            scan_lookback,
            scan_autostart,
            alert_capacity,
            fallback_price,
            starting_balance,
            status_log_interval: Duration::from_secs(status_log_secs),
            telegram,
        })
    }
}

fn parse_value<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
    })
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_bool<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value: raw }),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let settings = Settings::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.universe, vec!["BTC", "ETH", "SOL"]);
        assert!(settings.fallback_price.is_none());
    }

    #[test]
    fn test_universe_is_trimmed_and_uppercased() {
        let settings =
            Settings::from_lookup(lookup_from(&[("SCAN_UNIVERSE", " btc, eth ,,sol ")])).unwrap();
        assert_eq!(settings.universe, vec!["BTC", "ETH", "SOL"]);
    }

    #[test]
    fn test_malformed_number_is_rejected() {
        let err = Settings::from_lookup(lookup_from(&[("SCAN_INTERVAL_SECS", "soon")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "SCAN_INTERVAL_SECS",
                value: "soon".to_string()
            }
        );
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let err =
            Settings::from_lookup(lookup_from(&[("ALERT_FEED_CAPACITY", "0")])).unwrap_err();
        assert_eq!(err, ConfigError::Zero("ALERT_FEED_CAPACITY"));
    }

    #[test]
    fn test_fallback_price_must_be_positive() {
        assert!(Settings::from_lookup(lookup_from(&[("PAPER_FALLBACK_PRICE", "-1")])).is_err());
        let settings =
            Settings::from_lookup(lookup_from(&[("PAPER_FALLBACK_PRICE", "50000")])).unwrap();
        assert_eq!(settings.fallback_price, Some(50_000.0));
    }

    #[test]
    fn test_telegram_requires_both_values() {
        let err = Settings::from_lookup(lookup_from(&[("TELEGRAM_BOT_TOKEN", "abc")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::PartialTelegram);

        let settings = Settings::from_lookup(lookup_from(&[
            ("TELEGRAM_BOT_TOKEN", "abc"),
            ("TELEGRAM_CHAT_ID", "-10042"),
        ]))
        .unwrap();
        assert_eq!(settings.telegram.unwrap().chat_id, -100_42);
    }

    #[test]
    fn test_autostart_accepts_common_spellings() {
        let on = Settings::from_lookup(lookup_from(&[("SCAN_AUTOSTART", "yes")])).unwrap();
        assert!(on.scan_autostart);
        assert!(Settings::from_lookup(lookup_from(&[("SCAN_AUTOSTART", "maybe")])).is_err());
    }
}
