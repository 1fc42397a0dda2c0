use crate::data_structures::Thresholds;
use crate::report::Language;
use crate::yahoo::DEFAULT_BASE_URL;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("Watchlist must contain at least one symbol")]
    EmptyWatchlist,
    #[error("Thresholds must satisfy plunge <= 0 <= surge (got surge {surge}, plunge {plunge})")]
    InvalidThresholds { surge: f64, plunge: f64 },
    #[error("Unknown timezone '{0}'")]
    InvalidTimezone(String),
}

// One ticker on the watchlist and the label shown for it in the report
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub symbol: String,
    pub name: String,
}

impl WatchlistEntry {
    pub fn new(symbol: &str, name: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
        }
    }
}

pub fn default_watchlist() -> Vec<WatchlistEntry> {
    vec![
        WatchlistEntry::new("^GSPC", "标普500"),
        WatchlistEntry::new("^IXIC", "纳斯达克"),
        WatchlistEntry::new("BTC-USD", "比特币"),
        WatchlistEntry::new("ETH-USD", "以太坊"),
        WatchlistEntry::new("NVDA", "英伟达"),
        WatchlistEntry::new("TSLA", "特斯拉"),
        WatchlistEntry::new("AAPL", "苹果"),
        WatchlistEntry::new("GC=F", "黄金期货"),
    ]
}

// YAML-serializable configuration structure
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ConfigYaml {
    pub watchlist: Option<Vec<WatchlistEntry>>,
    pub surge_threshold: Option<f64>,
    pub plunge_threshold: Option<f64>,
    pub output_path: Option<String>,
    pub language: Option<Language>,
    pub timezone: Option<String>,
    pub provider_base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub random_agent: Option<bool>,
}

// Holds run-wide settings
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub watchlist: Vec<WatchlistEntry>,
    pub thresholds: Thresholds,
    pub output_path: PathBuf,
    pub language: Language,
    pub timezone: Option<Tz>,
    pub provider_base_url: String,
    pub request_timeout: Duration,
    pub random_agent: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            watchlist: default_watchlist(),
            thresholds: Thresholds::default(),
            output_path: PathBuf::from("index.html"),
            language: Language::Chinese,
            timezone: None,
            provider_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            random_agent: true,
        }
    }
}

impl AppConfig {
    // Load configuration from YAML file or environment variables
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        if let Ok(config_file) = env::var("CONFIG_FILE") {
            Self::from_yaml(&config_file)
        } else {
            Self::from_env()
        }
    }

    pub fn from_yaml(file_path: &str) -> Result<Self, ConfigError> {
        let yaml_content = fs::read_to_string(file_path).map_err(|source| ConfigError::Read {
            path: file_path.to_string(),
            source,
        })?;
        Self::from_yaml_str(&yaml_content)
    }

    pub fn from_yaml_str(yaml_content: &str) -> Result<Self, ConfigError> {
        let yaml_config: ConfigYaml = serde_yaml::from_str(yaml_content)?;
        Self::from_parts(yaml_config)
    }

    // Load all configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let watchlist = lookup("WATCHLIST").map(|raw| parse_watchlist(&raw)).transpose()?;

        let language = lookup("REPORT_LANGUAGE")
            .map(|raw| {
                raw.parse::<Language>().map_err(|_| ConfigError::InvalidValue {
                    key: "REPORT_LANGUAGE".to_string(),
                    value: raw,
                })
            })
            .transpose()?;

        let yaml_config = ConfigYaml {
            watchlist,
            surge_threshold: parse_var(&lookup, "SURGE_THRESHOLD")?,
            plunge_threshold: parse_var(&lookup, "PLUNGE_THRESHOLD")?,
            output_path: lookup("REPORT_OUTPUT_PATH"),
            language,
            timezone: lookup("REPORT_TIMEZONE"),
            provider_base_url: lookup("PROVIDER_BASE_URL"),
            request_timeout_secs: parse_var(&lookup, "REQUEST_TIMEOUT_SECS")?,
            random_agent: parse_var(&lookup, "RANDOM_AGENT")?,
        };

        Self::from_parts(yaml_config)
    }

    fn from_parts(yaml_config: ConfigYaml) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let timezone = yaml_config
            .timezone
            .filter(|tz| !tz.is_empty())
            .map(|tz| tz.parse::<Tz>().map_err(|_| ConfigError::InvalidTimezone(tz)))
            .transpose()?;

        let config = Self {
            watchlist: yaml_config.watchlist.unwrap_or(defaults.watchlist),
            thresholds: Thresholds {
                surge: yaml_config.surge_threshold.unwrap_or(defaults.thresholds.surge),
                plunge: yaml_config.plunge_threshold.unwrap_or(defaults.thresholds.plunge),
            },
            output_path: yaml_config.output_path.map(PathBuf::from).unwrap_or(defaults.output_path),
            language: yaml_config.language.unwrap_or(defaults.language),
            timezone,
            provider_base_url: yaml_config.provider_base_url.unwrap_or(defaults.provider_base_url),
            request_timeout: yaml_config
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            random_agent: yaml_config.random_agent.unwrap_or(defaults.random_agent),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watchlist.is_empty() {
            return Err(ConfigError::EmptyWatchlist);
        }

        let Thresholds { surge, plunge } = self.thresholds;
        if !(surge.is_finite() && plunge.is_finite() && plunge <= 0.0 && surge >= 0.0) {
            return Err(ConfigError::InvalidThresholds { surge, plunge });
        }

        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(None),
    }
}

/// Parses `SYMBOL=Name,SYMBOL=Name`. The last `=` splits, so futures tickers
/// such as `GC=F=Gold` work but names cannot contain `=`.
pub fn parse_watchlist(raw: &str) -> Result<Vec<WatchlistEntry>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|item| match item.rsplit_once('=') {
            Some((symbol, name)) if !symbol.trim().is_empty() && !name.trim().is_empty() => {
                Ok(WatchlistEntry::new(symbol.trim(), name.trim()))
            }
            _ => Err(ConfigError::InvalidValue {
                key: "WATCHLIST".to_string(),
                value: item.to_string(),
            }),
        })
        .collect()
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
    fn test_defaults_without_any_variables() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.watchlist.len(), 8);
        assert_eq!(config.watchlist[0].symbol, "^GSPC");
        assert_eq!(config.watchlist[7].symbol, "GC=F");
        assert_eq!(config.thresholds, Thresholds { surge: 3.0, plunge: -3.0 });
        assert_eq!(config.output_path, PathBuf::from("index.html"));
        assert_eq!(config.language, Language::Chinese);
        assert!(config.timezone.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("WATCHLIST", "AAPL=Apple, GC=F=Gold"),
            ("SURGE_THRESHOLD", "5"),
            ("PLUNGE_THRESHOLD", "-2.5"),
            ("REPORT_OUTPUT_PATH", "/tmp/report.html"),
            ("REPORT_LANGUAGE", "en"),
            ("REPORT_TIMEZONE", "Asia/Shanghai"),
            ("REQUEST_TIMEOUT_SECS", "10"),
            ("RANDOM_AGENT", "false"),
        ]))
        .unwrap();

        assert_eq!(
            config.watchlist,
            vec![WatchlistEntry::new("AAPL", "Apple"), WatchlistEntry::new("GC=F", "Gold")]
        );
        assert_eq!(config.thresholds, Thresholds { surge: 5.0, plunge: -2.5 });
        assert_eq!(config.output_path, PathBuf::from("/tmp/report.html"));
        assert_eq!(config.language, Language::English);
        assert_eq!(config.timezone, Some(chrono_tz::Asia::Shanghai));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(!config.random_agent);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            AppConfig::from_lookup(lookup_from(&[("SURGE_THRESHOLD", "lots")])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup_from(&[("SURGE_THRESHOLD", "-1")])),
            Err(ConfigError::InvalidThresholds { .. })
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup_from(&[("REPORT_TIMEZONE", "Mars/Olympus")])),
            Err(ConfigError::InvalidTimezone(_))
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup_from(&[("WATCHLIST", "AAPL")])),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_yaml_preserves_watchlist_order() {
        let yaml = r#"
watchlist:
  - symbol: "GC=F"
    name: Gold
  - symbol: "^GSPC"
    name: S&P 500
surge_threshold: 2.0
language: en
"#;
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.watchlist[0], WatchlistEntry::new("GC=F", "Gold"));
        assert_eq!(config.watchlist[1], WatchlistEntry::new("^GSPC", "S&P 500"));
        assert_eq!(config.thresholds.surge, 2.0);
        assert_eq!(config.thresholds.plunge, -3.0);
        assert_eq!(config.language, Language::English);
    }

    #[test]
    fn test_yaml_empty_watchlist_is_rejected() {
        assert!(matches!(
            AppConfig::from_yaml_str("watchlist: []"),
            Err(ConfigError::EmptyWatchlist)
        ));
    }
}
