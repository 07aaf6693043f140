use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "pool_config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("share_difficulty must be positive")]
    ZeroShareDifficulty,
    #[error("network must not be empty")]
    EmptyNetwork,
    #[error("invalid listen address {0:?}")]
    InvalidListen(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Chain identifier (`classic` or `mordor`), matched exactly.
    pub network: String,
    pub listen: String,
    pub redis_url: String,
    pub redis_prefix: String,
    pub node_rpc_url: String,
    pub share_difficulty: u64,
    /// Retention of hashrate samples written with each share.
    pub hashrate_expiration_secs: u64,
    pub block_refresh_interval_ms: u64,
    pub rpc_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: "classic".to_string(),
            listen: "0.0.0.0:8888".to_string(),
            redis_url: "redis://127.0.0.1/".to_string(),
            redis_prefix: "etc".to_string(),
            node_rpc_url: "http://127.0.0.1:8545".to_string(),
            share_difficulty: 4_000_000_000,
            hashrate_expiration_secs: 3 * 60 * 60,
            block_refresh_interval_ms: 120,
            rpc_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Defaults, then the JSON file, then `ETC_POOL_*` environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let (path, explicit) = match std::env::var("ETC_POOL_CONFIG") {
            Ok(p) => (p, true),
            Err(_) => (DEFAULT_CONFIG_PATH.to_string(), false),
        };

        let mut cfg = match std::fs::read_to_string(&path) {
            Ok(txt) => Self::from_json(&path, &txt)?,
            Err(e) if explicit || e.kind() != std::io::ErrorKind::NotFound => {
                return Err(ConfigError::Io { path, source: e });
            }
            Err(_) => Self::default(),
        };

        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json(path: &str, txt: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(txt).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    /// Apply overrides from a key lookup (the process environment in `load`).
    pub fn apply_overrides<F>(&mut self, get: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get("ETC_POOL_NETWORK") {
            self.network = v;
        }
        if let Some(v) = get("ETC_POOL_LISTEN") {
            self.listen = v;
        }
        if let Some(v) = get("ETC_POOL_REDIS_URL") {
            self.redis_url = v;
        }
        if let Some(v) = get("ETC_POOL_REDIS_PREFIX") {
            self.redis_prefix = v;
        }
        if let Some(v) = get("ETC_POOL_NODE_RPC") {
            self.node_rpc_url = v;
        }
        if let Some(v) = get("ETC_POOL_SHARE_DIFFICULTY") {
            self.share_difficulty = parse_number("ETC_POOL_SHARE_DIFFICULTY", v)?;
        }
        if let Some(v) = get("ETC_POOL_HASHRATE_EXPIRATION") {
            self.hashrate_expiration_secs = parse_number("ETC_POOL_HASHRATE_EXPIRATION", v)?;
        }
        if let Some(v) = get("ETC_POOL_REFRESH_MS") {
            self.block_refresh_interval_ms = parse_number("ETC_POOL_REFRESH_MS", v)?;
        }
        if let Some(v) = get("ETC_POOL_RPC_TIMEOUT_SECS") {
            self.rpc_timeout_secs = parse_number("ETC_POOL_RPC_TIMEOUT_SECS", v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.share_difficulty == 0 {
            return Err(ConfigError::ZeroShareDifficulty);
        }
        if self.network.trim().is_empty() {
            return Err(ConfigError::EmptyNetwork);
        }
        self.listen_addr()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen
            .parse()
            .map_err(|_| ConfigError::InvalidListen(self.listen.clone()))
    }

    pub fn hashrate_expiration(&self) -> Duration {
        Duration::from_secs(self.hashrate_expiration_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        // Zero would make tokio::time::interval panic.
        Duration::from_millis(self.block_refresh_interval_ms.max(1))
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs.max(1))
    }
}

fn parse_number(key: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.network, "classic");
        assert_eq!(cfg.hashrate_expiration(), Duration::from_secs(10_800));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg = Config::from_json("test.json", r#"{"network":"mordor","share_difficulty":1000}"#).unwrap();
        assert_eq!(cfg.network, "mordor");
        assert_eq!(cfg.share_difficulty, 1000);
        assert_eq!(cfg.redis_prefix, Config::default().redis_prefix);
    }

    #[test]
    fn test_bad_json_is_reported() {
        let err = Config::from_json("bad.json", "{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("ETC_POOL_NETWORK", "mordor"),
            ("ETC_POOL_SHARE_DIFFICULTY", "250"),
            ("ETC_POOL_REFRESH_MS", "500"),
        ]
        .into_iter()
        .collect();

        let mut cfg = Config::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.network, "mordor");
        assert_eq!(cfg.share_difficulty, 250);
        assert_eq!(cfg.refresh_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_unparsable_override_rejected() {
        let mut cfg = Config::default();
        let err = cfg
            .apply_overrides(|k| (k == "ETC_POOL_SHARE_DIFFICULTY").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "ETC_POOL_SHARE_DIFFICULTY", .. }));
    }

    #[test]
    fn test_validation_rules() {
        let mut cfg = Config::default();
        cfg.share_difficulty = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::ZeroShareDifficulty)));

        let mut cfg = Config::default();
        cfg.network = " ".to_string();
        assert!(matches!(cfg.validate(), Err(ConfigError::EmptyNetwork)));

        let mut cfg = Config::default();
        cfg.listen = "localhost".to_string();
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidListen(_))));
    }
}
