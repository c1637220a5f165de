//! Storefront API configuration.
//!
//! Configuration is read from a TOML file (path in `STOREFRONT_CONFIG`,
//! default `storefront.toml`), then selected environment variables override
//! individual values.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8080"
//!
//! [database]
//! path = "/var/lib/storefront/storefront.db"
//! max_connections = 5
//!
//! [checkout]
//! tax_percent = 10
//!
//! [gateway]
//! merchant_id = "xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx"
//! callback_url = "https://shop.example/payments/verify"
//!
//! [redirects]
//! success_url = "https://shop.example/orders/{order_id}/success"
//! failure_url = "https://shop.example/orders/{order_id}/failed"
//! ```

use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use storefront_core::{Percent, DEFAULT_TAX_PERCENT};
use storefront_payment::GatewayConfig;

pub const CONFIG_PATH_ENV: &str = "STOREFRONT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "storefront.toml";

/// Complete service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub checkout: CheckoutConfig,
    pub gateway: GatewayConfig,
    pub redirects: RedirectConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file, created on first start.
    pub path: PathBuf,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: PathBuf::from("storefront.db"),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    /// Flat tax applied to every new order.
    pub tax_percent: u8,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        CheckoutConfig {
            tax_percent: DEFAULT_TAX_PERCENT,
        }
    }
}

/// Where the payment callback sends the browser. `{order_id}` is substituted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedirectConfig {
    pub success_url: String,
    pub failure_url: String,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        RedirectConfig {
            success_url: "/orders/{order_id}/success".to_string(),
            failure_url: "/orders/{order_id}/failed".to_string(),
        }
    }
}

impl RedirectConfig {
    pub fn success_for(&self, order_id: &str) -> String {
        self.success_url.replace("{order_id}", order_id)
    }

    pub fn failure_for(&self, order_id: &str) -> String {
        self.failure_url.replace("{order_id}", order_id)
    }
}

impl AppConfig {
    /// Loads the file named by `STOREFRONT_CONFIG` (or `storefront.toml`),
    /// applies environment overrides and validates the result.
    ///
    /// A missing default file is not an error; a missing file that was
    /// named explicitly is.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = env::var(CONFIG_PATH_ENV).ok();
        let path = PathBuf::from(explicit.as_deref().unwrap_or(DEFAULT_CONFIG_PATH));

        let mut config = if path.exists() {
            AppConfig::from_file(&path)?
        } else if explicit.is_some() {
            return Err(ConfigError::MissingFile(path));
        } else {
            AppConfig::default()
        };

        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        AppConfig::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Applies `STOREFRONT_*` / `ZARINPAL_*` overrides from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("STOREFRONT_BIND") {
            self.server.bind = bind;
        }
        if let Some(path) = lookup("STOREFRONT_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(tax) = lookup("STOREFRONT_TAX_PERCENT") {
            self.checkout.tax_percent = tax
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("STOREFRONT_TAX_PERCENT".to_string()))?;
        }
        if let Some(merchant) = lookup("ZARINPAL_MERCHANT_ID") {
            self.gateway.merchant_id = merchant;
        }
        if let Some(callback) = lookup("ZARINPAL_CALLBACK_URL") {
            self.gateway.callback_url = callback;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.checkout.tax_percent > 100 {
            return Err(ConfigError::Invalid(
                "checkout.tax_percent must be between 0 and 100".to_string(),
            ));
        }
        if let Some(problem) = self.gateway.problem() {
            return Err(ConfigError::Invalid(problem));
        }
        if self.redirects.success_url.is_empty() || self.redirects.failure_url.is_empty() {
            return Err(ConfigError::Invalid(
                "redirects.success_url and redirects.failure_url are required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .bind
            .parse()
            .map_err(|_| ConfigError::InvalidValue("server.bind".to_string()))
    }

    /// Tax as a [`Percent`]; `validate` has already bounded it.
    pub fn tax_percent(&self) -> Percent {
        Percent::clamped(i64::from(self.checkout.tax_percent))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    MissingFile(PathBuf),

    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn with_merchant(mut config: AppConfig) -> AppConfig {
        config.gateway.merchant_id = "merchant-1".to_string();
        config
    }

    #[test]
    fn test_defaults_need_only_a_merchant() {
        let config = AppConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = with_merchant(AppConfig::default());
        config.validate().unwrap();
        assert_eq!(config.tax_percent().value(), 10);
        assert_eq!(config.bind_addr().unwrap().port(), 8080);
        assert_eq!(config.gateway.amount_multiplier, 10);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [checkout]
            tax_percent = 9

            [gateway]
            merchant_id = "m-1"
            timeout_secs = 5

            [redirects]
            success_url = "https://shop.test/ok/{order_id}"
            "#,
        )
        .unwrap();

        config.validate().unwrap();
        assert_eq!(config.checkout.tax_percent, 9);
        assert_eq!(config.gateway.timeout_secs, 5);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.redirects.success_for("o-1"), "https://shop.test/ok/o-1");
        assert_eq!(config.redirects.failure_for("o-1"), "/orders/o-1/failed");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("STOREFRONT_BIND", "0.0.0.0:9000"),
            ("STOREFRONT_DB_PATH", "/tmp/shop.db"),
            ("STOREFRONT_TAX_PERCENT", "0"),
            ("ZARINPAL_MERCHANT_ID", "from-env"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        config.validate().unwrap();
        assert_eq!(config.bind_addr().unwrap().port(), 9000);
        assert_eq!(config.database.path, PathBuf::from("/tmp/shop.db"));
        assert_eq!(config.tax_percent(), Percent::ZERO);
        assert_eq!(config.gateway.merchant_id, "from-env");
    }

    #[test]
    fn test_invalid_values() {
        let mut config = with_merchant(AppConfig::default());
        let err = config
            .apply_overrides(|key| (key == "STOREFRONT_TAX_PERCENT").then(|| "ten".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));

        config.checkout.tax_percent = 101;
        assert!(config.validate().is_err());

        let mut config = with_merchant(AppConfig::default());
        config.server.bind = "not an address".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));

        assert!(matches!(
            AppConfig::from_toml("[checkout]\ntax_percent = \"x\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
