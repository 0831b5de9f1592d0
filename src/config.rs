//! Environment configuration.

use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use crate::storefront::StorefrontOptions;
use crate::utils::RetryConfig;
use crate::{Result, StorefrontError};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    /// Enables the NATS notification sink when set.
    pub nats_url: Option<String>,
    pub nats_subject_prefix: String,
    pub currency: String,
    pub merchant_name: String,
    /// JSON document loaded into the in-memory store at startup.
    pub seed_file: Option<PathBuf>,
    pub order_write_attempts: u32,
    pub payment_latency: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source; unset and blank values take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let parse = |name: &str, default: &str| -> Result<u64> {
            let raw = get(name).unwrap_or_else(|| default.to_string());
            raw.parse::<u64>().map_err(|e| StorefrontError::Config(format!("Invalid {} '{}': {}", name, raw, e)))
        };

        let server_port = u16::try_from(parse("PORT", "8083")?).map_err(|e| StorefrontError::Config(format!("Invalid PORT: {}", e)))?;
        let order_write_attempts = u32::try_from(parse("ORDER_WRITE_ATTEMPTS", "3")?)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| StorefrontError::Config("ORDER_WRITE_ATTEMPTS must be a positive number".to_string()))?;

        let config = Self {
            server_host: get("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            server_port,
            nats_url: get("NATS_URL"),
            nats_subject_prefix: get("NATS_SUBJECT_PREFIX").unwrap_or_else(|| "storefront.notifications".to_string()),
            currency: get("CURRENCY").unwrap_or_else(|| "INR".to_string()).to_uppercase(),
            merchant_name: get("MERCHANT_NAME").unwrap_or_else(|| "Baby Dino".to_string()),
            seed_file: get("SEED_FILE").map(PathBuf::from),
            order_write_attempts,
            payment_latency: Duration::from_millis(parse("PAYMENT_LATENCY_MS", "50")?),
        };
        tracing::info!(host = %config.server_host, port = config.server_port, currency = %config.currency, "Configuration loaded");
        Ok(config)
    }

    pub fn bind_address(&self) -> String { format!("{}:{}", self.server_host, self.server_port) }

    pub fn storefront_options(&self) -> StorefrontOptions {
        StorefrontOptions {
            currency: self.currency.clone(),
            merchant_name: self.merchant_name.clone(),
            order_write_retry: RetryConfig::with_attempts(self.order_write_attempts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:8083");
        assert_eq!(config.currency, "INR");
        assert_eq!(config.merchant_name, "Baby Dino");
        assert_eq!(config.nats_subject_prefix, "storefront.notifications");
        assert!(config.nats_url.is_none());
        assert_eq!(config.storefront_options().order_write_retry.max_attempts, 3);
    }

    #[test]
    fn test_overrides_and_blank_values() {
        let config = config(&[("PORT", "9000"), ("CURRENCY", "usd"), ("NATS_URL", "  "), ("ORDER_WRITE_ATTEMPTS", "5")]).unwrap();
        assert_eq!(config.server_port, 9000);
        assert_eq!(config.currency, "USD");
        assert!(config.nats_url.is_none());
        assert_eq!(config.order_write_attempts, 5);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(config(&[("PORT", "eighty")]), Err(StorefrontError::Config(_))));
        assert!(matches!(config(&[("PORT", "70000")]), Err(StorefrontError::Config(_))));
        assert!(matches!(config(&[("ORDER_WRITE_ATTEMPTS", "0")]), Err(StorefrontError::Config(_))));
    }
}
