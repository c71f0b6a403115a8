use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::services::pricing::{parse_amount, PricingConfig};
use crate::wireguard::keys;

const DEFAULT_DATABASE_URL: &str = "sqlite://vpn_bot.db";
const DEFAULT_POOL_START: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 0);
const DEFAULT_RECONCILE_SECS: u64 = 3600;
const DEFAULT_CURRENCY: &str = "RUB";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Server side of every generated profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireGuardConfig {
    pub server_public_key: String,
    pub server_endpoint: String,
    pub dns_servers: Vec<String>,
    pub pool_start: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfig {
    pub provider_token: Option<String>,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bot_token: String,
    pub database_url: String,
    pub pricing: PricingConfig,
    pub wireguard: WireGuardConfig,
    pub payment: PaymentConfig,
    pub admin_ids: HashSet<i64>,
    pub reconcile_interval: Duration,
}

impl AppConfig {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let bot_token = required("BOT_TOKEN")?;
        let database_url = get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let defaults = PricingConfig::default();
        let base_monthly_price = match get("PRICE_MONTH") {
            Some(raw) => parse_amount(&raw).ok_or_else(|| ConfigError::Invalid {
                var: "PRICE_MONTH",
                reason: format!("'{}' is not a price", raw),
            })?,
            None => defaults.base_monthly_price,
        };
        let pricing = PricingConfig {
            base_monthly_price,
            discount_3_months: discount(&get, "DISCOUNT_3_MONTHS", defaults.discount_3_months)?,
            discount_6_months: discount(&get, "DISCOUNT_6_MONTHS", defaults.discount_6_months)?,
            discount_12_months: discount(&get, "DISCOUNT_12_MONTHS", defaults.discount_12_months)?,
        };

        let server_public_key = required("WG_SERVER_PUBLIC_KEY")?;
        if !keys::is_valid_key(&server_public_key) {
            return Err(ConfigError::Invalid {
                var: "WG_SERVER_PUBLIC_KEY",
                reason: "expected 32 bytes of base64".to_string(),
            });
        }
        let dns_servers: Vec<String> = required("WG_DNS")?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        let wireguard = WireGuardConfig {
            server_public_key,
            server_endpoint: required("WG_SERVER_ENDPOINT")?,
            dns_servers,
            pool_start: parse_or(&get, "WG_POOL_START", DEFAULT_POOL_START)?,
        };

        let payment = PaymentConfig {
            provider_token: get("PAYMENT_PROVIDER_TOKEN"),
            currency: get("PAYMENT_CURRENCY").unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        };

        let admin_ids = match get("ADMIN_IDS") {
            Some(raw) => parse_admin_ids(&raw)?,
            None => HashSet::new(),
        };

        let secs: u64 = parse_or(&get, "RECONCILE_INTERVAL_SECS", DEFAULT_RECONCILE_SECS)?;
        if secs == 0 {
            return Err(ConfigError::Invalid {
                var: "RECONCILE_INTERVAL_SECS",
                reason: "must be positive".to_string(),
            });
        }

        Ok(Self {
            bot_token,
            database_url,
            pricing,
            wireguard,
            payment,
            admin_ids,
            reconcile_interval: Duration::from_secs(secs),
        })
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn discount<G>(get: &G, var: &'static str, default: u32) -> Result<u32, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let pct = parse_or(get, var, default)?;
    if pct > 100 {
        return Err(ConfigError::Invalid {
            var,
            reason: format!("{}% is more than 100%", pct),
        });
    }
    Ok(pct)
}

fn parse_admin_ids(raw: &str) -> Result<HashSet<i64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|id| {
            id.parse::<i64>().map_err(|_| ConfigError::Invalid {
                var: "ADMIN_IDS",
                reason: format!("'{}' is not a user id", id),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SERVER_KEY: &str = "hSDwCYkwp1R0i33ctD73Wg2/Og0mOBr066SpjqqbTmo=";

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("BOT_TOKEN", "123:abc".to_string()),
            ("WG_SERVER_PUBLIC_KEY", SERVER_KEY.to_string()),
            ("WG_SERVER_ENDPOINT", "vpn.example.com:51820".to_string()),
            ("WG_DNS", "1.1.1.1, 8.8.8.8".to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<AppConfig, ConfigError> {
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_fill_optional_values() {
        let config = load(&base_env()).unwrap();

        assert_eq!(config.database_url, "sqlite://vpn_bot.db");
        assert_eq!(config.pricing, PricingConfig::default());
        assert_eq!(config.wireguard.dns_servers, vec!["1.1.1.1", "8.8.8.8"]);
        assert_eq!(config.wireguard.pool_start, Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(config.payment.currency, "RUB");
        assert!(config.payment.provider_token.is_none());
        assert!(config.admin_ids.is_empty());
        assert_eq!(config.reconcile_interval, Duration::from_secs(3600));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut env = base_env();
        env.insert("PRICE_MONTH", "249.50".into());
        env.insert("DISCOUNT_12_MONTHS", "30".into());
        env.insert("ADMIN_IDS", "11, 22,,33".into());
        env.insert("WG_POOL_START", "10.8.0.0".into());
        env.insert("RECONCILE_INTERVAL_SECS", "60".into());
        env.insert("PAYMENT_PROVIDER_TOKEN", "tok".into());

        let config = load(&env).unwrap();
        assert_eq!(config.pricing.base_monthly_price, 24_950);
        assert_eq!(config.pricing.discount_12_months, 30);
        assert_eq!(config.admin_ids, HashSet::from([11, 22, 33]));
        assert_eq!(config.wireguard.pool_start, Ipv4Addr::new(10, 8, 0, 0));
        assert_eq!(config.reconcile_interval, Duration::from_secs(60));
        assert_eq!(config.payment.provider_token.as_deref(), Some("tok"));
    }

    #[test]
    fn missing_required_values_are_reported_by_name() {
        for var in ["BOT_TOKEN", "WG_SERVER_PUBLIC_KEY", "WG_SERVER_ENDPOINT", "WG_DNS"] {
            let mut env = base_env();
            env.remove(var);
            assert_eq!(load(&env).unwrap_err(), ConfigError::Missing(var));
        }

        let mut env = base_env();
        env.insert("BOT_TOKEN", "   ".into());
        assert_eq!(load(&env).unwrap_err(), ConfigError::Missing("BOT_TOKEN"));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let cases = [
            ("WG_SERVER_PUBLIC_KEY", "not-a-key"),
            ("PRICE_MONTH", "cheap"),
            ("DISCOUNT_6_MONTHS", "150"),
            ("ADMIN_IDS", "1,two"),
            ("WG_POOL_START", "10.0.0"),
            ("RECONCILE_INTERVAL_SECS", "0"),
        ];
        for (var, value) in cases {
            let mut env = base_env();
            env.insert(var, value.to_string());
            match load(&env) {
                Err(ConfigError::Invalid { var: got, .. }) => assert_eq!(got, var),
                other => panic!("{var}={value}: expected Invalid, got {other:?}"),
            }
        }
    }
}
