//! Shop configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//!
//! | Variable                       | Default      | Meaning                          |
//! |--------------------------------|--------------|----------------------------------|
//! | `SHOP_DB_PATH`                 | `shop.db`    | SQLite file                      |
//! | `SHOP_DB_MAX_CONNECTIONS`      | `5`          | Pool size                        |
//! | `SHOP_TAX_RATE_BPS`            | `1000`       | Tax in basis points (10%)        |
//! | `SHOP_FREE_SHIPPING_THRESHOLD` | `1000000`    | Free shipping strictly above     |
//! | `SHOP_SHIPPING_FEE`            | `50000`      | Flat fee below the threshold     |
//! | `SHOP_POINT_VALUE`             | `1000`       | Money value of one point         |
//! | `SHOP_RETURN_WINDOW_DAYS`      | `7`          | Days to return, at most 3650     |
//! | `SHOP_LOYALTY_ACCRUAL`         | unset        | `points/amount`, e.g. `1/100000` |

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use checkout_core::pricing::{
    DEFAULT_FREE_SHIPPING_THRESHOLD, DEFAULT_POINT_VALUE, DEFAULT_SHIPPING_FEE, DEFAULT_TAX_RATE_BPS,
};
use checkout_core::{AccrualRule, Money, PricingPolicy, Rate, MAX_RETURN_WINDOW_DAYS, RETURN_WINDOW_DAYS};

use crate::error::DbResult;
use crate::pool::{Database, DbConfig};

/// Everything needed to open the shop database and price carts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub max_connections: u32,

    /// Tax, shipping, point value and accrual
    pub pricing: PricingPolicy,

    /// Days after delivery during which an order may be returned
    pub return_window_days: i64,
}

impl Default for ShopConfig {
    fn default() -> Self {
        ShopConfig {
            database_path: PathBuf::from("shop.db"),
            max_connections: 5,
            pricing: PricingPolicy::default(),
            return_window_days: RETURN_WINDOW_DAYS,
        }
    }
}

impl ShopConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = ShopConfig {
            database_path: lookup("SHOP_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("shop.db")),

            max_connections: parse_or(&lookup, "SHOP_DB_MAX_CONNECTIONS", 5)?,

            pricing: PricingPolicy {
                tax_rate: Rate::from_bps(parse_or(&lookup, "SHOP_TAX_RATE_BPS", DEFAULT_TAX_RATE_BPS)?),
                free_shipping_threshold: Money::from_minor(parse_or(
                    &lookup,
                    "SHOP_FREE_SHIPPING_THRESHOLD",
                    DEFAULT_FREE_SHIPPING_THRESHOLD,
                )?),
                shipping_fee: Money::from_minor(parse_or(&lookup, "SHOP_SHIPPING_FEE", DEFAULT_SHIPPING_FEE)?),
                point_value: Money::from_minor(parse_or(&lookup, "SHOP_POINT_VALUE", DEFAULT_POINT_VALUE)?),
                accrual: lookup("SHOP_LOYALTY_ACCRUAL")
                    .map(|raw| parse_accrual(&raw))
                    .transpose()?,
            },

            return_window_days: parse_or(&lookup, "SHOP_RETURN_WINDOW_DAYS", RETURN_WINDOW_DAYS)?,
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue("SHOP_DB_MAX_CONNECTIONS".to_string()));
        }
        if config.pricing.tax_rate.bps() > 10_000 {
            return Err(ConfigError::InvalidValue("SHOP_TAX_RATE_BPS".to_string()));
        }
        if config.pricing.shipping_fee.is_negative() {
            return Err(ConfigError::InvalidValue("SHOP_SHIPPING_FEE".to_string()));
        }
        if !config.pricing.point_value.is_positive() {
            return Err(ConfigError::InvalidValue("SHOP_POINT_VALUE".to_string()));
        }
        if !(0..=MAX_RETURN_WINDOW_DAYS).contains(&config.return_window_days) {
            return Err(ConfigError::InvalidValue("SHOP_RETURN_WINDOW_DAYS".to_string()));
        }

        Ok(config)
    }

    /// Pool settings for this configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone()).max_connections(self.max_connections)
    }

    /// Opens (and migrates) the database with this configuration's pricing.
    pub async fn open(&self) -> DbResult<Database> {
        Ok(Database::new(self.db_config())
            .await?
            .with_pricing(self.pricing)
            .with_return_window_days(self.return_window_days))
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// `"1/100000"` → 1 point per 100,000 spent.
fn parse_accrual(raw: &str) -> Result<AccrualRule, ConfigError> {
    let invalid = || ConfigError::InvalidValue("SHOP_LOYALTY_ACCRUAL".to_string());

    let (points, amount) = raw.split_once('/').ok_or_else(invalid)?;
    let points: i64 = points.trim().parse().map_err(|_| invalid())?;
    let amount: i64 = amount.trim().parse().map_err(|_| invalid())?;
    if points <= 0 || amount <= 0 {
        return Err(invalid());
    }

    Ok(AccrualRule {
        points,
        per_amount: Money::from_minor(amount),
    })
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<ShopConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ShopConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.database_path, PathBuf::from("shop.db"));
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.pricing, PricingPolicy::default());
        assert_eq!(config.return_window_days, 7);
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("SHOP_DB_PATH", "/tmp/test-shop.db"),
            ("SHOP_TAX_RATE_BPS", "800"),
            ("SHOP_SHIPPING_FEE", " 30000 "),
            ("SHOP_LOYALTY_ACCRUAL", "2/50000"),
            ("SHOP_RETURN_WINDOW_DAYS", "14"),
        ])
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/test-shop.db"));
        assert_eq!(config.pricing.tax_rate, Rate::from_bps(800));
        assert_eq!(config.pricing.shipping_fee, Money::from_minor(30_000));
        assert_eq!(
            config.pricing.accrual,
            Some(AccrualRule {
                points: 2,
                per_amount: Money::from_minor(50_000),
            })
        );
        assert_eq!(config.return_window_days, 14);
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        for (key, value) in [
            ("SHOP_DB_MAX_CONNECTIONS", "0"),
            ("SHOP_TAX_RATE_BPS", "ten"),
            ("SHOP_TAX_RATE_BPS", "20000"),
            ("SHOP_POINT_VALUE", "0"),
            ("SHOP_RETURN_WINDOW_DAYS", "-1"),
            ("SHOP_RETURN_WINDOW_DAYS", "3651"),
            ("SHOP_RETURN_WINDOW_DAYS", "9223372036854775807"),
            ("SHOP_LOYALTY_ACCRUAL", "1"),
            ("SHOP_LOYALTY_ACCRUAL", "0/100"),
        ] {
            match from_pairs(&[(key, value)]) {
                Err(ConfigError::InvalidValue(name)) => assert_eq!(name, key),
                other => panic!("{key}={value}: expected InvalidValue, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_open_applies_pricing() {
        let path = std::env::temp_dir().join(format!("checkout-config-{}.db", uuid::Uuid::new_v4()));
        let config = from_pairs(&[
            ("SHOP_DB_PATH", path.to_str().unwrap()),
            ("SHOP_TAX_RATE_BPS", "0"),
        ])
        .unwrap();

        let db = config.open().await.unwrap();
        assert_eq!(db.engine().policy().tax_rate, Rate::from_bps(0));
        assert!(db.health_check().await);
        db.close().await;

        let _ = std::fs::remove_file(&path);
    }
}
