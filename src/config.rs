use std::{env, path::PathBuf};

use chrono::{FixedOffset, Offset, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Runtime settings, read once from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    /// Offset used for "today" / "this month" boundaries and receipt dates.
    pub shop_utc_offset_minutes: i32,
    /// Characters per receipt line (48 for 80mm paper, 32 for 58mm).
    pub receipt_width: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: parsed("DATABASE_MAX_CONNECTIONS", 10)?,
            jwt_secret: required("JWT_SECRET")?,
            port: parsed("PORT", 3000)?,
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("static/uploads")),
            shop_utc_offset_minutes: parsed("SHOP_UTC_OFFSET_MINUTES", 330)?,
            receipt_width: parsed("RECEIPT_WIDTH", 48)?,
        })
    }

    pub fn shop_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.shop_utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            database_url: "postgres://localhost/kanaku360_test".to_string(),
            database_max_connections: 1,
            jwt_secret: "test-secret".to_string(),
            port: 0,
            upload_dir: PathBuf::from("static/uploads"),
            shop_utc_offset_minutes: 330,
            receipt_width: 48,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shop_offset_uses_configured_minutes() {
        let config = Config::for_tests();
        assert_eq!(config.shop_offset().local_minus_utc(), 330 * 60);
    }

    #[test]
    fn out_of_range_offset_falls_back_to_utc() {
        let config = Config {
            shop_utc_offset_minutes: 100_000,
            ..Config::for_tests()
        };
        assert_eq!(config.shop_offset().local_minus_utc(), 0);
    }
}
