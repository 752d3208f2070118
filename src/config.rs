use std::env;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::ConfigError;

/// Relative weight of each component in the combined activity score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub frequency: f64,
    pub recency: f64,
    pub value: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            frequency: 0.40,
            recency: 0.35,
            value: 0.25,
        }
    }
}

/// Inclusive lower bounds for each activity level. Anything below `low` is dormant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelThresholds {
    pub active: u8,
    pub medium: u8,
    pub low: u8,
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self {
            active: 70,
            medium: 50,
            low: 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    /// Order count in the window that counts as fully active.
    pub max_orders_30d: f64,
    /// Days after which recency contributes nothing.
    pub max_days_recency: i64,
    /// Reference average order value; twice this saturates the value score.
    pub baseline_order_value: Decimal,
    pub weights: ScoreWeights,
    pub thresholds: LevelThresholds,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            max_orders_30d: 100.0,
            max_days_recency: 90,
            baseline_order_value: Decimal::from(5000),
            weights: ScoreWeights::default(),
            thresholds: LevelThresholds::default(),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_orders_30d.is_nan() || self.max_orders_30d <= 0.0 {
            return Err(ConfigError::NonPositive("max_orders_30d"));
        }
        if self.max_days_recency <= 0 {
            return Err(ConfigError::NonPositive("max_days_recency"));
        }
        if self.baseline_order_value <= Decimal::ZERO {
            return Err(ConfigError::NonPositive("baseline_order_value"));
        }

        let w = self.weights;
        let sum = w.frequency + w.recency + w.value;
        if w.frequency < 0.0 || w.recency < 0.0 || w.value < 0.0 || (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::InvalidWeights(sum));
        }

        let t = self.thresholds;
        if !(t.active <= 100 && t.active > t.medium && t.medium > t.low && t.low > 0) {
            return Err(ConfigError::InvalidThresholds);
        }

        Ok(())
    }
}

/// Runtime settings for the CLI, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub log_level: String,
    pub window_days: i64,
    pub concurrency: usize,
    pub scoring: ScoringConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = ScoringConfig::default();
        let scoring = ScoringConfig {
            max_orders_30d: parse_var("ACTIVITY_MAX_ORDERS", "number", defaults.max_orders_30d)?,
            max_days_recency: parse_var(
                "ACTIVITY_MAX_DAYS_RECENCY",
                "whole number of days",
                defaults.max_days_recency,
            )?,
            baseline_order_value: parse_var(
                "ACTIVITY_BASELINE_ORDER_VALUE",
                "decimal amount",
                defaults.baseline_order_value,
            )?,
            ..defaults
        };
        scoring.validate()?;

        let window_days: i64 = parse_var("ACTIVITY_WINDOW_DAYS", "whole number of days", 30)?;
        if window_days <= 0 {
            return Err(ConfigError::NonPositive("ACTIVITY_WINDOW_DAYS"));
        }
        let concurrency: usize = parse_var("ACTIVITY_CONCURRENCY", "positive integer", 8)?;
        if concurrency == 0 {
            return Err(ConfigError::NonPositive("ACTIVITY_CONCURRENCY"));
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            log_level: env::var("ACTIVITY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            window_days,
            concurrency,
            scoring,
        })
    }
}

fn parse_var<T: FromStr>(
    name: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue {
                name,
                expected,
                value: raw,
            }),
        Err(_) => Ok(default),
    }
}
