use std::env;

use crate::risk::{AlertThresholds, DEFAULT_CONSECUTIVE_THRESHOLD, DEFAULT_MONTHLY_THRESHOLD};

/// Thresholds and ranking sizes used by the aggregation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub thresholds: AlertThresholds,
    pub top_absentees_limit: usize,
    pub dashboard_ranking_limit: usize,
    pub panel_ranking_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thresholds: AlertThresholds::default(),
            top_absentees_limit: 10,
            dashboard_ranking_limit: 5,
            panel_ranking_limit: 10,
        }
    }
}

/// Runtime configuration for the command line front end.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub log_level: String,
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingDatabaseUrl)?;
        let log_level = lookup("ATTENDANCE_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let defaults = EngineConfig::default();
        let engine = EngineConfig {
            thresholds: AlertThresholds {
                consecutive: parse_or(
                    &lookup,
                    "ALERT_CONSECUTIVE_THRESHOLD",
                    DEFAULT_CONSECUTIVE_THRESHOLD,
                )?,
                monthly: parse_or(&lookup, "ALERT_MONTHLY_THRESHOLD", DEFAULT_MONTHLY_THRESHOLD)?,
            },
            top_absentees_limit: parse_or(
                &lookup,
                "TOP_ABSENTEES_LIMIT",
                defaults.top_absentees_limit,
            )?,
            dashboard_ranking_limit: parse_or(
                &lookup,
                "DASHBOARD_RANKING_LIMIT",
                defaults.dashboard_ranking_limit,
            )?,
            panel_ranking_limit: parse_or(
                &lookup,
                "PANEL_RANKING_LIMIT",
                defaults.panel_ranking_limit,
            )?,
        };

        Ok(Self {
            database_url,
            max_connections: parse_or(&lookup, "ATTENDANCE_DB_MAX_CONNECTIONS", 5)?,
            log_level,
            engine,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
        None => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL must be set to the academic records Postgres instance")]
    MissingDatabaseUrl,
    #[error("{key} must be a non-negative integer, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },
}
