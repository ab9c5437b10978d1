use anyhow::{Context, Result};
use chrono::Weekday;
use std::env;

use crate::request::ApproverRole;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_path: String,
    /// Days never counted towards a leave duration.
    pub weekend: Vec<Weekday>,
    /// Age in days after which a pending request is escalated.
    pub escalation_after_days: i64,
    /// When set a step may only be decided once every earlier step is approved.
    pub enforce_step_order: bool,
    pub approval_flow: Vec<ApproverRole>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: "leave.db".to_string(),
            weekend: vec![Weekday::Sat, Weekday::Sun],
            escalation_after_days: 3,
            enforce_step_order: true,
            approval_flow: vec![ApproverRole::Manager, ApproverRole::Hr],
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_env_only()
    }

    /// Load configuration from environment variables only (without loading .env files)
    pub fn from_env_only() -> Result<Self> {
        let defaults = Self::default();

        let weekend = match env::var("LEAVE_WEEKEND_DAYS") {
            Ok(raw) => parse_weekdays(&raw)?,
            Err(_) => defaults.weekend,
        };

        Ok(EngineConfig {
            database_path: env::var("LEAVE_DB_PATH").unwrap_or(defaults.database_path),
            weekend,
            escalation_after_days: env::var("LEAVE_ESCALATION_AFTER_DAYS")
                .ok()
                .map(|v| v.parse())
                .transpose()
                .context("LEAVE_ESCALATION_AFTER_DAYS must be an integer")?
                .unwrap_or(defaults.escalation_after_days),
            enforce_step_order: env::var("LEAVE_ENFORCE_STEP_ORDER")
                .ok()
                .map(|v| v.parse())
                .transpose()
                .context("LEAVE_ENFORCE_STEP_ORDER must be true or false")?
                .unwrap_or(defaults.enforce_step_order),
            approval_flow: defaults.approval_flow,
        })
    }

    pub fn open_db(&self) -> Result<sled::Db> {
        sled::open(&self.database_path)
            .with_context(|| format!("failed to open leave database at {}", self.database_path))
    }
}

/// Parses a comma separated list such as `sat,sun` or `Fri, Sat`.
pub fn parse_weekdays(raw: &str) -> Result<Vec<Weekday>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Weekday>()
                .map_err(|_| anyhow::anyhow!("invalid weekday '{}'", s))
        })
        .collect()
}
