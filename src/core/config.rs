/*!
 * Simulation Configuration
 *
 * Runtime settings for the host process. Defaults come from `limits`,
 * environment variables override them, and a JSON document can be used
 * instead of the environment.
 */

use super::errors::{ConfigError, ConfigResult};
use super::limits::{
    DEFAULT_BATCH_SIZE, DEFAULT_BUFFER_CAPACITY, DEFAULT_CYCLE_DELAY, DEFAULT_ITEMS_PER_ROLE,
    DEFAULT_RR_QUANTUM,
};
use serde::{Deserialize, Serialize};
use std::num::{NonZeroU64, NonZeroUsize};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_BUFFER_CAPACITY: &str = "OSSIM_BUFFER_CAPACITY";
pub const ENV_ITEMS: &str = "OSSIM_ITEMS";
pub const ENV_CYCLE_DELAY_MS: &str = "OSSIM_CYCLE_DELAY_MS";
pub const ENV_BATCH_SIZE: &str = "OSSIM_BATCH_SIZE";
pub const ENV_RR_QUANTUM: &str = "OSSIM_RR_QUANTUM";
pub const ENV_TRACE_JSON: &str = "OSSIM_TRACE_JSON";

/// Host configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SimConfig {
    /// Bounded buffer slots
    pub buffer_capacity: NonZeroUsize,
    /// Items per role before it stops on its own (`None` runs until stopped)
    pub items: Option<u64>,
    /// Pause between item cycles in milliseconds
    pub cycle_delay_ms: u64,
    /// Processes created per batch
    pub batch_size: usize,
    /// Round-robin quantum
    pub rr_quantum: NonZeroU64,
    /// Emit JSON log lines
    pub trace_json: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: NonZeroUsize::new(DEFAULT_BUFFER_CAPACITY)
                .unwrap_or(NonZeroUsize::MIN),
            items: Some(DEFAULT_ITEMS_PER_ROLE),
            cycle_delay_ms: DEFAULT_CYCLE_DELAY.as_millis() as u64,
            batch_size: DEFAULT_BATCH_SIZE,
            rr_quantum: NonZeroU64::new(DEFAULT_RR_QUANTUM).unwrap_or(NonZeroU64::MIN),
            trace_json: false,
        }
    }
}

impl SimConfig {
    /// Defaults overlaid with any `OSSIM_*` environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_BUFFER_CAPACITY) {
            config.buffer_capacity = parse(ENV_BUFFER_CAPACITY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_ITEMS) {
            config.items = match raw.trim() {
                "" | "none" | "unbounded" => None,
                value => Some(parse(ENV_ITEMS, value)?),
            };
        }
        if let Some(raw) = lookup(ENV_CYCLE_DELAY_MS) {
            config.cycle_delay_ms = parse(ENV_CYCLE_DELAY_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_BATCH_SIZE) {
            config.batch_size = parse(ENV_BATCH_SIZE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_RR_QUANTUM) {
            config.rr_quantum = parse(ENV_RR_QUANTUM, &raw)?;
        }
        if let Some(raw) = lookup(ENV_TRACE_JSON) {
            config.trace_json = matches!(raw.trim(), "1" | "true");
        }

        Ok(config)
    }

    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[inline]
    pub fn cycle_delay(&self) -> Duration {
        Duration::from_millis(self.cycle_delay_ms)
    }
}

fn parse<T>(key: &str, raw: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
}
