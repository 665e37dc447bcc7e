//! CostGuard configuration

use anyhow::Result;
use pressledger_common::{
    ColorSavingsBasis, DepartmentId, PolicyConfiguration, PressLedgerError, PricingSchedule,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::statistics::CacheTtlPolicy;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "PRESSLEDGER_CONFIG";

/// Config file used when `PRESSLEDGER_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "pressledger.toml";

/// CostGuard service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostGuardConfig {
    /// Policy switches
    pub policy: PolicySettings,
    /// Per-page prices and savings rates
    pub pricing: PricingSchedule,
    /// Statistics cache
    pub cache: CacheSettings,
    /// Monthly department budgets
    pub budgets: Vec<DepartmentBudget>,
    /// Simulator settings
    pub simulation: SimulationSettings,
}

impl CostGuardConfig {
    /// Load configuration from defaults, file and environment
    ///
    /// Environment variables use the `PRESSLEDGER__` prefix with `__` between
    /// sections, e.g. `PRESSLEDGER__POLICY__FORCE_DUPLEX=false`.
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(PathBuf::from(path))
    }

    /// Load with an explicit config file path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        let cfg: Self = ::config::Config::builder()
            .add_source(::config::File::from(path).required(false))
            .add_source(
                ::config::Environment::with_prefix("PRESSLEDGER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject thresholds outside [0, 1], negative prices and budgets
    pub fn validate(&self) -> pressledger_common::Result<()> {
        self.policy_configuration().validate()?;

        for budget in &self.budgets {
            if budget.monthly_budget < Decimal::ZERO {
                return Err(PressLedgerError::Config(format!(
                    "budget for department {} must not be negative",
                    budget.department_id
                )));
            }
        }

        if self.cache.max_entries == 0 {
            return Err(PressLedgerError::Config(
                "cache.max_entries must be at least 1".to_string(),
            ));
        }
        if self.cache.backend == CacheBackend::Redis && self.cache.redis_url.is_none() {
            return Err(PressLedgerError::Config(
                "cache.redis_url is required for the redis backend".to_string(),
            ));
        }
        Ok(())
    }

    /// Policy configuration shared by the engine and calculators
    pub fn policy_configuration(&self) -> PolicyConfiguration {
        PolicyConfiguration {
            auto_convert_color_to_bw: self.policy.auto_convert_color_to_bw,
            force_duplex: self.policy.force_duplex,
            color_page_ratio_threshold: self.policy.color_page_ratio_threshold,
            color_savings_basis: self.policy.color_savings_basis,
            pricing: self.pricing.clone(),
        }
    }

    /// Budget book keyed by department
    pub fn budget_book(&self) -> HashMap<DepartmentId, Decimal> {
        self.budgets
            .iter()
            .map(|b| (b.department_id, b.monthly_budget))
            .collect()
    }
}

/// Policy switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    pub auto_convert_color_to_bw: bool,
    pub force_duplex: bool,
    /// Fraction of color pages at or below which a job is converted
    pub color_page_ratio_threshold: Decimal,
    pub color_savings_basis: ColorSavingsBasis,
}

impl Default for PolicySettings {
    fn default() -> Self {
        let defaults = PolicyConfiguration::default();
        Self {
            auto_convert_color_to_bw: defaults.auto_convert_color_to_bw,
            force_duplex: defaults.force_duplex,
            color_page_ratio_threshold: defaults.color_page_ratio_threshold,
            color_savings_basis: defaults.color_savings_basis,
        }
    }
}

/// Statistics cache backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Redis,
}

/// Statistics cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    /// Redis URL, required for the redis backend
    pub redis_url: Option<String>,
    pub open_window_ttl_secs: u64,
    pub closed_window_ttl_secs: u64,
    /// Entry bound for the in-memory backend
    pub max_entries: usize,
    /// Evict cached windows containing each newly stored job
    pub invalidate_on_write: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            redis_url: None,
            open_window_ttl_secs: crate::DEFAULT_OPEN_WINDOW_TTL_SECS,
            closed_window_ttl_secs: crate::DEFAULT_CLOSED_WINDOW_TTL_SECS,
            max_entries: crate::DEFAULT_CACHE_MAX_ENTRIES,
            invalidate_on_write: false,
        }
    }
}

impl CacheSettings {
    pub fn ttl_policy(&self) -> CacheTtlPolicy {
        CacheTtlPolicy {
            open_window_ttl: Duration::from_secs(self.open_window_ttl_secs),
            closed_window_ttl: Duration::from_secs(self.closed_window_ttl_secs),
        }
    }
}

/// Monthly budget for one department
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentBudget {
    pub department_id: DepartmentId,
    pub monthly_budget: Decimal,
}

/// Simulated fleet and job volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Jobs to submit
    pub jobs: usize,
    pub departments: u64,
    pub users_per_department: u64,
    pub printers: u64,
    /// Jobs are spread over this many days before now
    pub days: u32,
    /// RNG seed, random when unset
    pub seed: Option<u64>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            jobs: 200,
            departments: 4,
            users_per_department: 5,
            printers: 3,
            days: 7,
            seed: None,
        }
    }
}
