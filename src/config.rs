//! Engine configuration loaded from TOML

use serde::Deserialize;
use std::collections::HashMap;

use crate::reconciliation::matcher::{
    Matcher, DEFAULT_AMOUNT_TOLERANCE_CENTS, DEFAULT_DATE_TOLERANCE_DAYS,
};
use crate::reconciliation::splitter::SplitterConfig;
use crate::reconciliation::validator::{ChargeValidator, DEFAULT_CHARGE_TOLERANCE_CENTS};
use crate::types::*;
use crate::utils::money::from_cents;

/// Longest date window any provider may use
pub const MAX_DATE_TOLERANCE_DAYS: i64 = 30;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconConfig {
    /// Compute everything but skip ledger writes and record keeping
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub matching: MatchingConfig,
    /// Per-provider overrides keyed by provider name
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub splits: SplitterConfig,
}

/// Matching and validation tolerances
#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_amount_tolerance_cents")]
    pub amount_tolerance_cents: i64,
    #[serde(default = "default_date_tolerance_days")]
    pub date_tolerance_days: i64,
    #[serde(default = "default_charge_tolerance_cents")]
    pub charge_tolerance_cents: i64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            amount_tolerance_cents: DEFAULT_AMOUNT_TOLERANCE_CENTS,
            date_tolerance_days: DEFAULT_DATE_TOLERANCE_DAYS,
            charge_tolerance_cents: DEFAULT_CHARGE_TOLERANCE_CENTS,
        }
    }
}

fn default_amount_tolerance_cents() -> i64 {
    DEFAULT_AMOUNT_TOLERANCE_CENTS
}

fn default_date_tolerance_days() -> i64 {
    DEFAULT_DATE_TOLERANCE_DAYS
}

fn default_charge_tolerance_cents() -> i64 {
    DEFAULT_CHARGE_TOLERANCE_CENTS
}

/// Provider-specific tuning; retailers post charges with different delays
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub date_tolerance_days: Option<i64>,
}

impl ReconConfig {
    /// Parse and validate a TOML document
    pub fn from_toml(input: &str) -> ReconResult<Self> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ReconResult<()> {
        let m = &self.matching;
        if m.amount_tolerance_cents < 0 {
            return Err(ReconError::Config(format!(
                "amount_tolerance_cents must not be negative, got {}",
                m.amount_tolerance_cents
            )));
        }
        if m.charge_tolerance_cents < 0 {
            return Err(ReconError::Config(format!(
                "charge_tolerance_cents must not be negative, got {}",
                m.charge_tolerance_cents
            )));
        }
        check_date_tolerance("matching", m.date_tolerance_days)?;

        for (name, provider) in &self.providers {
            if let Some(days) = provider.date_tolerance_days {
                check_date_tolerance(&format!("providers.{name}"), days)?;
            }
        }

        Ok(())
    }

    /// Date tolerance for a provider, falling back to the global value
    pub fn date_tolerance_for(&self, provider: &str) -> i64 {
        self.providers
            .get(provider)
            .and_then(|p| p.date_tolerance_days)
            .unwrap_or(self.matching.date_tolerance_days)
    }

    /// Largest date tolerance across all providers
    pub fn max_date_tolerance(&self) -> i64 {
        self.providers
            .values()
            .filter_map(|p| p.date_tolerance_days)
            .fold(self.matching.date_tolerance_days, i64::max)
    }

    /// Matcher tuned for a provider
    pub fn matcher_for(&self, provider: &str) -> Matcher {
        Matcher::new(
            from_cents(self.matching.amount_tolerance_cents),
            self.date_tolerance_for(provider),
        )
    }

    pub fn charge_validator(&self) -> ChargeValidator {
        ChargeValidator::with_tolerance_cents(self.matching.charge_tolerance_cents)
    }
}

fn check_date_tolerance(section: &str, days: i64) -> ReconResult<()> {
    if !(0..=MAX_DATE_TOLERANCE_DAYS).contains(&days) {
        return Err(ReconError::Config(format!(
            "{section}: date_tolerance_days must be between 0 and {MAX_DATE_TOLERANCE_DAYS}, got {days}"
        )));
    }
    Ok(())
}
