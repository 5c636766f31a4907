//! Market configuration and its validated, immutable form.
//!
//! `MarketConfig` is the plain record produced by a loader (JSON file, preset or test code).
//! `MarketParams` is built from it once; every shape and value check happens in
//! `MarketParams::new`, so the generator and the auction model can index freely afterwards.
//!
//! Matrices are indexed `[campaign][viewer_type]`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{Result, SimError};
use crate::utils::mean;

/// Upper bound on `rate * horizon` for a single arrival stream
pub const MAX_EXPECTED_ARRIVALS: f64 = 1.0e7;

/// Raw market configuration, as loaded from outside the core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    pub num_campaigns: usize,
    pub num_viewer_types: usize,
    /// Simulation horizon in time units
    #[serde(alias = "T")]
    pub horizon: f64,
    /// Viewer arrival rate per viewer type
    #[serde(alias = "mu")]
    pub viewer_rates: Vec<f64>,
    /// Inventory arrival rate per campaign
    #[serde(alias = "lambda")]
    pub campaign_rates: Vec<f64>,
    /// Units added to each (campaign, viewer type) queue per campaign arrival
    #[serde(alias = "s")]
    pub supply: Vec<Vec<f64>>,
    /// Queue capacity per (campaign, viewer type)
    #[serde(alias = "A")]
    pub capacity: Vec<Vec<f64>>,
    /// Revenue for serving one viewer of type j from campaign i
    #[serde(alias = "r")]
    pub revenue: Vec<Vec<f64>>,
    /// Holding cost per unit of queued inventory per unit time
    #[serde(alias = "c")]
    pub holding_cost: Vec<Vec<f64>>,
    /// Win probability steepness per viewer type
    #[serde(alias = "k")]
    pub win_steepness: Vec<f64>,
    pub seed: u64,
}

impl MarketConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SimError::Config(format!("cannot parse market config: {}", e)))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| SimError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }
}

/// Validated market parameters. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketParams {
    config: MarketConfig,
}

impl MarketParams {
    /// Validate a configuration. Fails on any shape mismatch, negative rate or non-finite value,
    /// and on any stream expecting more than `MAX_EXPECTED_ARRIVALS` arrivals over the horizon.
    /// A rate of exactly zero is accepted and simply produces no arrivals.
    pub fn new(config: MarketConfig) -> Result<Self> {
        let campaigns = config.num_campaigns;
        let viewer_types = config.num_viewer_types;

        if campaigns == 0 {
            return Err(SimError::invalid("num_campaigns", "at least one campaign is required"));
        }
        if viewer_types == 0 {
            return Err(SimError::invalid("num_viewer_types", "at least one viewer type is required"));
        }
        if !config.horizon.is_finite() || config.horizon <= 0.0 {
            return Err(SimError::invalid("horizon", format!("must be finite and positive, got {}", config.horizon)));
        }

        check_vector("viewer_rates", &config.viewer_rates, viewer_types, true)?;
        check_vector("campaign_rates", &config.campaign_rates, campaigns, true)?;
        check_vector("win_steepness", &config.win_steepness, viewer_types, true)?;
        check_expected_arrivals("viewer_rates", &config.viewer_rates, config.horizon)?;
        check_expected_arrivals("campaign_rates", &config.campaign_rates, config.horizon)?;

        check_matrix("supply", &config.supply, campaigns, viewer_types, true)?;
        check_matrix("capacity", &config.capacity, campaigns, viewer_types, true)?;
        check_matrix("revenue", &config.revenue, campaigns, viewer_types, false)?;
        check_matrix("holding_cost", &config.holding_cost, campaigns, viewer_types, true)?;

        Ok(Self { config })
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn num_campaigns(&self) -> usize {
        self.config.num_campaigns
    }

    pub fn num_viewer_types(&self) -> usize {
        self.config.num_viewer_types
    }

    pub fn horizon(&self) -> f64 {
        self.config.horizon
    }

    pub fn viewer_rate(&self, viewer_type: usize) -> f64 {
        self.config.viewer_rates[viewer_type]
    }

    pub fn campaign_rate(&self, campaign: usize) -> f64 {
        self.config.campaign_rates[campaign]
    }

    pub fn supply(&self, campaign: usize, viewer_type: usize) -> f64 {
        self.config.supply[campaign][viewer_type]
    }

    pub fn capacity(&self, campaign: usize, viewer_type: usize) -> f64 {
        self.config.capacity[campaign][viewer_type]
    }

    pub fn revenue(&self, campaign: usize, viewer_type: usize) -> f64 {
        self.config.revenue[campaign][viewer_type]
    }

    pub fn holding_cost(&self, campaign: usize, viewer_type: usize) -> f64 {
        self.config.holding_cost[campaign][viewer_type]
    }

    pub fn win_steepness(&self, viewer_type: usize) -> f64 {
        self.config.win_steepness[viewer_type]
    }

    pub fn seed(&self) -> u64 {
        self.config.seed
    }

    /// Mean revenue of one campaign across viewer types
    pub fn campaign_mean_revenue(&self, campaign: usize) -> f64 {
        mean(&self.config.revenue[campaign])
    }

    /// Mean of all revenue cells
    pub fn global_mean_revenue(&self) -> f64 {
        let all: Vec<f64> = self.config.revenue.iter().flatten().copied().collect();
        mean(&all)
    }

    /// Mean of all capacity cells
    pub fn global_mean_capacity(&self) -> f64 {
        let all: Vec<f64> = self.config.capacity.iter().flatten().copied().collect();
        mean(&all)
    }

    /// New parameters with every holding cost multiplied by `multiplier`
    pub fn with_holding_cost_scaled(&self, multiplier: f64) -> Result<Self> {
        let mut config = self.config.clone();
        for row in &mut config.holding_cost {
            for cost in row.iter_mut() {
                *cost *= multiplier;
            }
        }
        Self::new(config)
    }

    /// New parameters with a different seed
    pub fn with_seed(&self, seed: u64) -> Self {
        let mut config = self.config.clone();
        config.seed = seed;
        Self { config }
    }
}

fn check_value(field: &str, value: f64, non_negative: bool) -> Result<()> {
    if !value.is_finite() {
        return Err(SimError::invalid(field, format!("value {} is not finite", value)));
    }
    if non_negative && value < 0.0 {
        return Err(SimError::invalid(field, format!("value {} is negative", value)));
    }
    Ok(())
}

fn check_expected_arrivals(field: &str, rates: &[f64], horizon: f64) -> Result<()> {
    for &rate in rates {
        let expected = rate * horizon;
        if expected > MAX_EXPECTED_ARRIVALS {
            return Err(SimError::invalid(field, format!(
                "rate {} over horizon {} expects {:.3e} arrivals, at most {:.0e} allowed",
                rate, horizon, expected, MAX_EXPECTED_ARRIVALS
            )));
        }
    }
    Ok(())
}

fn check_vector(field: &str, values: &[f64], expected: usize, non_negative: bool) -> Result<()> {
    if values.len() != expected {
        return Err(SimError::mismatch(field, expected, values.len()));
    }
    for &value in values {
        check_value(field, value, non_negative)?;
    }
    Ok(())
}

fn check_matrix(field: &str, rows: &[Vec<f64>], campaigns: usize, viewer_types: usize, non_negative: bool) -> Result<()> {
    if rows.len() != campaigns {
        return Err(SimError::mismatch(field, campaigns, rows.len()));
    }
    for row in rows {
        check_vector(field, row, viewer_types, non_negative)?;
    }
    Ok(())
}

/// Three campaigns competing for a single viewer type over an eight hour day
pub fn three_campaign_market() -> MarketConfig {
    MarketConfig {
        num_campaigns: 3,
        num_viewer_types: 1,
        horizon: 8.0 * 3600.0,
        viewer_rates: vec![2.5],
        campaign_rates: vec![0.1, 0.2, 0.3],
        supply: vec![vec![1.0], vec![1.0], vec![1.0]],
        capacity: vec![vec![50.0], vec![50.0], vec![50.0]],
        revenue: vec![vec![2.5], vec![3.0], vec![3.5]],
        holding_cost: vec![vec![0.4], vec![0.4], vec![0.3]],
        win_steepness: vec![1.0],
        seed: 123,
    }
}

/// One campaign, one viewer type, eight hour day
pub fn single_campaign_market() -> MarketConfig {
    MarketConfig {
        num_campaigns: 1,
        num_viewer_types: 1,
        horizon: 8.0 * 3600.0,
        viewer_rates: vec![2.5],
        campaign_rates: vec![0.1],
        supply: vec![vec![1.0]],
        capacity: vec![vec![50.0]],
        revenue: vec![vec![2.5]],
        holding_cost: vec![vec![0.4]],
        win_steepness: vec![1.0],
        seed: 123,
    }
}

#[cfg(test)]
pub(crate) fn tiny_market() -> MarketConfig {
    MarketConfig {
        num_campaigns: 1,
        num_viewer_types: 1,
        horizon: 100.0,
        viewer_rates: vec![1.0],
        campaign_rates: vec![1.0],
        supply: vec![vec![5.0]],
        capacity: vec![vec![10.0]],
        revenue: vec![vec![10.0]],
        holding_cost: vec![vec![0.0]],
        win_steepness: vec![1.0],
        seed: 42,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(MarketParams::new(three_campaign_market()).is_ok());
        assert!(MarketParams::new(single_campaign_market()).is_ok());
        assert!(MarketParams::new(tiny_market()).is_ok());
    }

    #[test]
    fn test_supply_column_mismatch_is_rejected() {
        // Two supply columns for a single viewer type
        let mut config = single_campaign_market();
        config.supply = vec![vec![5.0, 3.0]];
        let err = MarketParams::new(config).unwrap_err();
        assert_eq!(err, SimError::mismatch("supply", 1, 2));
    }

    #[test]
    fn test_campaign_rate_length_mismatch_is_rejected() {
        let mut config = three_campaign_market();
        config.campaign_rates = vec![0.1, 0.2];
        assert!(matches!(
            MarketParams::new(config),
            Err(SimError::DimensionMismatch { expected: 3, actual: 2, .. })
        ));
    }

    #[test]
    fn test_negative_rate_is_rejected() {
        let mut config = single_campaign_market();
        config.viewer_rates = vec![-1.0];
        assert!(matches!(MarketParams::new(config), Err(SimError::InvalidValue { .. })));
    }

    #[test]
    fn test_zero_rate_is_accepted() {
        let mut config = single_campaign_market();
        config.campaign_rates = vec![0.0];
        assert!(MarketParams::new(config).is_ok());
    }

    #[test]
    fn test_huge_expected_arrivals_is_rejected() {
        let mut config = single_campaign_market();
        config.viewer_rates = vec![1.0e10];
        config.horizon = 1.0e10;
        assert!(matches!(
            MarketParams::new(config),
            Err(SimError::InvalidValue { ref field, .. }) if field == "viewer_rates"
        ));

        let mut config = single_campaign_market();
        config.campaign_rates = vec![1.0e4];
        config.horizon = 1.0e4;
        assert!(matches!(MarketParams::new(config), Err(SimError::InvalidValue { .. })));

        // Exactly at the bound is still accepted
        let mut config = single_campaign_market();
        config.viewer_rates = vec![1.0e3];
        config.horizon = 1.0e4;
        assert!(MarketParams::new(config).is_ok());
    }

    #[test]
    fn test_zero_campaigns_is_rejected() {
        let mut config = single_campaign_market();
        config.num_campaigns = 0;
        assert!(MarketParams::new(config).is_err());
    }

    #[test]
    fn test_non_finite_horizon_is_rejected() {
        let mut config = single_campaign_market();
        config.horizon = f64::INFINITY;
        assert!(MarketParams::new(config).is_err());
    }

    #[test]
    fn test_revenue_may_be_negative() {
        let mut config = single_campaign_market();
        config.revenue = vec![vec![-1.0]];
        assert!(MarketParams::new(config).is_ok());
    }

    #[test]
    fn test_means() {
        let params = MarketParams::new(three_campaign_market()).unwrap();
        assert!((params.global_mean_revenue() - 3.0).abs() < 1e-12);
        assert!((params.campaign_mean_revenue(2) - 3.5).abs() < 1e-12);
        assert!((params.global_mean_capacity() - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_holding_cost_scaling() {
        let params = MarketParams::new(three_campaign_market()).unwrap();
        let scaled = params.with_holding_cost_scaled(0.5).unwrap();
        assert!((scaled.holding_cost(0, 0) - 0.2).abs() < 1e-12);
        assert!((scaled.holding_cost(2, 0) - 0.15).abs() < 1e-12);
        assert_eq!(scaled.revenue(1, 0), params.revenue(1, 0));
        assert!(params.with_holding_cost_scaled(-1.0).is_err());
    }

    #[test]
    fn test_json_accepts_short_keys() {
        let json = r#"{
            "num_campaigns": 1,
            "num_viewer_types": 2,
            "T": 3600.0,
            "mu": [0.5, 0.25],
            "lambda": [0.2],
            "s": [[5.0, 3.0]],
            "A": [[15.0, 10.0]],
            "r": [[1.5, 1.2]],
            "c": [[0.05, 0.04]],
            "k": [1.0, 2.0],
            "seed": 1
        }"#;
        let config = MarketConfig::from_json_str(json).unwrap();
        assert_eq!(config.horizon, 3600.0);
        assert_eq!(config.capacity, vec![vec![15.0, 10.0]]);
        let params = MarketParams::new(config).unwrap();
        assert_eq!(params.win_steepness(1), 2.0);
    }

    #[test]
    fn test_json_parse_error_is_config_error() {
        assert!(matches!(MarketConfig::from_json_str("{ not json"), Err(SimError::Config(_))));
    }
}
