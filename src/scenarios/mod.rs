use std::error::Error;
use crate::charts;
use crate::evaluation::{PolicyEvaluation, Simulator};
use crate::logger::{Logger, LogEvent, sanitize_filename};
use crate::params::MarketParams;
use crate::policies::{BiddingPolicy, PolicyType};
use crate::logln;
use crate::errln;

/// Function type for scenario entry functions.
/// `seed_offset` shifts the scenario's own seed so repeated iterations explore different streams.
pub type ScenarioFn = fn(scenario_name: &str, seed_offset: u64, logger: &mut Logger) -> Result<(), Box<dyn Error>>;

/// Entry in the scenario catalog
#[derive(Clone)]
pub struct ScenarioEntry {
    pub short_name: &'static str,
    pub run: ScenarioFn,
}

// Create an inventory collection for scenario entries
inventory::collect!(ScenarioEntry);

/// Get all registered scenarios from the catalog, sorted by name
pub fn get_scenario_catalog() -> Vec<ScenarioEntry> {
    let mut entries: Vec<ScenarioEntry> = inventory::iter::<ScenarioEntry>
        .into_iter()
        .cloned()
        .collect();
    entries.sort_by_key(|entry| entry.short_name);
    entries
}

// Scenario modules
pub mod policy_comparison;
pub mod single_campaign;
pub mod bid_curve;
pub mod holding_cost_sensitivity;

/// Policies compared by the market scenarios, in reporting order
pub fn standard_policies(params: &MarketParams) -> Vec<(String, Box<dyn BiddingPolicy>)> {
    vec![
        ("Dynamic".to_string(), PolicyType::DYNAMIC.create_policy(params)),
        ("Round robin".to_string(), PolicyType::ROUND_ROBIN.create_policy(params)),
        ("Fixed bid".to_string(), PolicyType::FIXED_BID.create_policy(params)),
        ("Linear".to_string(), PolicyType::LINEAR.create_policy(params)),
        ("Bid curve".to_string(), PolicyType::BID_CURVE.create_policy(params)),
    ]
}

/// Generate one event stream and evaluate every standard policy on it.
///
/// Logs the comparison and renders it to `charts/<scenario>/policy_comparison.png`.
/// Returns the number of generated events together with the evaluations.
pub fn compare_standard_policies(
    scenario_name: &str,
    params: MarketParams,
    num_runs: usize,
    logger: &mut Logger,
) -> Result<(usize, Vec<(String, PolicyEvaluation)>), Box<dyn Error>> {
    let mut simulator = Simulator::new(params);
    let events = simulator.generate_events()?;
    let viewers = events.iter().filter(|event| event.is_viewer()).count();
    logln!(logger, LogEvent::Scenario, "Generated {} events, {} of them viewers (seed {})",
        events.len(), viewers, simulator.params().seed());

    let policies = standard_policies(simulator.params());
    let results = simulator.compare_policies(scenario_name, policies, &events, num_runs, logger)?;

    logln!(logger, LogEvent::Scenario, "");
    for (label, evaluation) in &results {
        logln!(logger, LogEvent::Scenario, "{:<12} expected profit: {:>12.2}  raw mean: {:>12.2} over {} run(s)  ({})",
            label, evaluation.expected_profit, evaluation.raw_mean_profit, evaluation.run_profits.len(), evaluation.policy_name);
    }

    let chart_data: Vec<(String, f64)> = results
        .iter()
        .map(|(label, evaluation)| (label.clone(), evaluation.expected_profit))
        .collect();
    let chart_file = format!("charts/{}/policy_comparison.png", sanitize_filename(scenario_name));
    if let Err(e) = charts::plot_policy_comparison(&chart_data, "Bidding policy comparison", &chart_file) {
        errln!(logger, LogEvent::Scenario, "Cannot render {}: {}", chart_file, e);
    }

    Ok((events.len(), results))
}

/// Record one validation: log a check mark or a cross and remember failures
pub fn check(logger: &mut Logger, errors: &mut Vec<String>, passed: bool, msg: String) {
    if passed {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
        errors.push(msg);
    }
}

/// Turn collected validation failures into the scenario result
pub fn finish(scenario_name: &str, errors: Vec<String>) -> Result<(), Box<dyn Error>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(format!("Scenario '{}' validation failed:\n{}", scenario_name, errors.join("\n")).into())
    }
}

/// Checks every market comparison must pass regardless of the market
pub fn check_common(
    logger: &mut Logger,
    errors: &mut Vec<String>,
    num_events: usize,
    results: &[(String, PolicyEvaluation)],
) {
    for (label, evaluation) in results {
        let o = &evaluation.last_stat.overall_stat;
        let processed = o.viewer_events + o.campaign_events;
        check(logger, errors, processed == num_events,
            format!("{} processed every event: {} of {}", label, processed, num_events));
        check(logger, errors, evaluation.last_stat.bound_violations == 0,
            format!("{} kept every queue within [0, capacity]: {} violations", label, evaluation.last_stat.bound_violations));
        check(logger, errors, evaluation.expected_profit >= 0.0,
            format!("{} reports a non-negative expected profit: {:.2}", label, evaluation.expected_profit));
    }
}

/// Find an evaluation by its label
pub fn result_for<'a>(results: &'a [(String, PolicyEvaluation)], label: &str) -> Option<&'a PolicyEvaluation> {
    results.iter().find(|(l, _)| l == label).map(|(_, evaluation)| evaluation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_registered_and_sorted() {
        let names: Vec<&str> = get_scenario_catalog().iter().map(|e| e.short_name).collect();
        for expected in ["bid_curve", "holding_cost_sensitivity", "policy_comparison", "single_campaign"] {
            assert!(names.contains(&expected), "missing scenario {}", expected);
        }
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_finish_reports_failures() {
        assert!(finish("s", Vec::new()).is_ok());
        let err = finish("s", vec!["a".to_string(), "b".to_string()]).unwrap_err();
        assert!(err.to_string().contains("a\nb"));
    }

    #[test]
    fn test_check_collects_only_failures() {
        let mut logger = Logger::new();
        let mut errors = Vec::new();
        check(&mut logger, &mut errors, true, "fine".to_string());
        check(&mut logger, &mut errors, false, "broken".to_string());
        assert_eq!(errors, vec!["broken".to_string()]);
    }
}
