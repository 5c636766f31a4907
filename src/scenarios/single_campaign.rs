/// A single campaign and a single viewer type.
///
/// With only one campaign every policy allocates to campaign 0, so the policies differ only
/// in how much they bid as the queue fills up. Round robin and fixed bid collapse into the
/// same decision rule here.


use crate::params::{single_campaign_market, MarketParams};
use crate::policies::PolicyType;
use crate::scenarios::{check, check_common, compare_standard_policies, finish};
use crate::utils;
use crate::logger::{Logger, LogEvent};
use crate::logln;

// Register this scenario in the catalog
inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "single_campaign",
    run,
});

const NUM_RUNS: usize = 3;

pub fn run(scenario_name: &str, seed_offset: u64, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let base = MarketParams::new(single_campaign_market())?;
    let params = base.with_seed(utils::iteration_seed(base.seed(), seed_offset));

    // Decision rules are compared before the market consumes the parameters
    let mut round_robin = PolicyType::ROUND_ROBIN.create_policy(&params);
    let mut fixed = PolicyType::FIXED_BID.create_policy(&params);
    let capacity = params.capacity(0, 0);
    let probes: Vec<f64> = vec![0.0, 1.0, capacity * 0.5, capacity];

    let (num_events, results) = compare_standard_policies(scenario_name, params, NUM_RUNS, logger)?;

    logln!(logger, LogEvent::Scenario, "");
    let mut errors: Vec<String> = Vec::new();
    check_common(logger, &mut errors, num_events, &results);

    // Check: every policy sends every viewer to the only campaign
    for (label, evaluation) in &results {
        let stat = &evaluation.last_stat;
        check(logger, &mut errors, stat.campaign_stats[0].viewers_allocated == stat.overall_stat.viewer_events,
            format!("{} allocated all {} viewers to campaign 0", label, stat.overall_stat.viewer_events));
    }

    // Check: round robin and fixed bid make identical decisions
    let identical = probes.iter().all(|&queue| {
        round_robin.get_bid(&[queue], 0) == fixed.get_bid(&[queue], 0)
    });
    check(logger, &mut errors, identical,
        format!("{} and {} bid identically on a single campaign", round_robin.get_policy_type(), fixed.get_policy_type()));

    finish(scenario_name, errors)
}
