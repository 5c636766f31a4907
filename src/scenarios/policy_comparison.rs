/// Three campaigns with different inventory rates, revenues and holding costs share one
/// viewer type. Every bidding policy is evaluated over the same generated day of events.
///
/// - Dynamic: bid grows with the total queued inventory, viewer goes to the longest queue
///
/// - Round robin: fixed bid, viewers handed to campaigns in turn
///
/// - Fixed bid: fixed bid, every viewer goes to campaign 0
///
/// - Linear / Bid curve: bid depends on the longest queue, nothing is bid on empty queues


use crate::params::{three_campaign_market, MarketParams};
use crate::scenarios::{check, check_common, compare_standard_policies, finish, result_for};
use crate::utils;
use crate::logger::{Logger, LogEvent};
use crate::logln;

// Register this scenario in the catalog
inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "policy_comparison",
    run,
});

const NUM_RUNS: usize = 3;

pub fn run(scenario_name: &str, seed_offset: u64, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let base = MarketParams::new(three_campaign_market())?;
    let params = base.with_seed(utils::iteration_seed(base.seed(), seed_offset));

    let (num_events, results) = compare_standard_policies(scenario_name, params, NUM_RUNS, logger)?;

    logln!(logger, LogEvent::Scenario, "");
    let mut errors: Vec<String> = Vec::new();
    check_common(logger, &mut errors, num_events, &results);

    // Check: round robin spreads viewers evenly over the campaigns
    if let Some(round_robin) = result_for(&results, "Round robin") {
        let allocated: Vec<usize> = round_robin.last_stat.campaign_stats.iter().map(|c| c.viewers_allocated).collect();
        let spread = allocated.iter().max().copied().unwrap_or(0) - allocated.iter().min().copied().unwrap_or(0);
        check(logger, &mut errors, spread <= 1,
            format!("Round robin allocated viewers evenly: {:?}", allocated));
    }

    // Check: fixed bid sends every viewer to campaign 0
    if let Some(fixed) = result_for(&results, "Fixed bid") {
        let others: usize = fixed.last_stat.campaign_stats.iter().skip(1).map(|c| c.viewers_allocated).sum();
        check(logger, &mut errors, others == 0,
            format!("Fixed bid allocated no viewer outside campaign 0: {} found", others));
    }

    // Check: policies that bid zero on empty queues never win an auction they cannot serve
    for label in ["Linear", "Bid curve"] {
        if let Some(evaluation) = result_for(&results, label) {
            let wasted = evaluation.last_stat.overall_stat.won_on_empty_queue;
            check(logger, &mut errors, wasted == 0,
                format!("{} never won a viewer for an empty queue: {} found", label, wasted));
        }
    }

    finish(scenario_name, errors)
}
