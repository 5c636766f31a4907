/// Sensitivity of the dynamic policy's profit to the holding cost.
///
/// One day of events is generated for the three campaign market. Every holding cost is then
/// scaled by multipliers from 0.1 to 1.0 and the dynamic policy replays the same events once per
/// multiplier. Each replay gets its own simulator seeded like the original one, which regenerates
/// (and discards) the same events before replaying them. Win/loss draws therefore follow event
/// generation on the stream, and every multiplier sees the same draws. Runs differ only in what
/// inventory costs to hold.


use crate::charts;
use crate::evaluation::Simulator;
use crate::params::{three_campaign_market, MarketParams};
use crate::policies::DynamicPolicy;
use crate::scenarios::{check, finish};
use crate::utils;
use crate::logger::{Logger, LogEvent, sanitize_filename};
use crate::logln;
use crate::errln;

// Register this scenario in the catalog
inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "holding_cost_sensitivity",
    run,
});

/// Multipliers 0.1, 0.2, ..., 1.0
fn multipliers() -> Vec<f64> {
    (1..=10).map(|step| step as f64 / 10.0).collect()
}

pub fn run(scenario_name: &str, seed_offset: u64, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let base = MarketParams::new(three_campaign_market())?;
    let params = base.with_seed(utils::iteration_seed(base.seed(), seed_offset));

    let mut simulator = Simulator::new(params.clone());
    let events = simulator.generate_events()?;
    logln!(logger, LogEvent::Scenario, "Generated {} events (seed {})", events.len(), params.seed());

    let multipliers = multipliers();
    let mut profits = Vec::with_capacity(multipliers.len());
    for &multiplier in &multipliers {
        let mut scaled = Simulator::new(params.with_holding_cost_scaled(multiplier)?);
        let replayed = scaled.generate_events()?;
        if replayed != events {
            return Err(format!("Holding cost x{:.1} regenerated a different event stream", multiplier).into());
        }
        let simulation_run = scaled.run_policy(&mut DynamicPolicy::new(), &events, logger)?;
        logln!(logger, LogEvent::Scenario, "Holding cost x{:.1}: profit {:.2}", multiplier, simulation_run.total_profit);
        profits.push(simulation_run.total_profit);
    }

    let chart_file = format!("charts/{}/holding_cost_sensitivity.png", sanitize_filename(scenario_name));
    if let Err(e) = charts::plot_series(&multipliers, &profits, "Dynamic policy profit by holding cost",
        "Holding cost multiplier", "Profit", &chart_file) {
        errln!(logger, LogEvent::Scenario, "Cannot render {}: {}", chart_file, e);
    }

    logln!(logger, LogEvent::Scenario, "");
    let mut errors: Vec<String> = Vec::new();

    // Check: profit never increases with the holding cost
    let mut increases = Vec::new();
    for index in 1..profits.len() {
        let tolerance = 1e-9 * profits[index - 1].abs().max(1.0);
        if profits[index] > profits[index - 1] + tolerance {
            increases.push(format!("x{:.1}", multipliers[index]));
        }
    }
    check(logger, &mut errors, increases.is_empty(),
        format!("Profit is non-increasing in the holding cost multiplier (increases at {:?})", increases));

    // Check: holding inventory costs something over the day
    let cheapest = profits.first().copied().unwrap_or(0.0);
    let dearest = profits.last().copied().unwrap_or(0.0);
    check(logger, &mut errors, cheapest > dearest,
        format!("Lowest holding cost earns more than the highest: {:.2} > {:.2}", cheapest, dearest));

    finish(scenario_name, errors)
}
