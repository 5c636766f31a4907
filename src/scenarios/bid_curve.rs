/// Shape of the queue-dependent bid curve for the single campaign market.
///
/// The curve is sampled from an empty queue up to capacity and plotted. A bid curve policy
/// is then checked to bid exactly the curve for the queue it targets, and its expected profit
/// is measured against the fixed bid on one generated day.


use crate::charts;
use crate::evaluation::Simulator;
use crate::params::{single_campaign_market, MarketParams};
use crate::policies::{queue_bid_curve, BidCurvePolicy, BiddingPolicy, FixedBidPolicy};
use crate::scenarios::{check, finish};
use crate::utils;
use crate::logger::{Logger, LogEvent, sanitize_filename};
use crate::logln;
use crate::errln;

// Register this scenario in the catalog
inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "bid_curve",
    run,
});

const NUM_RUNS: usize = 3;

/// Queue lengths from 0 to capacity in about twenty steps
fn sample_queues(capacity: f64) -> Vec<f64> {
    let step = (capacity / 20.0).floor().max(1.0);
    let mut queues = Vec::new();
    let mut queue = 0.0;
    while queue <= capacity {
        queues.push(queue);
        queue += step;
    }
    queues
}

pub fn run(scenario_name: &str, seed_offset: u64, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let params = MarketParams::new(single_campaign_market())?;
    let revenue = params.revenue(0, 0);
    let capacity = params.capacity(0, 0);

    let queues = sample_queues(capacity);
    let bids: Vec<f64> = queues.iter().map(|&queue| queue_bid_curve(queue, revenue, capacity)).collect();

    logln!(logger, LogEvent::Scenario, "Bid curve for revenue {:.2}, capacity {:.0}", revenue, capacity);
    for (queue, bid) in queues.iter().zip(bids.iter()) {
        logln!(logger, LogEvent::Scenario, "  queue {:>6.1}  bid {:>8.4}", queue, bid);
    }

    let chart_file = format!("charts/{}/bid_curve.png", sanitize_filename(scenario_name));
    if let Err(e) = charts::plot_series(&queues, &bids, "Bid by queue length", "Queue length", "Bid", &chart_file) {
        errln!(logger, LogEvent::Scenario, "Cannot render {}: {}", chart_file, e);
    }

    logln!(logger, LogEvent::Scenario, "");
    let mut errors: Vec<String> = Vec::new();

    // Check: nothing is bid for an empty queue
    check(logger, &mut errors, bids[0] == 0.0,
        format!("Empty queue bids nothing: {:.4}", bids[0]));

    // Check: the peak sits at the largest sampled queue below 70% of capacity
    let mut peak = 0;
    for (index, bid) in bids.iter().enumerate() {
        if *bid > bids[peak] {
            peak = index;
        }
    }
    let expected_peak = queues.iter().rposition(|&queue| queue < capacity * 0.7).unwrap_or(0);
    check(logger, &mut errors, peak == expected_peak,
        format!("Bid peaks below 70% of capacity: peak at queue {:.1}, expected {:.1}", queues[peak], queues[expected_peak]));

    // Check: a full queue falls back to the base bid
    let full = queue_bid_curve(capacity, revenue, capacity);
    check(logger, &mut errors, (full - revenue * 0.6).abs() < 1e-9,
        format!("Full queue bids the base bid: {:.4}", full));

    // Check: the policy bids the curve for its target queue
    let mut policy = BidCurvePolicy::from_params(&params);
    let follows_curve = queues.iter().zip(bids.iter()).all(|(&queue, &bid)| {
        let decision = policy.get_bid(&[queue], 0);
        decision.campaign == 0 && (decision.amount - bid).abs() < 1e-12
    });
    check(logger, &mut errors, follows_curve,
        format!("{} bids the sampled curve", policy.get_policy_type()));

    // Check: expected profits over one generated day are finite and floored at zero
    let mut simulator = Simulator::new(params.with_seed(utils::iteration_seed(params.seed(), seed_offset)));
    let events = simulator.generate_events()?;
    let curve_profit = simulator.evaluate_policy(&mut policy, &events, NUM_RUNS, logger)?;
    let mut fixed = FixedBidPolicy::from_params(simulator.params());
    let fixed_profit = simulator.evaluate_policy(&mut fixed, &events, NUM_RUNS, logger)?;
    logln!(logger, LogEvent::Scenario, "Expected profit over {} run(s): bid curve {:.2}, {} {:.2}",
        NUM_RUNS, curve_profit, fixed.get_policy_type(), fixed_profit);
    for (name, profit) in [("Bid curve", curve_profit), ("Fixed bid", fixed_profit)] {
        check(logger, &mut errors, profit.is_finite() && profit >= 0.0,
            format!("{} expected profit is a non-negative number: {:.2}", name, profit));
    }

    finish(scenario_name, errors)
}
