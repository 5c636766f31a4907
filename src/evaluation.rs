//! Policy evaluation harness.
//!
//! A `Simulator` generates one event stream per market and replays it under each policy as
//! many times as requested. Every policy is scored by its mean run profit, floored at zero.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use crate::auction::EventLogEntry;
use crate::error::{Result, SimError};
use crate::events::{generate_events, Event};
use crate::logger::{Logger, LogEvent, FileReceiver, sanitize_filename};
use crate::params::MarketParams;
use crate::policies::BiddingPolicy;
use crate::simulationrun::{SimulationRun, SimulationStat};
use crate::utils::VERBOSE_EVENTS;
use crate::logln;
use crate::warnln;

/// Outcome of evaluating one policy
pub struct PolicyEvaluation {
    pub policy_name: String,
    /// Mean profit over runs, floored at zero
    pub expected_profit: f64,
    /// Mean profit over runs, as simulated
    pub raw_mean_profit: f64,
    pub run_profits: Vec<f64>,
    /// Statistics of the last run
    pub last_stat: SimulationStat,
}

/// Floor applied to mean profits reported by the harness: losing policies report break-even
pub fn floor_profit(mean_profit: f64) -> f64 {
    if mean_profit > 0.0 {
        mean_profit
    } else {
        0.0
    }
}

/// Raw mean and floored expected profit of a set of run profits.
/// An empty set means no run was requested, which is a configuration error.
pub fn summarize_runs(run_profits: &[f64]) -> Result<(f64, f64)> {
    if run_profits.is_empty() {
        return Err(SimError::Config("num_runs must be at least 1".to_string()));
    }
    let raw_mean_profit = run_profits.iter().sum::<f64>() / run_profits.len() as f64;
    Ok((raw_mean_profit, floor_profit(raw_mean_profit)))
}

/// Owns the market parameters and the single random stream every draw comes from.
///
/// The stream is seeded from the parameters at construction. Event generation consumes it
/// first; every later run continues the same stream, so runs over a shared event list see
/// fresh win/loss draws while the whole experiment stays reproducible from the seed.
pub struct Simulator {
    params: MarketParams,
    rng: StdRng,
}

impl Simulator {
    pub fn new(params: MarketParams) -> Self {
        let rng = StdRng::seed_from_u64(params.seed());
        Self { params, rng }
    }

    pub fn params(&self) -> &MarketParams {
        &self.params
    }

    /// Generate one event stream, to be shared by every policy evaluated on this market
    pub fn generate_events(&mut self) -> Result<Vec<Event>> {
        generate_events(&self.params, &mut self.rng)
    }

    /// Replay the events once under the policy, unfloored
    pub fn run_policy(&mut self, policy: &mut dyn BiddingPolicy, events: &[Event], logger: &mut Logger) -> Result<SimulationRun> {
        SimulationRun::new(&self.params, policy, events, &mut self.rng, logger)
    }

    /// Expected profit of the policy: mean over `num_runs` runs on the same events, floored at zero
    pub fn evaluate_policy(&mut self, policy: &mut dyn BiddingPolicy, events: &[Event], num_runs: usize, logger: &mut Logger) -> Result<f64> {
        let mut run_profits = Vec::with_capacity(num_runs);
        for _ in 0..num_runs {
            run_profits.push(self.run_policy(policy, events, logger)?.total_profit);
        }
        let (_, expected_profit) = summarize_runs(&run_profits)?;
        Ok(expected_profit)
    }

    /// Evaluate one policy and log its statistics.
    ///
    /// With verbose event logging on, each run's audit log is written to
    /// `log/<scenario>/events-<variant>-run<n>.csv`.
    pub fn run_variant(
        &mut self,
        variant_name: &str,
        scenario_name: &str,
        policy: &mut dyn BiddingPolicy,
        events: &[Event],
        num_runs: usize,
        logger: &mut Logger,
    ) -> Result<PolicyEvaluation> {
        let policy_name = policy.get_policy_type();
        logln!(logger, LogEvent::Evaluation, "\n=== {} - {} ===", variant_name, policy_name);

        let mut run_profits = Vec::with_capacity(num_runs);
        let mut last_stat = None;
        for run_index in 0..num_runs {
            let events_receiver_id = if VERBOSE_EVENTS.load(Ordering::Relaxed) {
                let path = PathBuf::from(format!(
                    "log/{}/events-{}-run{}.csv",
                    sanitize_filename(scenario_name),
                    sanitize_filename(variant_name),
                    run_index + 1
                ));
                match FileReceiver::new(&path, vec![LogEvent::Event]) {
                    Ok(receiver) => {
                        let id = logger.add_receiver(receiver);
                        logln!(logger, LogEvent::Event, "{}", EventLogEntry::CSV_HEADER);
                        Some(id)
                    }
                    Err(e) => {
                        warnln!(logger, LogEvent::Evaluation, "Cannot open event log {}: {}", path.display(), e);
                        None
                    }
                }
            } else {
                None
            };

            let result = self.run_policy(policy, events, logger);

            if let Some(id) = events_receiver_id {
                logger.remove_receiver(id);
            }

            let simulation_run = result?;
            let stat = SimulationStat::new(&self.params, &simulation_run);
            logln!(logger, LogEvent::Simulation, "\n--- {} run {} ---", variant_name, run_index + 1);
            stat.printout(logger, LogEvent::Simulation);

            run_profits.push(simulation_run.total_profit);
            last_stat = Some(stat);
        }

        let (raw_mean_profit, expected_profit) = summarize_runs(&run_profits)?;
        if raw_mean_profit < 0.0 {
            warnln!(logger, LogEvent::Evaluation, "{} lost {:.2} on average, reported as break-even", variant_name, -raw_mean_profit);
        }

        let last_stat = match last_stat {
            Some(stat) => stat,
            None => return Err(SimError::Config("no runs were executed".to_string())),
        };
        last_stat.printout_overall(logger, LogEvent::Evaluation);
        logln!(logger, LogEvent::Evaluation, "Expected profit over {} run(s): {:.2}", num_runs, expected_profit);

        Ok(PolicyEvaluation {
            policy_name,
            expected_profit,
            raw_mean_profit,
            run_profits,
            last_stat,
        })
    }

    /// Evaluate several policies over one shared event stream.
    /// Returns (label, evaluation) pairs in input order.
    pub fn compare_policies(
        &mut self,
        scenario_name: &str,
        policies: Vec<(String, Box<dyn BiddingPolicy>)>,
        events: &[Event],
        num_runs: usize,
        logger: &mut Logger,
    ) -> Result<Vec<(String, PolicyEvaluation)>> {
        let mut results = Vec::with_capacity(policies.len());
        for (label, mut policy) in policies {
            let evaluation = self.run_variant(&label, scenario_name, policy.as_mut(), events, num_runs, logger)?;
            results.push((label, evaluation));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{three_campaign_market, tiny_market, MarketParams};
    use crate::policies::{Bid, DynamicPolicy, FixedBidPolicy, PolicyType};

    fn simulator(config: crate::params::MarketConfig) -> Simulator {
        Simulator::new(MarketParams::new(config).unwrap())
    }

    /// Records every viewer it is asked about, bids nothing
    struct RecordingPolicy {
        seen: Vec<(usize, Vec<f64>)>,
    }

    impl BiddingPolicy for RecordingPolicy {
        fn get_bid(&mut self, queue_column: &[f64], viewer_type: usize) -> Bid {
            self.seen.push((viewer_type, queue_column.to_vec()));
            Bid { amount: 0.0, campaign: 0 }
        }

        fn get_policy_type(&self) -> String {
            "Recording".to_string()
        }
    }

    #[test]
    fn test_same_seed_same_experiment() {
        let mut logger = Logger::new();
        let mut a = simulator(tiny_market());
        let mut b = simulator(tiny_market());
        let events_a = a.generate_events().unwrap();
        let events_b = b.generate_events().unwrap();
        assert_eq!(events_a, events_b);

        let profit_a = a.run_policy(&mut FixedBidPolicy::new(6.0), &events_a, &mut logger).unwrap().total_profit;
        let profit_b = b.run_policy(&mut FixedBidPolicy::new(6.0), &events_b, &mut logger).unwrap().total_profit;
        assert_eq!(profit_a.to_bits(), profit_b.to_bits());
    }

    #[test]
    fn test_runs_draw_fresh_outcomes() {
        let mut logger = Logger::new();
        let mut sim = simulator(three_campaign_market());
        let events = sim.generate_events().unwrap();
        let first = sim.run_policy(&mut DynamicPolicy::new(), &events, &mut logger).unwrap();
        let second = sim.run_policy(&mut DynamicPolicy::new(), &events, &mut logger).unwrap();
        assert_eq!(first.log.len(), second.log.len());
        assert_ne!(first.log, second.log);
    }

    #[test]
    fn test_policies_see_identical_event_order() {
        let mut logger = Logger::new();
        let mut config = three_campaign_market();
        config.horizon = 500.0;
        let mut sim = simulator(config);
        let events = sim.generate_events().unwrap();

        let mut first = RecordingPolicy { seen: Vec::new() };
        let mut second = RecordingPolicy { seen: Vec::new() };
        let run_first = sim.run_policy(&mut first, &events, &mut logger).unwrap();
        let run_second = sim.run_policy(&mut second, &events, &mut logger).unwrap();

        // Zero bids never win, so queue evolution depends only on the event order
        assert_eq!(first.seen, second.seen);
        assert_eq!(first.seen.len(), events.iter().filter(|e| e.is_viewer()).count());
        let times_first: Vec<f64> = run_first.log.iter().map(|e| e.time).collect();
        let times_second: Vec<f64> = run_second.log.iter().map(|e| e.time).collect();
        let event_times: Vec<f64> = events.iter().map(|e| e.time()).collect();
        assert_eq!(times_first, event_times);
        assert_eq!(times_second, event_times);
    }

    #[test]
    fn test_negative_mean_is_floored() {
        // Bidding far above revenue loses money on every served viewer
        let mut logger = Logger::new();
        let mut sim = simulator(tiny_market());
        let events = sim.generate_events().unwrap();

        let raw = sim.run_policy(&mut FixedBidPolicy::new(50.0), &events, &mut logger).unwrap().total_profit;
        assert!(raw < 0.0);
        let expected = sim.evaluate_policy(&mut FixedBidPolicy::new(50.0), &events, 3, &mut logger).unwrap();
        assert_eq!(expected, 0.0);

        let evaluation = sim.run_variant("overbid", "test", &mut FixedBidPolicy::new(50.0), &events, 2, &mut logger).unwrap();
        assert_eq!(evaluation.expected_profit, 0.0);
        assert!(evaluation.raw_mean_profit < 0.0);
        assert_eq!(evaluation.run_profits.len(), 2);
    }

    #[test]
    fn test_floor_profit() {
        assert_eq!(floor_profit(-3.0), 0.0);
        assert_eq!(floor_profit(0.0), 0.0);
        assert_eq!(floor_profit(2.5), 2.5);
    }

    #[test]
    fn test_summarize_runs() {
        assert_eq!(summarize_runs(&[1.0, 2.0, 6.0]), Ok((3.0, 3.0)));
        assert_eq!(summarize_runs(&[-4.0, 2.0]), Ok((-1.0, 0.0)));
        assert!(matches!(summarize_runs(&[]), Err(SimError::Config(_))));
    }

    #[test]
    fn test_evaluate_policy_matches_run_variant() {
        // Same seed and same events: both paths see the same draws and apply the same floor
        let mut logger = Logger::new();
        let mut a = simulator(tiny_market());
        let mut b = simulator(tiny_market());
        let events = a.generate_events().unwrap();
        b.generate_events().unwrap();

        let expected = a.evaluate_policy(&mut FixedBidPolicy::new(6.0), &events, 3, &mut logger).unwrap();
        let evaluation = b.run_variant("fixed", "test", &mut FixedBidPolicy::new(6.0), &events, 3, &mut logger).unwrap();
        assert_eq!(expected.to_bits(), evaluation.expected_profit.to_bits());

        let overbid = a.evaluate_policy(&mut FixedBidPolicy::new(50.0), &events, 2, &mut logger).unwrap();
        let overbid_variant = b.run_variant("overbid", "test", &mut FixedBidPolicy::new(50.0), &events, 2, &mut logger).unwrap();
        assert_eq!(overbid, overbid_variant.expected_profit);
    }

    #[test]
    fn test_evaluate_is_mean_of_runs() {
        let mut logger = Logger::new();
        let mut sim = simulator(tiny_market());
        let events = sim.generate_events().unwrap();
        let evaluation = sim.run_variant("fixed", "test", &mut FixedBidPolicy::new(6.0), &events, 4, &mut logger).unwrap();
        let mean = evaluation.run_profits.iter().sum::<f64>() / 4.0;
        assert_eq!(evaluation.raw_mean_profit, mean);
        assert!(evaluation.expected_profit > 0.0);
    }

    #[test]
    fn test_zero_runs_is_rejected() {
        let mut logger = Logger::new();
        let mut sim = simulator(tiny_market());
        let events = sim.generate_events().unwrap();
        assert!(matches!(
            sim.evaluate_policy(&mut FixedBidPolicy::new(6.0), &events, 0, &mut logger),
            Err(SimError::Config(_))
        ));
        assert!(matches!(
            sim.run_variant("none", "test", &mut FixedBidPolicy::new(6.0), &events, 0, &mut logger),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn test_compare_policies_keeps_order() {
        let mut logger = Logger::new();
        let mut config = three_campaign_market();
        config.horizon = 2000.0;
        let mut sim = simulator(config);
        let events = sim.generate_events().unwrap();
        let params = sim.params().clone();

        let policies: Vec<(String, Box<dyn BiddingPolicy>)> = vec![
            ("dynamic".to_string(), PolicyType::DYNAMIC.create_policy(&params)),
            ("round robin".to_string(), PolicyType::ROUND_ROBIN.create_policy(&params)),
            ("fixed".to_string(), PolicyType::FIXED_BID.create_policy(&params)),
            ("linear".to_string(), PolicyType::LINEAR.create_policy(&params)),
        ];
        let results = sim.compare_policies("test", policies, &events, 1, &mut logger).unwrap();
        let labels: Vec<&str> = results.iter().map(|(label, _)| label.as_str()).collect();
        assert_eq!(labels, vec!["dynamic", "round robin", "fixed", "linear"]);
        for (_, evaluation) in &results {
            assert!(evaluation.expected_profit >= 0.0);
            assert_eq!(evaluation.last_stat.bound_violations, 0);
            let o = &evaluation.last_stat.overall_stat;
            assert_eq!(o.viewer_events + o.campaign_events, events.len());
        }
    }
}
