/// This file contains the SimulationRun struct, which replays one event stream under one policy
/// (evaluation.rs then runs it as many times as needed per policy).
///
/// Every run starts from empty queues at time 0 and processes the events strictly in the order
/// given. The elapsed time used for holding cost is always measured against the previous event.


use rand::rngs::StdRng;
use std::sync::atomic::Ordering;
use crate::auction::{process_event, EventLogEntry, EventOutcome, QueueState};
use crate::error::Result;
use crate::events::Event;
use crate::logger::{Logger, LogEvent};
use crate::params::MarketParams;
use crate::policies::BiddingPolicy;
use crate::utils::{TOTAL_SIMULATION_RUNS, VERBOSE_EVENTS};
use crate::logln;
use crate::errln;

/// Result of replaying one event stream under one policy
pub struct SimulationRun {
    pub total_profit: f64,
    pub log: Vec<EventLogEntry>,
    pub final_state: QueueState,
    /// Number of (event, cell) pairs where a queue was found outside [0, capacity]
    pub bound_violations: usize,
}

impl SimulationRun {
    /// Run the policy over all events
    pub fn new(
        params: &MarketParams,
        policy: &mut dyn BiddingPolicy,
        events: &[Event],
        rng: &mut StdRng,
        logger: &mut Logger,
    ) -> Result<Self> {
        let mut state = QueueState::new(params.num_campaigns(), params.num_viewer_types());
        let mut log = Vec::with_capacity(events.len());
        let mut total_profit = 0.0;
        let mut last_time = 0.0;
        let mut bound_violations = 0;
        let verbose = VERBOSE_EVENTS.load(Ordering::Relaxed);

        for event in events {
            let dt = event.time() - last_time;
            last_time = event.time();

            let transition = process_event(params, &mut state, event, dt, policy, rng)?;
            total_profit += transition.profit_delta;

            let violations = state.bound_violations(params);
            if violations > 0 {
                errln!(logger, LogEvent::Simulation, "Queue out of bounds after event at {:.4}", event.time());
                bound_violations += violations;
            }

            if verbose {
                logln!(logger, LogEvent::Event, "{}", transition.entry.to_csv_row());
            }
            log.push(transition.entry);
        }

        TOTAL_SIMULATION_RUNS.fetch_add(1, Ordering::Relaxed);

        Ok(Self {
            total_profit,
            log,
            final_state: state,
            bound_violations,
        })
    }
}

/// Statistics for a single campaign
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CampaignStat {
    pub viewers_allocated: usize,
    pub impressions_served: usize,
    pub inventory_accepted: f64,
    pub total_revenue: f64,
    pub total_bid_cost: f64,
}

/// Overall statistics for the run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverallStat {
    pub viewer_events: usize,
    pub campaign_events: usize,
    pub auctions_won: usize,
    /// Auctions won while the target queue was empty
    pub won_on_empty_queue: usize,
    pub auctions_lost: usize,
    pub total_revenue: f64,
    pub total_bid_cost: f64,
    pub total_holding_cost: f64,
    pub total_profit: f64,
    /// Units still queued when the horizon ends
    pub inventory_left: f64,
}

/// Complete run statistics
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationStat {
    pub campaign_stats: Vec<CampaignStat>,
    pub overall_stat: OverallStat,
    pub bound_violations: usize,
}

impl SimulationStat {
    /// Generate statistics from a finished run
    pub fn new(params: &MarketParams, simulation_run: &SimulationRun) -> Self {
        let mut campaign_stats = vec![CampaignStat::default(); params.num_campaigns()];
        let mut overall_stat = OverallStat {
            total_profit: simulation_run.total_profit,
            inventory_left: simulation_run.final_state.total(),
            ..OverallStat::default()
        };

        for entry in &simulation_run.log {
            overall_stat.total_holding_cost += entry.holding_cost;
            match entry.outcome {
                EventOutcome::Viewer { campaign, won, served, revenue, cost, .. } => {
                    overall_stat.viewer_events += 1;
                    let campaign_stat = &mut campaign_stats[campaign];
                    campaign_stat.viewers_allocated += 1;
                    if !won {
                        overall_stat.auctions_lost += 1;
                        continue;
                    }
                    overall_stat.auctions_won += 1;
                    if served {
                        campaign_stat.impressions_served += 1;
                        campaign_stat.total_revenue += revenue;
                        campaign_stat.total_bid_cost += cost;
                        overall_stat.total_revenue += revenue;
                        overall_stat.total_bid_cost += cost;
                    } else {
                        overall_stat.won_on_empty_queue += 1;
                    }
                }
                EventOutcome::Campaign { campaign_type, accepted } => {
                    overall_stat.campaign_events += 1;
                    campaign_stats[campaign_type].inventory_accepted += accepted;
                }
            }
        }

        Self {
            campaign_stats,
            overall_stat,
            bound_violations: simulation_run.bound_violations,
        }
    }

    /// Output campaign statistics
    pub fn printout_campaigns(&self, logger: &mut Logger, event: LogEvent) {
        for (campaign_id, campaign_stat) in self.campaign_stats.iter().enumerate() {
            logln!(logger, event, "\nCampaign {}", campaign_id);
            logln!(logger, event, "  Viewers (allocated/served): {} / {}",
                     campaign_stat.viewers_allocated,
                     campaign_stat.impressions_served);
            logln!(logger, event, "  Inventory accepted: {:.2}", campaign_stat.inventory_accepted);
            logln!(logger, event, "  Revenue / bid cost: {:.2} / {:.2}",
                     campaign_stat.total_revenue,
                     campaign_stat.total_bid_cost);
        }
    }

    /// Output only overall statistics
    pub fn printout_overall(&self, logger: &mut Logger, event: LogEvent) {
        let o = &self.overall_stat;
        logln!(logger, event, "Events (viewer/campaign): {} / {}", o.viewer_events, o.campaign_events);
        logln!(logger, event, "Auctions (won/won on empty queue/lost): {} / {} / {}",
                 o.auctions_won, o.won_on_empty_queue, o.auctions_lost);
        logln!(logger, event, "Revenue / bid cost / holding cost: {:.2} / {:.2} / {:.2}",
                 o.total_revenue, o.total_bid_cost, o.total_holding_cost);
        logln!(logger, event, "Inventory left at horizon: {:.2}", o.inventory_left);
        logln!(logger, event, "Profit: {:.2}", o.total_profit);
    }

    /// Output complete statistics
    pub fn printout(&self, logger: &mut Logger, event: LogEvent) {
        logln!(logger, event, "\n=== Campaign Statistics ===");
        self.printout_campaigns(logger, event);
        logln!(logger, event, "\n=== Overall Statistics ===");
        self.printout_overall(logger, event);
    }
}
