//! Per-event transition rules of the market.
//!
//! Each event first charges holding cost for the inventory that sat in the queues since the
//! previous event, then applies its own effect:
//! - a viewer is auctioned: the policy picks a bid and a target campaign, one uniform draw
//!   decides the auction, and a win is only served if the target queue is non-empty
//! - a campaign arrival tops up its queues, clamped at capacity

use rand::rngs::StdRng;
use rand::Rng;
use crate::error::{Result, SimError};
use crate::events::Event;
use crate::params::MarketParams;
use crate::policies::BiddingPolicy;

/// Probability that `bid` wins the auction for a viewer with steepness `k`.
/// Zero for non-positive bids, approaches 1 as the bid grows.
pub fn win_probability(bid: f64, k: f64) -> f64 {
    if bid > 0.0 {
        1.0 - (-k * bid).exp()
    } else {
        0.0
    }
}

/// Queue lengths per (campaign, viewer type)
#[derive(Debug, Clone, PartialEq)]
pub struct QueueState {
    queues: Vec<Vec<f64>>,
}

impl QueueState {
    /// All queues empty
    pub fn new(num_campaigns: usize, num_viewer_types: usize) -> Self {
        Self {
            queues: vec![vec![0.0; num_viewer_types]; num_campaigns],
        }
    }

    pub fn get(&self, campaign: usize, viewer_type: usize) -> f64 {
        self.queues[campaign][viewer_type]
    }

    /// Queue lengths of every campaign for one viewer type
    pub fn column(&self, viewer_type: usize) -> Vec<f64> {
        self.queues.iter().map(|row| row[viewer_type]).collect()
    }

    /// Total units queued across all cells
    pub fn total(&self) -> f64 {
        self.queues.iter().flatten().sum()
    }

    /// Number of cells outside [0, capacity]
    pub fn bound_violations(&self, params: &MarketParams) -> usize {
        let mut violations = 0;
        for (campaign, row) in self.queues.iter().enumerate() {
            for (viewer_type, &queue) in row.iter().enumerate() {
                if queue < 0.0 || queue > params.capacity(campaign, viewer_type) {
                    violations += 1;
                }
            }
        }
        violations
    }

    #[cfg(test)]
    pub(crate) fn set(&mut self, campaign: usize, viewer_type: usize, value: f64) {
        self.queues[campaign][viewer_type] = value;
    }
}

/// Outcome of one processed event
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Viewer {
        viewer_type: usize,
        bid: f64,
        campaign: usize,
        /// Auction won (before checking the queue)
        won: bool,
        /// Won and the target queue had inventory to serve
        served: bool,
        revenue: f64,
        cost: f64,
    },
    Campaign {
        campaign_type: usize,
        accepted: f64,
    },
}

/// Audit record of one processed event
#[derive(Debug, Clone, PartialEq)]
pub struct EventLogEntry {
    pub time: f64,
    pub holding_cost: f64,
    pub outcome: EventOutcome,
}

impl EventLogEntry {
    pub const CSV_HEADER: &'static str = "time,type,index,bid,campaign,won,served,revenue,cost,accepted,holding_cost";

    pub fn to_csv_row(&self) -> String {
        match &self.outcome {
            EventOutcome::Viewer { viewer_type, bid, campaign, won, served, revenue, cost } => format!(
                "{:.4},viewer,{},{:.4},{},{},{},{:.4},{:.4},,{:.4}",
                self.time, viewer_type, bid, campaign, won, served, revenue, cost, self.holding_cost
            ),
            EventOutcome::Campaign { campaign_type, accepted } => format!(
                "{:.4},campaign,{},,,,,,,{:.4},{:.4}",
                self.time, campaign_type, accepted, self.holding_cost
            ),
        }
    }
}

/// Profit contribution and audit record of one event
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub profit_delta: f64,
    pub entry: EventLogEntry,
}

/// Holding cost of the current queues over `dt` time units
pub fn holding_cost(params: &MarketParams, state: &QueueState, dt: f64) -> f64 {
    let mut cost = 0.0;
    for campaign in 0..params.num_campaigns() {
        for viewer_type in 0..params.num_viewer_types() {
            cost += params.holding_cost(campaign, viewer_type) * state.get(campaign, viewer_type) * dt;
        }
    }
    cost
}

/// Apply one event to `state`.
///
/// `dt` is the time elapsed since the previous event. Fails only when the policy targets a
/// campaign that does not exist, in which case the state is left untouched.
pub fn process_event(
    params: &MarketParams,
    state: &mut QueueState,
    event: &Event,
    dt: f64,
    policy: &mut dyn BiddingPolicy,
    rng: &mut StdRng,
) -> Result<Transition> {
    let holding = holding_cost(params, state, dt);
    let mut profit_delta = -holding;

    let outcome = match *event {
        Event::Viewer { viewer_type, .. } => {
            let column = state.column(viewer_type);
            let bid = policy.get_bid(&column, viewer_type);
            if bid.campaign >= params.num_campaigns() {
                return Err(SimError::Allocation {
                    campaign: bid.campaign,
                    num_campaigns: params.num_campaigns(),
                });
            }

            let probability = win_probability(bid.amount, params.win_steepness(viewer_type));
            // Always draw, so the random stream does not depend on the bid
            let won = rng.gen::<f64>() < probability;
            let served = won && state.queues[bid.campaign][viewer_type] > 0.0;

            let (revenue, cost) = if served {
                let queue = &mut state.queues[bid.campaign][viewer_type];
                *queue = (*queue - 1.0).max(0.0);
                (params.revenue(bid.campaign, viewer_type), bid.amount)
            } else {
                (0.0, 0.0)
            };
            profit_delta += revenue - cost;

            EventOutcome::Viewer {
                viewer_type,
                bid: bid.amount,
                campaign: bid.campaign,
                won,
                served,
                revenue,
                cost,
            }
        }
        Event::Campaign { campaign_type, .. } => {
            let mut accepted_total = 0.0;
            for viewer_type in 0..params.num_viewer_types() {
                let queue = &mut state.queues[campaign_type][viewer_type];
                let room = params.capacity(campaign_type, viewer_type) - *queue;
                let accepted = params.supply(campaign_type, viewer_type).min(room).max(0.0);
                *queue += accepted;
                accepted_total += accepted;
            }
            EventOutcome::Campaign {
                campaign_type,
                accepted: accepted_total,
            }
        }
    };

    Ok(Transition {
        profit_delta,
        entry: EventLogEntry {
            time: event.time(),
            holding_cost: holding,
            outcome,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use crate::params::{tiny_market, MarketParams};
    use crate::policies::{Bid, FixedBidPolicy};

    /// Always bids the same amount on one campaign, whatever the queues look like
    struct ConstantPolicy {
        bid: f64,
        campaign: usize,
    }

    impl BiddingPolicy for ConstantPolicy {
        fn get_bid(&mut self, _queue_column: &[f64], _viewer_type: usize) -> Bid {
            Bid { amount: self.bid, campaign: self.campaign }
        }

        fn get_policy_type(&self) -> String {
            "Constant".to_string()
        }
    }

    fn params_with(capacity: f64, holding: f64) -> MarketParams {
        let mut config = tiny_market();
        config.capacity = vec![vec![capacity]];
        config.holding_cost = vec![vec![holding]];
        MarketParams::new(config).unwrap()
    }

    #[test]
    fn test_win_probability_shape() {
        assert_eq!(win_probability(0.0, 1.0), 0.0);
        assert_eq!(win_probability(-3.0, 1.0), 0.0);
        assert_eq!(win_probability(5.0, 0.0), 0.0);
        let mut previous = 0.0;
        for step in 1..200 {
            let p = win_probability(step as f64 * 0.1, 1.5);
            assert!(p >= previous);
            assert!(p < 1.0 || step as f64 * 0.1 * 1.5 > 30.0);
            previous = p;
        }
        assert!(win_probability(50.0, 1.0) > 0.999_999);
        assert!((win_probability(1.0, 1.0) - (1.0 - (-1.0f64).exp())).abs() < 1e-15);
    }

    #[test]
    fn test_holding_cost_accrual() {
        // Queue of 5 held for 10 time units at cost 1 per unit
        let params = params_with(10.0, 1.0);
        let mut state = QueueState::new(1, 1);
        state.set(0, 0, 5.0);
        assert_eq!(holding_cost(&params, &state, 10.0), 50.0);
        assert_eq!(holding_cost(&params, &state, 0.0), 0.0);
    }

    #[test]
    fn test_holding_cost_is_charged_before_the_event() {
        let params = params_with(10.0, 1.0);
        let mut state = QueueState::new(1, 1);
        state.set(0, 0, 5.0);
        let mut policy = ConstantPolicy { bid: 0.0, campaign: 0 };
        let mut rng = StdRng::seed_from_u64(1);

        // Zero bid never wins, so the only contribution is the holding cost
        let event = Event::Viewer { time: 10.0, viewer_type: 0 };
        let transition = process_event(&params, &mut state, &event, 10.0, &mut policy, &mut rng).unwrap();
        assert_eq!(transition.profit_delta, -50.0);
        assert_eq!(transition.entry.holding_cost, 50.0);
        assert_eq!(state.get(0, 0), 5.0);
    }

    #[test]
    fn test_campaign_arrival_clamps_at_capacity() {
        let params = params_with(10.0, 0.0);
        let mut state = QueueState::new(1, 1);
        let mut policy = ConstantPolicy { bid: 0.0, campaign: 0 };
        let mut rng = StdRng::seed_from_u64(1);
        let event = Event::Campaign { time: 1.0, campaign_type: 0 };

        let accepted: Vec<f64> = (0..3)
            .map(|_| {
                let t = process_event(&params, &mut state, &event, 0.0, &mut policy, &mut rng).unwrap();
                match t.entry.outcome {
                    EventOutcome::Campaign { accepted, .. } => accepted,
                    _ => panic!("expected campaign outcome"),
                }
            })
            .collect();
        assert_eq!(accepted, vec![5.0, 5.0, 0.0]);
        assert_eq!(state.get(0, 0), 10.0);
        assert_eq!(state.bound_violations(&params), 0);
    }

    #[test]
    fn test_zero_capacity_never_serves() {
        let params = params_with(0.0, 0.0);
        let mut state = QueueState::new(1, 1);
        let mut policy = ConstantPolicy { bid: 100.0, campaign: 0 };
        let mut rng = StdRng::seed_from_u64(3);

        for step in 0..200 {
            let event = if step % 2 == 0 {
                Event::Campaign { time: step as f64, campaign_type: 0 }
            } else {
                Event::Viewer { time: step as f64, viewer_type: 0 }
            };
            let t = process_event(&params, &mut state, &event, 1.0, &mut policy, &mut rng).unwrap();
            if let EventOutcome::Viewer { served, revenue, .. } = t.entry.outcome {
                assert!(!served);
                assert_eq!(revenue, 0.0);
            }
            assert_eq!(t.profit_delta, 0.0);
            assert_eq!(state.get(0, 0), 0.0);
        }
    }

    #[test]
    fn test_win_serves_and_charges_bid() {
        let params = params_with(10.0, 0.0);
        let mut state = QueueState::new(1, 1);
        state.set(0, 0, 2.0);
        // Bid of 50 wins with probability 1 - e^-50
        let mut policy = ConstantPolicy { bid: 50.0, campaign: 0 };
        let mut rng = StdRng::seed_from_u64(5);
        let event = Event::Viewer { time: 0.0, viewer_type: 0 };

        let t = process_event(&params, &mut state, &event, 0.0, &mut policy, &mut rng).unwrap();
        assert_eq!(t.profit_delta, 10.0 - 50.0);
        assert_eq!(state.get(0, 0), 1.0);
        match t.entry.outcome {
            EventOutcome::Viewer { won, served, revenue, cost, .. } => {
                assert!(won && served);
                assert_eq!(revenue, 10.0);
                assert_eq!(cost, 50.0);
            }
            _ => panic!("expected viewer outcome"),
        }
    }

    #[test]
    fn test_win_on_empty_queue_costs_nothing() {
        let params = params_with(10.0, 0.0);
        let mut state = QueueState::new(1, 1);
        let mut policy = ConstantPolicy { bid: 50.0, campaign: 0 };
        let mut rng = StdRng::seed_from_u64(5);
        let event = Event::Viewer { time: 0.0, viewer_type: 0 };

        let t = process_event(&params, &mut state, &event, 0.0, &mut policy, &mut rng).unwrap();
        assert_eq!(t.profit_delta, 0.0);
        assert!(matches!(t.entry.outcome, EventOutcome::Viewer { won: true, served: false, .. }));
        assert_eq!(state.get(0, 0), 0.0);
    }

    #[test]
    fn test_fractional_queue_is_emptied_not_negative() {
        let params = params_with(10.0, 0.0);
        let mut state = QueueState::new(1, 1);
        state.set(0, 0, 0.5);
        let mut policy = ConstantPolicy { bid: 50.0, campaign: 0 };
        let mut rng = StdRng::seed_from_u64(5);
        let event = Event::Viewer { time: 0.0, viewer_type: 0 };

        let t = process_event(&params, &mut state, &event, 0.0, &mut policy, &mut rng).unwrap();
        assert!(matches!(t.entry.outcome, EventOutcome::Viewer { served: true, .. }));
        assert_eq!(state.get(0, 0), 0.0);
        assert_eq!(state.bound_violations(&params), 0);
    }

    #[test]
    fn test_out_of_range_campaign_is_allocation_error() {
        let params = params_with(10.0, 0.0);
        let mut state = QueueState::new(1, 1);
        let mut policy = ConstantPolicy { bid: 1.0, campaign: 3 };
        let mut rng = StdRng::seed_from_u64(5);
        let event = Event::Viewer { time: 0.0, viewer_type: 0 };

        let err = process_event(&params, &mut state, &event, 0.0, &mut policy, &mut rng).unwrap_err();
        assert_eq!(err, SimError::Allocation { campaign: 3, num_campaigns: 1 });
    }

    #[test]
    fn test_fixed_bid_targets_first_campaign() {
        let params = params_with(10.0, 0.0);
        let mut state = QueueState::new(1, 1);
        state.set(0, 0, 1.0);
        let mut policy = FixedBidPolicy::new(6.0);
        let mut rng = StdRng::seed_from_u64(9);
        let event = Event::Viewer { time: 0.0, viewer_type: 0 };
        let t = process_event(&params, &mut state, &event, 0.0, &mut policy, &mut rng).unwrap();
        assert!(matches!(t.entry.outcome, EventOutcome::Viewer { campaign: 0, .. }));
    }

    #[test]
    fn test_csv_row_columns() {
        let entry = EventLogEntry {
            time: 1.5,
            holding_cost: 0.25,
            outcome: EventOutcome::Campaign { campaign_type: 2, accepted: 3.0 },
        };
        let header_columns = EventLogEntry::CSV_HEADER.split(',').count();
        assert_eq!(entry.to_csv_row().split(',').count(), header_columns);
        assert_eq!(entry.to_csv_row(), "1.5000,campaign,2,,,,,,,3.0000,0.2500");
    }
}
