/// Bidding policies
/// A policy looks at the queue lengths of all campaigns for the arriving viewer type and
/// decides how much to bid for the viewer and which campaign the viewer goes to if won.
///
/// Policies never see the market state directly, only the column they are handed.
/// Some of them keep private counters (round robin), which is why `get_bid` takes `&mut self`.


use crate::params::MarketParams;

/// Share of revenue bid by the revenue-anchored policies
const REVENUE_BID_SHARE: f64 = 0.6;

/// Decision of a policy for one viewer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bid {
    pub amount: f64,
    pub campaign: usize,
}

/// Trait for bidding strategies
pub trait BiddingPolicy {
    /// Decide the bid and target campaign for a viewer of `viewer_type`
    /// `queue_column[i]` is the current queue of campaign i for this viewer type
    fn get_bid(&mut self, queue_column: &[f64], viewer_type: usize) -> Bid;

    /// Get a string representation of the policy
    fn get_policy_type(&self) -> String;
}

/// Index of the longest queue, first one on ties
fn longest_queue(queue_column: &[f64]) -> usize {
    let mut best = 0;
    for (index, &queue) in queue_column.iter().enumerate() {
        if queue > queue_column[best] {
            best = index;
        }
    }
    best
}

/// Policy type used to build policies from market parameters
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyType {
    DYNAMIC,
    ROUND_ROBIN,
    FIXED_BID,
    LINEAR,
    BID_CURVE,
}

impl PolicyType {
    /// Build the policy for the given market
    pub fn create_policy(&self, params: &MarketParams) -> Box<dyn BiddingPolicy> {
        match self {
            PolicyType::DYNAMIC => Box::new(DynamicPolicy::new()),
            PolicyType::ROUND_ROBIN => Box::new(RoundRobinPolicy::from_params(params)),
            PolicyType::FIXED_BID => Box::new(FixedBidPolicy::from_params(params)),
            PolicyType::LINEAR => Box::new(LinearPolicy::from_params(params)),
            PolicyType::BID_CURVE => Box::new(BidCurvePolicy::from_params(params)),
        }
    }
}

/// State-dependent bidding: bid grows with the total queued inventory for the viewer type,
/// the viewer goes to the campaign with the longest queue
pub struct DynamicPolicy {
    pub base_bid: f64,
    pub queue_factor: f64,
}

impl DynamicPolicy {
    pub fn new() -> Self {
        Self {
            base_bid: 0.5,
            queue_factor: 0.1,
        }
    }
}

impl Default for DynamicPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl BiddingPolicy for DynamicPolicy {
    fn get_bid(&mut self, queue_column: &[f64], _viewer_type: usize) -> Bid {
        let total_queue: f64 = queue_column.iter().sum();
        Bid {
            amount: self.base_bid + self.queue_factor * total_queue,
            campaign: longest_queue(queue_column),
        }
    }

    fn get_policy_type(&self) -> String {
        format!("Dynamic (base {:.2}, queue factor {:.2})", self.base_bid, self.queue_factor)
    }
}

/// Heuristic: fixed bid, viewers handed to campaigns in turn.
/// Each viewer type has its own counter. The counter is advanced before use, so the first
/// viewer of a type goes to campaign 1 (modulo the number of campaigns).
pub struct RoundRobinPolicy {
    pub bid: f64,
    num_campaigns: usize,
    allocation_counts: Vec<usize>,
}

impl RoundRobinPolicy {
    pub fn new(bid: f64, num_campaigns: usize, num_viewer_types: usize) -> Self {
        Self {
            bid,
            num_campaigns: num_campaigns.max(1),
            allocation_counts: vec![0; num_viewer_types],
        }
    }

    /// Bid the mean over campaigns of 60% of each campaign's mean revenue
    pub fn from_params(params: &MarketParams) -> Self {
        let campaigns = params.num_campaigns();
        let bid = (0..campaigns)
            .map(|campaign| params.campaign_mean_revenue(campaign) * REVENUE_BID_SHARE)
            .sum::<f64>()
            / campaigns as f64;
        Self::new(bid, campaigns, params.num_viewer_types())
    }
}

impl BiddingPolicy for RoundRobinPolicy {
    fn get_bid(&mut self, _queue_column: &[f64], viewer_type: usize) -> Bid {
        if viewer_type >= self.allocation_counts.len() {
            self.allocation_counts.resize(viewer_type + 1, 0);
        }
        self.allocation_counts[viewer_type] += 1;
        Bid {
            amount: self.bid,
            campaign: self.allocation_counts[viewer_type] % self.num_campaigns,
        }
    }

    fn get_policy_type(&self) -> String {
        format!("Round robin (bid {:.4})", self.bid)
    }
}

/// Always the same bid, always campaign 0
pub struct FixedBidPolicy {
    pub bid: f64,
}

impl FixedBidPolicy {
    pub fn new(bid: f64) -> Self {
        Self { bid }
    }

    /// Bid 60% of the mean revenue over all (campaign, viewer type) cells
    pub fn from_params(params: &MarketParams) -> Self {
        Self::new(params.global_mean_revenue() * REVENUE_BID_SHARE)
    }
}

impl BiddingPolicy for FixedBidPolicy {
    fn get_bid(&mut self, _queue_column: &[f64], _viewer_type: usize) -> Bid {
        Bid { amount: self.bid, campaign: 0 }
    }

    fn get_policy_type(&self) -> String {
        format!("Fixed bid ({:.4})", self.bid)
    }
}

/// Bid linear in the queue length of the longest queue
pub struct LinearPolicy {
    pub intercept: f64,
    pub slope: f64,
}

impl LinearPolicy {
    pub fn new(intercept: f64, slope: f64) -> Self {
        Self { intercept, slope }
    }

    /// No intercept; slope set so that an average-capacity full queue bids the fixed-bid level
    pub fn from_params(params: &MarketParams) -> Self {
        let mean_capacity = params.global_mean_capacity();
        let slope = if mean_capacity > 0.0 {
            params.global_mean_revenue() * REVENUE_BID_SHARE / mean_capacity
        } else {
            0.0
        };
        Self::new(0.0, slope)
    }
}

impl BiddingPolicy for LinearPolicy {
    fn get_bid(&mut self, queue_column: &[f64], _viewer_type: usize) -> Bid {
        let campaign = longest_queue(queue_column);
        let amount = self.intercept + self.slope * queue_column.get(campaign).copied().unwrap_or(0.0);
        Bid {
            amount: amount.max(0.0),
            campaign,
        }
    }

    fn get_policy_type(&self) -> String {
        format!("Linear (intercept {:.4}, slope {:.4})", self.intercept, self.slope)
    }
}

/// Bid as a function of one queue's length `a`, given the revenue and capacity of that queue.
///
/// Nothing to sell at `a = 0`. Below 70% of capacity the bid climbs with the queue, above it
/// the premium shrinks again as the queue nears capacity and further inventory would be refused.
pub fn queue_bid_curve(queue: f64, revenue: f64, capacity: f64) -> f64 {
    if queue <= 0.0 {
        return 0.0;
    }
    let base_bid = revenue * REVENUE_BID_SHARE;
    let queue_premium = if queue < capacity * 0.7 {
        0.1 * queue
    } else {
        0.1 * (capacity - queue)
    };
    base_bid + queue_premium
}

/// Bids `queue_bid_curve` for the campaign with the longest queue
pub struct BidCurvePolicy {
    /// [campaign][viewer_type]
    revenue: Vec<Vec<f64>>,
    /// [campaign][viewer_type]
    capacity: Vec<Vec<f64>>,
}

impl BidCurvePolicy {
    pub fn from_params(params: &MarketParams) -> Self {
        let config = params.config();
        Self {
            revenue: config.revenue.clone(),
            capacity: config.capacity.clone(),
        }
    }
}

impl BiddingPolicy for BidCurvePolicy {
    fn get_bid(&mut self, queue_column: &[f64], viewer_type: usize) -> Bid {
        let campaign = longest_queue(queue_column);
        let queue = queue_column.get(campaign).copied().unwrap_or(0.0);
        let amount = match (self.revenue.get(campaign), self.capacity.get(campaign)) {
            (Some(revenue), Some(capacity)) => queue_bid_curve(queue, revenue[viewer_type], capacity[viewer_type]),
            _ => 0.0,
        };
        Bid {
            amount: amount.max(0.0),
            campaign,
        }
    }

    fn get_policy_type(&self) -> String {
        "Queue bid curve".to_string()
    }
}
