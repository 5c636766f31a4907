//! Arrival stream generation.
//!
//! Every viewer type and every campaign is an independent Poisson process. Each stream is
//! drawn from the caller's random stream in a fixed order (viewer types first, then
//! campaigns) and the merged result is stable-sorted by time, so the same seed always
//! yields the same sequence.

use rand::rngs::StdRng;
use rand_distr::{Distribution, Exp};
use crate::error::{Result, SimError};
use crate::params::MarketParams;

/// Minimum number of inter-arrival gaps drawn per batch for viewer streams
const VIEWER_MIN_BATCH: usize = 100;

/// Minimum number of inter-arrival gaps drawn per batch for campaign streams
const CAMPAIGN_MIN_BATCH: usize = 50;

/// One arrival in the market
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    Viewer { time: f64, viewer_type: usize },
    Campaign { time: f64, campaign_type: usize },
}

impl Event {
    pub fn time(&self) -> f64 {
        match self {
            Event::Viewer { time, .. } => *time,
            Event::Campaign { time, .. } => *time,
        }
    }

    pub fn is_viewer(&self) -> bool {
        matches!(self, Event::Viewer { .. })
    }
}

/// Generate the full, time-ordered arrival stream for the market
pub fn generate_events(params: &MarketParams, rng: &mut StdRng) -> Result<Vec<Event>> {
    let horizon = params.horizon();
    let mut events = Vec::new();

    for viewer_type in 0..params.num_viewer_types() {
        let times = arrival_times(params.viewer_rate(viewer_type), horizon, VIEWER_MIN_BATCH, rng)?;
        events.extend(times.into_iter().map(|time| Event::Viewer { time, viewer_type }));
    }

    for campaign_type in 0..params.num_campaigns() {
        let times = arrival_times(params.campaign_rate(campaign_type), horizon, CAMPAIGN_MIN_BATCH, rng)?;
        events.extend(times.into_iter().map(|time| Event::Campaign { time, campaign_type }));
    }

    // sort_by is stable, so equal times keep generation order
    events.sort_by(|a, b| a.time().total_cmp(&b.time()));
    Ok(events)
}

/// Arrival times of a Poisson process with the given rate on [0, horizon).
///
/// Gaps are drawn in batches of at least `max(min_batch, 2 * rate * horizon)`. If the
/// cumulative clock has not reached the horizon after a batch, another batch is drawn,
/// so sparse rates never leave the end of the window uncovered.
fn arrival_times(rate: f64, horizon: f64, min_batch: usize, rng: &mut StdRng) -> Result<Vec<f64>> {
    if rate <= 0.0 {
        return Ok(Vec::new());
    }

    let gaps = Exp::new(rate).map_err(|e| SimError::Distribution(format!("rate {}: {}", rate, e)))?;
    let batch = min_batch.max((2.0 * rate * horizon) as usize);

    let mut times = Vec::with_capacity(batch);
    let mut clock = 0.0;
    while clock < horizon {
        for _ in 0..batch {
            clock += gaps.sample(rng);
            times.push(clock);
        }
    }

    times.retain(|&time| time < horizon);
    Ok(times)
}
