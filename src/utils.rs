use std::sync::atomic::{AtomicBool, AtomicU64};

/// When set, every simulation run writes its per-event audit log as CSV under log/
pub static VERBOSE_EVENTS: AtomicBool = AtomicBool::new(false);

/// Number of simulation runs completed by this process
pub static TOTAL_SIMULATION_RUNS: AtomicU64 = AtomicU64::new(0);

/// Seed of a scenario iteration: the scenario's base seed shifted by the iteration offset
pub fn iteration_seed(base_seed: u64, seed_offset: u64) -> u64 {
    base_seed.wrapping_add(seed_offset)
}

/// Arithmetic mean, 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
