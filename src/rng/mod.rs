//! Random number generation service.
//!
//! Service-time sampling and probabilistic branching are the entire
//! behavior surface of handlers and emitters (§4.2). Rather than a
//! thread-local RNG, every worker task owns an explicit [`WorkerRng`]
//! stream seeded deterministically from a single master seed, which keeps
//! the crate free of process-global mutable state (§9) and makes seeded
//! test runs reproducible.

use std::time::Duration;

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Produces independent, deterministically-seeded RNG streams for workers.
///
/// Each call to [`RngService::worker_rng`] with a distinct `worker_id`
/// yields a distinct stream; the same `(master_seed, worker_id)` pair always
/// yields the same stream.
#[derive(Debug, Clone, Copy)]
pub struct RngService {
    master_seed: u64,
    time_scale: f64,
}

impl RngService {
    /// Creates a new service rooted at `master_seed`, running at real time
    /// (`time_scale` of `1.0`).
    pub fn new(master_seed: u64) -> Self {
        Self::with_time_scale(master_seed, 1.0)
    }

    /// Creates a new service rooted at `master_seed` whose derived workers
    /// compress every sampled/fixed duration by `time_scale` (§5, §9).
    pub fn with_time_scale(master_seed: u64, time_scale: f64) -> Self {
        Self {
            master_seed,
            time_scale,
        }
    }

    /// Derives an independent RNG stream for the given worker identity.
    pub fn worker_rng(&self, worker_id: u64) -> WorkerRng {
        // Splitmix-style mixing keeps close worker_ids from producing
        // correlated seeds.
        let mixed = self
            .master_seed
            .wrapping_add(worker_id.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        WorkerRng {
            rng: SmallRng::seed_from_u64(mixed),
            time_scale: self.time_scale,
        }
    }
}

/// A single worker's private RNG stream with the sampling primitives
/// handlers and emitters need (§4.2).
pub struct WorkerRng {
    rng: SmallRng,
    time_scale: f64,
}

impl WorkerRng {
    /// Bernoulli trial. `p <= 0` never fires, `p >= 1` always fires.
    pub fn bernoulli(&mut self, p: f64) -> bool {
        if p <= 0.0 {
            return false;
        }
        if p >= 1.0 {
            return true;
        }
        self.rng.gen_range(0.0..1.0) < p
    }

    /// Samples a uniform value in `[min, max)`. Swaps the bounds if
    /// `min > max`. Returns `min` if the bounds are equal.
    pub fn uniform(&mut self, min: f64, max: f64) -> f64 {
        let (lo, hi) = if min > max { (max, min) } else { (min, max) };
        if lo == hi {
            return lo;
        }
        self.rng.gen_range(lo..hi)
    }

    /// Samples an inclusive integer range `[min, max]`. Swaps the bounds if
    /// `min > max`.
    pub fn int_range(&mut self, min: i64, max: i64) -> i64 {
        let (lo, hi) = if min > max { (max, min) } else { (min, max) };
        self.rng.gen_range(lo..=hi)
    }

    /// Samples `Normal(mean, std_dev)` via Box-Muller transform.
    ///
    /// Returns `mean` exactly when `std_dev <= 0.0`.
    pub fn normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        if std_dev <= 0.0 {
            return mean;
        }

        // Box-Muller requires u1 in (0, 1], never exactly 0, to keep ln finite.
        let u1: f64 = self.rng.gen_range(f64::MIN_POSITIVE..1.0);
        let u2: f64 = self.rng.gen_range(0.0..1.0);
        let magnitude = (-2.0 * u1.ln()).sqrt();
        let z = magnitude * (std::f64::consts::TAU * u2).cos();
        mean + z * std_dev
    }

    /// Samples `Normal(mean, std_dev)` and clamps the result to `[min, max]`.
    pub fn normal_clamped(&mut self, mean: f64, std_dev: f64, min: f64, max: f64) -> f64 {
        self.normal(mean, std_dev).clamp(min, max)
    }

    /// Picks a uniformly random element from a non-empty slice.
    ///
    /// # Panics
    ///
    /// Panics if `items` is empty.
    pub fn choice<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        assert!(!items.is_empty(), "choice requires a non-empty slice");
        let index = self.rng.gen_range(0..items.len());
        &items[index]
    }

    /// Picks an element from `items` with probability proportional to its
    /// paired weight. Falls back to the last entry on float drift, matching
    /// a cumulative-sum selection over non-negative weights (§4.2).
    ///
    /// # Panics
    ///
    /// Panics if `items` is empty or all weights are non-positive.
    pub fn weighted_choice<'a, T>(&mut self, items: &'a [(T, f64)]) -> &'a T {
        assert!(!items.is_empty(), "weighted_choice requires a non-empty slice");

        let weights: Vec<f64> = items.iter().map(|(_, w)| w.max(0.0)).collect();
        match WeightedIndex::new(&weights) {
            Ok(dist) => &items[dist.sample(&mut self.rng)].0,
            Err(_) => &items[items.len() - 1].0,
        }
    }

    /// Samples a service duration, in seconds, uniform over `[min, max)`,
    /// compressed by this worker's time scale.
    pub fn duration_seconds(&mut self, min: f64, max: f64) -> Duration {
        let seconds = self.uniform(min, max).max(0.0);
        self.scaled_duration_secs(seconds)
    }

    /// Converts a count of simulated seconds into a wall-clock [`Duration`],
    /// compressed by this worker's time scale (§5, §9).
    pub fn scaled_duration_secs(&self, seconds: f64) -> Duration {
        Duration::from_secs_f64(seconds.max(0.0) / self.time_scale)
    }

    /// Compresses a fixed wall-clock duration by this worker's time scale.
    pub fn scale(&self, duration: Duration) -> Duration {
        Duration::from_secs_f64(duration.as_secs_f64() / self.time_scale)
    }
}
