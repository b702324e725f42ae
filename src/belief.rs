//! Reward beliefs: incrementally updatable posteriors over a scalar reward.
//!
//! A belief summarises the rewards observed for one arm and supports
//! posterior sampling (for probability matching during learning) and a
//! point estimate (for the deterministic search heuristic). The concrete
//! family shipped here is [`EmpiricalNormal`]; [`Belief`] keeps the engine
//! generic over other families.

use rand::rngs::StdRng;
use rand_distr::{Distribution as _, Normal};

/// A reward: the log-joint-density contribution accumulated past a point.
///
/// Rewards may be negative. `NaN` marks an invalid run and must never be
/// fed to a belief.
pub type Reward = f64;

/// Common interface for reward-belief families.
///
/// `Default` must produce the uninformative belief (zero observations).
/// Beliefs are small value types: `update` and `as_prior` return new
/// beliefs rather than mutating in place.
pub trait Belief: Clone + Default {
    /// Absorb one reward observation.
    #[must_use]
    fn update(&self, reward: Reward) -> Self;

    /// Draw a plausible mean reward from the posterior.
    ///
    /// Requires at least one observation; callers must check
    /// [`observations`](Belief::observations) first.
    fn sample(&self, rng: &mut StdRng) -> Reward;

    /// Compress an informed belief into a weak prior for a sibling arm.
    #[must_use]
    fn as_prior(&self) -> Self;

    /// Point estimate of the mean reward.
    fn mode(&self) -> Reward;

    /// Number of rewards absorbed so far.
    fn observations(&self) -> u64;
}

/// Empirical-normal belief over the mean reward, parameterised by
/// `(sum, sum2, cnt)`.
///
/// `sample` draws from `Normal(sum/cnt, sqrt(var/cnt))` where `var` is the
/// empirical variance — the sampling distribution of the mean, so the
/// belief tightens as observations accumulate. The empirical variance can
/// go negative through floating-point cancellation and is clamped at zero
/// before the square root.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EmpiricalNormal {
    sum: f64,
    sum2: f64,
    cnt: u64,
}

impl EmpiricalNormal {
    pub fn new() -> Self {
        Self::default()
    }

    fn mean(&self) -> f64 {
        self.sum / self.cnt as f64
    }
}

impl Belief for EmpiricalNormal {
    fn update(&self, reward: Reward) -> Self {
        Self {
            sum: self.sum + reward,
            sum2: self.sum2 + reward * reward,
            cnt: self.cnt + 1,
        }
    }

    fn sample(&self, rng: &mut StdRng) -> Reward {
        debug_assert!(self.cnt > 0, "sample() on a belief with no observations");
        let n = self.cnt as f64;
        let mean = self.mean();
        let var = (self.sum2 / n - mean * mean).max(0.0);
        let sd = (var / n).sqrt();
        match Normal::new(mean, sd) {
            Ok(dist) => dist.sample(rng),
            Err(_) => mean,
        }
    }

    fn as_prior(&self) -> Self {
        if self.cnt <= 1 {
            return *self;
        }
        let n = self.cnt as f64;
        Self {
            sum: self.sum / n,
            sum2: self.sum2 / n,
            cnt: 1,
        }
    }

    fn mode(&self) -> Reward {
        self.mean()
    }

    fn observations(&self) -> u64 {
        self.cnt
    }
}
