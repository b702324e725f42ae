//! Best-first enumeration of complete traces.
//!
//! The search replays the program through the same checkpoint interface
//! as learning, but a sample checkpoint no longer picks one value: every
//! arm the site's bandit has learned becomes a child node on the open
//! list, ordered by estimated total cost. [`MapSearch`] is a lazy
//! iterator over the terminal states reached this way; consuming fewer
//! elements simply abandons the remaining frontier.
//!
//! Node cost is `f = -past_reward + h(belief)`: the cost accumulated
//! before the choice plus an estimate of the cost still to come, taken
//! from the arm's reward belief. The estimate is not admissible in
//! general, so emission order is only as good as the learned beliefs —
//! except with `number_of_h_draws = 0`, which degenerates to Dijkstra
//! over accumulated cost.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::belief::Belief;
use crate::frontier::{OpenList, SearchNode};
use crate::program::{Checkpoint, Model, SampleSite, State};

/// Configuration for one search.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchConfig {
    /// Heuristic draw count (`K`).
    ///
    /// - `K > 0`: `h = -max(K posterior samples)`, clamped at zero;
    ///   larger `K` is more conservative.
    /// - `K = 0`: `h = 0` (Dijkstra; emission order is optimal under
    ///   non-negative edge costs).
    /// - `K < 0`: `h = -mode(belief)`, deterministic and cheap but
    ///   unclamped, so strong arms can pull their subtree forward
    ///   aggressively.
    pub number_of_h_draws: i32,
    /// Seed for the heuristic's posterior draws (used when `K > 0`).
    pub seed: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            number_of_h_draws: 1,
            seed: 0,
        }
    }
}

/// Estimated remaining cost from a choice with reward belief `belief`.
pub fn distance_heuristic<B: Belief>(belief: &B, number_of_h_draws: i32, rng: &mut StdRng) -> f64 {
    if number_of_h_draws == 0 {
        return 0.0;
    }
    if number_of_h_draws < 0 {
        return -belief.mode();
    }
    let mut best = f64::NEG_INFINITY;
    for _ in 0..number_of_h_draws {
        best = best.max(belief.sample(rng));
    }
    let h = -best;
    if h.is_nan() {
        return 0.0;
    }
    h.max(0.0)
}

/// Lazy best-first stream of terminal states.
///
/// Ends when the open list is exhausted; a site whose bandit has no
/// learned arms (or no bandit at all) is a dead end and contributes no
/// children.
pub struct MapSearch<B: Belief = crate::belief::EmpiricalNormal> {
    open: OpenList<B>,
    pending: Option<Checkpoint<B>>,
    rng: StdRng,
    number_of_h_draws: i32,
}

impl<B: Belief + 'static> MapSearch<B> {
    /// Start a search from `begin` (normally a learned state as returned
    /// by [`backpropagate`](crate::backpropagate)).
    pub fn new(model: &Model<B>, begin: State<B>, config: SearchConfig) -> Self {
        Self {
            open: OpenList::new(),
            pending: Some(model.start(begin)),
            rng: StdRng::seed_from_u64(config.seed),
            number_of_h_draws: config.number_of_h_draws,
        }
    }

    /// Enqueue one child per arm the site's bandit has learned.
    fn expand(&mut self, site: SampleSite<B>) {
        let SampleSite {
            dist,
            name,
            cont,
            state,
        } = site;
        let id = state.trace().next_site(&name);
        let Some(bandit) = state.bandits().get(&id) else {
            return;
        };
        for (value, belief) in bandit.arms() {
            let log_density = dist.log_density(value);
            if log_density.is_nan() {
                continue;
            }
            let past_reward = state.log_weight();
            let cost =
                -past_reward + distance_heuristic(belief, self.number_of_h_draws, &mut self.rng);
            if cost.is_nan() {
                continue;
            }
            let mut child = state.clone();
            child.add_log_weight(log_density);
            child.record_choice(id.clone(), value.clone(), past_reward);
            let cont = cont.clone();
            let value = value.clone();
            self.open.insert(SearchNode::new(
                cost,
                Box::new(move || cont(value, child)),
            ));
        }
    }
}

impl<B: Belief + 'static> Iterator for MapSearch<B> {
    type Item = State<B>;

    fn next(&mut self) -> Option<State<B>> {
        loop {
            let checkpoint = match self.pending.take() {
                Some(checkpoint) => checkpoint,
                None => self.open.pop()?.resume(),
            };
            match checkpoint {
                Checkpoint::Result(state) => return Some(state),
                Checkpoint::Sample(site) => self.expand(site),
            }
        }
    }
}
