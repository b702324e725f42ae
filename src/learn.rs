//! Learning-mode execution: run the program to completion, then credit
//! the visited choice sites with the reward earned after each of them.
//!
//! A learning run consults the bandit table at every sample checkpoint:
//! when the site's bandit proposes an arm the run exploits it, otherwise
//! the run draws fresh from the program's own prior. The run records every
//! choice in the trace; [`backpropagate`] then walks the trace in order
//! and updates each site's bandit with the *future* reward — terminal
//! log-weight minus the log-weight accumulated before the choice.

use std::rc::Rc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::belief::Belief;
use crate::program::{Checkpoint, Model, SampleSite, State};

/// Trampoline driver for learning runs.
///
/// Seedable, deterministic by default (seed 0), like every stochastic
/// component in this crate.
#[derive(Debug)]
pub struct LearnDriver {
    rng: StdRng,
}

impl LearnDriver {
    /// Deterministic driver with the fixed default seed (0).
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Run the program once from `begin`, returning the terminal state.
    ///
    /// `begin` is expected to carry an empty trace (as produced by
    /// [`State::new`], [`State::carrying`] or [`backpropagate`]).
    pub fn run<B: Belief>(&mut self, model: &Model<B>, begin: State<B>) -> State<B> {
        let mut checkpoint = model.start(begin);
        loop {
            match checkpoint {
                Checkpoint::Result(state) => return state,
                Checkpoint::Sample(site) => {
                    let SampleSite {
                        dist,
                        name,
                        cont,
                        mut state,
                    } = site;
                    let id = state.trace().next_site(&name);
                    let chosen = state
                        .bandits()
                        .get(&id)
                        .and_then(|bandit| bandit.select(&mut self.rng))
                        .cloned();
                    let value = match chosen {
                        Some(value) => value,
                        None => dist.sample(&mut self.rng),
                    };
                    let past_reward = state.log_weight();
                    state.add_log_weight(dist.log_density(&value));
                    state.record_choice(id, value.clone(), past_reward);
                    checkpoint = cont(value, state);
                }
            }
        }
    }
}

impl Default for LearnDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Distribute a terminal state's log-weight back along its trace.
///
/// Each visited site's bandit (created on demand) absorbs the future
/// reward `R - past_reward` for the value chosen there. Returns a fresh
/// state carrying the updated table, ready to begin the next run.
///
/// A run whose terminal log-weight is `NaN` must be discarded by the
/// caller instead of backpropagated; see [`infer_map`](crate::infer_map).
pub fn backpropagate<B: Belief>(end: State<B>) -> State<B> {
    let (mut table, trace, total) = end.into_learned();
    debug_assert!(!total.is_nan(), "backpropagate on a discarded run");
    let bandits = Rc::make_mut(&mut table);
    for entry in trace.into_entries() {
        bandits
            .bandit_mut(entry.site)
            .update(entry.value, total - entry.past_reward);
    }
    State::from_shared(table)
}
