//! `maptrace`: bandit-guided best-first search for MAP traces of
//! probabilistic programs.
//!
//! A probabilistic program, delivered in continuation-passing checkpoint
//! form, is run two ways against a shared table of per-choice-site
//! bandits:
//!
//! - **Learning**: repeated runs select values by probability matching
//!   over per-value reward beliefs, then backpropagate the terminal
//!   log-weight along the trace so each site learns the future reward of
//!   each value tried there.
//! - **Search**: a best-first engine re-runs the program, expanding every
//!   learned arm at each choice into an open-list child ordered by
//!   accumulated cost plus a belief-derived heuristic, and yields
//!   complete traces as a lazy stream.
//!
//! Goals:
//! - **Deterministic by default**: every stochastic component is seeded;
//!   same model + options → same stream.
//! - **Lazy**: the search is an `Iterator`; stop consuming to stop
//!   searching, nothing to clean up.
//! - **Single-threaded by design**: checkpoints are cooperative pauses,
//!   driven by a trampoline; continuations are shared, not `Send`.
//!
//! Non-goals:
//! - Exact inference, gradient-based optimisation, or parallel search.
//! - Proven-optimal MAP: the heuristic is not admissible in general
//!   (`number_of_h_draws = 0` degenerates to Dijkstra if you need the
//!   guarantee and can pay for it).
//! - Persistence of learned beliefs across process runs.

#![forbid(unsafe_code)]

use std::fmt;

mod value;
pub use value::*;

mod belief;
pub use belief::*;

mod bandit;
pub use bandit::*;

mod trace;
pub use trace::*;

mod program;
pub use program::*;

mod dist;
pub use dist::*;

mod learn;
pub use learn::*;

mod frontier;
pub use frontier::*;

mod search;
pub use search::*;

mod infer;
pub use infer::*;

/// Construction-time validation errors.
///
/// Runtime anomalies (invalid runs, `NaN` heuristics, exhausted search)
/// are policy, not errors: discarded, dropped, or end-of-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A parameter was outside its domain.
    Domain(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Domain(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}
