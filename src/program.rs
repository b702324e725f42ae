//! The continuation-passing program interface.
//!
//! A probabilistic program is delivered as a function from a [`State`] to
//! a [`Checkpoint`]: either a paused random choice carrying its own
//! continuation, or a terminal result. Continuations are `Rc<dyn Fn>`
//! rather than one-shot closures because the search phase resumes the
//! same suspension once per known arm. Both drivers (learning and search)
//! own the trampoline; programs never recurse into the engine.

use std::rc::Rc;

use crate::bandit::BanditTable;
use crate::belief::{Belief, EmpiricalNormal};
use crate::dist::Dist;
use crate::trace::{SiteId, Trace, TraceEntry};
use crate::value::Value;

/// Resumes a paused program with the chosen value and the state to carry.
pub type Cont<B = EmpiricalNormal> = Rc<dyn Fn(Value, State<B>) -> Checkpoint<B>>;

/// Execution state threaded through a run.
///
/// Carries the accumulated log-weight, the trace of choices made so far,
/// any recorded predicts, and a shared handle on the learned bandit
/// table. The table is read-only during a run; sharing it through `Rc`
/// keeps state clones cheap when the search fans a suspension out into
/// many children.
#[derive(Debug, Clone, Default)]
pub struct State<B: Belief = EmpiricalNormal> {
    log_weight: f64,
    bandits: Rc<BanditTable<B>>,
    trace: Trace,
    predicts: Vec<(String, Value)>,
}

impl<B: Belief> State<B> {
    /// Empty state: no learned bandits, no trace, zero log-weight.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh run state carrying a previously learned bandit table.
    pub fn carrying(bandits: BanditTable<B>) -> Self {
        Self::from_shared(Rc::new(bandits))
    }

    pub(crate) fn from_shared(bandits: Rc<BanditTable<B>>) -> Self {
        Self {
            log_weight: 0.0,
            bandits,
            trace: Trace::new(),
            predicts: Vec::new(),
        }
    }

    pub fn log_weight(&self) -> f64 {
        self.log_weight
    }

    /// Add a log-density or log-likelihood contribution.
    pub fn add_log_weight(&mut self, lw: f64) {
        self.log_weight += lw;
    }

    /// Record a named value to be emitted with each terminal state.
    pub fn predict(&mut self, name: impl Into<String>, value: Value) {
        self.predicts.push((name.into(), value));
    }

    pub fn predicts(&self) -> &[(String, Value)] {
        &self.predicts
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn bandits(&self) -> &BanditTable<B> {
        &self.bandits
    }

    pub(crate) fn record_choice(&mut self, site: SiteId, value: Value, past_reward: f64) {
        self.trace.push(TraceEntry {
            site,
            value,
            past_reward,
        });
    }

    pub(crate) fn into_learned(self) -> (Rc<BanditTable<B>>, Trace, f64) {
        (self.bandits, self.trace, self.log_weight)
    }
}

/// A paused random choice: distribution, lexical site name, continuation,
/// and the state at the pause.
pub struct SampleSite<B: Belief = EmpiricalNormal> {
    pub dist: Rc<dyn Dist>,
    pub name: String,
    pub cont: Cont<B>,
    pub state: State<B>,
}

/// A suspension point of the program.
pub enum Checkpoint<B: Belief = EmpiricalNormal> {
    /// Awaiting a value for a random choice.
    Sample(SampleSite<B>),
    /// Terminal; the run is complete.
    Result(State<B>),
}

impl<B: Belief> Checkpoint<B> {
    /// Pause at a random choice.
    ///
    /// `name` is the lexical site identifier; repeated executions of the
    /// same program point should pass the same name and are disambiguated
    /// by occurrence counting.
    pub fn sample<D, F>(dist: D, name: impl Into<String>, state: State<B>, cont: F) -> Self
    where
        D: Dist + 'static,
        F: Fn(Value, State<B>) -> Checkpoint<B> + 'static,
    {
        Checkpoint::Sample(SampleSite {
            dist: Rc::new(dist),
            name: name.into(),
            cont: Rc::new(cont),
            state,
        })
    }

    /// Terminate with the final state.
    pub fn result(state: State<B>) -> Self {
        Checkpoint::Result(state)
    }
}

/// A probabilistic program in checkpoint form.
///
/// Cloning a model is cheap; the underlying entry point is shared.
pub struct Model<B: Belief = EmpiricalNormal> {
    entry: Rc<dyn Fn(State<B>) -> Checkpoint<B>>,
}

impl<B: Belief> Model<B> {
    pub fn new(entry: impl Fn(State<B>) -> Checkpoint<B> + 'static) -> Self {
        Self {
            entry: Rc::new(entry),
        }
    }

    /// Begin a run from `state`, yielding the first checkpoint.
    pub fn start(&self, state: State<B>) -> Checkpoint<B> {
        (self.entry)(state)
    }
}

impl<B: Belief> Clone for Model<B> {
    fn clone(&self) -> Self {
        Self {
            entry: Rc::clone(&self.entry),
        }
    }
}
