//! Orchestration: alternate learning passes with search passes and emit
//! the results.
//!
//! [`infer_map`] is the front door. Each pass starts from an empty state,
//! performs `number_of_samples` learning runs (discarding any run whose
//! terminal log-weight is `NaN`), then searches from the learned state
//! and emits up to `number_of_maps` terminal states through the caller's
//! [`ResultSink`]. The returned [`InferReport`] records what each pass
//! actually did; it is the audit envelope, not a log stream.

use crate::belief::Belief;
use crate::learn::{backpropagate, LearnDriver};
use crate::program::{Model, State};
use crate::search::{MapSearch, SearchConfig};
use crate::value::Value;
use crate::Error;

// Seed tag separating heuristic draws from learning draws.
const SEARCH_SEED_TAG: u64 = 0x4D41_5053; // "MAPS"

/// Which outputs to emit per terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResultSelection {
    /// Emit values recorded with [`State::predict`].
    pub predicts: bool,
    /// Emit the whole trace under the synthetic name `$trace`.
    pub trace: bool,
}

impl Default for ResultSelection {
    fn default() -> Self {
        Self {
            predicts: true,
            trace: true,
        }
    }
}

/// Options for [`infer_map`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MapOptions {
    /// Outer iterations; each pass re-learns from scratch.
    pub number_of_passes: usize,
    /// Learning runs per pass before searching.
    pub number_of_samples: usize,
    /// Terminal states to emit per pass.
    pub number_of_maps: usize,
    /// Heuristic draw count (see [`SearchConfig`]).
    pub number_of_h_draws: i32,
    /// Which outputs to emit.
    pub results: ResultSelection,
    /// Base RNG seed; learning and search derive their streams from it.
    pub seed: u64,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            number_of_passes: 1,
            number_of_samples: 100,
            number_of_maps: 1,
            number_of_h_draws: 1,
            results: ResultSelection::default(),
            seed: 0,
        }
    }
}

impl MapOptions {
    pub fn validate(&self) -> Result<(), Error> {
        if self.number_of_passes == 0 {
            return Err(Error::Domain("MapOptions: number_of_passes must be >= 1"));
        }
        if self.number_of_samples == 0 {
            return Err(Error::Domain("MapOptions: number_of_samples must be >= 1"));
        }
        Ok(())
    }
}

/// Consumer of emitted results.
///
/// Output formatting is the sink's concern; the engine only hands over
/// names, values and the (linear-scale) weight `exp(log_weight)`.
pub trait ResultSink {
    fn emit_predict(&mut self, name: &str, value: &Value, weight: f64);
    fn emit_trace(&mut self, name: &str, values: &[Value], weight: f64);
}

/// Sink that collects everything in memory.
#[derive(Debug, Clone, Default)]
pub struct VecSink {
    pub predicts: Vec<(String, Value, f64)>,
    pub traces: Vec<(Vec<Value>, f64)>,
}

impl ResultSink for VecSink {
    fn emit_predict(&mut self, name: &str, value: &Value, weight: f64) {
        self.predicts.push((name.to_string(), value.clone(), weight));
    }

    fn emit_trace(&mut self, _name: &str, values: &[Value], weight: f64) {
        self.traces.push((values.to_vec(), weight));
    }
}

/// What one pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PassReport {
    /// Learning runs that terminated with a usable log-weight.
    pub completed_runs: usize,
    /// Learning runs discarded for a `NaN` terminal log-weight.
    pub discarded_runs: usize,
    /// Distinct choice sites in the learned bandit table.
    pub sites: usize,
    /// Total arms across all bandits.
    pub arms: usize,
    /// Terminal states emitted by the search.
    pub emitted: usize,
}

/// Audit envelope returned by [`infer_map`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InferReport {
    pub passes: Vec<PassReport>,
}

/// Find MAP traces of `model`, emitting results through `sink`.
///
/// The search stream per pass ends early if the open list exhausts
/// before `number_of_maps` states were found; this is not an error.
pub fn infer_map<B, S>(
    model: &Model<B>,
    options: &MapOptions,
    sink: &mut S,
) -> Result<InferReport, Error>
where
    B: Belief + 'static,
    S: ResultSink + ?Sized,
{
    options.validate()?;
    let mut driver = LearnDriver::with_seed(options.seed);
    let mut report = InferReport::default();
    for pass in 0..options.number_of_passes {
        let mut begin: State<B> = State::new();
        let mut completed_runs = 0;
        let mut discarded_runs = 0;
        for _ in 0..options.number_of_samples {
            let end = driver.run(model, begin.clone());
            if end.log_weight().is_nan() {
                discarded_runs += 1;
            } else {
                begin = backpropagate(end);
                completed_runs += 1;
            }
        }
        let sites = begin.bandits().len();
        let arms = begin.bandits().total_arms();
        let config = SearchConfig {
            number_of_h_draws: options.number_of_h_draws,
            seed: options.seed ^ SEARCH_SEED_TAG ^ pass as u64,
        };
        let mut emitted = 0;
        for state in MapSearch::new(model, begin, config).take(options.number_of_maps) {
            emit_results(&state, options.results, sink);
            emitted += 1;
        }
        report.passes.push(PassReport {
            completed_runs,
            discarded_runs,
            sites,
            arms,
            emitted,
        });
    }
    Ok(report)
}

fn emit_results<B, S>(state: &State<B>, results: ResultSelection, sink: &mut S)
where
    B: Belief,
    S: ResultSink + ?Sized,
{
    let weight = state.log_weight().exp();
    if results.predicts {
        for (name, value) in state.predicts() {
            sink.emit_predict(name, value, weight);
        }
    }
    if results.trace {
        let values: Vec<Value> = state.trace().values().cloned().collect();
        sink.emit_trace("$trace", &values, weight);
    }
}
