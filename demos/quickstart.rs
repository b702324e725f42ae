//! Quickstart — the complete learn-then-search lifecycle in one example.
//!
//! Shows:
//! 1. Writing a small program in checkpoint form.
//! 2. Running `infer_map` and reading the audit report.
//! 3. Driving the lazy search directly from a hand-seeded bandit table.
//!
//! Run with:
//!   cargo run --example quickstart

use maptrace::{
    infer_map, BanditTable, Checkpoint, Flip, MapOptions, MapSearch, Model, SearchConfig, SiteId,
    State, Value, VecSink,
};

/// Two coins; +2 log-weight when both land heads.
fn two_coins() -> Model {
    Model::new(|state| {
        Checkpoint::sample(Flip::new(0.5), "x", state, |x, state| {
            let x = x.as_bool().unwrap_or(false);
            Checkpoint::sample(Flip::new(0.5), "y", state, move |y, mut state| {
                let y = y.as_bool().unwrap_or(false);
                if x && y {
                    state.add_log_weight(2.0);
                }
                state.predict("both", Value::Bool(x && y));
                Checkpoint::result(state)
            })
        })
    })
}

fn main() {
    // -----------------------------------------------------------------------
    // 1. Learn and search through the front door
    // -----------------------------------------------------------------------
    println!("=== 1. infer_map ===");

    let model = two_coins();
    let options = MapOptions {
        number_of_samples: 50,
        number_of_maps: 2,
        ..MapOptions::default()
    };
    let mut sink = VecSink::default();
    let report = infer_map(&model, &options, &mut sink).unwrap();

    for (i, pass) in report.passes.iter().enumerate() {
        println!(
            "  pass {i}: {} runs ({} discarded), {} sites / {} arms, {} emitted",
            pass.completed_runs, pass.discarded_runs, pass.sites, pass.arms, pass.emitted
        );
    }
    for (values, weight) in &sink.traces {
        let shown: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        println!("  $trace = [{}]  weight = {weight:.4}", shown.join(", "));
    }

    // -----------------------------------------------------------------------
    // 2. Search a hand-seeded table lazily
    // -----------------------------------------------------------------------
    println!("\n=== 2. Lazy search over a seeded table ===");

    let mut table = BanditTable::new();
    let both = 2.0 * 0.5f64.ln();
    let x = table.bandit_mut(SiteId::new("x", 0));
    x.update(Value::Bool(false), both);
    x.update(Value::Bool(true), both + 1.0);
    let y = table.bandit_mut(SiteId::new("y", 0));
    y.update(Value::Bool(false), 0.5f64.ln());
    y.update(Value::Bool(true), 0.5f64.ln() + 2.0);

    let search = MapSearch::new(
        &model,
        State::carrying(table),
        SearchConfig {
            number_of_h_draws: -1,
            seed: 0,
        },
    );
    for (i, state) in search.enumerate() {
        let shown: Vec<String> = state.trace().values().map(|v| v.to_string()).collect();
        println!(
            "  terminal {i}: [{}]  log-weight = {:.4}",
            shown.join(", "),
            state.log_weight()
        );
    }
}
