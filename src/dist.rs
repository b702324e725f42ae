//! Distribution primitives for writing programs.
//!
//! The engine only needs the two-method [`Dist`] contract: draw a value,
//! score a value. The concrete primitives here cover the usual discrete
//! and continuous cases; front-ends with richer libraries implement
//! `Dist` for their own types.

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution as _, Normal};

use crate::value::Value;
use crate::Error;

const LN_2PI: f64 = 1.8378770664093453;

/// A primitive distribution over [`Value`]s.
pub trait Dist {
    /// Draw a value from the prior.
    fn sample(&self, rng: &mut StdRng) -> Value;

    /// Log-density (or log-mass) of `value`.
    ///
    /// Values outside the support, including values of the wrong shape,
    /// score `-inf`.
    fn log_density(&self, value: &Value) -> f64;
}

/// Bernoulli over `Value::Bool`.
#[derive(Debug, Clone, Copy)]
pub struct Flip {
    p: f64,
}

impl Flip {
    /// `p` is clamped into `[0, 1]`.
    pub fn new(p: f64) -> Self {
        Self {
            p: if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.5 },
        }
    }
}

impl Dist for Flip {
    fn sample(&self, rng: &mut StdRng) -> Value {
        Value::Bool(rng.random::<f64>() < self.p)
    }

    fn log_density(&self, value: &Value) -> f64 {
        match value.as_bool() {
            Some(true) => self.p.ln(),
            Some(false) => (1.0 - self.p).ln(),
            None => f64::NEG_INFINITY,
        }
    }
}

/// Categorical over an explicit support.
#[derive(Debug, Clone)]
pub struct Categorical {
    support: Vec<(Value, f64)>,
}

impl Categorical {
    /// Build from `(value, weight)` pairs; weights are normalised.
    pub fn new(support: Vec<(Value, f64)>) -> Result<Self, Error> {
        if support.is_empty() {
            return Err(Error::Domain("Categorical: support must be non-empty"));
        }
        let total: f64 = support.iter().map(|(_, w)| w).sum();
        if !(total.is_finite() && total > 0.0)
            || support.iter().any(|(_, w)| !w.is_finite() || *w < 0.0)
        {
            return Err(Error::Domain(
                "Categorical: weights must be non-negative and sum to a positive finite total",
            ));
        }
        let support = support.into_iter().map(|(v, w)| (v, w / total)).collect();
        Ok(Self { support })
    }

    /// Uniform over the given values.
    pub fn uniform(values: Vec<Value>) -> Result<Self, Error> {
        Self::new(values.into_iter().map(|v| (v, 1.0)).collect())
    }
}

impl Dist for Categorical {
    fn sample(&self, rng: &mut StdRng) -> Value {
        let mut u: f64 = rng.random();
        for (value, p) in &self.support {
            u -= p;
            if u <= 0.0 {
                return value.clone();
            }
        }
        // Rounding fallthrough: the last entry absorbs residual mass.
        self.support[self.support.len() - 1].0.clone()
    }

    fn log_density(&self, value: &Value) -> f64 {
        self.support
            .iter()
            .find(|(v, _)| v == value)
            .map_or(f64::NEG_INFINITY, |(_, p)| p.ln())
    }
}

/// Gaussian over `Value::Real`.
#[derive(Debug, Clone, Copy)]
pub struct Gaussian {
    mean: f64,
    sd: f64,
    normal: Normal<f64>,
}

impl Gaussian {
    pub fn new(mean: f64, sd: f64) -> Result<Self, Error> {
        if !(mean.is_finite() && sd.is_finite() && sd > 0.0) {
            return Err(Error::Domain("Gaussian: sd must be finite and positive"));
        }
        let normal = Normal::new(mean, sd)
            .map_err(|_| Error::Domain("Gaussian: invalid parameters"))?;
        Ok(Self { mean, sd, normal })
    }
}

impl Dist for Gaussian {
    fn sample(&self, rng: &mut StdRng) -> Value {
        Value::Real(self.normal.sample(rng))
    }

    fn log_density(&self, value: &Value) -> f64 {
        match value.as_real() {
            Some(x) => {
                let z = (x - self.mean) / self.sd;
                -0.5 * (LN_2PI + z * z) - self.sd.ln()
            }
            None => f64::NEG_INFINITY,
        }
    }
}
