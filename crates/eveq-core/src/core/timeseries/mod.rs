//! Time series analysis of simulation observables.
//!
//! The [`Estimator`] trait is the seam between the convergence logic and the
//! statistics: given a series and one of the three [`EstimatorStrategy`]
//! variants it returns an [`Estimate`] of where the burn-in ends, how correlated
//! the remaining samples are, and how many independent samples they amount to.
//! [`BuiltinEstimator`] is the implementation shipped with the crate.

pub mod autocorrelation;
pub mod detection;

pub use detection::BuiltinEstimator;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An ordered sequence of samples of a single observable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservableSeries {
    pub name: String,
    pub samples: Vec<f64>,
}

impl ObservableSeries {
    pub fn new(name: impl Into<String>, samples: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            samples,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn extend(&mut self, samples: impl IntoIterator<Item = f64>) {
        self.samples.extend(samples);
    }
}

/// The three equilibration detection strategies combined by the convergence
/// detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EstimatorStrategy {
    /// Lag-window inefficiency, truncation point minimizing the squared
    /// standard error of the mean.
    Window,
    /// Geyer initial monotone sequence inefficiency, minimizing the squared
    /// standard error of the mean.
    InitialSequence,
    /// Initial positive sequence inefficiency, truncation point maximizing the
    /// effective sample size.
    PositiveSequence,
}

impl EstimatorStrategy {
    pub const ALL: [EstimatorStrategy; 3] = [
        EstimatorStrategy::Window,
        EstimatorStrategy::InitialSequence,
        EstimatorStrategy::PositiveSequence,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EstimatorStrategy::Window => "window",
            EstimatorStrategy::InitialSequence => "initial-sequence",
            EstimatorStrategy::PositiveSequence => "positive-sequence",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub equilibration_index: usize,
    pub statistical_inefficiency: f64,
    pub effective_sample_size: f64,
}

impl Estimate {
    /// The estimate for a series too short to analyse: no burn-in, no
    /// correlation, every sample counted.
    pub fn uncorrelated(n_samples: usize) -> Self {
        Self {
            equilibration_index: 0,
            statistical_inefficiency: 1.0,
            effective_sample_size: n_samples as f64,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EstimationError {
    #[error("Sample {index} of the series is not finite ({value})")]
    NonFinite { index: usize, value: f64 },

    #[error("Estimator returned an invalid result: {0}")]
    InvalidResult(String),
}

/// A statistical-inefficiency estimator library.
pub trait Estimator: Send + Sync {
    fn estimate(
        &self,
        series: &[f64],
        strategy: EstimatorStrategy,
    ) -> Result<Estimate, EstimationError>;
}
