//! Validated discrete distributions used for independent field draws and label redraws

use crate::error::{AppError, Result};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Maximum deviation of a probability vector's sum from 1
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// One outcome of a declared distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedValue<T> {
    pub value: T,
    pub probability: f64,
}

impl<T> WeightedValue<T> {
    pub fn new(value: T, probability: f64) -> Self {
        Self { value, probability }
    }
}

/// Shorthand for building declared distributions in code
pub fn weighted<T: Clone>(pairs: &[(T, f64)]) -> Vec<WeightedValue<T>> {
    pairs
        .iter()
        .map(|(value, probability)| WeightedValue::new(value.clone(), *probability))
        .collect()
}

/// Discrete distribution over a finite set of values
#[derive(Debug, Clone)]
pub struct CategoricalDistribution<T> {
    values: Vec<T>,
    index: WeightedIndex<f64>,
}

impl<T: Clone + Display> CategoricalDistribution<T> {
    /// Build a distribution, rejecting empty, negative, duplicated or non-normalized outcomes
    pub fn new(name: &str, outcomes: &[WeightedValue<T>]) -> Result<Self>
    where
        T: PartialEq,
    {
        if outcomes.is_empty() {
            return Err(AppError::InvalidConfiguration(format!(
                "distribution '{}' declares no outcomes",
                name
            )));
        }

        for (i, outcome) in outcomes.iter().enumerate() {
            if !outcome.probability.is_finite() || outcome.probability < 0.0 {
                return Err(AppError::InvalidConfiguration(format!(
                    "distribution '{}' has invalid probability {} for '{}'",
                    name, outcome.probability, outcome.value
                )));
            }
            if outcomes[..i].iter().any(|o| o.value == outcome.value) {
                return Err(AppError::InvalidConfiguration(format!(
                    "distribution '{}' declares '{}' more than once",
                    name, outcome.value
                )));
            }
        }

        let sum: f64 = outcomes.iter().map(|o| o.probability).sum();
        if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(AppError::InvalidConfiguration(format!(
                "distribution '{}' probabilities sum to {}, expected 1",
                name, sum
            )));
        }

        let probabilities: Vec<f64> = outcomes.iter().map(|o| o.probability).collect();
        let index = WeightedIndex::new(&probabilities).map_err(|e| {
            AppError::InvalidConfiguration(format!("distribution '{}': {}", name, e))
        })?;

        Ok(Self {
            values: outcomes.iter().map(|o| o.value.clone()).collect(),
            index,
        })
    }

    /// Draw one value
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        self.values[self.index.sample(rng)].clone()
    }
}

/// Inclusive integer range sampled uniformly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegerRange {
    pub min: u32,
    pub max: u32,
}

impl IntegerRange {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        if self.min > self.max {
            return Err(AppError::InvalidConfiguration(format!(
                "range '{}' is empty: min {} > max {}",
                name, self.min, self.max
            )));
        }
        Ok(())
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        rng.gen_range(self.min..=self.max)
    }
}
