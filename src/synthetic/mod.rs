//! Synthetic accident data
//!
//! Independent record generation followed by correlation injection, both
//! drawing from one seeded random source so a run is reproducible end to end.

pub mod distribution;
pub mod generator;
pub mod injection;

pub use distribution::{weighted, CategoricalDistribution, IntegerRange, WeightedValue};
pub use generator::{GenerationConfig, RecordGenerator};
pub use injection::{
    ConditionOperator, CorrelationConfig, CorrelationInjector, ResamplingRule, RuleCondition,
    RuleOutcome,
};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Seedable random source threaded through generation and injection
pub type RandomSource = ChaCha8Rng;

pub fn random_source(seed: u64) -> RandomSource {
    ChaCha8Rng::seed_from_u64(seed)
}
