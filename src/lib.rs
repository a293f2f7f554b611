//! Synthetic traffic accident data with injected risk correlations, a
//! severity classifier trained on it, and schema-aligned inference.

pub mod config;
pub mod error;
pub mod ml;
pub mod models;
pub mod pipeline;
pub mod synthetic;

pub use error::{AppError, Result};
