/// Machine learning stage of the pipeline
///
/// This module provides:
/// - One-hot encoding with an immutable, ordered encoding schema
/// - Stratified train/test splitting
/// - A bagged decision-tree ensemble behind the `Classifier` trait
/// - Held-out evaluation (accuracy, per-class metrics, confusion matrix)
/// - Schema-aligned inference for partial records

pub mod classifier;
pub mod evaluation;
pub mod features;
pub mod inference;
pub mod models;
pub mod service;
pub mod split;

pub use classifier::{BaggedTreeClassifier, Classifier};
pub use evaluation::Evaluator;
pub use features::{
    CategoricalEncoder, EncodedDataset, EncoderConfig, EncodingSchema, FeatureColumn,
};
pub use inference::{FeatureInput, InferenceAdapter, SeverityAssessment};
pub use models::{
    BalancingPolicy, ClassMetrics, EvaluationReport, FeatureImportance, FitOptions, ModelMetadata,
    Prediction, TrainingDataset,
};
pub use service::{TrainingConfig, TrainingOrchestrator, TrainingRun};
pub use split::{stratified_split, StratifiedSplit};
