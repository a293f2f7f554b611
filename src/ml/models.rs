use crate::error::{AppError, Result};
use crate::ml::features::EncodedDataset;
use crate::models::{ClassDistribution, Severity};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// Labeled feature matrix handed to the classifier
#[derive(Debug, Clone)]
pub struct TrainingDataset {
    /// Feature matrix (n_samples × n_features)
    pub features: Array2<f64>,

    /// Severity labels
    pub labels: Vec<Severity>,

    /// Position of each row in the encoded dataset it was taken from
    pub row_indices: Vec<usize>,
}

impl TrainingDataset {
    pub fn new(features: Array2<f64>, labels: Vec<Severity>) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(AppError::InvalidConfiguration(format!(
                "feature matrix has {} rows but {} labels were given",
                features.nrows(),
                labels.len()
            )));
        }

        let row_indices = (0..labels.len()).collect();
        Ok(Self {
            features,
            labels,
            row_indices,
        })
    }

    pub fn from_encoded(encoded: &EncodedDataset) -> Self {
        Self {
            features: encoded.features.clone(),
            labels: encoded.labels.clone(),
            row_indices: (0..encoded.labels.len()).collect(),
        }
    }

    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label_indices(&self) -> Vec<usize> {
        self.labels.iter().map(Severity::index).collect()
    }

    pub fn class_distribution(&self) -> ClassDistribution {
        ClassDistribution::from_labels(&self.labels)
    }

    /// Rows at the given positions, keeping their original row indices
    pub fn subset(&self, positions: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), positions),
            labels: positions.iter().map(|&p| self.labels[p]).collect(),
            row_indices: positions.iter().map(|&p| self.row_indices[p]).collect(),
        }
    }
}

/// How each tree's bootstrap sample is drawn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalancingPolicy {
    /// Uniform bootstrap
    None,

    /// Rows weighted inversely to their class frequency
    #[default]
    Balanced,
}

impl std::fmt::Display for BalancingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BalancingPolicy::None => write!(f, "none"),
            BalancingPolicy::Balanced => write!(f, "balanced"),
        }
    }
}

/// Options passed to the ensemble at fit time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct FitOptions {
    /// Number of trees
    #[validate(range(min = 1))]
    pub estimator_count: usize,

    pub balancing_policy: BalancingPolicy,

    /// Seed for bootstrap sampling and permutation importances
    pub seed: u64,

    /// Maximum tree depth (unbounded when absent)
    pub max_depth: Option<u16>,

    #[validate(range(min = 1))]
    pub min_samples_leaf: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            estimator_count: 100,
            balancing_policy: BalancingPolicy::Balanced,
            seed: 42,
            max_depth: None,
            min_samples_leaf: 1,
        }
    }
}

/// Prediction result with confidence score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction<T> {
    /// Predicted value
    pub value: T,

    /// Probability of the predicted value (0.0 - 1.0)
    pub confidence: f64,

    /// Probability of every class, in label order
    pub probabilities: Vec<f64>,
}

impl<T> Prediction<T> {
    pub fn new(value: T, confidence: f64) -> Self {
        Self {
            value,
            confidence,
            probabilities: Vec::new(),
        }
    }

    pub fn with_probabilities(mut self, probabilities: Vec<f64>) -> Self {
        self.probabilities = probabilities;
        self
    }
}

impl Prediction<Severity> {
    pub fn probability_of(&self, severity: Severity) -> f64 {
        self.probabilities.get(severity.index()).copied().unwrap_or(0.0)
    }
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class: Severity,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,

    /// True rows of this class in the evaluated partition
    pub support: usize,
}

/// Held-out evaluation of a trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Fraction of exact label matches
    pub accuracy: f64,

    /// Macro-averaged precision
    pub precision: f64,

    /// Macro-averaged recall
    pub recall: f64,

    /// Macro-averaged F1
    pub f1_score: f64,

    /// Per-class metrics in label order
    pub per_class: Vec<ClassMetrics>,

    /// Rows are true labels, columns predicted labels, both Minor, Serious, Fatal
    pub confusion_matrix: [[usize; Severity::COUNT]; Severity::COUNT],

    pub n_samples: usize,
}

impl EvaluationReport {
    pub fn class_metrics(&self, class: Severity) -> Option<&ClassMetrics> {
        self.per_class.iter().find(|m| m.class == class)
    }
}

/// Importance of one schema column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub column: String,
    pub importance: f64,
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,

    /// Model version
    pub version: String,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Number of training samples
    pub n_training_samples: usize,

    /// Number of features
    pub n_features: usize,

    /// Class distribution of the training partition
    pub training_distribution: ClassDistribution,

    /// Hyperparameters
    pub hyperparameters: BTreeMap<String, String>,
}
