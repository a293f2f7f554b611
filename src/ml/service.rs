use crate::error::Result;
use crate::ml::classifier::{Classifier, BaggedTreeClassifier};
use crate::ml::evaluation::Evaluator;
use crate::ml::features::{EncodedDataset, EncodingSchema};
use crate::ml::inference::InferenceAdapter;
use crate::ml::models::{EvaluationReport, FeatureImportance, FitOptions, TrainingDataset};
use crate::ml::split::stratified_split;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

/// Split and fit configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TrainingConfig {
    /// Share of each class held out for evaluation
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub test_fraction: f64,

    /// Seed for the stratified split
    pub split_seed: u64,

    /// Ensemble options
    #[validate(nested)]
    pub model: FitOptions,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            split_seed: 42,
            model: FitOptions::default(),
        }
    }
}

/// Splits encoded data and fits the classifier on the training partition
#[derive(Debug, Clone)]
pub struct TrainingOrchestrator {
    config: TrainingConfig,
}

impl TrainingOrchestrator {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn train(&self, encoded: &EncodedDataset) -> Result<TrainingRun> {
        let data = TrainingDataset::from_encoded(encoded);
        let split = stratified_split(&data, self.config.test_fraction, self.config.split_seed)?;

        info!(
            train = split.train.n_samples(),
            test = split.test.n_samples(),
            estimators = self.config.model.estimator_count,
            "Training severity classifier"
        );

        let model = BaggedTreeClassifier::fit(&split.train, &self.config.model)?;

        Ok(TrainingRun {
            schema: Arc::clone(&encoded.schema),
            model: Arc::new(model),
            train: split.train,
            test: split.test,
        })
    }
}

/// Model fitted in one run, bound to the schema it was trained on
pub struct TrainingRun {
    pub schema: Arc<EncodingSchema>,
    pub model: Arc<dyn Classifier>,
    pub train: TrainingDataset,

    /// Held-out partition
    pub test: TrainingDataset,
}

impl TrainingRun {
    /// Score the model on the held-out partition
    pub fn evaluate(&self) -> Result<EvaluationReport> {
        Evaluator::evaluate(self.model.as_ref(), &self.test)
    }

    /// Importances paired with schema column names, most important first
    pub fn ranked_importances(&self) -> Vec<FeatureImportance> {
        let mut ranked: Vec<FeatureImportance> = self
            .schema
            .columns()
            .iter()
            .zip(self.model.feature_importances())
            .map(|(column, &importance)| FeatureImportance {
                column: column.name.clone(),
                importance,
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }

    pub fn inference_adapter(&self) -> Result<InferenceAdapter> {
        InferenceAdapter::new(Arc::clone(&self.schema), Arc::clone(&self.model))
    }
}
