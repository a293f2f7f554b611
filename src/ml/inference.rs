//! Schema-aligned inference
//!
//! Callers rarely supply every one-hot column: a query says "weather is Rainy",
//! not four weather indicators. [`InferenceAdapter`] expands such partial input
//! into a full vector laid out in the fitted schema's column order and rejects
//! anything the schema cannot represent.

use crate::error::{AppError, Result};
use crate::ml::classifier::Classifier;
use crate::ml::features::{indicator_name, EncodingSchema};
use crate::ml::models::Prediction;
use crate::models::{AdvisoryTier, Record, Severity};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Partial feature record presented for inference
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureInput {
    /// Raw column values by schema column name; override category-derived values
    #[serde(default)]
    pub values: BTreeMap<String, f64>,

    /// `field = category` pairs for categorical fields
    #[serde(default)]
    pub categories: BTreeMap<String, String>,
}

impl FeatureInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, column: impl Into<String>, value: f64) -> Self {
        self.values.insert(column.into(), value);
        self
    }

    pub fn with_category(mut self, field: impl Into<String>, category: impl Into<String>) -> Self {
        self.categories.insert(field.into(), category.into());
        self
    }

    /// Describe a full record the way a caller would: numbers for numeric
    /// fields, categories for categorical ones
    pub fn from_record(record: &Record, schema: &EncodingSchema) -> Self {
        let mut input = Self::new();
        for field in schema.numeric_fields() {
            if let Some(value) = record.numeric(field) {
                input.values.insert(field.to_string(), value);
            }
        }
        for field in schema.categorical_fields() {
            if let Some(category) = record.category(field) {
                input.categories.insert(field.to_string(), category);
            }
        }
        input
    }
}

/// Severity prediction with its advisory tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityAssessment {
    #[serde(flatten)]
    pub prediction: Prediction<Severity>,

    pub advisory: AdvisoryTier,

    pub advisory_message: String,
}

impl SeverityAssessment {
    pub fn severity(&self) -> Severity {
        self.prediction.value
    }
}

/// Aligns partial inputs to an encoding schema and queries a trained model
#[derive(Clone)]
pub struct InferenceAdapter {
    schema: Arc<EncodingSchema>,
    model: Arc<dyn Classifier>,
}

impl std::fmt::Debug for InferenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceAdapter")
            .field("columns", &self.schema.len())
            .field("model", &self.model.metadata().name)
            .finish()
    }
}

impl InferenceAdapter {
    pub fn new(schema: Arc<EncodingSchema>, model: Arc<dyn Classifier>) -> Result<Self> {
        if model.n_features() != schema.len() {
            return Err(AppError::SchemaMismatch(format!(
                "model was fitted on {} columns but the schema has {}",
                model.n_features(),
                schema.len()
            )));
        }
        Ok(Self { schema, model })
    }

    pub fn schema(&self) -> &EncodingSchema {
        &self.schema
    }

    /// Full feature vector in schema order; absent columns are 0
    pub fn align(&self, input: &FeatureInput) -> Result<Vec<f64>> {
        let mut row = vec![0.0; self.schema.len()];

        for (field, category) in &input.categories {
            let Some(reference) = self.schema.reference_category(field) else {
                tracing::warn!(field = %field, "Rejected input for unknown categorical field");
                return Err(AppError::UnknownFeatureColumn(field.clone()));
            };
            if category == reference {
                continue;
            }

            let column = indicator_name(field, category);
            let idx = self.column_index(&column)?;
            row[idx] = 1.0;
        }

        for (column, value) in &input.values {
            let idx = self.column_index(column)?;
            row[idx] = *value;
        }

        Ok(row)
    }

    /// Align several inputs into one feature matrix
    pub fn align_batch(&self, inputs: &[FeatureInput]) -> Result<Array2<f64>> {
        let mut data = Vec::with_capacity(inputs.len() * self.schema.len());
        for input in inputs {
            data.extend(self.align(input)?);
        }
        Array2::from_shape_vec((inputs.len(), self.schema.len()), data)
            .map_err(|e| AppError::SchemaMismatch(format!("failed to build feature matrix: {}", e)))
    }

    pub fn predict(&self, input: &FeatureInput) -> Result<SeverityAssessment> {
        let features = self.align_batch(std::slice::from_ref(input))?;
        let mut assessments = self.predict_aligned(&features)?;
        assessments
            .pop()
            .ok_or_else(|| AppError::Classifier("model returned no prediction".to_string()))
    }

    pub fn predict_batch(&self, inputs: &[FeatureInput]) -> Result<Vec<SeverityAssessment>> {
        let features = self.align_batch(inputs)?;
        self.predict_aligned(&features)
    }

    fn predict_aligned(&self, features: &Array2<f64>) -> Result<Vec<SeverityAssessment>> {
        let labels = self.model.predict(features)?;
        let proba = self.model.predict_proba(features)?;

        labels
            .into_iter()
            .zip(proba.rows())
            .map(|(severity, row)| {
                let probabilities = row.to_vec();
                let confidence = probabilities.get(severity.index()).copied().unwrap_or(0.0);
                let advisory = AdvisoryTier::for_severity(severity);

                Ok(SeverityAssessment {
                    prediction: Prediction::new(severity, confidence)
                        .with_probabilities(probabilities),
                    advisory,
                    advisory_message: advisory.message().to_string(),
                })
            })
            .collect()
    }

    fn column_index(&self, column: &str) -> Result<usize> {
        self.schema.index_of(column).ok_or_else(|| {
            tracing::warn!(column = %column, "Rejected input for column outside the schema");
            AppError::UnknownFeatureColumn(column.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::features::FeatureColumn;
    use crate::ml::models::ModelMetadata;
    use crate::models::ClassDistribution;

    /// Predicts Fatal whenever the first indicator column is set
    struct StubClassifier {
        metadata: ModelMetadata,
        n_features: usize,
    }

    impl StubClassifier {
        fn new(n_features: usize) -> Self {
            Self {
                metadata: ModelMetadata {
                    name: "stub".to_string(),
                    version: "0".to_string(),
                    trained_at: chrono::Utc::now(),
                    n_training_samples: 0,
                    n_features,
                    training_distribution: ClassDistribution::default(),
                    hyperparameters: BTreeMap::new(),
                },
                n_features,
            }
        }
    }

    impl Classifier for StubClassifier {
        fn predict(&self, features: &Array2<f64>) -> Result<Vec<Severity>> {
            Ok(features
                .rows()
                .into_iter()
                .map(|r| if r[2] > 0.0 { Severity::Fatal } else { Severity::Minor })
                .collect())
        }

        fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
            let labels = self.predict(features)?;
            let mut proba = Array2::zeros((labels.len(), Severity::COUNT));
            for (i, label) in labels.iter().enumerate() {
                proba[[i, label.index()]] = 0.75;
                proba[[i, (label.index() + 1) % Severity::COUNT]] = 0.25;
            }
            Ok(proba)
        }

        fn feature_importances(&self) -> &[f64] {
            &[]
        }

        fn n_features(&self) -> usize {
            self.n_features
        }

        fn metadata(&self) -> &ModelMetadata {
            &self.metadata
        }
    }

    fn schema() -> Arc<EncodingSchema> {
        let columns = vec![
            FeatureColumn::numeric("speed_limit_mph"),
            FeatureColumn::numeric("time_of_day_hour"),
            FeatureColumn::indicator("weather_condition", "Foggy"),
            FeatureColumn::indicator("weather_condition", "Rainy"),
            FeatureColumn::indicator("road_type", "Urban Street"),
        ];
        let references = [
            ("weather_condition".to_string(), "Clear".to_string()),
            ("road_type".to_string(), "Highway".to_string()),
        ]
        .into_iter()
        .collect();
        Arc::new(EncodingSchema::new(columns, references))
    }

    fn adapter() -> InferenceAdapter {
        InferenceAdapter::new(schema(), Arc::new(StubClassifier::new(5))).unwrap()
    }

    #[test]
    fn test_align_fills_absent_columns_in_schema_order() {
        let input = FeatureInput::new()
            .with_value("time_of_day_hour", 8.0)
            .with_category("weather_condition", "Rainy")
            .with_value("speed_limit_mph", 60.0);

        assert_eq!(adapter().align(&input).unwrap(), vec![60.0, 8.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_reference_category_is_implicit() {
        let input = FeatureInput::new()
            .with_category("road_type", "Highway")
            .with_category("weather_condition", "Clear");
        assert_eq!(adapter().align(&input).unwrap(), vec![0.0; 5]);
    }

    #[test]
    fn test_explicit_values_override_categories() {
        let input = FeatureInput::new()
            .with_category("weather_condition", "Foggy")
            .with_value("weather_condition_Foggy", 0.0)
            .with_value("road_type_Urban Street", 1.0);
        assert_eq!(adapter().align(&input).unwrap(), vec![0.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_unknown_category_rejected() {
        let input = FeatureInput::new().with_category("road_type", "Dirt Track");
        match adapter().align(&input) {
            Err(AppError::UnknownFeatureColumn(column)) => {
                assert_eq!(column, "road_type_Dirt Track")
            }
            other => panic!("expected UnknownFeatureColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_column_and_field_rejected() {
        let adapter = adapter();

        let column = FeatureInput::new().with_value("road_type_Dirt Track", 1.0);
        assert!(matches!(adapter.align(&column), Err(AppError::UnknownFeatureColumn(_))));

        let field = FeatureInput::new().with_category("surface", "Gravel");
        assert!(matches!(adapter.align(&field), Err(AppError::UnknownFeatureColumn(_))));

        // Reference categories have no column of their own.
        let reference_column = FeatureInput::new().with_value("weather_condition_Clear", 1.0);
        assert!(matches!(
            adapter.align(&reference_column),
            Err(AppError::UnknownFeatureColumn(_))
        ));
    }

    #[test]
    fn test_predict_attaches_advisory_tier() {
        let adapter = adapter();

        let foggy = adapter
            .predict(&FeatureInput::new().with_category("weather_condition", "Foggy"))
            .unwrap();
        assert_eq!(foggy.severity(), Severity::Fatal);
        assert_eq!(foggy.advisory, AdvisoryTier::HighPriorityAlert);
        assert_eq!(foggy.prediction.confidence, 0.75);
        assert_eq!(foggy.prediction.probabilities.len(), 3);

        let clear = adapter.predict(&FeatureInput::new()).unwrap();
        assert_eq!(clear.advisory, AdvisoryTier::Routine);
    }

    #[test]
    fn test_schema_width_must_match_model() {
        let result = InferenceAdapter::new(schema(), Arc::new(StubClassifier::new(4)));
        assert!(matches!(result, Err(AppError::SchemaMismatch(_))));
    }

    #[test]
    fn test_feature_input_deserializes_partial_json() {
        let input: FeatureInput =
            serde_json::from_str(r#"{"categories": {"weather_condition": "Rainy"}}"#).unwrap();
        assert!(input.values.is_empty());
        assert_eq!(input.categories["weather_condition"], "Rainy");
    }
}
