use crate::error::{AppError, Result};
use crate::models::{fields, Dataset, Record, Severity};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Encoder configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// One-hot encode `speed_limit_mph` instead of passing it through as a number
    pub categorical_speed_limit: bool,
}

impl EncoderConfig {
    /// Fields passed through unchanged, in column order
    pub fn numeric_fields(&self) -> Vec<&'static str> {
        fields::NUMERIC
            .iter()
            .copied()
            .filter(|f| !(self.categorical_speed_limit && *f == fields::SPEED_LIMIT_MPH))
            .collect()
    }

    /// Fields expanded into indicator columns, in record declaration order
    pub fn categorical_fields(&self) -> Vec<&'static str> {
        let mut categorical = Vec::with_capacity(fields::CATEGORICAL.len() + 1);
        for field in fields::CATEGORICAL {
            if self.categorical_speed_limit && field == fields::JUNCTION_TYPE {
                categorical.push(fields::SPEED_LIMIT_MPH);
            }
            categorical.push(field);
        }
        categorical
    }
}

/// One output column of the encoded feature space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureColumn {
    /// Column name (`<field>` or `<field>_<value>`)
    pub name: String,

    /// Source record field
    pub field: String,

    /// Category this indicator column stands for; `None` for numeric pass-through
    pub category: Option<String>,
}

impl FeatureColumn {
    pub fn numeric(field: &str) -> Self {
        Self {
            name: field.to_string(),
            field: field.to_string(),
            category: None,
        }
    }

    pub fn indicator(field: &str, category: &str) -> Self {
        Self {
            name: indicator_name(field, category),
            field: field.to_string(),
            category: Some(category.to_string()),
        }
    }

    pub fn is_indicator(&self) -> bool {
        self.category.is_some()
    }
}

/// Name of the indicator column for `field == category`
pub fn indicator_name(field: &str, category: &str) -> String {
    format!("{}_{}", field, category)
}

/// Ordered feature columns fixed at fit time
///
/// The schema is the contract between training and every later encode or
/// predict call: models are positionally bound to `columns`, so rows must
/// always be laid out in this order. It is never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodingSchema {
    columns: Vec<FeatureColumn>,

    /// Dropped reference category per categorical field
    references: BTreeMap<String, String>,

    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl EncodingSchema {
    pub(crate) fn new(columns: Vec<FeatureColumn>, references: BTreeMap<String, String>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();

        Self {
            columns,
            references,
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Position of a column in the feature vector
    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    /// Implicit category of a categorical field, encoded as all-zero indicators
    pub fn reference_category(&self, field: &str) -> Option<&str> {
        self.references.get(field).map(String::as_str)
    }

    pub fn is_categorical(&self, field: &str) -> bool {
        self.references.contains_key(field)
    }

    /// Fields passed through as numbers
    pub fn numeric_fields(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| !c.is_indicator())
            .map(|c| c.field.as_str())
    }

    pub fn categorical_fields(&self) -> impl Iterator<Item = &str> {
        self.references.keys().map(String::as_str)
    }

    /// Encode one record into schema order
    ///
    /// A category that is neither the reference nor an indicator column cannot
    /// be represented and yields `SchemaMismatch`.
    pub fn encode_record(&self, record: &Record) -> Result<Vec<f64>> {
        let mut row = vec![0.0; self.columns.len()];

        for (i, column) in self.columns.iter().enumerate() {
            if column.is_indicator() {
                continue;
            }
            row[i] = record.numeric(&column.field).ok_or_else(|| {
                AppError::SchemaMismatch(format!("field '{}' is not numeric", column.field))
            })?;
        }

        for (field, reference) in &self.references {
            let category = record.category(field).ok_or_else(|| {
                AppError::SchemaMismatch(format!("field '{}' is not categorical", field))
            })?;
            if &category == reference {
                continue;
            }

            let column = indicator_name(field, &category);
            let idx = self.index_of(&column).ok_or_else(|| {
                AppError::SchemaMismatch(format!(
                    "category '{}' of field '{}' was not observed when the schema was fitted",
                    category, field
                ))
            })?;
            row[idx] = 1.0;
        }

        Ok(row)
    }
}

/// Encoded feature matrix with its labels and the schema that produced it
#[derive(Debug, Clone)]
pub struct EncodedDataset {
    pub schema: Arc<EncodingSchema>,

    /// Feature matrix (n_samples × schema.len())
    pub features: Array2<f64>,

    /// Severity per row
    pub labels: Vec<Severity>,
}

impl EncodedDataset {
    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    /// Fixed label encoding (Minor=0, Serious=1, Fatal=2)
    pub fn label_indices(&self) -> Vec<usize> {
        self.labels.iter().map(Severity::index).collect()
    }
}

/// One-hot encoder that derives an [`EncodingSchema`] from observed categories
#[derive(Debug, Clone, Default)]
pub struct CategoricalEncoder {
    config: EncoderConfig,
    schema: Option<Arc<EncodingSchema>>,
}

impl CategoricalEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config, schema: None }
    }

    pub fn schema(&self) -> Option<&Arc<EncodingSchema>> {
        self.schema.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.schema.is_some()
    }

    /// Derive the schema from a dataset's observed categories
    ///
    /// Refitting on data with the same category sets returns the existing
    /// schema. Refitting on different category sets fails with
    /// `SchemaMismatch` until [`reset`](Self::reset) is called.
    pub fn fit(&mut self, dataset: &Dataset) -> Result<Arc<EncodingSchema>> {
        if dataset.is_empty() {
            return Err(AppError::InvalidConfiguration(
                "cannot fit an encoding schema on an empty dataset".to_string(),
            ));
        }

        let candidate = self.build_schema(dataset);

        if let Some(existing) = &self.schema {
            if **existing != candidate {
                return Err(AppError::SchemaMismatch(describe_difference(existing, &candidate)));
            }
            return Ok(Arc::clone(existing));
        }

        tracing::info!(
            columns = candidate.len(),
            categorical_fields = candidate.references.len(),
            "Fitted encoding schema"
        );

        let schema = Arc::new(candidate);
        self.schema = Some(Arc::clone(&schema));
        Ok(schema)
    }

    /// Encode a dataset with the fitted schema
    pub fn transform(&self, dataset: &Dataset) -> Result<EncodedDataset> {
        let schema = self.schema.as_ref().ok_or_else(|| {
            AppError::SchemaMismatch("encoder has no fitted schema".to_string())
        })?;

        let mut data = Vec::with_capacity(dataset.len() * schema.len());
        for record in dataset.records() {
            data.extend(schema.encode_record(record)?);
        }

        let features = Array2::from_shape_vec((dataset.len(), schema.len()), data)
            .map_err(|e| {
                AppError::SchemaMismatch(format!("failed to build feature matrix: {}", e))
            })?;

        Ok(EncodedDataset {
            schema: Arc::clone(schema),
            features,
            labels: dataset.severities(),
        })
    }

    pub fn fit_transform(&mut self, dataset: &Dataset) -> Result<EncodedDataset> {
        self.fit(dataset)?;
        self.transform(dataset)
    }

    /// Discard the fitted schema so the next `fit` derives a new one
    pub fn reset(&mut self) {
        if self.schema.take().is_some() {
            tracing::debug!("Discarded fitted encoding schema");
        }
    }

    fn build_schema(&self, dataset: &Dataset) -> EncodingSchema {
        let mut columns: Vec<FeatureColumn> = self
            .config
            .numeric_fields()
            .into_iter()
            .map(FeatureColumn::numeric)
            .collect();
        let mut references = BTreeMap::new();

        for field in self.config.categorical_fields() {
            // BTreeSet iteration is byte-wise ascending; the first value is the reference.
            let mut observed = dataset.observed_categories(field).into_iter();
            let Some(reference) = observed.next() else {
                continue;
            };
            columns.extend(observed.map(|category| FeatureColumn::indicator(field, &category)));
            references.insert(field.to_string(), reference);
        }

        EncodingSchema::new(columns, references)
    }
}

fn describe_difference(existing: &EncodingSchema, candidate: &EncodingSchema) -> String {
    let missing: Vec<&str> = existing
        .column_names()
        .into_iter()
        .filter(|c| candidate.index_of(c).is_none())
        .collect();
    let added: Vec<&str> = candidate
        .column_names()
        .into_iter()
        .filter(|c| existing.index_of(c).is_none())
        .collect();

    format!(
        "observed categories differ from the fitted schema \
         (missing columns: {:?}, new columns: {:?}, references: {:?} vs {:?}); \
         reset the encoder to refit",
        missing, added, existing.references, candidate.references
    )
}
