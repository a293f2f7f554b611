use crate::error::{AppError, Result};
use crate::ml::models::{BalancingPolicy, FitOptions, ModelMetadata, TrainingDataset};
use crate::models::Severity;
use ndarray::{Array2, Axis};
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters, SplitCriterion,
};
use std::collections::BTreeMap;
use validator::Validate;

type Tree = DecisionTreeClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>;

/// One ensemble member
///
/// smartcore cannot fit a tree on a single label, so a bootstrap that drew
/// only one class becomes a constant vote for it.
enum Estimator {
    Tree(Tree),
    Constant(Severity),
}

/// Trait for trained severity classifiers
///
/// Implementations are immutable once fitted, so one model can serve
/// evaluation and any number of concurrent inference calls.
pub trait Classifier: Send + Sync {
    /// Predict class labels
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<Severity>>;

    /// Predict class probabilities (rows × 3, label order, each row sums to 1)
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>>;

    /// Importance per input column, aligned to the training column order
    fn feature_importances(&self) -> &[f64];

    /// Number of input columns the model was fitted on
    fn n_features(&self) -> usize;

    /// Get model metadata
    fn metadata(&self) -> &ModelMetadata;
}

/// Bagged ensemble of smartcore decision trees
///
/// Each tree is fitted on its own bootstrap sample and considers every
/// column at each split; there is no per-split feature subsampling.
pub struct BaggedTreeClassifier {
    trees: Vec<Estimator>,
    n_features: usize,
    importances: Vec<f64>,
    metadata: ModelMetadata,
}

impl BaggedTreeClassifier {
    /// Fit `options.estimator_count` trees on bootstrap samples of `data`
    pub fn fit(data: &TrainingDataset, options: &FitOptions) -> Result<Self> {
        options.validate()?;

        if data.is_empty() {
            return Err(AppError::InvalidConfiguration(
                "cannot fit a classifier on an empty training set".to_string(),
            ));
        }
        if data.n_features() == 0 {
            return Err(AppError::InvalidConfiguration(
                "cannot fit a classifier without feature columns".to_string(),
            ));
        }

        let labels: Vec<i32> = data.labels.iter().map(|s| s.index() as i32).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
        let sampler = BootstrapSampler::new(&data.labels, options.balancing_policy)?;

        let mut params = DecisionTreeClassifierParameters::default()
            .with_criterion(SplitCriterion::Gini)
            .with_min_samples_leaf(options.min_samples_leaf);
        if let Some(max_depth) = options.max_depth {
            params = params.with_max_depth(max_depth);
        }

        let mut trees = Vec::with_capacity(options.estimator_count);
        for _ in 0..options.estimator_count {
            let rows = sampler.draw(&mut rng);
            let y: Vec<i32> = rows.iter().map(|&r| labels[r]).collect();
            let x = to_dense_matrix(&data.features.select(Axis(0), &rows));

            let estimator = match single_label(&y) {
                Some(label) => Estimator::Constant(label),
                None => {
                    let tree = DecisionTreeClassifier::fit(&x, &y, params.clone()).map_err(|e| {
                        AppError::Classifier(format!("Failed to train decision tree: {}", e))
                    })?;
                    Estimator::Tree(tree)
                }
            };
            trees.push(estimator);
        }

        let hyperparameters: BTreeMap<String, String> = [
            ("estimator_count", options.estimator_count.to_string()),
            ("balancing_policy", options.balancing_policy.to_string()),
            ("seed", options.seed.to_string()),
            (
                "max_depth",
                options
                    .max_depth
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "unbounded".to_string()),
            ),
            ("min_samples_leaf", options.min_samples_leaf.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let mut model = Self {
            trees,
            n_features: data.n_features(),
            importances: Vec::new(),
            metadata: ModelMetadata {
                name: "Bagged Decision Trees".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                trained_at: chrono::Utc::now(),
                n_training_samples: data.n_samples(),
                n_features: data.n_features(),
                training_distribution: data.class_distribution(),
                hyperparameters,
            },
        };
        model.importances = model.permutation_importances(data, &mut rng)?;

        tracing::info!(
            trees = model.trees.len(),
            samples = data.n_samples(),
            features = data.n_features(),
            balancing = %options.balancing_policy,
            "Fitted bagged tree ensemble"
        );

        Ok(model)
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    /// Per-row class vote counts across all trees
    fn votes(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        if features.ncols() != self.n_features {
            return Err(AppError::SchemaMismatch(format!(
                "model expects {} feature columns, got {}",
                self.n_features,
                features.ncols()
            )));
        }

        let n_samples = features.nrows();
        let mut votes = Array2::zeros((n_samples, Severity::COUNT));
        if n_samples == 0 {
            return Ok(votes);
        }

        let x = to_dense_matrix(features);
        for estimator in &self.trees {
            let tree = match estimator {
                Estimator::Constant(label) => {
                    votes.column_mut(label.index()).mapv_inplace(|v| v + 1.0);
                    continue;
                }
                Estimator::Tree(tree) => tree,
            };
            let predictions = tree
                .predict(&x)
                .map_err(|e| AppError::Classifier(format!("Prediction failed: {}", e)))?;

            for (row, &label) in predictions.iter().enumerate() {
                let class = usize::try_from(label)
                    .ok()
                    .filter(|&c| c < Severity::COUNT)
                    .ok_or_else(|| {
                        AppError::Classifier(format!("tree predicted unknown label {}", label))
                    })?;
                votes[[row, class]] += 1.0;
            }
        }

        Ok(votes)
    }

    /// Accuracy drop on the training rows when one column is shuffled
    ///
    /// Negative drops are clamped to zero and the result normalized to sum
    /// to 1; a model insensitive to every column reports all zeros.
    fn permutation_importances<R: Rng + ?Sized>(
        &self,
        data: &TrainingDataset,
        rng: &mut R,
    ) -> Result<Vec<f64>> {
        let baseline = accuracy(&data.labels, &self.predict(&data.features)?);

        let mut drops = Vec::with_capacity(self.n_features);
        let mut permuted = data.features.clone();
        for column in 0..self.n_features {
            let original = data.features.column(column).to_owned();
            let mut shuffled = original.to_vec();
            shuffled.shuffle(rng);
            for (row, value) in shuffled.into_iter().enumerate() {
                permuted[[row, column]] = value;
            }

            let score = accuracy(&data.labels, &self.predict(&permuted)?);
            drops.push((baseline - score).max(0.0));

            permuted.column_mut(column).assign(&original);
        }

        let total: f64 = drops.iter().sum();
        if total > 0.0 {
            for drop in &mut drops {
                *drop /= total;
            }
        }

        Ok(drops)
    }
}

impl Classifier for BaggedTreeClassifier {
    /// Majority vote; ties go to the lower severity
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<Severity>> {
        let votes = self.votes(features)?;

        votes
            .rows()
            .into_iter()
            .map(|row| {
                let mut best = 0;
                for class in 1..Severity::COUNT {
                    if row[class] > row[best] {
                        best = class;
                    }
                }
                Severity::from_index(best)
                    .ok_or_else(|| AppError::Classifier(format!("invalid class index {}", best)))
            })
            .collect()
    }

    /// Share of trees voting for each class
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        let votes = self.votes(features)?;
        Ok(votes / self.trees.len() as f64)
    }

    fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

/// Draws bootstrap row samples, optionally class-balanced
struct BootstrapSampler {
    n_rows: usize,
    weights: Option<WeightedIndex<f64>>,
}

impl BootstrapSampler {
    fn new(labels: &[Severity], policy: BalancingPolicy) -> Result<Self> {
        let weights = match policy {
            BalancingPolicy::None => None,
            BalancingPolicy::Balanced => {
                let mut counts = [0usize; Severity::COUNT];
                for label in labels {
                    counts[label.index()] += 1;
                }
                let row_weights: Vec<f64> = labels
                    .iter()
                    .map(|l| 1.0 / counts[l.index()] as f64)
                    .collect();
                let index = WeightedIndex::new(&row_weights)
                    .map_err(|e| {
                        AppError::Classifier(format!("invalid bootstrap weights: {}", e))
                    })?;
                Some(index)
            }
        };

        Ok(Self {
            n_rows: labels.len(),
            weights,
        })
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<usize> {
        match &self.weights {
            Some(index) => (0..self.n_rows).map(|_| index.sample(rng)).collect(),
            None => (0..self.n_rows).map(|_| rng.gen_range(0..self.n_rows)).collect(),
        }
    }
}

/// The label shared by every sampled row, if there is only one
fn single_label(labels: &[i32]) -> Option<Severity> {
    let (&first, rest) = labels.split_first()?;
    if rest.iter().all(|&l| l == first) {
        usize::try_from(first).ok().and_then(Severity::from_index)
    } else {
        None
    }
}

fn to_dense_matrix(arr: &Array2<f64>) -> DenseMatrix<f64> {
    let data: Vec<f64> = arr.iter().copied().collect();
    DenseMatrix::new(arr.nrows(), arr.ncols(), data, false)
}

fn accuracy(y_true: &[Severity], y_pred: &[Severity]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}
