use crate::error::{AppError, Result};
use crate::ml::classifier::Classifier;
use crate::ml::models::{ClassMetrics, EvaluationReport, TrainingDataset};
use crate::models::Severity;

/// Scores a trained model against a held-out partition
pub struct Evaluator;

impl Evaluator {
    /// Predict the held-out rows and compare against their labels
    pub fn evaluate(model: &dyn Classifier, test: &TrainingDataset) -> Result<EvaluationReport> {
        let predictions = model.predict(&test.features)?;
        let report = Self::from_predictions(&test.labels, &predictions)?;

        tracing::info!(
            samples = report.n_samples,
            accuracy = report.accuracy,
            macro_f1 = report.f1_score,
            "Evaluated model on held-out partition"
        );

        Ok(report)
    }

    /// Accuracy, per-class precision/recall/F1 and the confusion matrix
    ///
    /// Undefined ratios (no predicted or no true rows of a class) are reported as 0.
    pub fn from_predictions(y_true: &[Severity], y_pred: &[Severity]) -> Result<EvaluationReport> {
        if y_true.len() != y_pred.len() {
            return Err(AppError::Classifier(format!(
                "{} labels but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }

        let mut confusion_matrix = [[0usize; Severity::COUNT]; Severity::COUNT];
        for (t, p) in y_true.iter().zip(y_pred) {
            confusion_matrix[t.index()][p.index()] += 1;
        }

        let n_samples = y_true.len();
        let correct: usize = (0..Severity::COUNT).map(|c| confusion_matrix[c][c]).sum();
        let accuracy = if n_samples > 0 {
            correct as f64 / n_samples as f64
        } else {
            0.0
        };

        let per_class: Vec<ClassMetrics> = Severity::all()
            .map(|class| {
                let c = class.index();
                let tp = confusion_matrix[c][c];
                let support: usize = confusion_matrix[c].iter().sum();
                let predicted: usize = confusion_matrix.iter().map(|row| row[c]).sum();

                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1_score = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };

                ClassMetrics {
                    class,
                    precision,
                    recall,
                    f1_score,
                    support,
                }
            })
            .collect();

        let n_classes = per_class.len() as f64;
        let precision = per_class.iter().map(|m| m.precision).sum::<f64>() / n_classes;
        let recall = per_class.iter().map(|m| m.recall).sum::<f64>() / n_classes;
        let f1_score = per_class.iter().map(|m| m.f1_score).sum::<f64>() / n_classes;

        Ok(EvaluationReport {
            accuracy,
            precision,
            recall,
            f1_score,
            per_class,
            confusion_matrix,
            n_samples,
        })
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64
    } else {
        0.0
    }
}
