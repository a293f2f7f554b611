use crate::error::{AppError, Result};
use crate::ml::models::TrainingDataset;
use crate::models::Severity;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Minimum rows a present class needs so both partitions receive at least one
pub const MIN_SAMPLES_PER_CLASS: usize = 2;

/// Train and held-out partitions of one dataset
#[derive(Debug, Clone)]
pub struct StratifiedSplit {
    pub train: TrainingDataset,
    pub test: TrainingDataset,
}

/// Split preserving each class's share in both partitions
///
/// Each present class contributes `round(n_c * test_fraction)` rows to the test
/// partition, clamped so both sides keep at least one row of the class. Rows
/// are shuffled per class with a ChaCha8 stream seeded from `seed`, and both
/// partitions keep ascending row order.
pub fn stratified_split(
    data: &TrainingDataset,
    test_fraction: f64,
    seed: u64,
) -> Result<StratifiedSplit> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(AppError::InvalidConfiguration(format!(
            "test fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); Severity::COUNT];
    for (position, label) in data.labels.iter().enumerate() {
        by_class[label.index()].push(position);
    }

    for (class_idx, positions) in by_class.iter().enumerate() {
        if !positions.is_empty() && positions.len() < MIN_SAMPLES_PER_CLASS {
            let class = Severity::from_index(class_idx)
                .map(|s| s.to_string())
                .unwrap_or_else(|| class_idx.to_string());
            return Err(AppError::InsufficientClassSamples {
                class,
                count: positions.len(),
                required: MIN_SAMPLES_PER_CLASS,
            });
        }
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train_rows = Vec::with_capacity(data.n_samples());
    let mut test_rows = Vec::new();

    for mut positions in by_class.into_iter().filter(|p| !p.is_empty()) {
        positions.shuffle(&mut rng);

        let n = positions.len();
        let n_test = ((n as f64 * test_fraction).round() as usize).clamp(1, n - 1);

        test_rows.extend_from_slice(&positions[..n_test]);
        train_rows.extend_from_slice(&positions[n_test..]);
    }

    train_rows.sort_unstable();
    test_rows.sort_unstable();

    tracing::info!(
        train = train_rows.len(),
        test = test_rows.len(),
        test_fraction,
        seed,
        "Stratified train/test split"
    );

    Ok(StratifiedSplit {
        train: data.subset(&train_rows),
        test: data.subset(&test_rows),
    })
}
