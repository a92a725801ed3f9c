//! Multivariate outlier detection with an isolation forest
//!
//! Random partitioning trees isolate points by splitting feature space on a
//! random feature at a random value. Points that are isolated after fewer
//! splits on average are more anomalous. The forest is trained on the whole
//! batch and the decision threshold is calibrated from `contamination`.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use crate::error::{Result, SentinelError};
use crate::models::{AnomalyResult, MetricBatch, MetricColumn};

/// Upper bound on rows drawn for each tree
pub const MAX_SAMPLES: usize = 256;

/// Euler-Mascheroni constant for the harmonic number approximation
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Isolation forest parameters
#[derive(Debug, Clone)]
pub struct IsolationForest {
    pub n_estimators: usize,
    /// Expected fraction of anomalies in the training batch
    pub contamination: f64,
    pub seed: u64,
}

impl IsolationForest {
    pub fn new(n_estimators: usize, contamination: f64, seed: u64) -> Result<Self> {
        if n_estimators == 0 {
            return Err(SentinelError::InvalidParameter(
                "forest needs at least one tree".into(),
            ));
        }
        if !(contamination > 0.0 && contamination <= 0.5) {
            return Err(SentinelError::InvalidParameter(format!(
                "contamination must be in (0, 0.5], got {}",
                contamination
            )));
        }
        Ok(Self {
            n_estimators,
            contamination,
            seed,
        })
    }

    /// Fill, fit and classify every row of the batch
    pub fn detect(&self, batch: &MetricBatch, columns: &[MetricColumn]) -> Result<Vec<AnomalyResult>> {
        let matrix = fill_features(batch, columns)?;
        let fitted = self.fit(&matrix)?;
        Ok(fitted.classify(batch, &matrix))
    }

    /// Train on a complete feature matrix (one inner vector per row)
    pub fn fit(&self, matrix: &[Vec<f64>]) -> Result<FittedForest> {
        if matrix.len() < 2 {
            return Err(SentinelError::ModelFit(format!(
                "need at least 2 rows to fit, got {}",
                matrix.len()
            )));
        }
        let dims = matrix[0].len();
        if dims == 0 {
            return Err(SentinelError::ModelFit("no feature columns".into()));
        }
        if matrix.iter().flatten().any(|v| !v.is_finite()) {
            return Err(SentinelError::ModelFit(
                "feature matrix holds a non-finite value".into(),
            ));
        }
        let all_constant = (0..dims).all(|f| {
            let first = matrix[0][f];
            matrix.iter().all(|row| row[f] == first)
        });
        if all_constant {
            return Err(SentinelError::ModelFit(
                "every feature column is constant".into(),
            ));
        }

        let sample_size = matrix.len().min(MAX_SAMPLES);
        let max_depth = (sample_size.max(2) as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let trees = (0..self.n_estimators)
            .map(|_| {
                let mut indices = index::sample(&mut rng, matrix.len(), sample_size).into_vec();
                IsolationTree {
                    root: grow(matrix, &mut indices, 0, max_depth, &mut rng),
                }
            })
            .collect();

        let mut forest = FittedForest {
            trees,
            sample_size,
            threshold: 0.0,
        };
        let scores: Vec<f64> = matrix.iter().map(|x| forest.score(x)).collect();
        forest.threshold = quantile(&scores, 1.0 - self.contamination);
        Ok(forest)
    }
}

/// A trained forest with its calibrated threshold
#[derive(Debug, Clone)]
pub struct FittedForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
    /// Scores strictly above this are anomalous
    pub threshold: f64,
}

impl FittedForest {
    /// Anomaly score in (0, 1]; higher is more anomalous
    pub fn score(&self, x: &[f64]) -> f64 {
        let mean_path = self.trees.iter().map(|t| t.path_length(x)).sum::<f64>()
            / self.trees.len() as f64;
        let norm = average_path_length(self.sample_size);
        if norm <= 0.0 {
            return 1.0;
        }
        2f64.powf(-mean_path / norm)
    }

    pub fn is_anomaly(&self, x: &[f64]) -> bool {
        self.score(x) > self.threshold
    }

    /// Pair each batch row with its score and decision
    pub fn classify(&self, batch: &MetricBatch, matrix: &[Vec<f64>]) -> Vec<AnomalyResult> {
        batch
            .rows()
            .iter()
            .zip(matrix)
            .map(|(row, x)| {
                let score = self.score(x);
                AnomalyResult {
                    row: row.clone(),
                    score: Some(score),
                    is_anomaly: score > self.threshold,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct IsolationTree {
    root: Node,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl IsolationTree {
    fn path_length(&self, x: &[f64]) -> f64 {
        let mut node = &self.root;
        let mut depth = 0.0;
        loop {
            match node {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    value,
                    left,
                    right,
                } => {
                    node = if x[*feature] < *value { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

fn grow(
    matrix: &[Vec<f64>],
    indices: &mut [usize],
    depth: usize,
    max_depth: usize,
    rng: &mut StdRng,
) -> Node {
    if indices.len() <= 1 || depth >= max_depth {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let dims = matrix[indices[0]].len();
    let splittable: Vec<(usize, f64, f64)> = (0..dims)
        .filter_map(|f| {
            let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                (lo.min(matrix[i][f]), hi.max(matrix[i][f]))
            });
            (hi > lo).then_some((f, lo, hi))
        })
        .collect();
    if splittable.is_empty() {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let (feature, lo, hi) = splittable[rng.gen_range(0..splittable.len())];
    let value = rng.gen_range(lo..hi);

    let mut split = 0;
    for i in 0..indices.len() {
        if matrix[indices[i]][feature] < value {
            indices.swap(i, split);
            split += 1;
        }
    }
    let (left, right) = indices.split_at_mut(split);

    Node::Split {
        feature,
        value,
        left: Box::new(grow(matrix, left, depth + 1, max_depth, rng)),
        right: Box::new(grow(matrix, right, depth + 1, max_depth, rng)),
    }
}

/// Average path length of an unsuccessful search in a binary search tree of `n` points
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated quantile, `q` in [0, 1]
fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Build the feature matrix, forward-filling then back-filling gaps per column
pub fn fill_features(batch: &MetricBatch, columns: &[MetricColumn]) -> Result<Vec<Vec<f64>>> {
    if batch.is_empty() {
        return Err(SentinelError::ModelFit("empty metric batch".into()));
    }
    if columns.is_empty() {
        return Err(SentinelError::ModelFit("no feature columns".into()));
    }

    let mut filled: Vec<Vec<f64>> = Vec::with_capacity(columns.len());
    for column in columns {
        let mut values = batch.column(*column);

        let mut last = None;
        for v in values.iter_mut() {
            match v {
                Some(x) => last = Some(*x),
                None => *v = last,
            }
        }
        let mut next = None;
        for v in values.iter_mut().rev() {
            match v {
                Some(x) => next = Some(*x),
                None => *v = next,
            }
        }

        let values: Option<Vec<f64>> = values.into_iter().collect();
        let values = values.ok_or_else(|| {
            SentinelError::ModelFit(format!("column '{}' has no values", column))
        })?;
        filled.push(values);
    }

    Ok((0..batch.len())
        .map(|i| filled.iter().map(|col| col[i]).collect())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetricRow;
    use chrono::{Duration, TimeZone, Utc};

    const FEATURES: [MetricColumn; 3] = MetricColumn::ALL;

    fn row(i: usize, cpu: f64, memory: f64, latency: f64) -> MetricRow {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        MetricRow::new(start + Duration::seconds(20 * i as i64), "node-a", cpu, memory, latency)
    }

    /// Tight deterministic cluster with one far outlier at index 150
    fn clustered_batch() -> MetricBatch {
        let rows = (0..200)
            .map(|i| {
                let x = i as f64;
                if i == 150 {
                    row(i, 99.0, 95.0, 380.0)
                } else {
                    row(
                        i,
                        40.0 + 3.0 * (x * 0.7).sin(),
                        45.0 + 2.0 * (x * 1.3).cos(),
                        80.0 + 6.0 * (x * 0.4).sin(),
                    )
                }
            })
            .collect();
        MetricBatch::from_rows(rows)
    }

    #[test]
    fn test_parameter_validation() {
        assert!(IsolationForest::new(0, 0.02, 42).is_err());
        assert!(IsolationForest::new(100, 0.0, 42).is_err());
        assert!(IsolationForest::new(100, 0.6, 42).is_err());
        assert!(IsolationForest::new(100, 0.5, 42).is_ok());
    }

    #[test]
    fn test_flags_far_outlier() {
        let forest = IsolationForest::new(200, 0.01, 42).unwrap();
        let results = forest.detect(&clustered_batch(), &FEATURES).unwrap();

        assert!(results[150].is_anomaly);
        let flagged = results.iter().filter(|r| r.is_anomaly).count();
        assert!(flagged <= 3, "flagged {flagged} rows");

        let top = results
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.score.partial_cmp(&b.1.score).unwrap())
            .map(|(i, _)| i);
        assert_eq!(top, Some(150));
    }

    #[test]
    fn test_same_seed_is_idempotent() {
        let forest = IsolationForest::new(50, 0.05, 7).unwrap();
        let batch = clustered_batch();

        let first: Vec<bool> = forest.detect(&batch, &FEATURES).unwrap().iter().map(|r| r.is_anomaly).collect();
        let second: Vec<bool> = forest.detect(&batch, &FEATURES).unwrap().iter().map(|r| r.is_anomaly).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_constant_matrix_fails() {
        let rows = (0..20).map(|i| row(i, 50.0, 50.0, 100.0)).collect();
        let batch = MetricBatch::from_rows(rows);

        let forest = IsolationForest::new(10, 0.1, 42).unwrap();
        let err = forest.detect(&batch, &FEATURES).unwrap_err();
        assert!(matches!(err, SentinelError::ModelFit(_)));
    }

    #[test]
    fn test_non_finite_matrix_fails() {
        let mut matrix: Vec<Vec<f64>> = (0..30)
            .map(|i| vec![40.0 + (i % 5) as f64, 50.0, 80.0])
            .collect();
        matrix[10][0] = f64::INFINITY;

        let forest = IsolationForest::new(50, 0.05, 42).unwrap();
        assert!(matches!(forest.fit(&matrix), Err(SentinelError::ModelFit(_))));
    }

    #[test]
    fn test_single_row_fails() {
        let batch = MetricBatch::from_rows(vec![row(0, 1.0, 2.0, 3.0)]);
        let forest = IsolationForest::new(10, 0.1, 42).unwrap();
        assert!(matches!(
            forest.detect(&batch, &FEATURES),
            Err(SentinelError::ModelFit(_))
        ));
    }

    #[test]
    fn test_forward_then_back_fill() {
        let mut rows: Vec<MetricRow> = (0..4).map(|i| row(i, 10.0 * (i + 1) as f64, 1.0, 2.0)).collect();
        rows[0].cpu = None;
        rows[2].cpu = None;
        let batch = MetricBatch::from_rows(rows);

        let matrix = fill_features(&batch, &[MetricColumn::Cpu]).unwrap();
        let cpu: Vec<f64> = matrix.iter().map(|r| r[0]).collect();
        assert_eq!(cpu, vec![20.0, 20.0, 20.0, 40.0]);
    }

    #[test]
    fn test_all_missing_column_fails() {
        let mut rows: Vec<MetricRow> = (0..4).map(|i| row(i, 1.0, 2.0, 3.0)).collect();
        for r in rows.iter_mut() {
            r.latency_ms = None;
        }
        let batch = MetricBatch::from_rows(rows);
        assert!(matches!(
            fill_features(&batch, &FEATURES),
            Err(SentinelError::ModelFit(_))
        ));
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // c(256) from the original isolation forest paper
        assert!((average_path_length(256) - 10.24).abs() < 0.01);
    }

    #[test]
    fn test_quantile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile(&values, 0.5), 3.0);
        assert!((quantile(&values, 0.9) - 4.6).abs() < 1e-12);
    }
}
