use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::entity::ReportModel;
use crate::error::{ReportError, Result};
use crate::models::{EntityRiskRanking, FeatureRow, RiskScore, FEATURE_SCHEMA};

/// Estimators that expose a probability per class.
pub trait ProbabilityEstimator: Send + Sync {
    /// One probability vector per input row.
    fn predict_proba(&self, rows: &[FeatureRow]) -> Vec<Vec<f64>>;
}

/// Estimators that only expose a single scalar prediction per row.
pub trait ScalarPredictor: Send + Sync {
    fn predict(&self, rows: &[FeatureRow]) -> Vec<f64>;
}

/// How a loaded model reports its output, fixed when the artifact is
/// loaded.
pub enum ModelOutputKind {
    Probabilistic(Box<dyn ProbabilityEstimator>),
    /// Output is clamped into [0, 1] and read as a probability.
    ScalarOnly(Box<dyn ScalarPredictor>),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct LinearModel {
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LinearModel {
    fn decision(&self, values: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(values)
            .map(|(weight, value)| weight * value)
            .sum::<f64>()
            + self.intercept
    }
}

struct LogisticRegression(LinearModel);

impl ProbabilityEstimator for LogisticRegression {
    fn predict_proba(&self, rows: &[FeatureRow]) -> Vec<Vec<f64>> {
        rows.iter()
            .map(|row| {
                let p = 1.0 / (1.0 + (-self.0.decision(&row.values)).exp());
                vec![1.0 - p, p]
            })
            .collect()
    }
}

struct LinearClassifier {
    linear: LinearModel,
    threshold: f64,
}

impl ScalarPredictor for LinearClassifier {
    fn predict(&self, rows: &[FeatureRow]) -> Vec<f64> {
        rows.iter()
            .map(|row| {
                if self.linear.decision(&row.values) >= self.threshold {
                    1.0
                } else {
                    0.0
                }
            })
            .collect()
    }
}

struct LinearRegression(LinearModel);

impl ScalarPredictor for LinearRegression {
    fn predict(&self, rows: &[FeatureRow]) -> Vec<f64> {
        rows.iter().map(|row| self.0.decision(&row.values)).collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum EstimatorSpec {
    LogisticRegression(LinearModel),
    LinearClassifier {
        coefficients: Vec<f64>,
        intercept: f64,
        #[serde(default)]
        threshold: f64,
    },
    LinearRegression(LinearModel),
}

impl EstimatorSpec {
    fn parameters(&self) -> (&[f64], f64) {
        match self {
            EstimatorSpec::LogisticRegression(linear) | EstimatorSpec::LinearRegression(linear) => {
                (&linear.coefficients, linear.intercept)
            }
            EstimatorSpec::LinearClassifier {
                coefficients,
                intercept,
                ..
            } => (coefficients, *intercept),
        }
    }

    fn into_output(self) -> ModelOutputKind {
        match self {
            EstimatorSpec::LogisticRegression(linear) => {
                ModelOutputKind::Probabilistic(Box::new(LogisticRegression(linear)))
            }
            EstimatorSpec::LinearClassifier {
                coefficients,
                intercept,
                threshold,
            } => ModelOutputKind::ScalarOnly(Box::new(LinearClassifier {
                linear: LinearModel {
                    coefficients,
                    intercept,
                },
                threshold,
            })),
            EstimatorSpec::LinearRegression(linear) => {
                ModelOutputKind::ScalarOnly(Box::new(LinearRegression(linear)))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModelArtifact {
    name: String,
    schema_version: u32,
    features: Vec<String>,
    #[serde(default = "default_positive_class")]
    positive_class: usize,
    estimator: EstimatorSpec,
}

fn default_positive_class() -> usize {
    1
}

/// A pretrained classifier plus the feature layout it was trained on.
pub struct RiskModel {
    name: String,
    features: Vec<String>,
    positive_class: usize,
    output: ModelOutputKind,
}

impl RiskModel {
    /// Builds a model over the current feature schema. Artifacts are only
    /// accepted when their feature list equals that schema.
    pub fn new(name: impl Into<String>, output: ModelOutputKind) -> Self {
        RiskModel {
            name: name.into(),
            features: FEATURE_SCHEMA.names.iter().map(|n| n.to_string()).collect(),
            positive_class: default_positive_class(),
            output,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let load_error = |reason: String| ReportError::ModelLoad {
            path: path.to_path_buf(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|err| load_error(err.to_string()))?;
        let model = Self::from_json(&raw).map_err(load_error)?;
        tracing::info!(
            model = %model.name,
            path = %path.display(),
            probabilistic = matches!(model.output, ModelOutputKind::Probabilistic(_)),
            "risk model loaded"
        );
        Ok(model)
    }

    fn from_json(raw: &str) -> std::result::Result<Self, String> {
        let artifact: ModelArtifact = serde_json::from_str(raw).map_err(|err| err.to_string())?;

        if artifact.schema_version != FEATURE_SCHEMA.version {
            return Err(format!(
                "artifact targets feature schema v{}, this build produces v{}",
                artifact.schema_version, FEATURE_SCHEMA.version
            ));
        }
        if artifact.features.len() != FEATURE_SCHEMA.names.len()
            || artifact
                .features
                .iter()
                .zip(FEATURE_SCHEMA.names)
                .any(|(have, want)| have.as_str() != *want)
        {
            return Err(format!(
                "artifact features {:?} do not match {:?}",
                artifact.features, FEATURE_SCHEMA.names
            ));
        }

        let (coefficients, intercept) = artifact.estimator.parameters();
        if coefficients.len() != artifact.features.len() {
            return Err(format!(
                "{} coefficients for {} features",
                coefficients.len(),
                artifact.features.len()
            ));
        }
        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err("model parameters must be finite".to_string());
        }

        let mut model = RiskModel::new(artifact.name, artifact.estimator.into_output());
        model.positive_class = artifact.positive_class;
        Ok(model)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Positive-class probability for each row, in row order.
    fn probabilities(&self, rows: &[FeatureRow]) -> Result<Vec<f64>> {
        for row in rows {
            if row.values.len() != self.features.len() {
                return Err(ReportError::SchemaMismatch {
                    expected: self.features.len(),
                    found: row.values.len(),
                });
            }
        }

        match &self.output {
            ModelOutputKind::Probabilistic(estimator) => {
                let matrix = estimator.predict_proba(rows);
                check_row_count(matrix.len(), rows.len())?;
                matrix
                    .iter()
                    .map(|columns| self.positive_column(columns))
                    .collect()
            }
            ModelOutputKind::ScalarOnly(predictor) => {
                let predictions = predictor.predict(rows);
                check_row_count(predictions.len(), rows.len())?;
                predictions
                    .into_iter()
                    .map(|value| {
                        if value.is_finite() {
                            Ok(value.clamp(0.0, 1.0))
                        } else {
                            Err(ReportError::PredictionShape(format!(
                                "non-finite scalar prediction {value}"
                            )))
                        }
                    })
                    .collect()
            }
        }
    }

    fn positive_column(&self, columns: &[f64]) -> Result<f64> {
        let probability = match columns.len() {
            0 => {
                return Err(ReportError::PredictionShape(
                    "empty probability vector".to_string(),
                ))
            }
            1 => columns[0],
            width => *columns.get(self.positive_class).ok_or_else(|| {
                ReportError::PredictionShape(format!(
                    "positive class column {} outside {width} columns",
                    self.positive_class
                ))
            })?,
        };

        if probability.is_finite() && (0.0..=1.0).contains(&probability) {
            Ok(probability)
        } else {
            Err(ReportError::PredictionShape(format!(
                "probability {probability} outside [0, 1]"
            )))
        }
    }
}

fn check_row_count(found: usize, expected: usize) -> Result<()> {
    if found == expected {
        Ok(())
    } else {
        Err(ReportError::PredictionShape(format!(
            "model returned {found} predictions for {expected} rows"
        )))
    }
}

/// Turns feature rows into a single risk score using a shared, read-only
/// model.
#[derive(Clone)]
pub struct RiskScorer {
    model: Arc<RiskModel>,
}

impl RiskScorer {
    pub fn new(model: Arc<RiskModel>) -> Self {
        RiskScorer { model }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub async fn score<M: ReportModel>(&self, report: &M, id: i64) -> Result<Option<RiskScore>> {
        let rows = report.feature_rows(id).await?;
        self.score_rows(&rows)
    }

    /// Unweighted mean of the per-row probabilities; `None` without rows.
    pub fn score_rows(&self, rows: &[FeatureRow]) -> Result<Option<RiskScore>> {
        if rows.is_empty() {
            return Ok(None);
        }
        let probabilities = self.model.probabilities(rows)?;
        let mean = probabilities.iter().sum::<f64>() / probabilities.len() as f64;
        Ok(Some(RiskScore::new(mean.clamp(0.0, 1.0))))
    }

    /// Scores every selectable entity and orders them by descending risk.
    pub async fn rank<M: ReportModel>(&self, report: &M) -> Result<Vec<EntityRiskRanking>> {
        let mut rankings = Vec::new();

        for option in report.selector_options().await? {
            if let Some(score) = self.score(report, option.id).await? {
                rankings.push(EntityRiskRanking {
                    label: option.label,
                    id: option.id,
                    score,
                });
            }
        }

        rankings.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(rankings)
    }
}
