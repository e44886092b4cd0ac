//! Error taxonomy for the prediction pipeline

use crate::types::patient::ValidationError;
use thiserror::Error;

/// Failure to obtain a complete, usable artifact set
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArtifactError {
    /// One or more artifact files could not be located
    #[error("model artifacts not found: {}", missing.join(", "))]
    Missing { missing: Vec<String> },

    /// An artifact exists but cannot be turned into the expected capability
    #[error("artifact '{artifact}' is corrupt: {reason}")]
    Corrupt { artifact: String, reason: String },
}

impl ArtifactError {
    pub fn corrupt(artifact: impl Into<String>, reason: impl Into<String>) -> Self {
        ArtifactError::Corrupt {
            artifact: artifact.into(),
            reason: reason.into(),
        }
    }
}

/// Failure inside the preprocessor/model pair on an otherwise valid vector
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("preprocessor transform failed: {0}")]
    Transform(String),

    #[error("model prediction failed: {0}")]
    Predict(String),

    #[error("model produced a non-finite score ({0})")]
    NonFiniteScore(f64),
}

/// Configuration rejected at startup
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid risk band thresholds: {0}")]
    InvalidRiskBands(String),
}

/// Everything `predict` can fail with
#[derive(Error, Debug)]
pub enum PredictionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl PredictionError {
    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            PredictionError::Validation(_) => "validation",
            PredictionError::Artifact(_) => "artifact",
            PredictionError::Inference(_) => "inference",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_lists_every_artifact() {
        let err = ArtifactError::Missing {
            missing: vec!["best_model.json".into(), "feature_list.json".into()],
        };
        assert_eq!(
            err.to_string(),
            "model artifacts not found: best_model.json, feature_list.json"
        );
    }

    #[test]
    fn test_prediction_error_kind() {
        let err: PredictionError = InferenceError::NonFiniteScore(f64::NAN).into();
        assert_eq!(err.kind(), "inference");

        let err: PredictionError = ArtifactError::corrupt("preprocessor.json", "bad json").into();
        assert_eq!(err.kind(), "artifact");
        assert!(err.to_string().contains("preprocessor.json"));
    }
}
