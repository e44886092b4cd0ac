//! Preprocessor artifacts

use crate::error::InferenceError;
use crate::feature_reconciler::FeatureFrame;
use serde::{Deserialize, Serialize};

/// Fitted transform applied before the model
pub trait Preprocessor: Send + Sync {
    /// Columns the transform was fitted on, in order
    fn feature_names_in(&self) -> &[String];

    /// Transform one named row into model input
    fn transform(&self, frame: FeatureFrame<'_>) -> Result<Vec<f64>, InferenceError>;
}

/// Serialized preprocessor exported by the training pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreprocessorArtifact {
    /// Column check only, values unchanged
    Passthrough { feature_names_in: Vec<String> },

    /// `(x - mean) / scale` per column, with optional imputation of
    /// non-finite inputs
    StandardScaler {
        feature_names_in: Vec<String>,
        mean: Vec<f64>,
        scale: Vec<f64>,
        #[serde(default)]
        fill_value: Option<Vec<f64>>,
    },
}

impl PreprocessorArtifact {
    /// Structural checks run once at load time
    pub fn validate(&self) -> Result<(), String> {
        match self {
            PreprocessorArtifact::Passthrough { .. } => Ok(()),
            PreprocessorArtifact::StandardScaler {
                feature_names_in,
                mean,
                scale,
                fill_value,
            } => {
                let n = feature_names_in.len();
                if mean.len() != n || scale.len() != n {
                    return Err(format!(
                        "standard_scaler has {} columns but {} means and {} scales",
                        n,
                        mean.len(),
                        scale.len()
                    ));
                }
                if let Some(fill) = fill_value {
                    if fill.len() != n {
                        return Err(format!(
                            "standard_scaler has {} columns but {} fill values",
                            n,
                            fill.len()
                        ));
                    }
                }
                if mean.iter().chain(scale.iter()).any(|v| !v.is_finite()) {
                    return Err("standard_scaler statistics must be finite".to_string());
                }
                Ok(())
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PreprocessorArtifact::Passthrough { .. } => "passthrough",
            PreprocessorArtifact::StandardScaler { .. } => "standard_scaler",
        }
    }

    fn check_columns(&self, frame: &FeatureFrame<'_>) -> Result<(), InferenceError> {
        let expected = self.feature_names_in();
        if frame.columns != expected {
            return Err(InferenceError::Transform(format!(
                "feature names do not match those seen at fit time: expected {:?}, got {:?}",
                expected, frame.columns
            )));
        }
        if frame.values.len() != expected.len() {
            return Err(InferenceError::Transform(format!(
                "frame has {} columns but {} values",
                expected.len(),
                frame.values.len()
            )));
        }
        Ok(())
    }
}

impl Preprocessor for PreprocessorArtifact {
    fn feature_names_in(&self) -> &[String] {
        match self {
            PreprocessorArtifact::Passthrough { feature_names_in }
            | PreprocessorArtifact::StandardScaler {
                feature_names_in, ..
            } => feature_names_in,
        }
    }

    fn transform(&self, frame: FeatureFrame<'_>) -> Result<Vec<f64>, InferenceError> {
        self.check_columns(&frame)?;

        match self {
            PreprocessorArtifact::Passthrough { .. } => Ok(frame.values.to_vec()),
            PreprocessorArtifact::StandardScaler {
                mean,
                scale,
                fill_value,
                ..
            } => frame
                .values
                .iter()
                .enumerate()
                .map(|(i, &x)| -> Result<f64, InferenceError> {
                    let x = if x.is_finite() {
                        x
                    } else {
                        fill_value.as_ref().map(|f| f[i]).ok_or_else(|| {
                            InferenceError::Transform(format!(
                                "non-finite value in column '{}'",
                                frame.columns[i]
                            ))
                        })?
                    };
                    // zero-variance columns were fitted with scale 1
                    let s = if scale[i] == 0.0 { 1.0 } else { scale[i] };
                    Ok((x - mean[i]) / s)
                })
                .collect(),
        }
    }
}
