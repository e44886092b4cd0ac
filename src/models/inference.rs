//! Preprocessor + model invocation

use crate::error::InferenceError;
use crate::feature_reconciler::FeatureVector;
use crate::models::estimator::RiskModel;
use crate::models::loader::ArtifactSet;
use crate::models::preprocessor::Preprocessor;
use tracing::debug;

/// Transform `vector` with `preprocessor`, then score it with `model`.
///
/// The two steps always run together; a failure in either aborts the whole
/// call. The raw score is returned unclipped.
pub fn infer(
    vector: &FeatureVector,
    model: &dyn RiskModel,
    preprocessor: &dyn Preprocessor,
) -> Result<f64, InferenceError> {
    let transformed = preprocessor.transform(vector.as_frame())?;
    let score = model.predict(&transformed)?;

    debug!(
        model = %model.name(),
        features = transformed.len(),
        raw_score = score,
        "Inference complete"
    );

    Ok(score)
}

impl ArtifactSet {
    /// Run [`infer`] with this set's model and preprocessor
    pub fn infer(&self, vector: &FeatureVector) -> Result<f64, InferenceError> {
        infer(vector, self.model.as_ref(), self.preprocessor.as_ref())
    }
}
