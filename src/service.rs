//! End-to-end prediction: validate, reconcile, infer, classify

use crate::error::{InferenceError, PredictionError};
use crate::feature_reconciler::FeatureReconciler;
use crate::metrics::PredictionMetrics;
use crate::models::{ArtifactCache, RiskClassifier};
use crate::schema::SchemaValidator;
use crate::types::assessment::RiskAssessment;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Request pipeline shared by every handler
pub struct PredictionService {
    validator: SchemaValidator,
    reconciler: FeatureReconciler,
    classifier: RiskClassifier,
    artifacts: Arc<ArtifactCache>,
    metrics: Arc<PredictionMetrics>,
}

impl PredictionService {
    pub fn new(
        validator: SchemaValidator,
        classifier: RiskClassifier,
        artifacts: Arc<ArtifactCache>,
        metrics: Arc<PredictionMetrics>,
    ) -> Self {
        Self {
            validator,
            reconciler: FeatureReconciler::new(),
            classifier,
            artifacts,
            metrics,
        }
    }

    pub fn validator(&self) -> &SchemaValidator {
        &self.validator
    }

    pub fn classifier(&self) -> &RiskClassifier {
        &self.classifier
    }

    pub fn artifacts(&self) -> &Arc<ArtifactCache> {
        &self.artifacts
    }

    pub fn metrics(&self) -> &Arc<PredictionMetrics> {
        &self.metrics
    }

    /// Score one raw request body.
    ///
    /// Artifacts are loaded on first use; a load failure is returned as-is and
    /// the next call tries again.
    pub fn predict(&self, raw: &Value) -> Result<RiskAssessment, PredictionError> {
        let request_id = Uuid::new_v4();
        let start = Instant::now();
        self.metrics.record_request();

        match self.run(raw, request_id) {
            Ok(assessment) => {
                let latency = start.elapsed();
                self.metrics
                    .record_prediction(latency, assessment.risk_score, assessment.risk_level);
                info!(
                    request_id = %request_id,
                    risk_score = assessment.risk_score,
                    risk_level = %assessment.risk_level,
                    model = %assessment.model_used,
                    latency_us = latency.as_micros() as u64,
                    "Prediction served"
                );
                Ok(assessment)
            }
            Err(e) => {
                self.metrics.record_failure(&e, start.elapsed());
                warn!(request_id = %request_id, kind = e.kind(), error = %e, "Prediction failed");
                Err(e)
            }
        }
    }

    fn run(&self, raw: &Value, request_id: Uuid) -> Result<RiskAssessment, PredictionError> {
        let record = self.validator.validate(raw)?;
        debug!(request_id = %request_id, record = ?record, "Request validated");

        let artifacts = self.artifacts.get()?;
        let vector = self.reconciler.reconcile(&record, &artifacts.feature_schema);

        let raw_score = artifacts.infer(&vector)?;
        if !raw_score.is_finite() {
            return Err(InferenceError::NonFiniteScore(raw_score).into());
        }

        Ok(self.classifier.classify(raw_score, artifacts.model.name()))
    }
}
