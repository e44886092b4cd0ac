//! Score to risk band mapping

use crate::types::assessment::{RiskAssessment, RiskBandTable};

/// Clamp a raw model score into `[0.0, 1.0]`
pub fn clip_score(raw_score: f64) -> f64 {
    raw_score.clamp(0.0, 1.0)
}

/// Maps raw scores onto a fixed band table.
///
/// Callers must reject non-finite scores first; NaN is not special-cased.
#[derive(Debug, Clone, Default)]
pub struct RiskClassifier {
    table: RiskBandTable,
}

impl RiskClassifier {
    pub fn new(table: RiskBandTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RiskBandTable {
        &self.table
    }

    pub fn classify(&self, raw_score: f64, model_used: &str) -> RiskAssessment {
        let risk_score = clip_score(raw_score);
        let band = self.table.band_for(risk_score);

        RiskAssessment {
            risk_score,
            risk_level: band.level,
            recommendation: band.recommendation.clone(),
            model_used: model_used.to_string(),
        }
    }
}
