//! Risk assessment output and risk band definitions

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk category, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "MODERATE")]
    Moderate,
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "VERY HIGH")]
    VeryHigh,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Moderate,
        RiskLevel::High,
        RiskLevel::VeryHigh,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Moderate => "MODERATE",
            RiskLevel::High => "HIGH",
            RiskLevel::VeryHigh => "VERY HIGH",
        }
    }

    /// Recommendation text bound to this level
    pub fn recommendation(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Routine screening recommended",
            RiskLevel::Moderate => "Consider additional screening and consultation",
            RiskLevel::High => "Consult healthcare provider soon for evaluation",
            RiskLevel::VeryHigh => "Immediate medical intervention required",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upper bounds (exclusive) of the LOW, MODERATE and HIGH bands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskBandThresholds {
    pub moderate: f64,
    pub high: f64,
    pub very_high: f64,
}

impl Default for RiskBandThresholds {
    /// Thresholds calibrated for the decision tree output range (0.0 - 0.8)
    fn default() -> Self {
        Self {
            moderate: 0.15,
            high: 0.4,
            very_high: 0.65,
        }
    }
}

/// One score interval of the band table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskBand {
    /// Exclusive upper bound, `None` for the last band
    pub upper_bound: Option<f64>,
    pub level: RiskLevel,
    pub recommendation: String,
}

/// Ordered bands partitioning `[0.0, 1.0]`.
///
/// Only constructible through [`RiskBandTable::new`], so the last band is
/// always unbounded and the bounds are strictly ascending.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskBandTable {
    bands: Vec<RiskBand>,
}

impl RiskBandTable {
    pub fn new(thresholds: RiskBandThresholds) -> Result<Self, ConfigError> {
        let bounds = [thresholds.moderate, thresholds.high, thresholds.very_high];

        if let Some(bad) = bounds.iter().find(|b| !b.is_finite() || **b <= 0.0 || **b > 1.0) {
            return Err(ConfigError::InvalidRiskBands(format!(
                "threshold {} is outside (0, 1]",
                bad
            )));
        }
        if !bounds.windows(2).all(|w| w[0] < w[1]) {
            return Err(ConfigError::InvalidRiskBands(format!(
                "thresholds must be strictly ascending, got {:?}",
                bounds
            )));
        }

        let bands = RiskLevel::ALL
            .iter()
            .enumerate()
            .map(|(i, level)| RiskBand {
                upper_bound: bounds.get(i).copied(),
                level: *level,
                recommendation: level.recommendation().to_string(),
            })
            .collect();

        Ok(Self { bands })
    }

    pub fn bands(&self) -> &[RiskBand] {
        &self.bands
    }

    /// First band whose upper bound strictly exceeds `score`, else the last band
    pub fn band_for(&self, score: f64) -> &RiskBand {
        self.bands
            .iter()
            .find(|band| band.upper_bound.map_or(true, |bound| score < bound))
            .unwrap_or_else(|| &self.bands[self.bands.len() - 1])
    }
}

impl Default for RiskBandTable {
    fn default() -> Self {
        let t = RiskBandThresholds::default();
        let bands = RiskLevel::ALL
            .iter()
            .zip([Some(t.moderate), Some(t.high), Some(t.very_high), None])
            .map(|(level, upper_bound)| RiskBand {
                upper_bound,
                level: *level,
                recommendation: level.recommendation().to_string(),
            })
            .collect();
        Self { bands }
    }
}

/// Prediction response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Clipped risk score (0.0 - 1.0)
    pub risk_score: f64,

    /// Risk band the score falls into
    pub risk_level: RiskLevel,

    /// Recommendation bound to the band
    pub recommendation: String,

    /// Model type that produced the score
    pub model_used: String,
}
