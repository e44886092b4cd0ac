//! Request and response types for the prediction pipeline

pub mod assessment;
pub mod patient;

pub use assessment::{RiskAssessment, RiskBand, RiskBandTable, RiskBandThresholds, RiskLevel};
pub use patient::{FieldViolation, PatientRecord, ValidationError, ViolationKind};
