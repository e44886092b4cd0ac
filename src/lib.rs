//! Cervical Cancer Risk Prediction Library
//!
//! Serves a trained regression model over HTTP: validates patient risk
//! factors, aligns them with the training feature list, runs the fitted
//! preprocessor and model, and maps the score onto a risk band.

pub mod config;
pub mod error;
pub mod feature_reconciler;
pub mod metrics;
pub mod models;
pub mod schema;
pub mod server;
pub mod service;
pub mod types;

#[cfg(test)]
mod test_support;

pub use config::AppConfig;
pub use error::{ArtifactError, ConfigError, InferenceError, PredictionError};
pub use feature_reconciler::{FeatureReconciler, FeatureSchema, FeatureVector};
pub use models::{ArtifactCache, ArtifactLoader, ArtifactSet, RiskClassifier};
pub use schema::{SchemaValidator, SchemaVersion};
pub use service::PredictionService;
pub use types::{
    assessment::{RiskAssessment, RiskBandTable, RiskLevel},
    patient::{PatientRecord, ValidationError},
};
