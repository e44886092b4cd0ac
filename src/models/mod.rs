//! Trained model artifacts and the inference pipeline

pub mod classifier;
pub mod estimator;
pub mod inference;
pub mod loader;
pub mod preprocessor;

pub use classifier::{clip_score, RiskClassifier};
pub use estimator::{ModelArtifact, RiskModel};
pub use inference::infer;
pub use loader::{ArtifactCache, ArtifactLoader, ArtifactSet};
pub use preprocessor::{Preprocessor, PreprocessorArtifact};
