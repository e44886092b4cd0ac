//! Training artifact loader

use crate::config::ModelsConfig;
use crate::error::ArtifactError;
use crate::feature_reconciler::FeatureSchema;
use crate::models::estimator::{ModelArtifact, RiskModel};
use crate::models::preprocessor::{Preprocessor, PreprocessorArtifact};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

/// A complete, immutable set of training artifacts
pub struct ArtifactSet {
    pub model: Box<dyn RiskModel>,
    pub preprocessor: Box<dyn Preprocessor>,
    pub feature_schema: FeatureSchema,
    pub loaded_at: DateTime<Utc>,
}

impl std::fmt::Debug for ArtifactSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactSet")
            .field("model", &self.model.name())
            .field("features", &self.feature_schema.len())
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

enum ModelSource {
    Json(PathBuf),
    #[cfg(feature = "onnx")]
    Onnx(PathBuf),
}

/// Loads the model, preprocessor and feature list from one directory
#[derive(Debug, Clone)]
pub struct ArtifactLoader {
    config: ModelsConfig,
}

impl ArtifactLoader {
    pub fn new(config: &ModelsConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.config.artifacts_dir
    }

    /// Load all three artifacts.
    ///
    /// Either every artifact is ready or an error is returned; a partial set
    /// is never produced.
    pub fn load(&self) -> Result<ArtifactSet, ArtifactError> {
        let dir = &self.config.artifacts_dir;
        let preprocessor_path = dir.join(&self.config.preprocessor_file);
        let feature_list_path = dir.join(&self.config.feature_list_file);

        let mut missing = Vec::new();
        let model_source = self.locate_model();
        if model_source.is_none() {
            missing.push(self.model_description());
        }
        if !preprocessor_path.is_file() {
            missing.push(self.config.preprocessor_file.clone());
        }
        if !feature_list_path.is_file() {
            missing.push(self.config.feature_list_file.clone());
        }
        let Some(model_source) = model_source.filter(|_| missing.is_empty()) else {
            warn!(dir = %dir.display(), missing = ?missing, "Model artifacts not found");
            return Err(ArtifactError::Missing { missing });
        };

        let names: Vec<String> = read_json(&feature_list_path, &self.config.feature_list_file)?;
        let feature_schema = FeatureSchema::new(names).map_err(|dup| {
            ArtifactError::corrupt(
                &self.config.feature_list_file,
                format!("duplicate feature name '{}'", dup),
            )
        })?;

        let preprocessor: PreprocessorArtifact =
            read_json(&preprocessor_path, &self.config.preprocessor_file)?;
        preprocessor
            .validate()
            .map_err(|reason| ArtifactError::corrupt(&self.config.preprocessor_file, reason))?;

        if preprocessor.feature_names_in() != feature_schema.names() {
            warn!(
                preprocessor = ?preprocessor.feature_names_in(),
                feature_list = ?feature_schema.names(),
                "Preprocessor columns differ from the feature list; predictions will fail"
            );
        }

        let model = self.load_model(model_source)?;

        info!(
            dir = %dir.display(),
            model = %model.name(),
            preprocessor = preprocessor.kind(),
            features = feature_schema.len(),
            "Model artifacts loaded"
        );

        Ok(ArtifactSet {
            model,
            preprocessor: Box::new(preprocessor),
            feature_schema,
            loaded_at: Utc::now(),
        })
    }

    fn locate_model(&self) -> Option<ModelSource> {
        let json = self.config.artifacts_dir.join(&self.config.model_file);
        if json.is_file() {
            return Some(ModelSource::Json(json));
        }

        #[cfg(feature = "onnx")]
        {
            let onnx = self.config.artifacts_dir.join(&self.config.onnx_model_file);
            if onnx.is_file() {
                return Some(ModelSource::Onnx(onnx));
            }
        }

        None
    }

    fn model_description(&self) -> String {
        if cfg!(feature = "onnx") {
            format!(
                "{} (or {})",
                self.config.model_file, self.config.onnx_model_file
            )
        } else {
            self.config.model_file.clone()
        }
    }

    fn load_model(&self, source: ModelSource) -> Result<Box<dyn RiskModel>, ArtifactError> {
        match source {
            ModelSource::Json(path) => {
                let model: ModelArtifact = read_json(&path, &self.config.model_file)?;
                model
                    .validate()
                    .map_err(|reason| ArtifactError::corrupt(&self.config.model_file, reason))?;
                Ok(Box::new(model))
            }
            #[cfg(feature = "onnx")]
            ModelSource::Onnx(path) => {
                let model = crate::models::estimator::OnnxModel::load(
                    &path,
                    &self.config.onnx_model_name,
                    self.config.onnx_threads,
                )
                .map_err(|e| {
                    ArtifactError::corrupt(&self.config.onnx_model_file, format!("{:#}", e))
                })?;
                Ok(Box::new(model))
            }
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path, artifact: &str) -> Result<T, ArtifactError> {
    let bytes = std::fs::read(path)
        .map_err(|e| ArtifactError::corrupt(artifact, format!("unreadable: {}", e)))?;
    serde_json::from_slice(&bytes).map_err(|e| ArtifactError::corrupt(artifact, e.to_string()))
}

/// Process-wide holder of the current artifact set.
///
/// Readers get an `Arc` to a fully loaded set. A failed load leaves the cache
/// untouched so a later request can retry; a reload swaps the pointer only
/// after the new set is complete.
pub struct ArtifactCache {
    loader: ArtifactLoader,
    current: RwLock<Option<Arc<ArtifactSet>>>,
}

impl ArtifactCache {
    pub fn new(loader: ArtifactLoader) -> Self {
        Self {
            loader,
            current: RwLock::new(None),
        }
    }

    /// Current set, if one has been loaded
    pub fn current(&self) -> Option<Arc<ArtifactSet>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current set, loading it first if needed
    pub fn get(&self) -> Result<Arc<ArtifactSet>, ArtifactError> {
        if let Some(set) = self.current() {
            return Ok(set);
        }

        let loaded = Arc::new(self.loader.load()?);
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        // another request may have published a set while we were loading
        Ok(slot.get_or_insert(loaded).clone())
    }

    /// Load a fresh set and swap it in; the old set stays on failure
    pub fn reload(&self) -> Result<Arc<ArtifactSet>, ArtifactError> {
        let loaded = Arc::new(self.loader.load()?);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(loaded.clone());
        info!(features = loaded.feature_schema.len(), "Model artifacts reloaded");
        Ok(loaded)
    }

    pub fn loader(&self) -> &ArtifactLoader {
        &self.loader
    }
}
