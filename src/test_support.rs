//! Shared fixtures for unit tests

use crate::config::ModelsConfig;
use crate::models::estimator::{ModelArtifact, RegressionTree, TreeArrays};
use crate::models::preprocessor::PreprocessorArtifact;
use crate::schema::SchemaVersion;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Artifact files as the training pipeline would write them
pub(crate) struct ArtifactFixture {
    pub feature_list: Vec<String>,
    pub preprocessor: PreprocessorArtifact,
    pub model: ModelArtifact,
}

impl ArtifactFixture {
    /// Linear model on the 25 clinical features, inputs scaled to [0, 1].
    ///
    /// Age and age at first intercourse carry no weight, so a record with no
    /// risk factors scores the intercept (0.02, LOW) and a record with every
    /// risk factor at its maximum saturates above 1.0.
    pub fn clinical_linear() -> Self {
        let fields = SchemaVersion::Clinical.fields();
        let feature_list: Vec<String> = fields.iter().map(|f| f.feature.to_string()).collect();
        let coefficients = fields
            .iter()
            .map(|f| match f.feature {
                "Age" | "First sexual intercourse" => 0.0,
                "Num of pregnancies" => 0.02,
                _ => 0.05,
            })
            .collect();

        Self {
            preprocessor: PreprocessorArtifact::StandardScaler {
                feature_names_in: feature_list.clone(),
                mean: vec![0.0; fields.len()],
                scale: fields.iter().map(|f| f.max).collect(),
                fill_value: None,
            },
            model: ModelArtifact::LinearRegression {
                n_features_in: fields.len(),
                coefficients,
                intercept: 0.02,
            },
            feature_list,
        }
    }

    /// Decision tree on the 10 VIF features, no scaling.
    ///
    /// `STDs (number)` <= 0.5 -> 0.05; otherwise partners <= 3.5 -> 0.3,
    /// else 0.7.
    pub fn vif_tree() -> Self {
        let feature_list: Vec<String> = SchemaVersion::Vif
            .expected_features()
            .into_iter()
            .map(String::from)
            .collect();
        let tree = RegressionTree::try_from(TreeArrays {
            children_left: vec![1, -1, 3, -1, -1],
            children_right: vec![2, -1, 4, -1, -1],
            feature: vec![6, -2, 0, -2, -2],
            threshold: vec![0.5, -2.0, 3.5, -2.0, -2.0],
            value: vec![0.2, 0.05, 0.5, 0.3, 0.7],
        })
        .unwrap();

        Self {
            preprocessor: PreprocessorArtifact::Passthrough {
                feature_names_in: feature_list.clone(),
            },
            model: ModelArtifact::DecisionTreeRegressor {
                n_features_in: feature_list.len(),
                tree,
            },
            feature_list,
        }
    }

    pub fn write_to(&self, dir: &Path) {
        fs::write(
            dir.join("feature_list.json"),
            serde_json::to_vec_pretty(&self.feature_list).unwrap(),
        )
        .unwrap();
        fs::write(
            dir.join("preprocessor.json"),
            serde_json::to_vec_pretty(&self.preprocessor).unwrap(),
        )
        .unwrap();
        fs::write(
            dir.join("best_model.json"),
            serde_json::to_vec_pretty(&self.model).unwrap(),
        )
        .unwrap();
    }

    pub fn models_config(&self, dir: &Path) -> ModelsConfig {
        ModelsConfig {
            artifacts_dir: dir.to_path_buf(),
            ..ModelsConfig::default()
        }
    }
}

pub(crate) fn write_artifacts(fixture: &ArtifactFixture) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fixture.write_to(dir.path());
    dir
}

/// Clinical payload from the API example
pub(crate) fn sample_clinical_payload() -> Value {
    json!({
        "Age": 25,
        "Number_of_sexual_partners": 2,
        "First_sexual_intercourse": 18,
        "Num_of_pregnancies": 1,
        "Smokes": 0,
        "Smokes_years": 0.0,
        "Smokes_packs_year": 0.0,
        "Hormonal_Contraceptives": 1,
        "Hormonal_Contraceptives_years": 2.0,
        "IUD": 0,
        "IUD_years": 0.0,
        "STDs": 0,
        "STDs_number": 0,
        "STDs_condylomatosis": 0,
        "STDs_cervical_condylomatosis": 0,
        "STDs_vaginal_condylomatosis": 0,
        "STDs_vulvo_perineal_condylomatosis": 0,
        "STDs_syphilis": 0,
        "STDs_pelvic_inflammatory_disease": 0,
        "STDs_genital_herpes": 0,
        "STDs_molluscum_contagiosum": 0,
        "STDs_AIDS": 0,
        "STDs_HIV": 0,
        "STDs_Hepatitis_B": 0,
        "STDs_HPV": 0
    })
}

/// Every clinical field at its lowest valid value
pub(crate) fn zero_risk_payload() -> Value {
    payload_from(SchemaVersion::Clinical, |spec| spec.min)
}

/// Every clinical field at its highest valid value
pub(crate) fn max_risk_payload() -> Value {
    payload_from(SchemaVersion::Clinical, |spec| spec.max)
}

fn payload_from(version: SchemaVersion, value: impl Fn(&crate::schema::FieldSpec) -> f64) -> Value {
    let object = version
        .fields()
        .iter()
        .map(|spec| (spec.name.to_string(), json!(value(spec))))
        .collect();
    Value::Object(object)
}
