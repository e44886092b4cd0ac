//! Input schema declarations and request validation.
//!
//! Each deployed model generation has a statically declared field table.
//! Wire names are what API clients send; every field also accepts the
//! training feature name (e.g. `STDs (number)` for `STDs_number`) so payloads
//! built straight from the training frame keep working.

use crate::types::patient::{FieldViolation, PatientRecord, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Feature schema generation served by this deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    /// 25 clinical risk factors
    #[default]
    Clinical,
    /// 10 features kept after VIF selection
    Vif,
}

impl SchemaVersion {
    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            SchemaVersion::Clinical => CLINICAL_FIELDS,
            SchemaVersion::Vif => VIF_FIELDS,
        }
    }

    /// Training feature names in declaration order
    pub fn expected_features(&self) -> Vec<&'static str> {
        self.fields().iter().map(|f| f.feature).collect()
    }

    /// Compare a saved feature list with this generation, order included
    pub fn diff_feature_list(&self, names: &[String]) -> FeatureListDiff {
        let expected = self.expected_features();
        let actual: HashSet<&str> = names.iter().map(String::as_str).collect();
        let wanted: HashSet<&str> = expected.iter().copied().collect();

        let missing = expected
            .iter()
            .filter(|name| !actual.contains(*name))
            .map(|name| name.to_string())
            .collect();
        let unexpected = names
            .iter()
            .filter(|name| !wanted.contains(name.as_str()))
            .cloned()
            .collect();
        let misplaced = expected
            .iter()
            .zip(names)
            .enumerate()
            .filter(|(_, (want, got))| **want != got.as_str())
            .map(|(index, (want, got))| MisplacedFeature {
                index,
                expected: want.to_string(),
                actual: got.clone(),
            })
            .collect();

        FeatureListDiff {
            missing,
            unexpected,
            misplaced,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaVersion::Clinical => "clinical",
            SchemaVersion::Vif => "vif",
        }
    }
}

/// Position where a saved feature list disagrees with the expected order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MisplacedFeature {
    pub index: usize,
    pub expected: String,
    pub actual: String,
}

/// Result of [`SchemaVersion::diff_feature_list`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureListDiff {
    /// Expected names absent from the list
    pub missing: Vec<String>,
    /// Listed names the generation does not declare
    pub unexpected: Vec<String>,
    /// Positions whose name differs from the expected one
    pub misplaced: Vec<MisplacedFeature>,
}

impl FeatureListDiff {
    /// Same names in the same order
    pub fn is_match(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty() && self.misplaced.is_empty()
    }

    /// Same names, different order
    pub fn is_reordered(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty() && !self.misplaced.is_empty()
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "clinical" => Ok(SchemaVersion::Clinical),
            "vif" => Ok(SchemaVersion::Vif),
            other => Err(format!(
                "unknown schema version '{}', expected 'clinical' or 'vif'",
                other
            )),
        }
    }
}

/// Semantic numeric type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Integer,
    Float,
}

/// Declared shape of one input field
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldSpec {
    /// Wire name
    pub name: &'static str,
    /// Training feature name, also accepted on the wire
    pub feature: &'static str,
    pub kind: FieldKind,
    /// Inclusive lower bound
    pub min: f64,
    /// Inclusive upper bound
    pub max: f64,
    pub required: bool,
}

impl FieldSpec {
    const fn integer(name: &'static str, feature: &'static str, min: f64, max: f64) -> Self {
        Self {
            name,
            feature,
            kind: FieldKind::Integer,
            min,
            max,
            required: true,
        }
    }

    const fn float(name: &'static str, feature: &'static str, min: f64, max: f64) -> Self {
        Self {
            name,
            feature,
            kind: FieldKind::Float,
            min,
            max,
            required: true,
        }
    }

    const fn flag(name: &'static str, feature: &'static str) -> Self {
        Self::integer(name, feature, 0.0, 1.0)
    }

    /// Keys this field is looked up under, wire name first
    pub fn keys(&self) -> impl Iterator<Item = &'static str> {
        let alias = (self.feature != self.name).then_some(self.feature);
        std::iter::once(self.name).chain(alias)
    }

    fn check(&self, value: &Value) -> Result<f64, FieldViolation> {
        let kind = match self.kind {
            FieldKind::Integer => "integer",
            FieldKind::Float => "number",
        };

        let number = match value.as_f64() {
            Some(n) if n.is_finite() => n,
            _ => {
                return Err(FieldViolation::wrong_type(
                    self.name,
                    format!("expected {}, got {}", kind, json_type(value)),
                ))
            }
        };

        if self.kind == FieldKind::Integer && number.fract() != 0.0 {
            return Err(FieldViolation::wrong_type(
                self.name,
                format!("expected integer, got {}", number),
            ));
        }

        if number < self.min || number > self.max {
            return Err(FieldViolation::out_of_range(
                self.name,
                format!(
                    "value {} must be between {} and {}",
                    number, self.min, self.max
                ),
            ));
        }

        Ok(number)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

const CLINICAL_FIELDS: &[FieldSpec] = &[
    FieldSpec::integer("Age", "Age", 15.0, 100.0),
    FieldSpec::integer("Number_of_sexual_partners", "Number of sexual partners", 0.0, 50.0),
    FieldSpec::integer("First_sexual_intercourse", "First sexual intercourse", 10.0, 40.0),
    FieldSpec::integer("Num_of_pregnancies", "Num of pregnancies", 0.0, 20.0),
    FieldSpec::flag("Smokes", "Smokes"),
    FieldSpec::float("Smokes_years", "Smokes (years)", 0.0, 80.0),
    FieldSpec::float("Smokes_packs_year", "Smokes (packs/year)", 0.0, 100.0),
    FieldSpec::flag("Hormonal_Contraceptives", "Hormonal Contraceptives"),
    FieldSpec::float(
        "Hormonal_Contraceptives_years",
        "Hormonal Contraceptives (years)",
        0.0,
        50.0,
    ),
    FieldSpec::flag("IUD", "IUD"),
    FieldSpec::float("IUD_years", "IUD (years)", 0.0, 50.0),
    FieldSpec::flag("STDs", "STDs"),
    FieldSpec::integer("STDs_number", "STDs (number)", 0.0, 20.0),
    FieldSpec::flag("STDs_condylomatosis", "STDs:condylomatosis"),
    FieldSpec::flag("STDs_cervical_condylomatosis", "STDs:cervical condylomatosis"),
    FieldSpec::flag("STDs_vaginal_condylomatosis", "STDs:vaginal condylomatosis"),
    FieldSpec::flag(
        "STDs_vulvo_perineal_condylomatosis",
        "STDs:vulvo-perineal condylomatosis",
    ),
    FieldSpec::flag("STDs_syphilis", "STDs:syphilis"),
    FieldSpec::flag(
        "STDs_pelvic_inflammatory_disease",
        "STDs:pelvic inflammatory disease",
    ),
    FieldSpec::flag("STDs_genital_herpes", "STDs:genital herpes"),
    FieldSpec::flag("STDs_molluscum_contagiosum", "STDs:molluscum contagiosum"),
    FieldSpec::flag("STDs_AIDS", "STDs:AIDS"),
    FieldSpec::flag("STDs_HIV", "STDs:HIV"),
    FieldSpec::flag("STDs_Hepatitis_B", "STDs:Hepatitis B"),
    FieldSpec::flag("STDs_HPV", "STDs:HPV"),
];

const VIF_FIELDS: &[FieldSpec] = &[
    FieldSpec::integer("Number_of_sexual_partners", "Number of sexual partners", 0.0, 50.0),
    FieldSpec::integer("First_sexual_intercourse", "First sexual intercourse", 10.0, 40.0),
    FieldSpec::flag("Smokes", "Smokes"),
    FieldSpec::flag("Hormonal_Contraceptives", "Hormonal Contraceptives"),
    FieldSpec::float("IUD_years", "IUD (years)", 0.0, 50.0),
    FieldSpec::flag("STDs", "STDs"),
    FieldSpec::integer("STDs_number", "STDs (number)", 0.0, 20.0),
    FieldSpec::flag("STDs_cervical_condylomatosis", "STDs:cervical condylomatosis"),
    FieldSpec::flag(
        "STDs_pelvic_inflammatory_disease",
        "STDs:pelvic inflammatory disease",
    ),
    FieldSpec::flag("STDs_genital_herpes", "STDs:genital herpes"),
];

/// Validates raw request bodies against one schema generation
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    version: SchemaVersion,
}

impl SchemaValidator {
    pub fn new(version: SchemaVersion) -> Self {
        Self { version }
    }

    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        self.version.fields()
    }

    /// Validate a request body into a [`PatientRecord`].
    ///
    /// Every offending field is reported, in declaration order. Declared
    /// fields are stored under their training feature name. Unknown numeric
    /// keys pass through under their own name; unknown non-numeric keys are
    /// ignored.
    pub fn validate(&self, raw: &Value) -> Result<PatientRecord, ValidationError> {
        let Some(object) = raw.as_object() else {
            return Err(ValidationError::new(vec![FieldViolation::wrong_type(
                "$",
                format!("expected JSON object, got {}", json_type(raw)),
            )]));
        };

        let mut record = PatientRecord::new();
        let mut violations = Vec::new();
        let mut declared: HashSet<&str> = HashSet::new();

        for spec in self.fields() {
            declared.extend(spec.keys());

            match spec.keys().find_map(|key| object.get(key)) {
                Some(value) => match spec.check(value) {
                    Ok(number) => record.insert(spec.feature, number),
                    Err(violation) => violations.push(violation),
                },
                None if spec.required => violations.push(FieldViolation::missing(spec.name)),
                None => {}
            }
        }

        if !violations.is_empty() {
            return Err(ValidationError::new(violations));
        }

        for (key, value) in object {
            if declared.contains(key.as_str()) {
                continue;
            }
            if let Some(number) = value.as_f64().filter(|n| n.is_finite()) {
                record.insert(key.as_str(), number);
            }
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_clinical_payload;
    use crate::types::patient::ViolationKind;
    use serde_json::json;

    #[test]
    fn test_field_tables() {
        assert_eq!(SchemaVersion::Clinical.fields().len(), 25);
        assert_eq!(SchemaVersion::Vif.fields().len(), 10);
        assert_eq!(
            SchemaVersion::Vif.expected_features()[6],
            "STDs (number)"
        );
        for spec in SchemaVersion::Vif.fields() {
            assert!(SchemaVersion::Clinical.fields().contains(spec));
        }
    }

    #[test]
    fn test_valid_payload_maps_to_feature_names() {
        let validator = SchemaValidator::new(SchemaVersion::Clinical);
        let record = validator.validate(&sample_clinical_payload()).unwrap();

        assert_eq!(record.len(), 25);
        assert_eq!(record.get("Age"), Some(25.0));
        assert_eq!(record.get("Hormonal Contraceptives (years)"), Some(2.0));
        assert_eq!(record.get("STDs (number)"), Some(0.0));
        assert!(!record.contains("STDs_number"));
    }

    #[test]
    fn test_training_names_accepted_as_aliases() {
        let validator = SchemaValidator::new(SchemaVersion::Vif);
        let payload = json!({
            "Number of sexual partners": 3,
            "First sexual intercourse": 17,
            "Smokes": 1,
            "Hormonal Contraceptives": 0,
            "IUD (years)": 1.5,
            "STDs": 1,
            "STDs (number)": 2,
            "STDs:cervical condylomatosis": 0,
            "STDs:pelvic inflammatory disease": 0,
            "STDs:genital herpes": 1
        });

        let record = validator.validate(&payload).unwrap();
        assert_eq!(record.len(), 10);
        assert_eq!(record.get("STDs (number)"), Some(2.0));
        assert_eq!(record.get("IUD (years)"), Some(1.5));
    }

    #[test]
    fn test_collects_every_violation() {
        let validator = SchemaValidator::new(SchemaVersion::Clinical);
        let mut payload = sample_clinical_payload();
        payload["Age"] = json!(150);
        payload["Number_of_sexual_partners"] = json!(-5);
        payload["Smokes"] = json!("no");
        payload["STDs_number"] = json!(1.5);
        payload.as_object_mut().unwrap().remove("IUD");

        let err = validator.validate(&payload).unwrap_err();
        let summary: Vec<(&str, ViolationKind)> = err
            .violations()
            .iter()
            .map(|v| (v.field.as_str(), v.kind))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("Age", ViolationKind::OutOfRange),
                ("Number_of_sexual_partners", ViolationKind::OutOfRange),
                ("Smokes", ViolationKind::WrongType),
                ("IUD", ViolationKind::Missing),
                ("STDs_number", ViolationKind::WrongType),
            ]
        );
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let validator = SchemaValidator::new(SchemaVersion::Clinical);
        let mut payload = sample_clinical_payload();
        payload["Age"] = json!(15);
        payload["Smokes_packs_year"] = json!(100.0);
        assert!(validator.validate(&payload).is_ok());

        payload["Age"] = json!(100);
        assert!(validator.validate(&payload).is_ok());
    }

    #[test]
    fn test_integral_float_accepted_for_integer_field() {
        let validator = SchemaValidator::new(SchemaVersion::Clinical);
        let mut payload = sample_clinical_payload();
        payload["Age"] = json!(30.0);
        let record = validator.validate(&payload).unwrap();
        assert_eq!(record.get("Age"), Some(30.0));
    }

    #[test]
    fn test_boolean_is_wrong_type() {
        let validator = SchemaValidator::new(SchemaVersion::Clinical);
        let mut payload = sample_clinical_payload();
        payload["Smokes"] = json!(true);
        let err = validator.validate(&payload).unwrap_err();
        assert_eq!(err.violations().len(), 1);
        assert_eq!(err.violations()[0].kind, ViolationKind::WrongType);
    }

    #[test]
    fn test_unknown_fields_pass_through() {
        let validator = SchemaValidator::new(SchemaVersion::Clinical);
        let mut payload = sample_clinical_payload();
        payload["Dx:Cancer"] = json!(1);
        payload["notes"] = json!("free text");

        let record = validator.validate(&payload).unwrap();
        assert_eq!(record.get("Dx:Cancer"), Some(1.0));
        assert!(!record.contains("notes"));
    }

    #[test]
    fn test_non_object_body() {
        let validator = SchemaValidator::new(SchemaVersion::Clinical);
        let err = validator.validate(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(err.violations()[0].field, "$");
    }

    #[test]
    fn test_schema_version_parsing() {
        assert_eq!("VIF".parse::<SchemaVersion>(), Ok(SchemaVersion::Vif));
        assert_eq!(
            "clinical".parse::<SchemaVersion>(),
            Ok(SchemaVersion::Clinical)
        );
        assert!("v3".parse::<SchemaVersion>().is_err());
    }

    fn vif_names() -> Vec<String> {
        SchemaVersion::Vif
            .expected_features()
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_feature_list_diff_exact_match() {
        let diff = SchemaVersion::Vif.diff_feature_list(&vif_names());
        assert!(diff.is_match());
        assert_eq!(diff, FeatureListDiff::default());
    }

    #[test]
    fn test_feature_list_diff_detects_permutation() {
        let mut names = vif_names();
        names.swap(0, 1);

        let diff = SchemaVersion::Vif.diff_feature_list(&names);
        assert!(!diff.is_match());
        assert!(diff.is_reordered());
        assert_eq!(
            diff.misplaced,
            vec![
                MisplacedFeature {
                    index: 0,
                    expected: "Number of sexual partners".to_string(),
                    actual: "First sexual intercourse".to_string(),
                },
                MisplacedFeature {
                    index: 1,
                    expected: "First sexual intercourse".to_string(),
                    actual: "Number of sexual partners".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_feature_list_diff_set_differences() {
        let mut names = vif_names();
        names.pop();
        names.push("Age".to_string());

        let diff = SchemaVersion::Vif.diff_feature_list(&names);
        assert!(!diff.is_match());
        assert!(!diff.is_reordered());
        assert_eq!(diff.missing, vec!["STDs:genital herpes".to_string()]);
        assert_eq!(diff.unexpected, vec!["Age".to_string()]);
    }
}
