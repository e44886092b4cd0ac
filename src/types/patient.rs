//! Patient record and validation failure types

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Validated patient risk factors keyed by training feature name.
///
/// Created per request and discarded once the response is written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientRecord {
    values: BTreeMap<String, f64>,
}

impl PatientRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for PatientRecord {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Why a field was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Missing,
    WrongType,
    OutOfRange,
}

/// One offending field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub kind: ViolationKind,
    pub message: String,
}

impl FieldViolation {
    pub fn missing(field: &str) -> Self {
        Self {
            field: field.to_string(),
            kind: ViolationKind::Missing,
            message: "field required".to_string(),
        }
    }

    pub fn wrong_type(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            kind: ViolationKind::WrongType,
            message: message.into(),
        }
    }

    pub fn out_of_range(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            kind: ViolationKind::OutOfRange,
            message: message.into(),
        }
    }
}

/// Complete list of schema violations for one request
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", format_violations(.violations))]
pub struct ValidationError {
    violations: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn new(violations: Vec<FieldViolation>) -> Self {
        Self { violations }
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<FieldViolation> {
        self.violations
    }
}

fn format_violations(violations: &[FieldViolation]) -> String {
    let details: Vec<String> = violations
        .iter()
        .map(|v| format!("{} ({})", v.field, v.message))
        .collect();
    if details.is_empty() {
        format!("{} invalid field(s)", violations.len())
    } else {
        format!("{} invalid field(s): {}", violations.len(), details.join("; "))
    }
}
