//! Alignment of patient records to the trained feature schema.
//!
//! The preprocessor was fitted on a frame with a fixed column order, so every
//! request is reduced to exactly that order before inference. Features the
//! record lacks are zero-filled and record fields the schema does not know
//! are dropped.

use crate::types::patient::PatientRecord;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Ordered feature names the trained pipeline expects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Arc<[String]>,
}

impl FeatureSchema {
    /// Build a schema, rejecting duplicate names (returned as the error)
    pub fn new(names: Vec<String>) -> Result<Self, String> {
        {
            let mut seen = HashSet::with_capacity(names.len());
            if let Some(dup) = names.iter().find(|n| !seen.insert(n.as_str())) {
                return Err(dup.clone());
            }
        }
        Ok(Self {
            names: names.into(),
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

/// Named view handed to the preprocessor
#[derive(Debug, Clone, Copy)]
pub struct FeatureFrame<'a> {
    pub columns: &'a [String],
    pub values: &'a [f64],
}

/// Feature values in schema order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    columns: Arc<[String]>,
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.values[i])
    }

    pub fn as_frame(&self) -> FeatureFrame<'_> {
        FeatureFrame {
            columns: &self.columns,
            values: &self.values,
        }
    }
}

/// Maps patient records onto a [`FeatureSchema`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureReconciler;

impl FeatureReconciler {
    pub fn new() -> Self {
        Self
    }

    /// Build the vector for `schema` from `record`.
    ///
    /// Never fails: absent features become `0.0`, unknown fields are ignored.
    /// An empty schema yields an empty vector.
    pub fn reconcile(&self, record: &PatientRecord, schema: &FeatureSchema) -> FeatureVector {
        let mut filled = 0usize;
        let values: Vec<f64> = schema
            .names()
            .iter()
            .map(|name| {
                record.get(name).unwrap_or_else(|| {
                    filled += 1;
                    0.0
                })
            })
            .collect();

        let dropped = record.iter().filter(|(k, _)| !schema.contains(k)).count();

        debug!(
            features = values.len(),
            zero_filled = filled,
            dropped = dropped,
            "Record reconciled to feature schema"
        );

        FeatureVector {
            columns: schema.names.clone(),
            values,
        }
    }
}
