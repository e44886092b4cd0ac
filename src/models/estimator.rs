//! Regression model artifacts
//!
//! Two backends: a portable JSON export of the fitted estimator (linear model,
//! single regression tree or random forest) and, behind the `onnx` feature,
//! an ONNX graph executed by ONNX Runtime.

use crate::error::InferenceError;
use serde::{Deserialize, Serialize};

/// Scores one preprocessed feature row
pub trait RiskModel: Send + Sync {
    /// Model type reported as `model_used`
    fn name(&self) -> &str;

    /// Expected input width, if the artifact declares one
    fn n_features_in(&self) -> Option<usize>;

    fn predict(&self, features: &[f64]) -> Result<f64, InferenceError>;
}

/// Fitted regression tree in flattened array form.
///
/// Node `i` is a leaf when `children_left[i] == -1`. Internal nodes send a
/// sample left when `x[feature[i]] <= threshold[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TreeArrays", into = "TreeArrays")]
pub struct RegressionTree {
    arrays: TreeArrays,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeArrays {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<f64>,
}

impl TryFrom<TreeArrays> for RegressionTree {
    type Error = String;

    fn try_from(arrays: TreeArrays) -> Result<Self, Self::Error> {
        let n = arrays.value.len();
        if n == 0 {
            return Err("tree has no nodes".to_string());
        }
        if arrays.children_left.len() != n
            || arrays.children_right.len() != n
            || arrays.feature.len() != n
            || arrays.threshold.len() != n
        {
            return Err(format!("tree arrays must all have {} entries", n));
        }

        for i in 0..n {
            if !arrays.value[i].is_finite() {
                return Err(format!("node {} has a non-finite value", i));
            }
            let (left, right) = (arrays.children_left[i], arrays.children_right[i]);
            if left == -1 {
                continue;
            }
            // children are stored after their parent, which also rules out cycles
            for child in [left, right] {
                if child <= i as i64 || child >= n as i64 {
                    return Err(format!("node {} has invalid child index {}", i, child));
                }
            }
            if arrays.feature[i] < 0 {
                return Err(format!("node {} splits on negative feature index", i));
            }
            if !arrays.threshold[i].is_finite() {
                return Err(format!("node {} has a non-finite threshold", i));
            }
        }

        Ok(Self { arrays })
    }
}

impl From<RegressionTree> for TreeArrays {
    fn from(tree: RegressionTree) -> Self {
        tree.arrays
    }
}

impl RegressionTree {
    pub fn node_count(&self) -> usize {
        self.arrays.value.len()
    }

    /// Largest feature index used by any split
    pub fn max_feature(&self) -> Option<usize> {
        (0..self.node_count())
            .filter(|&i| self.arrays.children_left[i] != -1)
            .map(|i| self.arrays.feature[i] as usize)
            .max()
    }

    pub fn evaluate(&self, x: &[f64]) -> Result<f64, InferenceError> {
        let a = &self.arrays;
        let mut node = 0usize;

        while a.children_left[node] != -1 {
            let feature = a.feature[node] as usize;
            let value = x.get(feature).ok_or_else(|| {
                InferenceError::Predict(format!(
                    "split on feature {} but row has {} features",
                    feature,
                    x.len()
                ))
            })?;
            node = if *value <= a.threshold[node] {
                a.children_left[node] as usize
            } else {
                a.children_right[node] as usize
            };
        }

        Ok(a.value[node])
    }
}

/// JSON model artifact, tagged by estimator type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model_type")]
pub enum ModelArtifact {
    LinearRegression {
        n_features_in: usize,
        coefficients: Vec<f64>,
        intercept: f64,
    },
    DecisionTreeRegressor {
        n_features_in: usize,
        tree: RegressionTree,
    },
    RandomForestRegressor {
        n_features_in: usize,
        trees: Vec<RegressionTree>,
    },
}

impl ModelArtifact {
    /// Cross-field checks run once at load time
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ModelArtifact::LinearRegression {
                n_features_in,
                coefficients,
                intercept,
            } => {
                if coefficients.len() != *n_features_in {
                    return Err(format!(
                        "{} coefficients for {} input features",
                        coefficients.len(),
                        n_features_in
                    ));
                }
                if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
                    return Err("coefficients must be finite".to_string());
                }
                Ok(())
            }
            ModelArtifact::DecisionTreeRegressor {
                n_features_in,
                tree,
            } => check_tree_width(tree, *n_features_in),
            ModelArtifact::RandomForestRegressor {
                n_features_in,
                trees,
            } => {
                if trees.is_empty() {
                    return Err("random forest has no trees".to_string());
                }
                trees
                    .iter()
                    .try_for_each(|tree| check_tree_width(tree, *n_features_in))
            }
        }
    }
}

fn check_tree_width(tree: &RegressionTree, n_features_in: usize) -> Result<(), String> {
    match tree.max_feature() {
        Some(max) if max >= n_features_in => Err(format!(
            "tree splits on feature {} but model has {} input features",
            max, n_features_in
        )),
        _ => Ok(()),
    }
}

impl RiskModel for ModelArtifact {
    fn name(&self) -> &str {
        match self {
            ModelArtifact::LinearRegression { .. } => "LinearRegression",
            ModelArtifact::DecisionTreeRegressor { .. } => "DecisionTreeRegressor",
            ModelArtifact::RandomForestRegressor { .. } => "RandomForestRegressor",
        }
    }

    fn n_features_in(&self) -> Option<usize> {
        match self {
            ModelArtifact::LinearRegression { n_features_in, .. }
            | ModelArtifact::DecisionTreeRegressor { n_features_in, .. }
            | ModelArtifact::RandomForestRegressor { n_features_in, .. } => Some(*n_features_in),
        }
    }

    fn predict(&self, features: &[f64]) -> Result<f64, InferenceError> {
        if let Some(expected) = self.n_features_in() {
            if features.len() != expected {
                return Err(InferenceError::Predict(format!(
                    "X has {} features, but {} is expecting {} features as input",
                    features.len(),
                    self.name(),
                    expected
                )));
            }
        }

        match self {
            ModelArtifact::LinearRegression {
                coefficients,
                intercept,
                ..
            } => Ok(intercept
                + coefficients
                    .iter()
                    .zip(features)
                    .map(|(c, x)| c * x)
                    .sum::<f64>()),
            ModelArtifact::DecisionTreeRegressor { tree, .. } => tree.evaluate(features),
            ModelArtifact::RandomForestRegressor { trees, .. } => {
                let mut total = 0.0;
                for tree in trees {
                    total += tree.evaluate(features)?;
                }
                Ok(total / trees.len() as f64)
            }
        }
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxModel;

#[cfg(feature = "onnx")]
mod onnx {
    use super::RiskModel;
    use crate::error::InferenceError;
    use anyhow::{Context, Result};
    use ort::session::{builder::GraphOptimizationLevel, Session};
    use ort::value::Tensor;
    use std::path::Path;
    use std::sync::Mutex;
    use tracing::info;

    /// Regressor exported to ONNX, run through ONNX Runtime
    pub struct OnnxModel {
        name: String,
        session: Mutex<Session>,
        input_name: String,
        output_name: String,
    }

    impl OnnxModel {
        pub fn load<P: AsRef<Path>>(path: P, name: &str, threads: usize) -> Result<Self> {
            let path = path.as_ref();

            info!(model = %name, path = %path.display(), threads = threads, "Loading ONNX model");

            let session = Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .with_intra_threads(threads)?
                .commit_from_file(path)
                .context(format!("Failed to load model from {:?}", path))?;

            let input_name = session
                .inputs
                .first()
                .map(|i| i.name.clone())
                .unwrap_or_else(|| "float_input".to_string());

            // regressors exported from sklearn name their output "variable"
            let output_name = session
                .outputs
                .iter()
                .find(|o| o.name.contains("variable") || o.name.contains("output"))
                .or_else(|| session.outputs.first())
                .map(|o| o.name.clone())
                .unwrap_or_else(|| "variable".to_string());

            info!(
                model = %name,
                input = %input_name,
                output = %output_name,
                "ONNX model loaded"
            );

            Ok(Self {
                name: name.to_string(),
                session: Mutex::new(session),
                input_name,
                output_name,
            })
        }

        fn run(&self, features: &[f64]) -> Result<f64> {
            let row: Vec<f32> = features.iter().map(|&v| v as f32).collect();
            let shape = vec![1_i64, row.len() as i64];
            let input_tensor =
                Tensor::from_array((shape, row)).context("Failed to create input tensor")?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| anyhow::anyhow!("ONNX session lock poisoned"))?;
            let outputs = session.run(ort::inputs![self.input_name.as_str() => input_tensor])?;

            let output = outputs
                .get(self.output_name.as_str())
                .with_context(|| format!("model has no output named {}", self.output_name))?;
            let (_, data) = output.try_extract_tensor::<f32>()?;

            let score = data
                .first()
                .map(|&v| v as f64)
                .context("model returned an empty tensor")?;
            Ok(score)
        }
    }

    impl RiskModel for OnnxModel {
        fn name(&self) -> &str {
            &self.name
        }

        fn n_features_in(&self) -> Option<usize> {
            None
        }

        fn predict(&self, features: &[f64]) -> Result<f64, InferenceError> {
            self.run(features)
                .map_err(|e| InferenceError::Predict(format!("{:#}", e)))
        }
    }
}
