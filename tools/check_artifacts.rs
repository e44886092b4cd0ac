//! Artifact Checker
//!
//! Loads a training artifact directory and reports whether the saved feature
//! list matches the schema generation the service is expected to serve.

use anyhow::{bail, Context, Result};
use cervical_risk_api::{
    config::{AppConfig, ModelsConfig},
    models::{infer, ArtifactLoader},
    schema::SchemaVersion,
    FeatureReconciler, PatientRecord,
};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "check-artifacts",
    about = "Inspect trained model artifacts and compare the feature list"
)]
struct Cli {
    /// Read artifact locations from this configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Artifact directory, overrides the configuration
    #[arg(long, value_name = "DIR")]
    artifacts_dir: Option<PathBuf>,

    /// Schema generation the feature list should match (vif, clinical)
    #[arg(long, default_value = "vif")]
    expect: SchemaVersion,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("check_artifacts=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut models = match &cli.config {
        Some(path) => AppConfig::load_from_path(path)?.models,
        None => ModelsConfig::default(),
    };
    if let Some(dir) = cli.artifacts_dir {
        models.artifacts_dir = dir;
    }

    info!("Checking artifacts in {}", models.artifacts_dir.display());
    let set = ArtifactLoader::new(&models)
        .load()
        .context("failed to load model artifacts")?;

    let names = set.feature_schema.names();
    println!("Model type: {}", set.model.name());
    if let Some(n) = set.model.n_features_in() {
        println!("Model input width: {}", n);
    }
    println!("Number of features: {}", names.len());
    println!("\nFeatures used by the model:");
    for (i, name) in names.iter().enumerate() {
        println!("  {:2}. {}", i + 1, name);
    }

    // a zero-filled row exercises the full preprocessor + model path
    let vector = FeatureReconciler::new().reconcile(&PatientRecord::new(), &set.feature_schema);
    match infer(&vector, set.model.as_ref(), set.preprocessor.as_ref()) {
        Ok(score) => println!("\nPreprocessor accepts the feature list (baseline score {:.4})", score),
        Err(e) => println!("\nPreprocessor rejects the feature list: {}", e),
    }

    let expected = cli.expect.expected_features();
    let diff = cli.expect.diff_feature_list(names);

    println!(
        "\nExpected {} features ({} schema):",
        expected.len(),
        cli.expect
    );
    if diff.is_match() {
        println!("  Feature list matches");
        return Ok(());
    }
    for name in &diff.missing {
        println!("  missing:    {}", name);
    }
    for name in &diff.unexpected {
        println!("  unexpected: {}", name);
    }
    if diff.is_reordered() {
        println!("  Same features, different order:");
    }
    for m in &diff.misplaced {
        println!(
            "  position {:2}: expected '{}', found '{}'",
            m.index + 1,
            m.expected,
            m.actual
        );
    }

    bail!(
        "feature list does not match the {} schema ({} missing, {} unexpected, {} out of place)",
        cli.expect,
        diff.missing.len(),
        diff.unexpected.len(),
        diff.misplaced.len()
    )
}
