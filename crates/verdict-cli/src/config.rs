use anyhow::{Context, Result};
use std::path::Path;

use verdict_evaluator::{EvaluatorConfig, FraudDetection};

/// Load the evaluator config from a TOML file, or the defaults when no file
/// is given.
pub fn load(path: Option<&Path>) -> Result<EvaluatorConfig> {
    let Some(path) = path else {
        return Ok(EvaluatorConfig::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let config: EvaluatorConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    Ok(config)
}

/// Apply command-line flags on top of the loaded config.
pub fn apply_overrides(
    config: &mut EvaluatorConfig,
    required_committee_size: Option<usize>,
    no_fraud_detection: bool,
) {
    if let Some(size) = required_committee_size {
        config.required_committee_size = size;
    }
    if no_fraud_detection {
        config.fraud_detection = FraudDetection::Disabled;
    }
}
