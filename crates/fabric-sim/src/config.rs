//! Simulation configuration

use crate::failures::FailureModel;
use crate::{Result, SimError};
use arbor_routing::Algorithm;
use clos_fabric::Variant;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// How batch records are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One semicolon-separated line per batch
    #[default]
    Text,
    Json,
    Markdown,
}

/// Parameters of one simulation campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Clos fan-out `k`
    pub fan_out: usize,
    pub algorithms: Vec<Algorithm>,
    /// Automorphism variants (1 = fixed core, 2 = rotated core)
    pub variants: Vec<u8>,
    /// Fraction of links failed per scenario
    pub failure_rates: Vec<f64>,
    /// Fail any link, or only the all-to-one destination's uplinks
    pub failure_model: FailureModel,
    /// Scenarios drawn per failure rate
    pub repeats: usize,
    /// Seed for failure sampling and PRNB switching
    pub seed: u64,
    /// `uniform`, `all-to-one:<dest>`, or a matrix file path
    pub traffic: String,
    /// Label for output records; derived from `traffic` when empty
    pub tag: String,
    /// Abort a batch that runs longer than this
    pub deadline_secs: Option<f64>,
    pub output: OutputFormat,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fan_out: 80,
            algorithms: vec![Algorithm::DetCirc],
            variants: vec![1, 2],
            failure_rates: (0..16).map(|i| i as f64 * 0.02).collect(),
            failure_model: FailureModel::Random,
            repeats: 3,
            seed: 123,
            traffic: "all-to-one:0".to_string(),
            tag: String::new(),
            deadline_secs: None,
            output: OutputFormat::Text,
        }
    }
}

impl SimConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON config; absent fields keep their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
        info!(path = %path.display(), "Loaded simulation config");
        Ok(config)
    }

    pub fn fan_out(mut self, k: usize) -> Self {
        self.fan_out = k;
        self
    }

    pub fn algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.algorithms = algorithms;
        self
    }

    pub fn variants(mut self, variants: Vec<u8>) -> Self {
        self.variants = variants;
        self
    }

    pub fn failure_rates(mut self, rates: Vec<f64>) -> Self {
        self.failure_rates = rates;
        self
    }

    pub fn failure_model(mut self, model: FailureModel) -> Self {
        self.failure_model = model;
        self
    }

    pub fn repeats(mut self, n: usize) -> Self {
        self.repeats = n;
        self
    }

    pub fn seed(mut self, s: u64) -> Self {
        self.seed = s;
        self
    }

    pub fn traffic(mut self, spec: &str) -> Self {
        self.traffic = spec.to_string();
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tag = tag.to_string();
        self
    }

    pub fn deadline_secs(mut self, secs: f64) -> Self {
        self.deadline_secs = Some(secs);
        self
    }

    pub fn output(mut self, format: OutputFormat) -> Self {
        self.output = format;
        self
    }

    /// Reject values no batch could run with
    pub fn validate(&self) -> Result<()> {
        if self.algorithms.is_empty() {
            return Err(SimError::Config("no algorithms selected".into()));
        }
        if self.repeats == 0 {
            return Err(SimError::Config("repeats must be at least 1".into()));
        }
        if let Some(&rate) = self
            .failure_rates
            .iter()
            .find(|r| !(0.0..=1.0).contains(*r))
        {
            return Err(SimError::InvalidRate(rate));
        }
        if matches!(self.deadline_secs, Some(s) if !(s > 0.0 && s.is_finite())) {
            return Err(SimError::Config("deadline must be a positive number of seconds".into()));
        }
        if self.failure_model == FailureModel::Destination && self.destination().is_none() {
            return Err(SimError::Config(format!(
                "destination failures need all-to-one traffic, got {:?}",
                self.traffic
            )));
        }
        self.parsed_variants()?;
        Ok(())
    }

    pub fn parsed_variants(&self) -> Result<Vec<Variant>> {
        if self.variants.is_empty() {
            return Err(SimError::Config("no automorphism variants selected".into()));
        }
        Ok(self
            .variants
            .iter()
            .map(|&v| Variant::try_from(v))
            .collect::<clos_fabric::Result<Vec<_>>>()?)
    }

    /// Destination index of an `all-to-one:<dest>` traffic spec
    pub fn destination(&self) -> Option<usize> {
        self.traffic
            .trim()
            .strip_prefix("all-to-one:")?
            .trim()
            .trim_start_matches("acc")
            .parse()
            .ok()
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs_f64)
    }

    /// Record label: the explicit tag, else one derived from the traffic spec
    pub fn record_tag(&self) -> String {
        if !self.tag.is_empty() {
            return self.tag.clone();
        }
        let spec = self.traffic.trim();
        if spec.starts_with("all-to-one") {
            "A2O".to_string()
        } else if spec == "uniform" {
            "UNIFORM".to_string()
        } else {
            Path::new(spec)
                .file_stem()
                .map(|s| s.to_string_lossy().to_uppercase())
                .unwrap_or_else(|| "CUSTOM".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimConfig::default();
        config.validate().unwrap();
        assert_eq!(config.failure_rates.len(), 16);
        assert_eq!(config.parsed_variants().unwrap(), vec![Variant::FixedCore, Variant::RotatedCore]);
        assert_eq!(config.record_tag(), "A2O");
    }

    #[test]
    fn test_builder_and_validation() {
        let config = SimConfig::new()
            .fan_out(4)
            .algorithms(vec![Algorithm::Prnb, Algorithm::SquareOne])
            .failure_rates(vec![0.0, 0.1])
            .traffic("uniform")
            .output(OutputFormat::Json);
        config.validate().unwrap();
        assert_eq!(config.record_tag(), "UNIFORM");

        assert!(matches!(
            config.clone().failure_rates(vec![1.5]).validate(),
            Err(SimError::InvalidRate(r)) if r == 1.5
        ));
        assert!(matches!(
            config.clone().variants(vec![3]).validate(),
            Err(SimError::Fabric(_))
        ));
        assert!(config.clone().repeats(0).validate().is_err());
        assert!(config.clone().deadline_secs(-1.0).validate().is_err());
        assert_eq!(config.tag("GRAVITY").record_tag(), "GRAVITY");
    }

    #[test]
    fn test_destination_model_needs_all_to_one() {
        let config = SimConfig::new().fan_out(4).failure_model(FailureModel::Destination);
        config.validate().unwrap();
        assert_eq!(config.destination(), Some(0));
        assert_eq!(config.clone().traffic("all-to-one:acc5").destination(), Some(5));

        assert!(matches!(
            config.clone().traffic("uniform").validate(),
            Err(SimError::Config(_))
        ));
        assert!(config.clone().traffic("all-to-one:x").validate().is_err());
        assert_eq!(SimConfig::new().traffic("uniform").destination(), None);
        SimConfig::new().traffic("uniform").validate().unwrap();
    }

    #[test]
    fn test_load_partial_json() {
        let json = r#"{"fan_out": 8, "algorithms": ["bibd", "sq1"], "output": "markdown", "failure_model": "destination"}"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = SimConfig::load(file.path()).unwrap();
        assert_eq!(config.fan_out, 8);
        assert_eq!(config.algorithms, vec![Algorithm::Bibd, Algorithm::SquareOne]);
        assert_eq!(config.output, OutputFormat::Markdown);
        assert_eq!(config.failure_model, FailureModel::Destination);
        assert_eq!(config.repeats, 3);
    }
}
