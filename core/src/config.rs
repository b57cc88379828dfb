use crate::generator::{GeneratorParams, StratificationFactor, DEFAULT_BLOCK_SIZE, DEFAULT_OVERSAMPLE};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SOURCE: &str = "docs/randomization_tutorial.md";
pub const DEFAULT_OUTPUT: &str = "output/randomization_tutorial.html";
pub const DEFAULT_SEED: u64 = 42;

/// Parameters for the upload table written by the export job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub target_n:   usize,
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    #[serde(default = "default_oversample")]
    pub oversample: f64,
    #[serde(default)]
    pub factors:    Vec<StratificationFactor>,
}

impl ExportConfig {
    pub fn params(&self) -> GeneratorParams {
        GeneratorParams {
            total_target_n:    self.target_n,
            block_size:        self.block_size,
            oversample_factor: self.oversample,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            target_n:   100,
            block_size: DEFAULT_BLOCK_SIZE,
            oversample: DEFAULT_OVERSAMPLE,
            factors:    vec![
                StratificationFactor::new("site", &["1", "2"]),
                StratificationFactor::new("age", &["under50", "50plus"]),
            ],
        }
    }
}

fn default_block_size() -> usize { DEFAULT_BLOCK_SIZE }
fn default_oversample() -> f64 { DEFAULT_OVERSAMPLE }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default = "default_seed")]
    pub seed:   u64,
    #[serde(default)]
    pub export: ExportConfig,
}

fn default_source() -> String { DEFAULT_SOURCE.to_string() }
fn default_output() -> String { DEFAULT_OUTPUT.to_string() }
fn default_seed() -> u64 { DEFAULT_SEED }

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            output: default_output(),
            seed:   DEFAULT_SEED,
            export: ExportConfig::default(),
        }
    }
}

impl ReportConfig {
    /// Load from a JSON file. Missing keys fall back to defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: ReportConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.export.params().validate()?;
        Ok(config)
    }

    /// Small, fast configuration for tests.
    pub fn default_test() -> Self {
        Self {
            seed: 7,
            export: ExportConfig {
                target_n:   8,
                block_size: 4,
                oversample: 1.0,
                factors:    vec![StratificationFactor::new("site", &["a", "b"])],
            },
            ..Self::default()
        }
    }
}
