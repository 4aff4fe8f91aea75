// training/config.rs

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Knobs for greedy layerwise autoencoder pretraining (stage 1).
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PretrainConfig {
    pub layer_sizes: Vec<usize>,
    pub corruption: f32,
    pub batch_size: usize,
    pub iterations: usize,
    pub regularization: f32,
    pub lr: f64,
    pub seed: u64,
}

impl Default for PretrainConfig {
    fn default() -> Self {
        Self {
            layer_sizes: vec![300],
            corruption: 0.2,
            batch_size: 1000,
            iterations: 3,
            regularization: 0.01,
            lr: 0.1,
            seed: 42,
        }
    }
}

impl PretrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.layer_sizes.is_empty() {
            bail!("pretraining needs at least one layer size");
        }
        if !(0.0..=1.0).contains(&self.corruption) {
            bail!("corruption {} outside [0, 1]", self.corruption);
        }
        if self.batch_size == 0 {
            bail!("batch size must be positive");
        }
        Ok(())
    }
}

/// Knobs for pair-composition fine tuning (stages 2 and 3).
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct FineTuneConfig {
    pub layer_sizes: Vec<usize>,
    pub batch_size: usize,
    pub iterations: usize,
    pub regularization: f32,
    pub lr: f64,
    pub min_lr: f64,
    /// Relative per-epoch cost change below which an epoch counts towards
    /// convergence; five consecutive such epochs stop the run.
    pub tolerance: f64,
    pub update_empty_vectors: bool,
    pub update_event_vectors: bool,
    pub update_input_vectors: bool,
    pub seed: u64,
}

impl Default for FineTuneConfig {
    fn default() -> Self {
        Self {
            layer_sizes: vec![100],
            batch_size: 100,
            iterations: 10,
            regularization: 0.01,
            lr: 0.1,
            min_lr: 0.01,
            tolerance: 5e-4,
            update_empty_vectors: false,
            update_event_vectors: false,
            update_input_vectors: false,
            seed: 42,
        }
    }
}

impl FineTuneConfig {
    /// Whether snapshots need the `_full` variant carrying the embedding
    /// and event-network weights in addition to the pair network.
    pub fn updates_composition(&self) -> bool {
        self.update_empty_vectors || self.update_event_vectors || self.update_input_vectors
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch size must be positive");
        }
        if self.min_lr > self.lr {
            bail!("min learning rate {} exceeds learning rate {}", self.min_lr, self.lr);
        }
        Ok(())
    }
}

/// Parses a comma-separated hidden-size list, e.g. "400,300".
pub fn parse_layer_sizes(s: &str) -> Result<Vec<usize>> {
    s.split(',')
        .map(|p| {
            p.trim()
                .parse::<usize>()
                .with_context(|| format!("bad layer size '{}'", p))
        })
        .collect()
}

pub fn load_pretrain_config(path: &std::path::Path) -> Result<PretrainConfig> {
    let txt = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    Ok(toml::from_str(&txt)?)
}

pub fn load_finetune_config(path: &std::path::Path) -> Result<FineTuneConfig> {
    let txt = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    Ok(toml::from_str(&txt)?)
}
