use super::error::Error;
use crate::data::{DatasetConfig, LoaderConfig};
use crate::nn::{ModelConfig, OptimizerConfig, OptimizerKind, PoolFunc};
use serde::Deserialize;
use std::sync::OnceLock;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../../resources/explore.toml");

static DEFAULT_SETTINGS: OnceLock<ExploreSettings> = OnceLock::new();

/// Hyper-parameters of an exploration run, read from TOML.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ExploreSettings {
    #[serde(default)]
    pub dataset: DatasetSettings,
    #[serde(default)]
    pub loader: LoaderSettings,
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub optimizer: OptimizerSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetSettings {
    #[serde(default = "default_max_num_nbr")]
    pub max_num_nbr: usize,
    #[serde(default = "default_radius")]
    pub radius: f64,
    #[serde(default)]
    pub dmin: f64,
    #[serde(default = "default_step")]
    pub step: f64,
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,
}

fn default_max_num_nbr() -> usize {
    12
}
fn default_radius() -> f64 {
    8.0
}
fn default_step() -> f64 {
    0.2
}
fn default_random_seed() -> u64 {
    123
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            max_num_nbr: default_max_num_nbr(),
            radius: default_radius(),
            dmin: 0.0,
            step: default_step(),
            random_seed: default_random_seed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub train_ratio: Option<f64>,
    #[serde(default = "default_holdout_ratio")]
    pub val_ratio: f64,
    #[serde(default = "default_holdout_ratio")]
    pub test_ratio: f64,
    #[serde(default)]
    pub train_size: Option<usize>,
    #[serde(default)]
    pub val_size: Option<usize>,
    #[serde(default)]
    pub test_size: Option<usize>,
    #[serde(default = "default_return_test")]
    pub return_test: bool,
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    /// Upper bound on the number of targets used to fit the normalizer.
    #[serde(default = "default_normalizer_samples")]
    pub normalizer_samples: usize,
}

fn default_batch_size() -> usize {
    256
}
fn default_holdout_ratio() -> f64 {
    0.1
}
fn default_return_test() -> bool {
    true
}
fn default_num_workers() -> usize {
    1
}
fn default_normalizer_samples() -> usize {
    500
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            train_ratio: None,
            val_ratio: default_holdout_ratio(),
            test_ratio: default_holdout_ratio(),
            train_size: None,
            val_size: None,
            test_size: None,
            return_test: default_return_test(),
            num_workers: default_num_workers(),
            normalizer_samples: default_normalizer_samples(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSettings {
    #[serde(default = "default_atom_fea_len")]
    pub atom_fea_len: usize,
    #[serde(default = "default_n_conv")]
    pub n_conv: usize,
    #[serde(default = "default_h_fea_len")]
    pub h_fea_len: usize,
    #[serde(default = "default_n_h")]
    pub n_h: usize,
    #[serde(default)]
    pub pool: PoolFunc,
    #[serde(default)]
    pub classification: bool,
    #[serde(default = "default_dropout")]
    pub dropout: f32,
}

fn default_atom_fea_len() -> usize {
    64
}
fn default_n_conv() -> usize {
    3
}
fn default_h_fea_len() -> usize {
    128
}
fn default_n_h() -> usize {
    1
}
fn default_dropout() -> f32 {
    0.5
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            atom_fea_len: default_atom_fea_len(),
            n_conv: default_n_conv(),
            h_fea_len: default_h_fea_len(),
            n_h: default_n_h(),
            pool: PoolFunc::Mean,
            classification: false,
            dropout: default_dropout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizerSettings {
    #[serde(default)]
    pub kind: OptimizerKind,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default)]
    pub weight_decay: f64,
}

fn default_learning_rate() -> f64 {
    0.01
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            kind: OptimizerKind::Adam,
            learning_rate: default_learning_rate(),
            weight_decay: 0.0,
        }
    }
}

impl DatasetSettings {
    /// Copies the featurization parameters onto `config`, keeping its paths.
    pub fn apply(&self, config: DatasetConfig) -> DatasetConfig {
        DatasetConfig {
            max_num_nbr: self.max_num_nbr,
            radius: self.radius,
            dmin: self.dmin,
            step: self.step,
            random_seed: self.random_seed,
            ..config
        }
    }
}

impl LoaderSettings {
    pub fn to_config(&self) -> LoaderConfig {
        LoaderConfig {
            batch_size: self.batch_size,
            train_ratio: self.train_ratio,
            val_ratio: self.val_ratio,
            test_ratio: self.test_ratio,
            train_size: self.train_size,
            val_size: self.val_size,
            test_size: self.test_size,
            return_test: self.return_test,
            num_workers: self.num_workers,
        }
    }
}

impl ModelSettings {
    pub fn to_config(&self, orig_atom_fea_len: usize, nbr_fea_len: usize) -> ModelConfig {
        ModelConfig {
            orig_atom_fea_len,
            nbr_fea_len,
            atom_fea_len: self.atom_fea_len,
            n_conv: self.n_conv,
            h_fea_len: self.h_fea_len,
            n_h: self.n_h,
            pool: self.pool,
            classification: self.classification,
            dropout: self.dropout,
        }
    }
}

impl OptimizerSettings {
    pub fn to_config(&self) -> OptimizerConfig {
        OptimizerConfig {
            kind: self.kind,
            learning_rate: self.learning_rate,
            weight_decay: self.weight_decay,
        }
    }
}

/// Parses `custom_toml`, or returns the embedded defaults when `None`.
pub fn load_settings(custom_toml: Option<&str>) -> Result<ExploreSettings, Error> {
    match custom_toml {
        Some(toml) => Ok(toml::from_str(toml)?),
        None => Ok(default_settings().clone()),
    }
}

pub fn default_settings() -> &'static ExploreSettings {
    DEFAULT_SETTINGS.get_or_init(|| {
        toml::from_str(DEFAULT_SETTINGS_TOML)
            .expect("Failed to parse embedded explore settings. This is a library bug.")
    })
}
