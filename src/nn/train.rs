use super::error::Error;
use candle_core::{DType, Tensor, Var};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, SGD, loss};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Loss between model output and (normalized) targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    /// Mean squared error over `(B, 1)` predictions.
    Mse,
    /// Negative log-likelihood over `(B, 2)` log-probabilities and integer labels.
    Nll,
}

impl Criterion {
    pub fn for_task(classification: bool) -> Self {
        if classification { Self::Nll } else { Self::Mse }
    }

    pub fn loss(&self, output: &Tensor, target: &Tensor) -> Result<Tensor, Error> {
        match self {
            Criterion::Mse => Ok(loss::mse(output, &target.to_dtype(output.dtype())?)?),
            Criterion::Nll => {
                let labels = target.flatten_all()?.to_dtype(DType::U32)?;
                Ok(loss::nll(output, &labels)?)
            }
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Mse => write!(f, "MSE"),
            Criterion::Nll => write!(f, "NLL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    #[default]
    Adam,
    Sgd,
}

impl FromStr for OptimizerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "adam" => Ok(OptimizerKind::Adam),
            "sgd" => Ok(OptimizerKind::Sgd),
            _ => Err(Error::UnknownOptimizer(s.to_string())),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerKind::Adam => write!(f, "Adam"),
            OptimizerKind::Sgd => write!(f, "SGD"),
        }
    }
}

/// Optimizer choice and its hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerConfig {
    pub kind: OptimizerKind,
    pub learning_rate: f64,
    pub weight_decay: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            kind: OptimizerKind::Adam,
            learning_rate: 0.01,
            weight_decay: 0.0,
        }
    }
}

/// A constructed optimizer over a fixed set of variables.
pub enum ModelOptimizer {
    Adam(AdamW),
    Sgd(SGD),
}

impl fmt::Debug for ModelOptimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelOptimizer")
            .field("kind", &self.kind())
            .field("learning_rate", &self.learning_rate())
            .finish()
    }
}

impl ModelOptimizer {
    pub fn kind(&self) -> OptimizerKind {
        match self {
            ModelOptimizer::Adam(_) => OptimizerKind::Adam,
            ModelOptimizer::Sgd(_) => OptimizerKind::Sgd,
        }
    }

    pub fn backward_step(&mut self, loss: &Tensor) -> Result<(), Error> {
        match self {
            ModelOptimizer::Adam(opt) => opt.backward_step(loss)?,
            ModelOptimizer::Sgd(opt) => opt.backward_step(loss)?,
        }
        Ok(())
    }

    pub fn learning_rate(&self) -> f64 {
        match self {
            ModelOptimizer::Adam(opt) => opt.learning_rate(),
            ModelOptimizer::Sgd(opt) => opt.learning_rate(),
        }
    }
}

impl OptimizerConfig {
    pub fn build(&self, vars: Vec<Var>) -> Result<ModelOptimizer, Error> {
        if self.learning_rate <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "learning rate {} must be positive",
                self.learning_rate
            )));
        }
        match self.kind {
            OptimizerKind::Adam => {
                let params = ParamsAdamW {
                    lr: self.learning_rate,
                    weight_decay: self.weight_decay,
                    ..ParamsAdamW::default()
                };
                Ok(ModelOptimizer::Adam(AdamW::new(vars, params)?))
            }
            OptimizerKind::Sgd => {
                if self.weight_decay != 0.0 {
                    tracing::warn!(
                        weight_decay = self.weight_decay,
                        "weight decay is ignored by SGD"
                    );
                }
                Ok(ModelOptimizer::Sgd(SGD::new(vars, self.learning_rate)?))
            }
        }
    }
}
