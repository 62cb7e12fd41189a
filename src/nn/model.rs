use super::conv::{ConvLayer, softplus};
use super::error::Error;
use crate::data::Batch;
use candle_core::{D, Module, Tensor};
use candle_nn::{Dropout, Linear, VarBuilder, linear, ops};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// How atom features are reduced to one vector per crystal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolFunc {
    #[default]
    Mean,
    Sum,
    Max,
}

impl fmt::Display for PoolFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolFunc::Mean => write!(f, "mean"),
            PoolFunc::Sum => write!(f, "sum"),
            PoolFunc::Max => write!(f, "max"),
        }
    }
}

impl FromStr for PoolFunc {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mean" => Ok(PoolFunc::Mean),
            "sum" => Ok(PoolFunc::Sum),
            "max" => Ok(PoolFunc::Max),
            _ => Err(Error::UnknownPool(s.to_string())),
        }
    }
}

/// Architecture of a [`CrystalGraphConvNet`].
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub orig_atom_fea_len: usize,
    pub nbr_fea_len: usize,
    pub atom_fea_len: usize,
    pub n_conv: usize,
    pub h_fea_len: usize,
    /// Hidden layers after pooling, counting the `conv_to_fc` layer.
    pub n_h: usize,
    pub pool: PoolFunc,
    /// Two-class log-probabilities instead of a single regression output.
    pub classification: bool,
    /// Dropout probability, used only for classification.
    pub dropout: f32,
}

impl ModelConfig {
    pub fn new(orig_atom_fea_len: usize, nbr_fea_len: usize) -> Self {
        Self {
            orig_atom_fea_len,
            nbr_fea_len,
            atom_fea_len: 64,
            n_conv: 3,
            h_fea_len: 128,
            n_h: 1,
            pool: PoolFunc::Mean,
            classification: false,
            dropout: 0.5,
        }
    }

    fn validate(&self) -> Result<(), Error> {
        let sizes = [
            ("orig_atom_fea_len", self.orig_atom_fea_len),
            ("nbr_fea_len", self.nbr_fea_len),
            ("atom_fea_len", self.atom_fea_len),
            ("h_fea_len", self.h_fea_len),
            ("n_h", self.n_h),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, v)| *v == 0) {
            return Err(Error::InvalidConfig(format!("{name} must be positive")));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::InvalidConfig(format!(
                "dropout {} is outside [0, 1)",
                self.dropout
            )));
        }
        Ok(())
    }
}

/// Crystal graph convolutional network.
///
/// Atom features are embedded, refined by `n_conv` [`ConvLayer`]s, pooled per
/// crystal, and passed through a small feed-forward head.
#[derive(Debug, Clone)]
pub struct CrystalGraphConvNet {
    embedding: Linear,
    convs: Vec<ConvLayer>,
    conv_to_fc: Linear,
    fcs: Vec<Linear>,
    fc_out: Linear,
    pool: PoolFunc,
    dropout: Option<Dropout>,
}

impl CrystalGraphConvNet {
    pub fn new(config: &ModelConfig, vb: VarBuilder) -> Result<Self, Error> {
        config.validate()?;

        let embedding = linear(config.orig_atom_fea_len, config.atom_fea_len, vb.pp("embedding"))?;
        let convs = (0..config.n_conv)
            .map(|i| ConvLayer::new(config.atom_fea_len, config.nbr_fea_len, vb.pp(format!("convs.{i}"))))
            .collect::<Result<Vec<_>, _>>()?;
        let conv_to_fc = linear(config.atom_fea_len, config.h_fea_len, vb.pp("conv_to_fc"))?;
        let fcs = (0..config.n_h - 1)
            .map(|i| linear(config.h_fea_len, config.h_fea_len, vb.pp(format!("fcs.{i}"))))
            .collect::<Result<Vec<_>, _>>()?;
        let out_len = if config.classification { 2 } else { 1 };
        let fc_out = linear(config.h_fea_len, out_len, vb.pp("fc_out"))?;

        Ok(Self {
            embedding,
            convs,
            conv_to_fc,
            fcs,
            fc_out,
            pool: config.pool,
            dropout: config.classification.then(|| Dropout::new(config.dropout)),
        })
    }

    pub fn is_classifier(&self) -> bool {
        self.dropout.is_some()
    }

    /// Returns `(B, 1)` predictions, or `(B, 2)` log-probabilities for a classifier.
    pub fn forward(
        &self,
        atom_fea: &Tensor,
        nbr_fea: &Tensor,
        nbr_fea_idx: &Tensor,
        crystal_atom_idx: &[Range<usize>],
        train: bool,
    ) -> Result<Tensor, Error> {
        let mut atom_fea = self.embedding.forward(atom_fea)?;
        for conv in &self.convs {
            atom_fea = conv.forward(&atom_fea, nbr_fea, nbr_fea_idx, train)?;
        }

        let crys_fea = self.pooling(&atom_fea, crystal_atom_idx)?;
        let crys_fea = self.conv_to_fc.forward(&softplus(&crys_fea)?)?;
        let mut crys_fea = softplus(&crys_fea)?;
        if let Some(dropout) = &self.dropout {
            crys_fea = dropout.forward(&crys_fea, train)?;
        }
        for fc in &self.fcs {
            crys_fea = softplus(&fc.forward(&crys_fea)?)?;
        }

        let out = self.fc_out.forward(&crys_fea)?;
        if self.is_classifier() {
            Ok(ops::log_softmax(&out, D::Minus1)?)
        } else {
            Ok(out)
        }
    }

    pub fn forward_batch(&self, batch: &Batch, train: bool) -> Result<Tensor, Error> {
        self.forward(
            &batch.atom_fea,
            &batch.nbr_fea,
            &batch.nbr_fea_idx,
            &batch.crystal_atom_idx,
            train,
        )
    }

    /// Reduces the rows of each crystal to one `(1, A)` vector and stacks them.
    fn pooling(&self, atom_fea: &Tensor, crystal_atom_idx: &[Range<usize>]) -> Result<Tensor, Error> {
        let pooled = crystal_atom_idx
            .iter()
            .map(|range| {
                let rows = atom_fea.narrow(0, range.start, range.len())?;
                match self.pool {
                    PoolFunc::Mean => rows.mean_keepdim(0),
                    PoolFunc::Sum => rows.sum_keepdim(0),
                    PoolFunc::Max => rows.max_keepdim(0),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Tensor::cat(&pooled, 0)?)
    }
}
