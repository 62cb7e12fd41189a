use super::assembly::{GatedProjection, assemble_edge_features};
use super::error::Error;
use candle_core::{ModuleT, Tensor};
use candle_nn::{BatchNorm, BatchNormConfig, VarBuilder, batch_norm, ops};

/// `log(1 + exp(x))`, computed as `max(x, 0) + log(1 + exp(-|x|))`.
pub fn softplus(x: &Tensor) -> Result<Tensor, Error> {
    let tail = ((x.abs()?.neg()?.exp()? + 1.0)?).log()?;
    Ok((x.relu()? + tail)?)
}

/// One gated graph convolution over atom features.
#[derive(Debug, Clone)]
pub struct ConvLayer {
    atom_fea_len: usize,
    fc_full: GatedProjection,
    bn1: BatchNorm,
    bn2: BatchNorm,
}

impl ConvLayer {
    pub fn new(atom_fea_len: usize, nbr_fea_len: usize, vb: VarBuilder) -> Result<Self, Error> {
        let fc_full = GatedProjection::new(atom_fea_len, nbr_fea_len, vb.pp("fc_full"))?;
        let bn1 = batch_norm(2 * atom_fea_len, BatchNormConfig::default(), vb.pp("bn1"))?;
        let bn2 = batch_norm(atom_fea_len, BatchNormConfig::default(), vb.pp("bn2"))?;
        Ok(Self {
            atom_fea_len,
            fc_full,
            bn1,
            bn2,
        })
    }

    /// Updates `(N, A)` atom features from their `(N, M, D)` neighbor
    /// features and `(N, M)` neighbor indices.
    pub fn forward(
        &self,
        atom_in: &Tensor,
        nbr_fea: &Tensor,
        nbr_fea_idx: &Tensor,
        train: bool,
    ) -> Result<Tensor, Error> {
        let (n, m) = nbr_fea_idx.dims2()?;
        let a = self.atom_fea_len;

        let total = assemble_edge_features(atom_in, nbr_fea_idx, nbr_fea)?;
        let gated = self.fc_full.forward(&total)?;
        let gated = self
            .bn1
            .forward_t(&gated.reshape((n * m, 2 * a))?, train)?
            .reshape((n, m, 2 * a))?;

        let filter = ops::sigmoid(&gated.narrow(2, 0, a)?)?;
        let core = softplus(&gated.narrow(2, a, a)?)?;
        let summed = (filter * core)?.sum(1)?;
        let summed = self.bn2.forward_t(&summed, train)?;

        softplus(&(atom_in + summed)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn softplus_matches_reference_values() {
        let x = Tensor::new(&[-30.0f32, -1.0, 0.0, 1.0, 30.0], &Device::Cpu).unwrap();
        let y = softplus(&x).unwrap().to_vec1::<f32>().unwrap();
        let expected = [0.0f32, 0.313_261_7, std::f32::consts::LN_2, 1.313_261_7, 30.0];
        for (a, b) in y.iter().zip(expected) {
            assert!((a - b).abs() < 1e-5, "{a} vs {b}");
        }
    }

    #[test]
    fn preserves_atom_feature_shape() {
        let dev = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &dev);
        let conv = ConvLayer::new(8, 5, vb.pp("conv")).unwrap();

        let atom = Tensor::rand(0f32, 1f32, (3, 8), &dev).unwrap();
        let nbr = Tensor::rand(0f32, 1f32, (3, 4, 5), &dev).unwrap();
        let idx = Tensor::from_vec(vec![1u32, 2, 0, 1, 2, 0, 0, 2, 0, 1, 1, 2], (3, 4), &dev).unwrap();

        let out = conv.forward(&atom, &nbr, &idx, true).unwrap();
        assert_eq!(out.dims(), &[3, 8]);
        let values = out.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!(values.iter().all(|v| v.is_finite() && *v >= 0.0));
    }
}
