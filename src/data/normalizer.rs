use super::error::Error;
use candle_core::{DType, Tensor};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Standardizes targets with the mean and unbiased standard deviation of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    pub mean: f64,
    pub std: f64,
}

impl Normalizer {
    pub fn fit(sample: &Tensor) -> Result<Self, Error> {
        let values = sample.flatten_all()?.to_dtype(DType::F64)?.to_vec1::<f64>()?;
        Self::from_values(&values)
    }

    /// A sample without spread keeps its mean but gets a unit scale, so that
    /// normalized targets stay finite.
    pub fn from_values(values: &[f64]) -> Result<Self, Error> {
        let n = values.len();
        if n < 2 {
            return Err(Error::TooFewSamples(n));
        }
        let mean = values.iter().sum::<f64>() / n as f64;
        let var = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        let mut std = var.sqrt();
        if std <= f64::EPSILON * mean.abs().max(1.0) {
            warn!(mean, samples = n, "targets are constant; using unit standard deviation");
            std = 1.0;
        }
        Ok(Self { mean, std })
    }

    pub fn norm(&self, tensor: &Tensor) -> Result<Tensor, Error> {
        Ok(tensor.affine(1.0 / self.std, -self.mean / self.std)?)
    }

    pub fn denorm(&self, tensor: &Tensor) -> Result<Tensor, Error> {
        Ok(tensor.affine(self.std, self.mean)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn unbiased_statistics() {
        let n = Normalizer::from_values(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(n.mean, 2.5);
        assert!((n.std - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn norm_then_denorm_restores_values() {
        let t = Tensor::new(&[[-3.0f32], [0.5], [7.25]], &Device::Cpu).unwrap();
        let n = Normalizer::fit(&t).unwrap();

        let normed = n.norm(&t).unwrap();
        let mean: f32 = normed.mean_all().unwrap().to_scalar().unwrap();
        assert!(mean.abs() < 1e-5);

        let back = n.denorm(&normed).unwrap().to_vec2::<f32>().unwrap();
        for (a, b) in back.iter().flatten().zip([-3.0f32, 0.5, 7.25]) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn state_round_trips_through_json() {
        let n = Normalizer { mean: -1.5, std: 0.25 };
        let json = serde_json::to_string(&n).unwrap();
        assert_eq!(json, r#"{"mean":-1.5,"std":0.25}"#);
        assert_eq!(serde_json::from_str::<Normalizer>(&json).unwrap(), n);
    }

    #[test]
    fn constant_targets_get_unit_scale() {
        let n = Normalizer::from_values(&[2.0, 2.0, 2.0]).unwrap();
        assert_eq!(n, Normalizer { mean: 2.0, std: 1.0 });

        let t = Tensor::new(&[[2.0f32], [2.0]], &Device::Cpu).unwrap();
        let normed = n.norm(&t).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(normed, vec![vec![0.0], vec![0.0]]);
    }

    #[test]
    fn needs_two_samples() {
        assert!(matches!(Normalizer::from_values(&[1.0]), Err(Error::TooFewSamples(1))));
    }
}
