use super::error::Error;

/// Expands a scalar distance onto a bank of Gaussian radial basis functions.
///
/// Filter centres run from `dmin` to `dmax` inclusive in steps of `step`;
/// component `k` of the expansion is `exp(-(d - μ_k)² / var²)`.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianDistance {
    centers: Vec<f64>,
    var: f64,
}

impl GaussianDistance {
    /// `var` defaults to `step` when `None`.
    pub fn new(dmin: f64, dmax: f64, step: f64, var: Option<f64>) -> Result<Self, Error> {
        if dmin >= dmax {
            return Err(Error::InvalidFilter(format!(
                "dmin ({dmin}) must be below dmax ({dmax})"
            )));
        }
        if step <= 0.0 || dmax - dmin <= step {
            return Err(Error::InvalidFilter(format!(
                "step ({step}) must be positive and smaller than dmax - dmin"
            )));
        }
        let var = var.unwrap_or(step);
        if var <= 0.0 {
            return Err(Error::InvalidFilter(format!("var ({var}) must be positive")));
        }

        let n = ((dmax - dmin) / step).round() as usize + 1;
        let centers = (0..n).map(|k| dmin + k as f64 * step).collect();
        Ok(Self { centers, var })
    }

    /// Number of filters, i.e. the length of each expanded vector.
    #[inline]
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    pub fn centers(&self) -> &[f64] {
        &self.centers
    }

    /// Appends the expansion of `distance` to `out`.
    pub fn expand_into(&self, distance: f64, out: &mut Vec<f32>) {
        let inv_var_sq = 1.0 / (self.var * self.var);
        out.extend(
            self.centers
                .iter()
                .map(|mu| (-(distance - mu).powi(2) * inv_var_sq).exp() as f32),
        );
    }

    pub fn expand(&self, distance: f64) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.len());
        self.expand_into(distance, &mut out);
        out
    }
}
