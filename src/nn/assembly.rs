use super::error::Error;
use candle_core::{Module, Tensor};
use candle_nn::{Linear, VarBuilder, linear};

/// Gathers the feature vector of every neighbor: `(N, F)` × `(N, M)` → `(N, M, F)`.
pub fn neighbor_features(atom_fea: &Tensor, nbr_fea_idx: &Tensor) -> Result<Tensor, Error> {
    let (n, m) = nbr_fea_idx.dims2()?;
    let f = atom_fea.dim(1)?;
    let flat = nbr_fea_idx.flatten_all()?;
    Ok(atom_fea.index_select(&flat, 0)?.reshape((n, m, f))?)
}

/// Builds the per-edge input of a convolution.
///
/// For atom `i` and neighbor slot `j` the output row is
/// `[atom_fea[i], atom_fea[nbr_fea_idx[i, j]], nbr_fea[i, j]]`, giving a
/// `(N, M, 2F + D)` tensor.
pub fn assemble_edge_features(
    atom_fea: &Tensor,
    nbr_fea_idx: &Tensor,
    nbr_fea: &Tensor,
) -> Result<Tensor, Error> {
    let (n, m) = nbr_fea_idx.dims2()?;
    let f = atom_fea.dim(1)?;

    let centre = atom_fea.unsqueeze(1)?.broadcast_as((n, m, f))?.contiguous()?;
    let gathered = neighbor_features(atom_fea, nbr_fea_idx)?;

    Ok(Tensor::cat(&[&centre, &gathered, nbr_fea], 2)?)
}

/// Linear map from assembled edge features to the `2F` gate/core pair.
#[derive(Debug, Clone)]
pub struct GatedProjection {
    fc_full: Linear,
}

impl GatedProjection {
    pub fn new(atom_fea_len: usize, nbr_fea_len: usize, vb: VarBuilder) -> Result<Self, Error> {
        let fc_full = linear(2 * atom_fea_len + nbr_fea_len, 2 * atom_fea_len, vb)?;
        Ok(Self { fc_full })
    }

    /// `(N, M, 2F + D)` → `(N, M, 2F)`.
    pub fn forward(&self, total_nbr_fea: &Tensor) -> Result<Tensor, Error> {
        Ok(self.fc_full.forward(total_nbr_fea)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn inputs(n: usize, m: usize, f: usize, d: usize) -> (Tensor, Tensor, Tensor) {
        let dev = Device::Cpu;
        let atom: Vec<f32> = (0..n * f).map(|x| x as f32).collect();
        let idx: Vec<u32> = (0..n * m).map(|k| ((k / m + k % m + 1) % n) as u32).collect();
        (
            Tensor::from_vec(atom, (n, f), &dev).unwrap(),
            Tensor::from_vec(idx, (n, m), &dev).unwrap(),
            Tensor::rand(0f32, 1f32, (n, m, d), &dev).unwrap(),
        )
    }

    #[test]
    fn combined_shape_is_two_f_plus_d() {
        let (atom, idx, nbr) = inputs(4, 12, 92, 41);
        let total = assemble_edge_features(&atom, &idx, &nbr).unwrap();
        assert_eq!(total.dims(), &[4, 12, 225]);
    }

    #[test]
    fn leading_block_repeats_centre_atom() {
        let (n, m, f, d) = (3, 4, 5, 2);
        let (atom, idx, nbr) = inputs(n, m, f, d);
        let total = assemble_edge_features(&atom, &idx, &nbr).unwrap();

        let total = total.to_vec3::<f32>().unwrap();
        let atom = atom.to_vec2::<f32>().unwrap();
        let idx = idx.to_vec2::<u32>().unwrap();
        let nbr = nbr.to_vec3::<f32>().unwrap();
        for i in 0..n {
            for j in 0..m {
                assert_eq!(&total[i][j][..f], &atom[i][..]);
                assert_eq!(&total[i][j][f..2 * f], &atom[idx[i][j] as usize][..]);
                assert_eq!(&total[i][j][2 * f..], &nbr[i][j][..]);
            }
        }
    }

    #[test]
    fn projection_maps_to_two_f() {
        let (atom, idx, nbr) = inputs(4, 12, 92, 41);
        let total = assemble_edge_features(&atom, &idx, &nbr).unwrap();

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let fc = GatedProjection::new(92, 41, vb.pp("fc_full")).unwrap();

        assert_eq!(fc.forward(&total).unwrap().dims(), &[4, 12, 184]);
    }

    #[test]
    fn mismatched_widths_surface_as_tensor_errors() {
        let (atom, idx, _) = inputs(4, 12, 8, 41);
        let wrong = Tensor::zeros((4, 11, 41), DType::F32, &Device::Cpu).unwrap();
        assert!(matches!(
            assemble_edge_features(&atom, &idx, &wrong),
            Err(Error::Tensor(_))
        ));
    }
}
