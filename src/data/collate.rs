use super::dataset::CrystalGraph;
use super::error::Error;
use candle_core::Tensor;
use std::ops::Range;

/// Several crystal graphs pooled into one disconnected graph.
#[derive(Debug, Clone)]
pub struct Batch {
    /// `(ΣN, F)`
    pub atom_fea: Tensor,
    /// `(ΣN, M, D)`
    pub nbr_fea: Tensor,
    /// `(ΣN, M)`, offset into the pooled atom list.
    pub nbr_fea_idx: Tensor,
    /// Atom rows belonging to each crystal.
    pub crystal_atom_idx: Vec<Range<usize>>,
    /// `(B, 1)`
    pub target: Tensor,
    pub ids: Vec<String>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.crystal_atom_idx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crystal_atom_idx.is_empty()
    }

    pub fn n_atoms(&self) -> usize {
        self.crystal_atom_idx.last().map_or(0, |r| r.end)
    }
}

/// Concatenates graphs along the atom axis, shifting each graph's neighbor
/// indices by the number of atoms that precede it.
pub fn collate_pool(graphs: &[CrystalGraph]) -> Result<Batch, Error> {
    let Some(first) = graphs.first() else {
        return Err(Error::EmptyDataset);
    };
    let device = first.atom_fea.device();

    let mut atom_fea = Vec::with_capacity(graphs.len());
    let mut nbr_fea = Vec::with_capacity(graphs.len());
    let mut nbr_fea_idx = Vec::with_capacity(graphs.len());
    let mut targets = Vec::with_capacity(graphs.len());
    let mut crystal_atom_idx = Vec::with_capacity(graphs.len());
    let mut ids = Vec::with_capacity(graphs.len());

    let mut base = 0usize;
    for graph in graphs {
        let n = graph.n_atoms();
        atom_fea.push(&graph.atom_fea);
        nbr_fea.push(&graph.nbr_fea);
        let offset = Tensor::new(base as u32, device)?;
        nbr_fea_idx.push(graph.nbr_fea_idx.broadcast_add(&offset)?);
        targets.push(&graph.target);
        crystal_atom_idx.push(base..base + n);
        ids.push(graph.id.clone());
        base += n;
    }

    Ok(Batch {
        atom_fea: Tensor::cat(&atom_fea, 0)?,
        nbr_fea: Tensor::cat(&nbr_fea, 0)?,
        nbr_fea_idx: Tensor::cat(&nbr_fea_idx, 0)?,
        crystal_atom_idx,
        target: Tensor::stack(&targets, 0)?,
        ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn graph(id: &str, n: usize, target: f32) -> CrystalGraph {
        let dev = Device::Cpu;
        let idx: Vec<u32> = (0..n * 2).map(|k| ((k / 2 + 1) % n) as u32).collect();
        CrystalGraph {
            atom_fea: Tensor::ones((n, 3), candle_core::DType::F32, &dev).unwrap(),
            nbr_fea: Tensor::zeros((n, 2, 4), candle_core::DType::F32, &dev).unwrap(),
            nbr_fea_idx: Tensor::from_vec(idx, (n, 2), &dev).unwrap(),
            target: Tensor::new(&[target], &dev).unwrap(),
            id: id.to_string(),
        }
    }

    #[test]
    fn offsets_neighbor_indices() {
        let batch = collate_pool(&[graph("a", 2, 1.0), graph("b", 3, 2.0)]).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.n_atoms(), 5);
        assert_eq!(batch.crystal_atom_idx, vec![0..2, 2..5]);
        assert_eq!(batch.atom_fea.dims(), &[5, 3]);
        assert_eq!(batch.nbr_fea.dims(), &[5, 2, 4]);

        let idx = batch.nbr_fea_idx.to_vec2::<u32>().unwrap();
        assert_eq!(idx[0], vec![1, 1]);
        assert_eq!(idx[1], vec![0, 0]);
        assert_eq!(idx[2], vec![3, 3]);
        assert_eq!(idx[4], vec![2, 2]);

        assert_eq!(batch.target.dims(), &[2, 1]);
        assert_eq!(batch.target.to_vec2::<f32>().unwrap(), vec![vec![1.0], vec![2.0]]);
        assert_eq!(batch.ids, ["a", "b"]);
    }

    #[test]
    fn empty_batch_is_an_error() {
        assert!(matches!(collate_pool(&[]), Err(Error::EmptyDataset)));
    }
}
