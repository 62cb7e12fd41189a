//! Walk-through of the crystal graph pipeline without training.
//!
//! [`inspect_example`] featurizes one structure and runs it through the
//! edge-feature assembly and the gated projection of a convolution, reporting
//! the shape of every intermediate tensor. [`Pipeline::build`] then wires up
//! the split loaders, a target normalizer, the network, its loss and its
//! optimizer; [`Pipeline::baseline`] evaluates the untrained loss on the first
//! training batch.

mod config;
mod error;

pub use config::{
    DatasetSettings, ExploreSettings, LoaderSettings, ModelSettings, OptimizerSettings,
    default_settings, load_settings,
};
pub use error::Error;

use crate::data::{CifDataset, Loaders, Normalizer, split_loaders};
use crate::nn::{
    Criterion, CrystalGraphConvNet, GatedProjection, ModelConfig, ModelOptimizer,
    assemble_edge_features, neighbor_features,
};
use candle_core::DType;
use candle_nn::{VarBuilder, VarMap};
use rand::Rng;
use tracing::{debug, info};

/// Shapes of the tensors produced for one structure.
#[derive(Debug, Clone, PartialEq)]
pub struct ExampleSummary {
    pub id: String,
    pub target: f64,
    /// `(N, F)`
    pub atom_fea: Vec<usize>,
    /// `(N, M, D)`
    pub nbr_fea: Vec<usize>,
    /// `(N, M)`
    pub nbr_fea_idx: Vec<usize>,
    /// `(N, M, F)`
    pub atom_nbr_fea: Vec<usize>,
    /// `(N, M, 2F + D)`
    pub total_nbr_fea: Vec<usize>,
    /// `(N, M, 2F)`
    pub total_gated_fea: Vec<usize>,
}

/// Featurizes structure `index` and applies a freshly initialized gated
/// projection sized to the raw atom features.
pub fn inspect_example(dataset: &CifDataset, index: usize) -> Result<ExampleSummary, Error> {
    let graph = dataset.get(index)?;
    let f = dataset.atom_fea_len();
    let d = dataset.nbr_fea_len();

    let atom_nbr_fea = neighbor_features(&graph.atom_fea, &graph.nbr_fea_idx)?;
    let total = assemble_edge_features(&graph.atom_fea, &graph.nbr_fea_idx, &graph.nbr_fea)?;

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, dataset.device());
    let fc_full = GatedProjection::new(f, d, vb.pp("fc_full"))?;
    let gated = fc_full.forward(&total)?;

    let summary = ExampleSummary {
        id: graph.id.clone(),
        target: dataset.target(index)?,
        atom_fea: graph.atom_fea.dims().to_vec(),
        nbr_fea: graph.nbr_fea.dims().to_vec(),
        nbr_fea_idx: graph.nbr_fea_idx.dims().to_vec(),
        atom_nbr_fea: atom_nbr_fea.dims().to_vec(),
        total_nbr_fea: total.dims().to_vec(),
        total_gated_fea: gated.dims().to_vec(),
    };
    debug!(?summary, "inspected example");
    Ok(summary)
}

/// Everything needed to start training, built but not run.
pub struct Pipeline {
    pub loaders: Loaders,
    pub normalizer: Normalizer,
    pub model_config: ModelConfig,
    pub model: CrystalGraphConvNet,
    pub criterion: Criterion,
    pub optimizer: ModelOptimizer,
    varmap: VarMap,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("loaders", &self.loaders)
            .field("normalizer", &self.normalizer)
            .field("model_config", &self.model_config)
            .field("criterion", &self.criterion)
            .field("optimizer", &self.optimizer)
            .field("parameters", &self.parameter_count())
            .finish()
    }
}

/// Untrained loss on one training batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineReport {
    pub crystals: usize,
    pub atoms: usize,
    pub loss: f32,
}

impl Pipeline {
    pub fn build<R: Rng + ?Sized>(
        dataset: &CifDataset,
        settings: &ExploreSettings,
        rng: &mut R,
    ) -> Result<Self, Error> {
        let loaders = split_loaders(dataset.len(), &settings.loader.to_config())?;
        if loaders.train.is_empty() {
            return Err(Error::EmptyTrainingSet(dataset.len()));
        }

        let normalizer = if settings.model.classification {
            Normalizer { mean: 0.0, std: 1.0 }
        } else {
            let n = dataset.len().min(settings.loader.normalizer_samples);
            let targets = rand::seq::index::sample(rng, dataset.len(), n)
                .into_iter()
                .map(|i| dataset.target(i))
                .collect::<Result<Vec<_>, _>>()?;
            Normalizer::from_values(&targets)?
        };
        info!(mean = normalizer.mean, std = normalizer.std, "fitted target normalizer");

        let model_config = settings
            .model
            .to_config(dataset.atom_fea_len(), dataset.nbr_fea_len());
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, dataset.device());
        let model = CrystalGraphConvNet::new(&model_config, vb)?;

        let criterion = Criterion::for_task(model_config.classification);
        let optimizer = settings.optimizer.to_config().build(varmap.all_vars())?;

        let pipeline = Self {
            loaders,
            normalizer,
            model_config,
            model,
            criterion,
            optimizer,
            varmap,
        };
        info!(
            parameters = pipeline.parameter_count(),
            criterion = %pipeline.criterion,
            "built model"
        );
        Ok(pipeline)
    }

    /// Total number of scalar values held by the model's variables.
    pub fn parameter_count(&self) -> usize {
        self.varmap.all_vars().iter().map(|v| v.elem_count()).sum()
    }

    /// One forward pass over the first training batch. No parameter is updated.
    pub fn baseline<R: Rng + ?Sized>(
        &self,
        dataset: &CifDataset,
        rng: &mut R,
    ) -> Result<BaselineReport, Error> {
        let Some(batch) = self.loaders.train.iter(dataset, rng).next() else {
            return Err(Error::EmptyTrainingSet(dataset.len()));
        };
        let batch = batch?;

        let output = self.model.forward_batch(&batch, false)?;
        let target = if self.model_config.classification {
            batch.target.clone()
        } else {
            self.normalizer.norm(&batch.target)?
        };
        let loss = self
            .criterion
            .loss(&output, &target)?
            .to_scalar::<f32>()?;

        Ok(BaselineReport {
            crystals: batch.len(),
            atoms: batch.n_atoms(),
            loss,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DatasetConfig, fixtures::write_dataset};
    use candle_core::Device;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn dataset(dir: &std::path::Path, n: usize) -> CifDataset {
        write_dataset(dir, n);
        let config = DatasetConfig {
            radius: 5.0,
            ..DatasetConfig::in_dir(dir, "final_energy")
        };
        CifDataset::open(&config, &Device::Cpu).unwrap()
    }

    fn small_settings() -> ExploreSettings {
        let mut s = ExploreSettings::default();
        s.loader.batch_size = 4;
        s.model.atom_fea_len = 8;
        s.model.h_fea_len = 16;
        s.model.n_conv = 2;
        s
    }

    #[test]
    fn inspects_first_example_shapes() {
        let tmp = tempfile::tempdir().unwrap();
        let ds = dataset(tmp.path(), 4);
        let nacl = (0..ds.len()).find(|&i| ds.id(i).unwrap() == "mp-0").unwrap();

        let s = inspect_example(&ds, nacl).unwrap();

        assert_eq!(s.id, "mp-0");
        assert_eq!(s.target, 0.0);
        assert_eq!(s.atom_fea, vec![8, 3]);
        assert_eq!(s.nbr_fea, vec![8, 12, 26]);
        assert_eq!(s.nbr_fea_idx, vec![8, 12]);
        assert_eq!(s.atom_nbr_fea, vec![8, 12, 3]);
        assert_eq!(s.total_nbr_fea, vec![8, 12, 2 * 3 + 26]);
        assert_eq!(s.total_gated_fea, vec![8, 12, 6]);
    }

    #[test]
    fn builds_pipeline_and_scores_baseline_loss() {
        let tmp = tempfile::tempdir().unwrap();
        let ds = dataset(tmp.path(), 10);
        let mut rng = StdRng::seed_from_u64(0);

        let pipeline = Pipeline::build(&ds, &small_settings(), &mut rng).unwrap();

        assert_eq!(pipeline.loaders.train.len(), 8);
        assert_eq!(pipeline.loaders.val.len(), 1);
        assert_eq!(pipeline.loaders.test.as_ref().map(|l| l.len()), Some(1));
        assert_eq!(pipeline.criterion, Criterion::Mse);
        assert!((pipeline.normalizer.mean - 4.5).abs() < 1e-9);
        assert!(pipeline.parameter_count() > 0);

        let report = pipeline.baseline(&ds, &mut rng).unwrap();
        assert_eq!(report.crystals, 4);
        assert!(report.loss.is_finite() && report.loss >= 0.0);
    }

    #[test]
    fn constant_targets_give_finite_loss() {
        let tmp = tempfile::tempdir().unwrap();
        write_dataset(tmp.path(), 10);
        let csv_path = tmp.path().join("final_energy.csv");
        let csv = std::fs::read_to_string(&csv_path).unwrap();
        let zeroed: Vec<String> = csv
            .lines()
            .enumerate()
            .map(|(i, line)| match (i, line.rsplit_once(',')) {
                (0, _) | (_, None) => line.to_string(),
                (_, Some((head, _))) => format!("{head},0"),
            })
            .collect();
        std::fs::write(&csv_path, zeroed.join("\n") + "\n").unwrap();

        let config = DatasetConfig {
            radius: 5.0,
            ..DatasetConfig::in_dir(tmp.path(), "final_energy")
        };
        let ds = CifDataset::open(&config, &Device::Cpu).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        let pipeline = Pipeline::build(&ds, &small_settings(), &mut rng).unwrap();
        assert_eq!(pipeline.normalizer.mean, 0.0);
        assert_eq!(pipeline.normalizer.std, 1.0);

        let report = pipeline.baseline(&ds, &mut rng).unwrap();
        assert!(report.loss.is_finite());
    }

    #[test]
    fn tiny_dataset_has_no_training_split() {
        let tmp = tempfile::tempdir().unwrap();
        let ds = dataset(tmp.path(), 1);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            Pipeline::build(&ds, &small_settings(), &mut rng),
            Err(Error::EmptyTrainingSet(1))
        ));
    }
}
