use super::collate::{Batch, collate_pool};
use super::dataset::CifDataset;
use super::error::Error;
use rand::Rng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, warn};

/// How a dataset is divided and batched.
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderConfig {
    pub batch_size: usize,
    /// Defaults to `1 - val_ratio - test_ratio` when `None`.
    pub train_ratio: Option<f64>,
    pub val_ratio: f64,
    pub test_ratio: f64,
    /// Explicit sizes take precedence over the ratios.
    pub train_size: Option<usize>,
    pub val_size: Option<usize>,
    pub test_size: Option<usize>,
    pub return_test: bool,
    /// More than one worker featurizes each batch in parallel.
    pub num_workers: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            train_ratio: None,
            val_ratio: 0.1,
            test_ratio: 0.1,
            train_size: None,
            val_size: None,
            test_size: None,
            return_test: true,
            num_workers: 1,
        }
    }
}

/// Dataset indices assigned to each subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub val: Vec<usize>,
    pub test: Vec<usize>,
}

/// Training takes the head of `0..len`; validation and test are taken from
/// the tail, with the test block last.
pub fn split_indices(len: usize, config: &LoaderConfig) -> Result<Split, Error> {
    let ratio_size = |ratio: f64| (ratio * len as f64) as usize;

    let train_size = match (config.train_size, config.train_ratio) {
        (Some(size), _) => size,
        (None, Some(train_ratio)) => {
            let sum = train_ratio + config.val_ratio + config.test_ratio;
            if sum > 1.0 {
                return Err(Error::InvalidSplit(format!(
                    "train, validation and test ratios sum to {sum}"
                )));
            }
            ratio_size(train_ratio)
        }
        (None, None) => {
            let rest = config.val_ratio + config.test_ratio;
            if rest >= 1.0 {
                return Err(Error::InvalidSplit(format!(
                    "validation and test ratios sum to {rest}, leaving nothing to train on"
                )));
            }
            warn!(
                train_ratio = 1.0 - rest,
                "train_ratio not set; using 1 - val_ratio - test_ratio"
            );
            ratio_size(1.0 - rest)
        }
    };
    let val_size = config.val_size.unwrap_or_else(|| ratio_size(config.val_ratio));
    let test_size = config.test_size.unwrap_or_else(|| ratio_size(config.test_ratio));

    if train_size + val_size + test_size > len {
        return Err(Error::InvalidSplit(format!(
            "{train_size} + {val_size} + {test_size} samples requested from {len}"
        )));
    }

    let test_start = len - test_size;
    let val_start = test_start - val_size;
    Ok(Split {
        train: (0..train_size).collect(),
        val: (val_start..test_start).collect(),
        test: (test_start..len).collect(),
    })
}

/// Train, validation and optional test loaders over one dataset.
#[derive(Debug, Clone)]
pub struct Loaders {
    pub train: DataLoader,
    pub val: DataLoader,
    pub test: Option<DataLoader>,
}

pub fn split_loaders(len: usize, config: &LoaderConfig) -> Result<Loaders, Error> {
    if config.batch_size == 0 {
        return Err(Error::InvalidSplit("batch size must be positive".into()));
    }
    let split = split_indices(len, config)?;

    let pool = if config.num_workers > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_workers)
            .thread_name(|i| format!("featurize-{i}"))
            .build()
            .map_err(|e| Error::WorkerPool(e.to_string()))?;
        Some(Arc::new(pool))
    } else {
        None
    };

    let loader = |indices| DataLoader {
        indices,
        batch_size: config.batch_size,
        pool: pool.clone(),
    };

    debug!(
        train = split.train.len(),
        val = split.val.len(),
        test = split.test.len(),
        "split dataset"
    );

    Ok(Loaders {
        train: loader(split.train),
        val: loader(split.val),
        test: config.return_test.then(|| loader(split.test)),
    })
}

/// Draws a subset of the dataset in random order, one batch at a time.
#[derive(Clone)]
pub struct DataLoader {
    indices: Vec<usize>,
    batch_size: usize,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl std::fmt::Debug for DataLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataLoader")
            .field("samples", &self.indices.len())
            .field("batch_size", &self.batch_size)
            .field("parallel", &self.pool.is_some())
            .finish()
    }
}

impl DataLoader {
    /// Number of samples in the subset.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_batches(&self) -> usize {
        self.indices.len().div_ceil(self.batch_size)
    }

    /// Batches over a fresh permutation of the subset.
    pub fn iter<'a, R: Rng + ?Sized>(&'a self, dataset: &'a CifDataset, rng: &mut R) -> Batches<'a> {
        let mut order = self.indices.clone();
        order.shuffle(rng);
        Batches {
            dataset,
            order,
            batch_size: self.batch_size,
            pos: 0,
            pool: self.pool.as_deref(),
        }
    }
}

pub struct Batches<'a> {
    dataset: &'a CifDataset,
    order: Vec<usize>,
    batch_size: usize,
    pos: usize,
    pool: Option<&'a rayon::ThreadPool>,
}

impl Iterator for Batches<'_> {
    type Item = Result<Batch, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.order.len() {
            return None;
        }
        let end = (self.pos + self.batch_size).min(self.order.len());
        let chunk = &self.order[self.pos..end];
        self.pos = end;

        let dataset = self.dataset;
        let graphs = match self.pool {
            Some(pool) => pool.install(|| {
                chunk
                    .par_iter()
                    .map(|&i| dataset.get(i))
                    .collect::<Result<Vec<_>, _>>()
            }),
            None => chunk.iter().map(|&i| dataset.get(i)).collect(),
        };
        Some(graphs.and_then(|g| collate_pool(&g)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.order.len() - self.pos).div_ceil(self.batch_size);
        (n, Some(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::{DatasetConfig, fixtures::write_dataset};
    use candle_core::Device;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn default_ratios_split_80_10_10() {
        let split = split_indices(100, &LoaderConfig::default()).unwrap();
        assert_eq!(split.train, (0..80).collect::<Vec<_>>());
        assert_eq!(split.val, (80..90).collect::<Vec<_>>());
        assert_eq!(split.test, (90..100).collect::<Vec<_>>());
    }

    #[test]
    fn explicit_sizes_override_ratios() {
        let config = LoaderConfig {
            train_size: Some(5),
            val_size: Some(2),
            test_size: Some(1),
            ..LoaderConfig::default()
        };
        let split = split_indices(20, &config).unwrap();
        assert_eq!(split.train, vec![0, 1, 2, 3, 4]);
        assert_eq!(split.val, vec![17, 18]);
        assert_eq!(split.test, vec![19]);
    }

    #[test]
    fn ratios_above_one_are_rejected() {
        let config = LoaderConfig {
            train_ratio: Some(0.9),
            ..LoaderConfig::default()
        };
        assert!(matches!(split_indices(10, &config), Err(Error::InvalidSplit(_))));

        let config = LoaderConfig {
            val_ratio: 0.6,
            test_ratio: 0.4,
            ..LoaderConfig::default()
        };
        assert!(split_indices(10, &config).is_err());
    }

    #[test]
    fn oversized_request_is_rejected() {
        let config = LoaderConfig {
            train_size: Some(10),
            ..LoaderConfig::default()
        };
        assert!(split_indices(10, &config).is_err());
    }

    #[test]
    fn test_loader_is_optional() {
        let config = LoaderConfig {
            return_test: false,
            ..LoaderConfig::default()
        };
        let loaders = split_loaders(50, &config).unwrap();
        assert!(loaders.test.is_none());
        assert_eq!(loaders.train.len(), 40);
        assert_eq!(loaders.val.len(), 5);
    }

    #[test]
    fn batches_cover_subset_once() {
        let tmp = tempfile::tempdir().unwrap();
        write_dataset(tmp.path(), 6);
        let dataset =
            CifDataset::open(&DatasetConfig::in_dir(tmp.path(), "final_energy"), &Device::Cpu)
                .unwrap();

        for workers in [1, 3] {
            let config = LoaderConfig {
                batch_size: 2,
                train_size: Some(5),
                val_size: Some(1),
                test_size: Some(0),
                num_workers: workers,
                ..LoaderConfig::default()
            };
            let loaders = split_loaders(dataset.len(), &config).unwrap();
            assert_eq!(loaders.train.num_batches(), 3);

            let mut rng = StdRng::seed_from_u64(7);
            let batches: Vec<Batch> = loaders
                .train
                .iter(&dataset, &mut rng)
                .collect::<Result<_, _>>()
                .unwrap();
            let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
            assert_eq!(sizes, vec![2, 2, 1]);

            let mut ids: Vec<String> = batches.into_iter().flat_map(|b| b.ids).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), 5);
        }
    }
}
