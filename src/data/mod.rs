//! Crystal graph dataset.
//!
//! Structures stored by the fetcher are turned into fixed-width graphs: every
//! site keeps its `M` nearest periodic neighbors, each neighbor distance is
//! expanded onto a Gaussian basis, and each element is embedded through an
//! [`AtomInitializer`]. Graphs are pooled into [`Batch`]es by [`collate_pool`]
//! and served in random order by the [`DataLoader`]s of a train/validation/test
//! split.

mod collate;
mod dataset;
mod error;
mod gaussian;
mod initializer;
mod loader;
pub mod neighbors;
mod normalizer;

pub use collate::{Batch, collate_pool};
pub use dataset::{ATOM_INIT_FILE, CifDataset, CrystalGraph, DatasetConfig};
pub use error::Error;
pub use gaussian::GaussianDistance;
pub use initializer::{AtomInitializer, JsonAtomInitializer, OneHotInitializer};
pub use loader::{Batches, DataLoader, LoaderConfig, Loaders, Split, split_indices, split_loaders};
pub use normalizer::Normalizer;

#[cfg(test)]
pub(crate) use dataset::fixtures;
