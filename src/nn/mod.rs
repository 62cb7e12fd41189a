//! Crystal graph convolutional network built on `candle`.
//!
//! - [`assembly`] – per-edge feature concatenation and the gated projection
//!   that opens every convolution.
//! - [`ConvLayer`] – gated convolution with batch normalization.
//! - [`CrystalGraphConvNet`] – embedding, convolutions, pooling and output head.
//! - [`Criterion`] and [`OptimizerConfig`] – loss and optimizer construction.

pub mod assembly;
mod conv;
mod error;
mod model;
mod train;

pub use assembly::{GatedProjection, assemble_edge_features, neighbor_features};
pub use conv::{ConvLayer, softplus};
pub use error::Error;
pub use model::{CrystalGraphConvNet, ModelConfig, PoolFunc};
pub use train::{Criterion, ModelOptimizer, OptimizerConfig, OptimizerKind};
