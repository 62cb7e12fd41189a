//! Crystallographic Information File (CIF) input.
//!
//! Only the first `data_` block is read. Cell parameters, symmetry
//! operations and the `_atom_site` loop are turned into a [`Crystal`] whose
//! sites cover the full unit cell.
//!
//! [`Crystal`]: crate::model::crystal::Crystal

mod reader;
mod symmetry;
mod syntax;

pub use reader::read;
pub use symmetry::SymOp;
