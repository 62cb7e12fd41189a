//! File I/O for crystal structures, summary tables and atom feature tables.
//!
//! - [`cif`] – Crystallographic Information File reader (first data block,
//!   symmetry expansion, ordered sites only).
//! - [`table`] – The `<prop>.csv` summary written by the fetcher and read back
//!   by the dataset loader.
//! - [`atom_init`] – The `atom_init.json` element embedding table.

use std::fmt;

pub mod atom_init;
pub mod cif;
pub mod error;
pub mod table;

pub use error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Cif,
    Csv,
    AtomInit,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Cif => write!(f, "CIF"),
            Format::Csv => write!(f, "CSV"),
            Format::AtomInit => write!(f, "atom_init JSON"),
        }
    }
}
