//! Crystal structure acquisition and crystal graph featurization in pure Rust.
//! It downloads stable, ordered compounds from the Materials Project, stores them
//! as CIF files next to a property table, and turns them into the fixed-width
//! graphs consumed by a crystal graph convolutional network.
//!
//! # Features
//!
//! - **Fetching** — Query the Materials Project legacy REST API for
//!   thermodynamically stable, ordered structures and filter them against a
//!   78-element allow-list
//! - **Structure I/O** — CIF reading with symmetry expansion, CSV property
//!   tables and `atom_init.json` element embeddings
//! - **Graph featurization** — Periodic neighbor search, Gaussian distance
//!   expansion, batching and train/validation/test splits
//! - **Network** — Gated graph convolutions, crystal pooling, loss and
//!   optimizer construction on `candle`
//!
//! # Quick Start
//!
//! A fetch runs one query and keeps every record whose elements all lie in the
//! allow-list:
//!
//! ```
//! use crystal_forge::fetch::{Query, partition_allowed};
//! use crystal_forge::{Element, ElementSet, StructureRecord};
//!
//! let query = Query::stable_ordered("final_energy");
//! assert_eq!(
//!     query.properties,
//!     ["full_formula", "task_id", "final_energy", "cif", "elements"]
//! );
//!
//! let record = |id: &str, elements: &[Element]| StructureRecord {
//!     task_id: id.to_string(),
//!     full_formula: String::new(),
//!     value: Some(-1.0),
//!     elements: elements.to_vec(),
//!     cif: String::new(),
//! };
//! let records = vec![
//!     record("mp-22862", &[Element::Na, Element::Cl]),
//!     record("mp-1009", &[Element::Xe, Element::F]),
//! ];
//!
//! let (kept, dropped) = partition_allowed(records, &ElementSet::allowed());
//! assert_eq!(kept.len(), 1);
//! assert_eq!(kept[0].task_id, "mp-22862");
//! assert_eq!(dropped[0].disallowed.to_string(), "{Xe}");
//! ```
//!
//! # Module Organization
//!
//! - [`fetch`] — Database query, allow-list filter and on-disk layout
//! - [`io`] — CIF, CSV table and element table readers and writers
//! - [`data`] — Crystal graph dataset, batching and loaders
//! - [`nn`] — Crystal graph convolutional network
//! - [`explore`] — Feature inspection and pipeline construction without training
//!
//! # Data Types
//!
//! - [`Element`] — Chemical element (H through Og)
//! - [`ElementSet`] — Set of elements, including the fetch allow-list
//! - [`StructureRecord`] — One structure returned by the database
//! - [`Crystal`] — Lattice plus fractional sites parsed from a CIF file

mod model;

pub mod data;
pub mod explore;
pub mod fetch;
pub mod io;
pub mod nn;

pub use model::crystal::{Crystal, Lattice, Site};
pub use model::element_set::{ALLOWED_SYMBOLS, ElementSet};
pub use model::record::StructureRecord;
pub use model::types::{Element, ParseElementError};

pub use data::Error as DataError;
pub use explore::Error as ExploreError;
pub use fetch::Error as FetchError;
pub use io::Error as IoError;
pub use nn::Error as ModelError;
