//! Core data structures shared by the fetcher and the explorer.
//!
//! - [`types`] – Periodic table elements.
//! - [`element_set`] – Compact element sets and the fetcher's allow-list.
//! - [`record`] – Structure records as delivered by the materials database.
//! - [`crystal`] – Periodic crystals (lattice plus fractional sites) parsed from CIF.

pub mod crystal;
pub mod element_set;
pub mod record;
pub mod types;
