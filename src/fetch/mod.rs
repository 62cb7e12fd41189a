//! Download of stable, ordered crystal structures from a materials database.
//!
//! A fetch runs a single [`Query`] against a [`StructureSource`], discards
//! every record containing an element outside the allow-list, and stores the
//! survivors as a CSV summary next to a directory of CIF files:
//!
//! ```text
//! <out>/<prop>.csv            full_formula,task_id,<prop>
//! <out>/<prop>_cifs/<id>.cif  raw CIF payload per kept record
//! ```
//!
//! Existing files are overwritten. Any failure aborts the run.

mod error;
mod filter;
mod query;
mod rester;
mod source;

pub use error::Error;
pub use filter::{Dropped, dedup_task_ids, partition_allowed};
pub use query::Query;
pub use rester::{DEFAULT_CHUNK_SIZE, DEFAULT_ENDPOINT, MpRester, unwrap_envelope};
pub use source::{StructureSource, record_from_document};

use crate::io::table;
use crate::model::element_set::ElementSet;
use crate::model::record::StructureRecord;
use std::collections::HashSet;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_PROPERTY: &str = "final_energy";

/// Where and what to fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    pub output_dir: PathBuf,
    /// Database property stored as the target column.
    pub property: String,
    pub allowed: ElementSet,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data"),
            property: DEFAULT_PROPERTY.to_string(),
            allowed: ElementSet::allowed(),
        }
    }
}

impl FetchConfig {
    pub fn csv_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.csv", self.property))
    }

    pub fn cif_dir(&self) -> PathBuf {
        self.output_dir.join(format!("{}_cifs", self.property))
    }
}

/// Outcome of a completed fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchReport {
    /// Records returned by the source.
    pub queried: usize,
    pub kept: usize,
    pub dropped: Vec<Dropped>,
    /// Repeated `task_id`s removed after their first occurrence.
    pub duplicates: Vec<String>,
    pub csv_path: PathBuf,
    pub cif_dir: PathBuf,
}

/// Queries `source` and writes the filtered records below `config.output_dir`.
pub fn fetch<S: StructureSource>(source: &S, config: &FetchConfig) -> Result<FetchReport, Error> {
    validate_property(&config.property)?;
    let query = Query::stable_ordered(&config.property);

    info!(property = %config.property, "querying materials database");
    let records = source.query(&query)?;
    let queried = records.len();
    info!(queried, "received structure records");

    let (kept, dropped) = partition_allowed(records, &config.allowed);
    for d in &dropped {
        debug!(task_id = %d.task_id, elements = %d.disallowed, "dropping record");
    }
    if !dropped.is_empty() {
        info!(dropped = dropped.len(), "records removed by element allow-list");
    }

    let (kept, duplicates) = dedup_task_ids(kept);
    for id in &duplicates {
        warn!(task_id = %id, "skipping repeated record");
    }

    write_outputs(config, &kept)?;

    Ok(FetchReport {
        queried,
        kept: kept.len(),
        dropped,
        duplicates,
        csv_path: config.csv_path(),
        cif_dir: config.cif_dir(),
    })
}

/// Writes the summary table and one CIF file per record.
///
/// Every `task_id` must be unique; nothing is written otherwise.
pub fn write_outputs(config: &FetchConfig, records: &[StructureRecord]) -> Result<(), Error> {
    validate_property(&config.property)?;
    let mut seen = HashSet::with_capacity(records.len());
    if let Some(r) = records.iter().find(|r| !seen.insert(r.task_id.as_str())) {
        return Err(Error::DuplicateTaskId(r.task_id.clone()));
    }

    let cif_dir = config.cif_dir();
    create_dir(&config.output_dir)?;
    create_dir(&cif_dir)?;

    let csv_path = config.csv_path();
    let file = fs::File::create(&csv_path).map_err(|e| Error::write(&csv_path, e))?;
    let rows = table::write_summary(BufWriter::new(file), &config.property, records)?;
    debug!(rows, path = %csv_path.display(), "wrote summary table");

    for record in records {
        let path = cif_dir.join(format!("{}.cif", record.task_id));
        if record.cif.trim().is_empty() {
            warn!(task_id = %record.task_id, "record has an empty CIF payload");
        }
        fs::write(&path, &record.cif).map_err(|e| Error::write(&path, e))?;
    }

    Ok(())
}

/// Rejects property names that would escape the output directory.
pub fn validate_property(property: &str) -> Result<(), Error> {
    let name = property.trim();
    if name.is_empty()
        || name != property
        || property.starts_with('.')
        || property.contains(['/', '\\'])
    {
        return Err(Error::InvalidProperty(property.to_string()));
    }
    Ok(())
}

fn create_dir(path: &Path) -> Result<(), Error> {
    fs::create_dir_all(path).map_err(|e| Error::write(path, e))
}
