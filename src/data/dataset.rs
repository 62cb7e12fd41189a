use super::error::Error;
use super::gaussian::GaussianDistance;
use super::initializer::{AtomInitializer, JsonAtomInitializer, OneHotInitializer};
use super::neighbors::all_neighbors;
use crate::io::{atom_init, cif, table};
use crate::model::crystal::Crystal;
use candle_core::{Device, Tensor};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const ATOM_INIT_FILE: &str = "atom_init.json";

/// Locations and featurization parameters of a structure dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetConfig {
    pub csv_path: PathBuf,
    pub cif_dir: PathBuf,
    /// Element embedding table; a one-hot encoding is used when absent.
    pub atom_init_path: Option<PathBuf>,
    pub property: String,
    pub max_num_nbr: usize,
    pub radius: f64,
    pub dmin: f64,
    pub step: f64,
    pub random_seed: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self::in_dir("data", "final_energy")
    }
}

impl DatasetConfig {
    /// The layout written by the fetcher: `<dir>/<property>.csv`,
    /// `<dir>/<property>_cifs/` and `<dir>/atom_init.json`.
    pub fn in_dir(dir: impl AsRef<Path>, property: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            csv_path: dir.join(format!("{property}.csv")),
            cif_dir: dir.join(format!("{property}_cifs")),
            atom_init_path: Some(dir.join(ATOM_INIT_FILE)),
            property: property.to_string(),
            max_num_nbr: 12,
            radius: 8.0,
            dmin: 0.0,
            step: 0.2,
            random_seed: 123,
        }
    }
}

/// Feature tensors of one structure.
#[derive(Debug, Clone)]
pub struct CrystalGraph {
    /// `(N, F)` initial atom features.
    pub atom_fea: Tensor,
    /// `(N, M, D)` Gaussian-expanded neighbor distances.
    pub nbr_fea: Tensor,
    /// `(N, M)` neighbor site indices, `u32`.
    pub nbr_fea_idx: Tensor,
    /// `(1,)` target value.
    pub target: Tensor,
    pub id: String,
}

impl CrystalGraph {
    pub fn n_atoms(&self) -> usize {
        self.atom_fea.dims().first().copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    id: String,
    target: f64,
}

/// Structures listed in a summary table, featurized on demand as crystal graphs.
///
/// Entries are shuffled once with the configured seed when the dataset is opened.
pub struct CifDataset {
    entries: Vec<Entry>,
    cif_dir: PathBuf,
    initializer: Box<dyn AtomInitializer>,
    gdf: GaussianDistance,
    max_num_nbr: usize,
    radius: f64,
    device: Device,
}

impl std::fmt::Debug for CifDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CifDataset")
            .field("len", &self.entries.len())
            .field("cif_dir", &self.cif_dir)
            .field("atom_fea_len", &self.initializer.feature_len())
            .field("nbr_fea_len", &self.gdf.len())
            .field("max_num_nbr", &self.max_num_nbr)
            .field("radius", &self.radius)
            .finish()
    }
}

impl CifDataset {
    pub fn open(config: &DatasetConfig, device: &Device) -> Result<Self, Error> {
        let file = File::open(&config.csv_path).map_err(|e| Error::open(&config.csv_path, e))?;
        let rows = table::read_targets(BufReader::new(file), &config.property)
            .map_err(|e| Error::read(&config.csv_path, e))?;

        let total = rows.len();
        let mut entries: Vec<Entry> = rows
            .into_iter()
            .filter_map(|row| match row.target {
                Some(target) => Some(Entry { id: row.id, target }),
                None => {
                    warn!(id = %row.id, "skipping structure without a target value");
                    None
                }
            })
            .collect();
        if entries.is_empty() {
            return Err(Error::EmptyDataset);
        }

        let mut rng = StdRng::seed_from_u64(config.random_seed);
        entries.shuffle(&mut rng);

        let initializer = load_initializer(config.atom_init_path.as_deref())?;
        let gdf = GaussianDistance::new(config.dmin, config.radius, config.step, None)?;

        info!(
            structures = entries.len(),
            skipped = total - entries.len(),
            atom_fea_len = initializer.feature_len(),
            nbr_fea_len = gdf.len(),
            "opened crystal dataset"
        );

        Ok(Self {
            entries,
            cif_dir: config.cif_dir.clone(),
            initializer,
            gdf,
            max_num_nbr: config.max_num_nbr,
            radius: config.radius,
            device: device.clone(),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Length of each initial atom feature vector.
    pub fn atom_fea_len(&self) -> usize {
        self.initializer.feature_len()
    }

    /// Length of each expanded neighbor distance vector.
    pub fn nbr_fea_len(&self) -> usize {
        self.gdf.len()
    }

    pub fn max_num_nbr(&self) -> usize {
        self.max_num_nbr
    }

    pub fn id(&self, index: usize) -> Result<&str, Error> {
        self.entry(index).map(|e| e.id.as_str())
    }

    pub fn target(&self, index: usize) -> Result<f64, Error> {
        self.entry(index).map(|e| e.target)
    }

    fn entry(&self, index: usize) -> Result<&Entry, Error> {
        self.entries.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.entries.len(),
        })
    }

    pub fn cif_path(&self, index: usize) -> Result<PathBuf, Error> {
        Ok(self.cif_dir.join(format!("{}.cif", self.entry(index)?.id)))
    }

    pub fn load_crystal(&self, index: usize) -> Result<Crystal, Error> {
        let path = self.cif_path(index)?;
        let id = &self.entry(index)?.id;
        let file = File::open(&path).map_err(|e| Error::open(&path, e))?;
        cif::read(BufReader::new(file)).map_err(|source| Error::Structure {
            id: id.clone(),
            source,
        })
    }

    /// Featurizes the structure at `index`.
    ///
    /// Each site keeps its `max_num_nbr` closest neighbors; sites with fewer
    /// neighbors inside the cutoff are padded with index 0 at distance
    /// `radius + 1`.
    pub fn get(&self, index: usize) -> Result<CrystalGraph, Error> {
        let entry = self.entry(index)?;
        let crystal = self.load_crystal(index)?;
        let n = crystal.site_count();
        if n == 0 {
            return Err(Error::EmptyStructure(entry.id.clone()));
        }

        let f = self.initializer.feature_len();
        let mut atom_fea = Vec::with_capacity(n * f);
        for site in &crystal.sites {
            let features =
                self.initializer
                    .features(site.element)
                    .ok_or_else(|| Error::MissingAtomFeatures {
                        id: entry.id.clone(),
                        element: site.element,
                    })?;
            atom_fea.extend_from_slice(features);
        }

        let m = self.max_num_nbr;
        let d = self.gdf.len();
        let mut nbr_idx = Vec::with_capacity(n * m);
        let mut nbr_fea = Vec::with_capacity(n * m * d);
        let mut padded = 0usize;

        for neighbors in all_neighbors(&crystal, self.radius) {
            let kept = neighbors.len().min(m);
            for nbr in &neighbors[..kept] {
                nbr_idx.push(nbr.index as u32);
                self.gdf.expand_into(nbr.distance, &mut nbr_fea);
            }
            if kept < m {
                padded += 1;
                for _ in kept..m {
                    nbr_idx.push(0);
                    self.gdf.expand_into(self.radius + 1.0, &mut nbr_fea);
                }
            }
        }
        if padded > 0 {
            warn!(
                id = %entry.id,
                sites = padded,
                radius = self.radius,
                "not enough neighbors to build graph; consider increasing the radius"
            );
        }
        debug!(id = %entry.id, atoms = n, "featurized structure");

        Ok(CrystalGraph {
            atom_fea: Tensor::from_vec(atom_fea, (n, f), &self.device)?,
            nbr_fea: Tensor::from_vec(nbr_fea, (n, m, d), &self.device)?,
            nbr_fea_idx: Tensor::from_vec(nbr_idx, (n, m), &self.device)?,
            target: Tensor::new(&[entry.target as f32], &self.device)?,
            id: entry.id.clone(),
        })
    }
}

fn load_initializer(path: Option<&Path>) -> Result<Box<dyn AtomInitializer>, Error> {
    match path {
        Some(path) if path.exists() => {
            let file = File::open(path).map_err(|e| Error::open(path, e))?;
            let table = atom_init::read(BufReader::new(file)).map_err(|e| Error::read(path, e))?;
            Ok(Box::new(JsonAtomInitializer::new(&table)))
        }
        Some(path) => {
            warn!(path = %path.display(), "atom_init table not found; using one-hot element features");
            Ok(Box::new(OneHotInitializer::new()))
        }
        None => Ok(Box::new(OneHotInitializer::new())),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::fs;
    use std::path::Path;

    pub const NACL_CIF: &str = "data_NaCl
_cell_length_a 5.64
_cell_length_b 5.64
_cell_length_c 5.64
_cell_angle_alpha 90
_cell_angle_beta 90
_cell_angle_gamma 90
_symmetry_space_group_name_H-M 'P 1'
loop_
_symmetry_equiv_pos_as_xyz
'x, y, z'
loop_
_atom_site_label
_atom_site_type_symbol
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
Na1 Na 0.0 0.0 0.0
Na2 Na 0.0 0.5 0.5
Na3 Na 0.5 0.0 0.5
Na4 Na 0.5 0.5 0.0
Cl1 Cl 0.5 0.5 0.5
Cl2 Cl 0.5 0.0 0.0
Cl3 Cl 0.0 0.5 0.0
Cl4 Cl 0.0 0.0 0.5
";

    pub const PO_CIF: &str = "data_Po
_cell_length_a 3.35
_cell_length_b 3.35
_cell_length_c 3.35
_cell_angle_alpha 90
_cell_angle_beta 90
_cell_angle_gamma 90
loop_
_atom_site_type_symbol
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
Po 0 0 0
";

    /// Writes `n` structures alternating NaCl and Po, with targets `0, 1, ..`.
    pub fn write_dataset(dir: &Path, n: usize) {
        let cif_dir = dir.join("final_energy_cifs");
        fs::create_dir_all(&cif_dir).unwrap();
        let mut csv = String::from("full_formula,task_id,final_energy\n");
        for i in 0..n {
            let (formula, cif) = if i % 2 == 0 { ("Na4Cl4", NACL_CIF) } else { ("Po1", PO_CIF) };
            csv.push_str(&format!("{formula},mp-{i},{i}\n"));
            fs::write(cif_dir.join(format!("mp-{i}.cif")), cif).unwrap();
        }
        fs::write(dir.join("final_energy.csv"), csv).unwrap();
        fs::write(
            dir.join("atom_init.json"),
            r#"{"11": [1, 0, 0], "17": [0, 1, 0], "84": [0, 0, 1]}"#,
        )
        .unwrap();
    }
}
