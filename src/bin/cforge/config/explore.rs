use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use crystal_forge::data::{ATOM_INIT_FILE, DatasetConfig};
use crystal_forge::explore::{ExploreSettings, load_settings};

use crate::cli::ExploreArgs;

/// Reads `--config`, or falls back to the embedded defaults.
pub fn load_explore_settings(path: Option<&Path>) -> Result<ExploreSettings> {
    let Some(path) = path else {
        return Ok(load_settings(None)?);
    };

    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
    load_settings(Some(&text))
        .with_context(|| format!("Failed to parse settings file: {}", path.display()))
}

pub fn build_dataset_config(args: &ExploreArgs, settings: &ExploreSettings) -> DatasetConfig {
    let mut config = DatasetConfig::in_dir(&args.csv_dir, &args.property);

    if let Some(dir) = &args.cif_dir {
        config.cif_dir = dir.clone();
    }
    if let Some(dir) = &args.init_dir {
        config.atom_init_path = Some(dir.join(ATOM_INIT_FILE));
    }

    let mut config = settings.dataset.apply(config);
    if let Some(seed) = args.run.seed {
        config.random_seed = seed;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;
    use std::path::PathBuf;

    fn explore_args(extra: &[&str]) -> ExploreArgs {
        let mut argv = vec!["cforge", "explore"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Explore(args) => args,
            Command::Fetch(_) => unreachable!(),
        }
    }

    #[test]
    fn default_layout_follows_csv_dir() {
        let args = explore_args(&["--csv-dir", "runs"]);
        let config = build_dataset_config(&args, &ExploreSettings::default());
        assert_eq!(config.csv_path, PathBuf::from("runs/final_energy.csv"));
        assert_eq!(config.cif_dir, PathBuf::from("runs/final_energy_cifs"));
        assert_eq!(config.atom_init_path, Some(PathBuf::from("runs/atom_init.json")));
        assert_eq!(config.random_seed, 123);
    }

    #[test]
    fn explicit_dirs_and_seed_override() {
        let args = explore_args(&["--cif-dir", "cifs", "--init-dir", "emb", "--seed", "7"]);
        let config = build_dataset_config(&args, &ExploreSettings::default());
        assert_eq!(config.cif_dir, PathBuf::from("cifs"));
        assert_eq!(config.atom_init_path, Some(PathBuf::from("emb/atom_init.json")));
        assert_eq!(config.random_seed, 7);
    }

    #[test]
    fn settings_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("explore.toml");
        fs::write(&path, "[dataset]\nradius = 6.0\n").unwrap();
        let settings = load_explore_settings(Some(&path)).unwrap();
        assert_eq!(settings.dataset.radius, 6.0);
    }

    #[test]
    fn missing_settings_file_is_reported() {
        let err = load_explore_settings(Some(Path::new("/nonexistent/explore.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read settings file"));
    }
}
