use anyhow::{Context, Result, ensure};
use crystal_forge::ElementSet;
use crystal_forge::fetch::{FetchConfig, MpRester, validate_property};

use crate::cli::{FetchArgs, RemoteOptions};

pub fn build_fetch_config(args: &FetchArgs) -> Result<FetchConfig> {
    ensure!(!args.property.trim().is_empty(), "--prop must not be empty");
    validate_property(&args.property)
        .with_context(|| format!("--prop '{}' must be a plain file name", args.property))?;

    Ok(FetchConfig {
        output_dir: args.output_dir.clone(),
        property: args.property.clone(),
        allowed: ElementSet::allowed(),
    })
}

pub fn build_rester(api_key: &str, opts: &RemoteOptions) -> Result<MpRester> {
    ensure!(opts.chunk_size > 0, "--chunk-size must be at least 1");

    let rester = MpRester::new(api_key)
        .context("Failed to initialize HTTP client")?
        .with_endpoint(opts.endpoint.trim_end_matches('/'))
        .with_chunk_size(opts.chunk_size);
    Ok(rester)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;
    use std::path::PathBuf;

    fn fetch_args(extra: &[&str]) -> FetchArgs {
        let mut argv = vec!["cforge", "fetch", "KEY"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Fetch(args) => args,
            Command::Explore(_) => unreachable!(),
        }
    }

    #[test]
    fn property_names_the_output_files() {
        let config = build_fetch_config(&fetch_args(&["--prop", "band_gap", "--out", "runs"])).unwrap();
        assert_eq!(config.property, "band_gap");
        assert_eq!(config.output_dir, PathBuf::from("runs"));
    }

    #[test]
    fn property_with_path_separators_is_rejected() {
        for bad in ["../x", "nested/name", "..\\x", "  "] {
            assert!(build_fetch_config(&fetch_args(&["--prop", bad])).is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let args = fetch_args(&["--chunk-size", "0"]);
        assert!(build_rester(&args.api_key, &args.remote).is_err());
    }
}
