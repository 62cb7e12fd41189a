use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cforge",
    about = "Materials Project structure fetching and crystal graph exploration",
    version,
    author,
    before_help = crate::display::banner_for_help(),
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Download stable, ordered structures and a property table
    #[command(visible_alias = "f")]
    Fetch(FetchArgs),

    /// Featurize a fetched dataset and build an untrained network
    #[command(visible_alias = "e")]
    Explore(ExploreArgs),
}

/// Output options shared by all commands.
#[derive(Args)]
pub struct OutputOptions {
    /// Suppress progress output (for scripting)
    #[arg(short, long)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Args)]
pub struct FetchArgs {
    /// Materials Project API key
    #[arg(value_name = "API_KEY")]
    pub api_key: String,

    /// Property stored as the target column
    #[arg(long = "prop", value_name = "NAME", default_value = crystal_forge::fetch::DEFAULT_PROPERTY)]
    pub property: String,

    /// Directory receiving <prop>.csv and <prop>_cifs/
    #[arg(long = "out", value_name = "DIR", default_value = "data")]
    pub output_dir: PathBuf,

    #[command(flatten)]
    pub remote: RemoteOptions,

    #[command(flatten)]
    pub output: OutputOptions,
}

#[derive(Args)]
#[command(next_help_heading = "Remote API")]
pub struct RemoteOptions {
    /// Base URL of the REST API
    #[arg(long, value_name = "URL", default_value = crystal_forge::fetch::DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Number of documents requested per round trip
    #[arg(long = "chunk-size", value_name = "N", default_value_t = crystal_forge::fetch::DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,
}

#[derive(Args)]
pub struct ExploreArgs {
    /// Directory holding <prop>.csv
    #[arg(long = "csv-dir", value_name = "DIR", default_value = "data")]
    pub csv_dir: PathBuf,

    /// Directory holding the CIF files [default: <csv-dir>/<prop>_cifs]
    #[arg(long = "cif-dir", value_name = "DIR")]
    pub cif_dir: Option<PathBuf>,

    /// Directory holding atom_init.json [default: <csv-dir>]
    #[arg(long = "init-dir", value_name = "DIR")]
    pub init_dir: Option<PathBuf>,

    /// Property used as the regression target
    #[arg(long = "prop", value_name = "NAME", default_value = crystal_forge::fetch::DEFAULT_PROPERTY)]
    pub property: String,

    #[command(flatten)]
    pub run: RunOptions,

    #[command(flatten)]
    pub output: OutputOptions,
}

#[derive(Args)]
#[command(next_help_heading = "Exploration")]
pub struct RunOptions {
    /// Hyper-parameter file (TOML); embedded defaults if omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Dataset position of the structure to inspect
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub index: usize,

    /// Seed for dataset shuffling and batch sampling [default: settings value]
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,
}

impl Command {
    pub fn output(&self) -> &OutputOptions {
        match self {
            Command::Fetch(args) => &args.output,
            Command::Explore(args) => &args.output,
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn fetch_defaults() {
        let cli = Cli::try_parse_from(["cforge", "fetch", "KEY"]).unwrap();
        let Command::Fetch(args) = cli.command else {
            panic!("expected fetch");
        };
        assert_eq!(args.api_key, "KEY");
        assert_eq!(args.property, "final_energy");
        assert_eq!(args.output_dir, PathBuf::from("data"));
        assert_eq!(args.remote.chunk_size, 500);
        assert!(!args.output.quiet);
        assert_eq!(args.output.verbose, 0);
    }

    #[test]
    fn fetch_requires_api_key() {
        assert!(Cli::try_parse_from(["cforge", "fetch"]).is_err());
    }

    #[test]
    fn explore_flags() {
        let cli = Cli::try_parse_from([
            "cforge", "e", "--csv-dir", "runs", "--prop", "band_gap", "--index", "3", "-vv", "-q",
        ])
        .unwrap();
        let Command::Explore(args) = cli.command else {
            panic!("expected explore");
        };
        assert_eq!(args.csv_dir, PathBuf::from("runs"));
        assert_eq!(args.property, "band_gap");
        assert_eq!(args.run.index, 3);
        assert_eq!(args.run.seed, None);
        assert!(args.cif_dir.is_none());
        assert_eq!(args.output.verbose, 2);
        assert!(args.output.quiet);
    }
}
