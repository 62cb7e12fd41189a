mod explore;
mod fetch;

pub use explore::{build_dataset_config, load_explore_settings};
pub use fetch::{build_fetch_config, build_rester};
