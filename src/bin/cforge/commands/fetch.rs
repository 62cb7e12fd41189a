use anyhow::{Context, Result};
use crystal_forge::fetch::{FetchReport, fetch};
use tracing::info;

use crate::cli::FetchArgs;
use crate::config::{build_fetch_config, build_rester};
use crate::display::{Context as DisplayContext, Progress, path_label, print_dropped, print_fetch_summary};

const TOTAL_STEPS: u8 = 2;

pub fn run_fetch(args: FetchArgs, ctx: DisplayContext) -> Result<()> {
    let mut progress = Progress::new(ctx.interactive, TOTAL_STEPS, "Fetch complete");

    progress.step("Preparing request");
    let config = build_fetch_config(&args)?;
    let rester = build_rester(&args.api_key, &args.remote)?;
    progress.complete_step(
        "Preparing request",
        &[
            format!("Endpoint {}", rester.endpoint()),
            format!("Property '{}'", config.property),
            format!("Allow-list of {} elements", config.allowed.len()),
        ],
    );

    progress.step("Fetching structures");
    let report = fetch(&rester, &config).context("Fetching structures failed")?;
    progress.complete_step("Fetching structures", &fetch_substeps(&report));

    info!(
        queried = report.queried,
        kept = report.kept,
        dropped = report.dropped.len(),
        duplicates = report.duplicates.len(),
        "fetch finished"
    );

    if ctx.interactive {
        print_fetch_summary(&report);
        print_dropped(&report.dropped);
    }

    progress.finish();

    Ok(())
}

fn fetch_substeps(report: &FetchReport) -> Vec<String> {
    vec![
        format!("Query stable, ordered structures ({} found)", report.queried),
        format!("Drop {} outside the allow-list", report.dropped.len()),
        format!("Skip {} repeated task ids", report.duplicates.len()),
        format!("Write {} rows → {}", report.kept, path_label(&report.csv_path)),
        format!("Write {} CIF files → {}", report.kept, path_label(&report.cif_dir)),
    ]
}
