use anyhow::{Context, Result};
use candle_core::Device;
use crystal_forge::data::CifDataset;
use crystal_forge::explore::{Pipeline, inspect_example};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::cli::ExploreArgs;
use crate::config::{build_dataset_config, load_explore_settings};
use crate::display::{Context as DisplayContext, Progress, path_label, print_example, print_pipeline};
use crate::util::text::shape;

const TOTAL_STEPS: u8 = 4;

pub fn run_explore(args: ExploreArgs, ctx: DisplayContext) -> Result<()> {
    let mut progress = Progress::new(ctx.interactive, TOTAL_STEPS, "Exploration complete");

    progress.step("Loading settings");
    let settings = load_explore_settings(args.run.config.as_deref())?;
    let config = build_dataset_config(&args, &settings);
    let source = args
        .run
        .config
        .as_deref()
        .map(path_label)
        .unwrap_or_else(|| "embedded defaults".to_string());
    progress.complete_step(
        "Loading settings",
        &[
            format!("Hyper-parameters from {}", source),
            format!(
                "Radius {} Å, {} neighbors, step {} Å",
                config.radius, config.max_num_nbr, config.step
            ),
        ],
    );

    progress.step("Opening dataset");
    let device = Device::Cpu;
    let dataset = CifDataset::open(&config, &device)
        .with_context(|| format!("Failed to open dataset '{}'", config.csv_path.display()))?;
    progress.complete_step(
        "Opening dataset",
        &[
            format!("Read {} structures from {}", dataset.len(), path_label(&config.csv_path)),
            format!(
                "Atom features {}, distance features {}",
                dataset.atom_fea_len(),
                dataset.nbr_fea_len()
            ),
        ],
    );

    progress.step("Inspecting example");
    let summary = inspect_example(&dataset, args.run.index)
        .with_context(|| format!("Failed to featurize structure #{}", args.run.index))?;
    progress.complete_step(
        "Inspecting example",
        &[
            format!(
                "Featurize {} ({} atoms)",
                summary.id,
                summary.atom_fea.first().copied().unwrap_or(0)
            ),
            format!("Assemble edge features {}", shape(&summary.total_nbr_fea)),
            format!("Gated projection {}", shape(&summary.total_gated_fea)),
        ],
    );

    if ctx.interactive {
        print_example(&summary);
    }

    progress.step("Building training pipeline");
    let mut rng = StdRng::seed_from_u64(config.random_seed);
    let pipeline =
        Pipeline::build(&dataset, &settings, &mut rng).context("Failed to build training pipeline")?;
    let baseline = pipeline
        .baseline(&dataset, &mut rng)
        .context("Forward pass on the first training batch failed")?;
    progress.complete_step(
        "Building training pipeline",
        &[
            format!(
                "Split {} / {} structures (train / validation)",
                pipeline.loaders.train.len(),
                pipeline.loaders.val.len()
            ),
            format!("Initialize {} parameters", pipeline.parameter_count()),
            format!("Baseline {} loss on {} crystals", pipeline.criterion, baseline.crystals),
        ],
    );

    if ctx.interactive {
        print_pipeline(&pipeline, &baseline);
    }

    progress.finish();

    Ok(())
}
