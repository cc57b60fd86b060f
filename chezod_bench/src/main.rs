use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::analysis::figures::{plot_corr_per_residue, plot_gt_vs_pred_contours};
use crate::analysis::per_residue::{correlation_table, get_z_score_per_residue, CheZodCompare, CompareInputs};
use crate::analysis::stability::run_stability_analysis;
use crate::config::BenchConfig;
use crate::constants::{COMBINED_STRATEGY, CONTOUR_PLOT, CORR_PER_RES_CSV, CORR_PER_RES_PLOT};
use crate::data_handling::chezod::ChezodDataset;
use crate::helper_functions::{dataframe_to_csv, ensure_dir};
use crate::models::{ModelType, TrainStrategy};
use crate::prediction_tools::onnx_lasso::OnnxLasso;
use crate::prediction_tools::ZScorePredictor;

mod analysis;
mod config;
mod constants;
mod data_handling;
mod helper_functions;
mod lasso_model;
mod models;
mod prediction_tools;

#[derive(Parser, Debug)]
#[command(
    name = "chezod-bench",
    version,
    about = "Per-residue CheZod disorder benchmark of ESM-based Lasso regressors against ODiNPred."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Per-residue Spearman comparison of the exported regressors and ODiNPred.
    Compare {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Directory with the `DisorderPredictions<brmid>.txt` ODiNPred outputs.
        #[arg(short = 'b', long)]
        benchmark_dir: PathBuf,

        #[arg(long)]
        models_dir: Option<PathBuf>,

        #[arg(long)]
        media_dir: Option<PathBuf>,

        /// JSON run configuration.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Stability selection over the representation features of one model.
    Stability {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// One of esm-1v, esm-1b, esm-msa, combined.
        #[arg(short = 'm', long)]
        model_type: String,

        #[arg(long)]
        media_dir: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct DatasetArgs {
    /// CheZod training set (JSON).
    #[arg(short = 't', long)]
    train_json_file: PathBuf,

    /// CheZod test set (JSON).
    #[arg(short = 'e', long)]
    test_json_file: PathBuf,

    /// Residue representations of the training proteins.
    #[arg(short = 'r', long)]
    train_repr_dir: PathBuf,

    /// Residue representations of the test proteins.
    #[arg(short = 'p', long)]
    test_repr_dir: PathBuf,

    #[arg(short = 's', long)]
    train_strategy: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Command::Compare {
            dataset,
            benchmark_dir,
            models_dir,
            media_dir,
            config,
        } => {
            let strategy = parse_strategy_or_exit(&dataset.train_strategy);
            run_compare(&dataset, strategy, &benchmark_dir, models_dir, media_dir, config.as_deref())
        }
        Command::Stability {
            dataset,
            model_type,
            media_dir,
            config,
        } => {
            let strategy = parse_strategy_or_exit(&dataset.train_strategy);
            let model = parse_model_or_exit(&model_type, strategy);
            run_stability(&dataset, model, media_dir, config.as_deref())
        }
    };

    if let Err(e) = outcome {
        error!("{e:#}");
        process::exit(1);
    }
}

fn parse_strategy_or_exit(name: &str) -> TrainStrategy {
    match name.parse::<TrainStrategy>() {
        Ok(s) => s,
        Err(_) => {
            println!("The training strategies are:");
            for s in TrainStrategy::whitelist() {
                println!("{s}");
            }
            process::exit(2);
        }
    }
}

fn parse_model_or_exit(name: &str, strategy: TrainStrategy) -> ModelType {
    let model = match name.parse::<ModelType>() {
        Ok(m) if m.has_regressor() => m,
        _ => {
            println!("The model types are:");
            for m in ModelType::ALL.iter().filter(|m| m.has_regressor()) {
                println!("{m}");
            }
            process::exit(2);
        }
    };
    if model == ModelType::Combined && strategy.name() != COMBINED_STRATEGY {
        println!("The combined model is only available with {COMBINED_STRATEGY}");
        process::exit(2);
    }
    model
}

fn resolve_config(
    config: Option<&Path>,
    models_dir: Option<PathBuf>,
    media_dir: Option<PathBuf>,
) -> Result<BenchConfig> {
    let mut cfg = BenchConfig::load(config)?;
    if let Some(dir) = models_dir {
        cfg.models_dir = dir;
    }
    if let Some(dir) = media_dir {
        cfg.media_dir = dir;
    }
    ensure_dir(&cfg.media_dir)?;
    Ok(cfg)
}

fn run_compare(
    args: &DatasetArgs,
    strategy: TrainStrategy,
    benchmark_dir: &Path,
    models_dir: Option<PathBuf>,
    media_dir: Option<PathBuf>,
    config: Option<&Path>,
) -> Result<()> {
    let cfg = resolve_config(config, models_dir, media_dir)?;
    info!("Comparing {:?} and combined against ODiNPred ({})", cfg.embedding_models, strategy);

    let dataset = ChezodDataset::new(&args.train_json_file, &args.test_json_file)?;

    let mut predictors: BTreeMap<ModelType, Box<dyn ZScorePredictor>> = BTreeMap::new();
    for &model in &cfg.embedding_models {
        predictors.insert(model, Box::new(OnnxLasso::load_for(&cfg.models_dir, model, strategy)?));
    }
    if strategy.name() == COMBINED_STRATEGY {
        let combined = OnnxLasso::load_for(&cfg.models_dir, ModelType::Combined, strategy)?;
        predictors.insert(ModelType::Combined, Box::new(combined));
    } else {
        warn!("No combined regressor for {}, comparing embedding models only", strategy);
    }

    let inputs = CompareInputs {
        benchmark_dir,
        test_repr_dir: &args.test_repr_dir,
        embedding_models: &cfg.embedding_models,
    };
    let scores = get_z_score_per_residue(&dataset, &inputs, &mut predictors)?;

    let compare = CheZodCompare::new(&scores);
    let corr = compare.corr_per_residue();

    let mut table = correlation_table(&corr)?;
    dataframe_to_csv(&mut table, &cfg.media_dir.join(CORR_PER_RES_CSV), true)
        .context("writing per-residue correlations")?;

    plot_corr_per_residue(
        &corr,
        cfg.highlight_model,
        cfg.reference_correlation,
        &cfg.media_dir.join(CORR_PER_RES_PLOT),
    )?;
    let (actual, per_model) = compare.z_scores_per_model();
    plot_gt_vs_pred_contours(&actual, &per_model, &cfg.media_dir.join(CONTOUR_PLOT))?;

    info!("Done, outputs in {}", cfg.media_dir.display());
    Ok(())
}

fn run_stability(
    args: &DatasetArgs,
    model: ModelType,
    media_dir: Option<PathBuf>,
    config: Option<&Path>,
) -> Result<()> {
    let cfg = resolve_config(config, None, media_dir)?;
    info!("Stability selection for {} ({} trials per lambda)", model, cfg.stability.nr_samples);

    let dataset = ChezodDataset::new(&args.train_json_file, &args.test_json_file)?;
    let sets = dataset.train_test_sets(&args.train_repr_dir, &args.test_repr_dir, model)?;
    let results = run_stability_analysis(&sets, &cfg.stability, model, &cfg.media_dir)?;

    for (cutoff, slim) in results {
        match slim.spearman {
            Some(rho) => info!("cp={cutoff}: {} coordinates, rho {rho:.4}", slim.n_coordinates),
            None => info!("cp={cutoff}: {} coordinates, rho undefined", slim.n_coordinates),
        }
        if let Some(fit) = &slim.fit {
            info!("cp={cutoff}: {} of {} refit coefficients non-zero", fit.n_selected(), fit.coef.len());
        }
    }
    Ok(())
}
