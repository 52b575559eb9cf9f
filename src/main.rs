use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use listing_pricer::app::predict_use_case::PredictUseCase;
use listing_pricer::app::preprocess_use_case::{preprocess_with, PreprocessOptions};
use listing_pricer::app::training_use_case::prepare_training;
use listing_pricer::config::Config;
use listing_pricer::constants::{DEFAULT_MODEL_NAME, PRICE};
use listing_pricer::infra::{registry_from_config, ModelCache};
use listing_pricer::model::ModelArtifact;
use listing_pricer::observability::{init_logging, metrics};
use listing_pricer::pipeline::ingestion::{read_clean_csv, read_csv, write_training_csv};
use listing_pricer::pipeline::PreprocessArtifact;
use listing_pricer::server::{start_server, AppState};

#[derive(Parser)]
#[command(name = "listing_pricer")]
#[command(about = "Clean short-term rental listings and serve nightly price predictions")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean a raw listings CSV into a model-ready CSV
    Preprocess {
        #[arg(long, default_value = "data/raw/listings.csv")]
        input: PathBuf,
        #[arg(long, default_value = "data/processed/listings_clean.csv")]
        output: PathBuf,
        /// Write the vocabulary and imputation medians here
        #[arg(long)]
        artifact_out: Option<PathBuf>,
        /// Encode with a previously saved artifact instead of fitting one
        #[arg(long)]
        frozen_artifact: Option<PathBuf>,
    },
    /// Cap outliers, log the target and split a clean CSV into train/test sets
    PrepareTraining {
        #[arg(long, default_value = "data/processed/listings_clean.csv")]
        input: PathBuf,
        #[arg(long, default_value = "data/training")]
        out_dir: PathBuf,
    },
    /// Store a model artifact JSON file as a new registry version
    Register {
        #[arg(long)]
        artifact: PathBuf,
        /// Bundle this preprocessing artifact so raw listings can be scored
        #[arg(long)]
        preprocess_artifact: Option<PathBuf>,
        /// Also point this alias at the new version
        #[arg(long)]
        alias: Option<String>,
    },
    /// Point a registry alias at a model version
    SetAlias {
        version: u32,
        #[arg(long, default_value = DEFAULT_MODEL_NAME)]
        name: String,
        #[arg(long, default_value = "champion")]
        alias: String,
    },
    /// Predict one listing's nightly price from encoded features
    Predict {
        /// JSON object of the nine encoded features, or @path to a JSON file
        features: String,
        /// Overrides registry.model_uri
        #[arg(long)]
        model_uri: Option<String>,
    },
    /// Price every listing of a raw CSV with the model's bundled preprocessing
    Score {
        #[arg(long)]
        input: PathBuf,
        /// Overrides registry.model_uri
        #[arg(long)]
        model_uri: Option<String>,
    },
    /// Run the HTTP prediction server
    Serve {
        /// Overrides server.port
        #[arg(long)]
        port: Option<u16>,
    },
}

fn read_features(arg: &str) -> anyhow::Result<BTreeMap<String, f64>> {
    let text = match arg.strip_prefix('@') {
        Some(path) => fs::read_to_string(path).with_context(|| format!("reading {path}"))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&text).context("features must be a JSON object of numbers")
}

fn run_preprocess(
    input: &Path,
    output: &Path,
    artifact_out: Option<&Path>,
    frozen_artifact: Option<&Path>,
) -> anyhow::Result<()> {
    let frozen = frozen_artifact.map(PreprocessArtifact::load).transpose()?;
    let processed = preprocess_with(
        input,
        output,
        PreprocessOptions {
            frozen,
            artifact_out,
        },
    )?;

    let report = &processed.report;
    println!("\n📊 Preprocessing results:");
    println!("   Rows in: {}", report.rows_in);
    println!("   Rows out: {}", report.rows_out);
    println!("   Rows dropped: {}", report.dropped_rows());
    for (column, count) in &report.nulls_imputed {
        if *count > 0 {
            println!("   Imputed {} nulls in {}", count, column);
        }
    }
    println!("   Output file: {}", output.display());
    Ok(())
}

fn run_prepare_training(config: &Config, input: &Path, out_dir: &Path) -> anyhow::Result<()> {
    let table = read_clean_csv(input)?;
    let prepared = prepare_training(&table, &config.training)?;

    let target_column = format!("log1p_{PRICE}");
    write_training_csv(
        &prepared.train.frame,
        &prepared.train.targets,
        &target_column,
        &out_dir.join("train.csv"),
    )?;
    write_training_csv(
        &prepared.test.frame,
        &prepared.test.targets,
        &target_column,
        &out_dir.join("test.csv"),
    )?;
    fs::write(
        out_dir.join("metadata.json"),
        serde_json::to_vec_pretty(&prepared.metadata)?,
    )?;

    let meta = &prepared.metadata;
    println!("\n✂️ Price cap: {:.0} (q={})", meta.price_cap.threshold, meta.price_cap.quantile);
    println!("   Train rows: {}", meta.train_rows);
    println!("   Test rows: {}", meta.test_rows);
    println!("   Run: {}", meta.run_id);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    metrics::init();

    match cli.command {
        Commands::Preprocess {
            input,
            output,
            artifact_out,
            frozen_artifact,
        } => {
            println!("🧹 Cleaning {}...", input.display());
            if let Err(e) = run_preprocess(
                &input,
                &output,
                artifact_out.as_deref(),
                frozen_artifact.as_deref(),
            ) {
                error!("Preprocessing failed: {:#}", e);
                println!("❌ Preprocessing failed: {:#}", e);
                return Err(e);
            }
            println!("✅ Preprocessing completed successfully");
        }
        Commands::PrepareTraining { input, out_dir } => {
            run_prepare_training(&config, &input, &out_dir)?;
            println!("✅ Training sets written to {}", out_dir.display());
        }
        Commands::Register {
            artifact,
            preprocess_artifact,
            alias,
        } => {
            let bytes = fs::read(&artifact).with_context(|| format!("reading {}", artifact.display()))?;
            let mut model: ModelArtifact = serde_json::from_slice(&bytes)?;
            if let Some(path) = preprocess_artifact {
                model
                    .attach_preprocessing(PreprocessArtifact::load(&path)?)
                    .with_context(|| format!("bundling {}", path.display()))?;
            }
            let name = model.name.clone();
            let registry = registry_from_config(&config.registry)?;
            let version = registry.register(model).await?;
            println!("📦 Registered {} as version {}", name, version);
            if let Some(alias) = alias {
                registry.set_alias(&name, &alias, version).await?;
                println!("🏷️ models:/{}@{} -> v{}", name, alias, version);
            }
        }
        Commands::SetAlias {
            version,
            name,
            alias,
        } => {
            let registry = registry_from_config(&config.registry)?;
            registry.set_alias(&name, &alias, version).await?;
            let confirmed = registry.alias_version(&name, &alias).await?;
            println!("🏷️ Alias '{}' set on v{}", alias, version);
            println!("   Confirmed: models:/{}@{} -> v{}", name, alias, confirmed);
        }
        Commands::Predict {
            features,
            model_uri,
        } => {
            let features = read_features(&features)?;
            let model_uri = model_uri.unwrap_or_else(|| config.registry.model_uri.clone());
            let loader = Arc::new(ModelCache::new(registry_from_config(&config.registry)?));
            let price = PredictUseCase::new(loader)
                .predict(&features, &model_uri)
                .await?;
            println!("💶 Predicted nightly price: {:.2}", price);
        }
        Commands::Score { input, model_uri } => {
            let batch = read_csv(&input)?;
            let model_uri = model_uri.unwrap_or_else(|| config.registry.model_uri.clone());
            let loader = Arc::new(ModelCache::new(registry_from_config(&config.registry)?));
            let prices = PredictUseCase::new(loader)
                .predict_listings(&batch, &model_uri)
                .await?;
            println!("💶 Predicted nightly prices for {} listings:", prices.len());
            for (row, price) in prices.iter().enumerate() {
                println!("   {}: {:.2}", row, price);
            }
        }
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.server.port);
            let loader = Arc::new(ModelCache::new(registry_from_config(&config.registry)?));
            let state = AppState {
                predictor: Arc::new(PredictUseCase::new(loader)),
                model_uri: config.registry.model_uri.clone(),
            };
            info!("Serving predictions from {}", state.model_uri);
            if let Err(e) = start_server(state, port).await {
                bail!("server stopped: {e}");
            }
        }
    }

    Ok(())
}
