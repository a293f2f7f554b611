use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use traffic_severity::{
    config::{Config, CONFIG_PATH_ENV},
    ml::FeatureInput,
    pipeline::Pipeline,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "traffic-severity", version)]
#[command(about = "Synthetic traffic accident severity pipeline", long_about = None)]
struct Cli {
    /// Configuration file layered over the embedded defaults
    #[arg(short, long, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Override generation.record_count
    #[arg(short, long)]
    records: Option<usize>,

    /// Override generation.seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Override training.model.estimator_count
    #[arg(short, long)]
    estimators: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and print the report as JSON
    Run,

    /// Train once, then predict the severity of one partial record
    Predict {
        /// Categorical input as FIELD=VALUE (e.g. weather_condition=Rainy)
        #[arg(short = 'C', long = "category", value_parser = parse_key_value)]
        categories: Vec<(String, String)>,

        /// Raw column value as COLUMN=NUMBER (e.g. speed_limit_mph=60)
        #[arg(short = 'V', long = "value", value_parser = parse_key_value)]
        values: Vec<(String, String)>,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    if let Some(records) = cli.records {
        config.generation.record_count = records;
    }
    if let Some(seed) = cli.seed {
        config.generation.seed = seed;
    }
    if let Some(estimators) = cli.estimators {
        config.training.model.estimator_count = estimators;
    }

    // Initialize tracing; stdout carries the JSON output
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting traffic-severity");

    let pipeline = Pipeline::new(config).context("Invalid configuration")?;
    let run = pipeline.run().context("Pipeline run failed")?;

    match cli.command {
        Commands::Run => {
            println!("{}", serde_json::to_string_pretty(&run.report)?);
        }
        Commands::Predict { categories, values } => {
            let mut input = FeatureInput::new();
            for (field, category) in categories {
                input = input.with_category(field, category);
            }
            for (column, raw) in values {
                let value: f64 = raw
                    .parse()
                    .with_context(|| format!("value for '{}' is not a number: '{}'", column, raw))?;
                if !value.is_finite() {
                    bail!("value for '{}' must be finite", column);
                }
                input = input.with_value(column, value);
            }

            let adapter = run.inference_adapter()?;
            let assessment = adapter.predict(&input)?;
            println!("{}", serde_json::to_string_pretty(&assessment)?);
        }
    }

    Ok(())
}
