use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;

use carprice_inference::logging::init_logging;
use carprice_inference::schema::{
    self, column_kind, describe, display_domain, ColumnKind, DROPPED_COLUMNS, FEATURE_COLUMNS,
    RECORD_COLUMNS,
};
use carprice_inference::{Config, Doors, PricePipeline};

#[derive(Parser)]
#[command(name = "carprice", version, about = "Predict used-car prices from fitted artifacts")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the encoder and model artifacts
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Predict the price of one vehicle described by a JSON record
    Predict {
        /// Record file, or `-` for stdin
        #[arg(long, short)]
        record: PathBuf,

        /// Print the full-precision result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the record fields, dropped columns and model feature order
    Schema,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_env_overrides();
    if let Some(dir) = cli.base_dir {
        config.artifacts.base_dir = dir;
    }

    init_logging(&config.log_level);

    match cli.command {
        Command::Predict { record, json } => run_predict(config, &record, json),
        Command::Schema => {
            print_schema();
            Ok(())
        }
    }
}

fn read_record(path: &Path) -> anyhow::Result<serde_json::Value> {
    let mut content = String::new();
    if path == Path::new("-") {
        std::io::stdin()
            .read_to_string(&mut content)
            .context("failed to read record from stdin")?;
    } else {
        content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read record from {}", path.display()))?;
    }
    serde_json::from_str(&content).context("record is not valid JSON")
}

fn run_predict(config: Config, record: &Path, as_json: bool) -> anyhow::Result<()> {
    let value = read_record(record)?;
    let pipeline = PricePipeline::new(config);

    let prediction = pipeline
        .run_json(&value)
        .map_err(|err| anyhow::anyhow!("{} stage failed: {err}", err.stage()))?;

    if as_json {
        let out = json!({
            "price": prediction.price,
            "rounded": prediction.rounded(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("The predicted price is: {prediction}");
    }
    Ok(())
}

fn print_schema() {
    println!("Record fields:");
    for name in RECORD_COLUMNS {
        let kind = match column_kind(name) {
            Some(ColumnKind::Categorical) => "categorical",
            _ => "numeric",
        };
        println!("  {:<17} {:<12} {}", name, kind, describe(name).unwrap_or(""));
        if let Some(domain) = display_domain(name) {
            println!("  {:<17} {:<12} one of: {}", "", "", domain.join(", "));
        }
    }
    println!();
    println!(
        "Doors tokens: 2 -> {}, 4 -> {}, >5 -> {}",
        Doors::Two.encoded_token(),
        Doors::Four.encoded_token(),
        Doors::MoreThanFive.encoded_token(),
    );
    println!("Dropped before inference: {}", DROPPED_COLUMNS.join(", "));
    println!(
        "Model feature order ({}): {}",
        schema::NUM_FEATURES,
        FEATURE_COLUMNS.join(", ")
    );
}
