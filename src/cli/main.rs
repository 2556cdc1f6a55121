use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use ir2tif::config::Config;
use ir2tif::converter::ThermalConverter;
use ir2tif::pipeline::{self, InputMode};

#[derive(Parser, Debug)]
#[command(
    name = "ir2tif",
    version,
    about = "Convert radiometric thermal JPGs to TIFF and extract their metadata as JSON"
)]
struct Cli {
    /// A thermal JPG or a directory of them
    #[arg(value_name = "INPUT", required_unless_present = "init")]
    input: Option<PathBuf>,

    /// Directory for TIFFs and metadata JSON (created if missing)
    #[arg(value_name = "OUTPUT", required_unless_present = "init")]
    output: Option<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Path to the native converter library (overrides the config)
    #[arg(long, value_name = "FILE")]
    library: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Output per-file results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    let (Some(input), Some(output)) = (cli.input, cli.output) else {
        anyhow::bail!("Both INPUT and OUTPUT are required. Use --help for usage.");
    };

    // Load config
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(library) = cli.library {
        config.library.path = Some(library);
    }

    // Nothing to do for a bad input; skip loading the library.
    if InputMode::of(&input) == InputMode::Invalid {
        log::error!("Invalid input path: {}", input.display());
        return Ok(());
    }

    let converter = ThermalConverter::from_config(&config)?;
    log::debug!("Using converter: {}", converter.backend_name());

    let report = pipeline::run_batch(&converter, &input, &output, &config)?;

    // JSON output
    if cli.json {
        let json_results: Vec<serde_json::Value> = report
            .outcomes
            .iter()
            .map(|r| {
                serde_json::json!({
                    "path": r.source.display().to_string(),
                    "tiff": r.tiff.as_ref().map(|p| p.display().to_string()),
                    "metadata": r.metadata,
                    "error": r.error,
                    "metadata_error": r.metadata_error,
                })
            })
            .collect();

        println!("{}", serde_json::to_string_pretty(&json_results)?);
    }

    Ok(())
}
