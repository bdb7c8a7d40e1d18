//! `scoring`: compute configured metrics over a directory of datasets.

use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use scoring_core::config::ConfigError;
use scoring_core::display::{format_trace, write_csv};
use scoring_core::store::KeyError;
use scoring_core::{
    CancelToken, DirectoryProvider, EngineSettings, Key, LoaderRegistry, Pipeline, ScoringError, SharedLogger,
    YamlConfigProvider,
};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "scoring", version, about)]
struct Cli {
    #[command(flatten)]
    globals: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// YAML settings file. Flags and environment variables override its values
    #[arg(long, global = true, value_name = "PATH", env = "SCORING_SETTINGS")]
    settings: Option<PathBuf>,

    /// Directory holding the dataset files
    #[arg(long, global = true, value_name = "DIR", env = "SCORING_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Directory holding score configurations
    #[arg(long, global = true, value_name = "DIR", env = "SCORING_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Score configuration identifier, e.g. `score_1.yaml`
    #[arg(long, global = true, value_name = "ID", env = "SCORING_CONFIG")]
    config: Option<String>,

    /// Number of parallel workers
    #[arg(long, global = true, value_name = "N", env = "SCORING_WORKERS")]
    workers: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute every key and write a sorted CSV table
    Batch {
        /// Output file (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Print rows as JSON lines in completion order
    Stream,
    /// Show how one metric was computed for one key
    Explain {
        #[arg(long)]
        entity: String,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        metric: String,
    },
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Settings(#[from] ConfigError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error("invalid key: {0}")]
    Key(#[from] KeyError),
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to encode row: {0}")]
    Json(#[from] serde_json::Error),
}

fn resolve_settings(globals: &GlobalArgs) -> Result<EngineSettings, ConfigError> {
    let mut settings = match &globals.settings {
        Some(path) => EngineSettings::from_yaml_file(path)?,
        None => EngineSettings::default(),
    };
    if let Some(dir) = &globals.data_dir {
        settings.data_dir = dir.clone();
    }
    if let Some(dir) = &globals.config_dir {
        settings.config_dir = dir.clone();
    }
    if let Some(id) = &globals.config {
        settings.config_id = id.clone();
    }
    if let Some(workers) = globals.workers {
        if workers == 0 {
            return Err(ConfigError::InvalidSetting("workers must be at least 1".to_string()));
        }
        settings.workers = workers;
    }
    Ok(settings)
}

fn run(cli: Cli) -> Result<(), CliError> {
    let settings = resolve_settings(&cli.globals)?;
    let logger = SharedLogger::global();
    let configs = YamlConfigProvider::new(&settings.config_dir);
    let data = DirectoryProvider::new(LoaderRegistry::default(), logger.clone());
    let pipeline = Pipeline::new(logger, &configs, &data)
        .with_bindings(settings.bindings.clone())
        .with_workers(settings.workers);
    let cancel = CancelToken::new();

    match cli.command {
        Command::Batch { output } => {
            let (config, rows) = pipeline.compute_batch(&cancel, &settings.config_id, &settings.data_dir)?;
            match output {
                Some(path) => write_csv(BufWriter::new(File::create(path)?), &config, &rows)?,
                None => write_csv(io::stdout().lock(), &config, &rows)?,
            }
        }
        Command::Stream => {
            let prepared = pipeline.prepare(&settings.config_id, &settings.data_dir)?;
            let mut out = io::stdout().lock();
            for row in pipeline.stream(cancel, prepared)? {
                serde_json::to_writer(&mut out, &row)?;
                writeln!(out)?;
            }
            out.flush()?;
        }
        Command::Explain { entity, year, metric } => {
            let key = Key::new(entity, year)?;
            let prepared = pipeline.prepare(&settings.config_id, &settings.data_dir)?;
            let engine = pipeline.engine(prepared.plan, prepared.datasets);
            print!("{}", format_trace(&engine, &key, &metric));
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
