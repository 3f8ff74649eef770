//! Trace optimizer CLI

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use tracejit::{OptLevel, OptimizationPipeline, PipelineConfig, Trace};

#[derive(Parser)]
#[command(name = "tracejit", version, about = "Tracing JIT trace optimizer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Optimize a recorded trace
    Optimize {
        /// Trace file (JSON)
        file: PathBuf,
        /// Optimization level
        #[arg(short, long, value_enum)]
        level: Option<Level>,
        /// Pipeline configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Print the optimized trace as JSON
        #[arg(long)]
        json: bool,
        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
    /// Print a trace in text form
    Show {
        /// Trace file (JSON)
        file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Level {
    Debug,
    Release,
}

impl From<Level> for OptLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Debug => OptLevel::Debug,
            Level::Release => OptLevel::Release,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Optimize {
            file,
            level,
            config,
            json,
            verbose,
        } => optimize_file(&file, level, config.as_deref(), json, verbose),
        Command::Show { file } => {
            init_logging(false);
            show_file(&file)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if verbose { "debug" } else { "warn" }),
    )
    .init();
}

fn load_trace(path: &Path) -> Result<Trace, Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&source)?)
}

fn optimize_file(
    path: &Path,
    level: Option<Level>,
    config: Option<&Path>,
    json: bool,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match config {
        Some(config) => PipelineConfig::from_file(config)?,
        None => PipelineConfig::new(),
    };
    if let Some(level) = level {
        config = config.opt_level(level.into());
    }
    let verbose = config.verbose || verbose;
    let config = config.verbose(verbose);
    init_logging(config.verbose);

    let mut trace = load_trace(path)?;
    let pipeline = OptimizationPipeline::from_config(&config);
    let stats = pipeline.optimize(&mut trace)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&trace)?);
    } else {
        println!("{trace}");
    }
    if config.verbose {
        eprintln!("{stats}");
    }
    Ok(())
}

fn show_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let trace = load_trace(path)?;
    println!("; {} input(s), {} operation(s)", trace.inputs, trace.len());
    println!("{trace}");
    Ok(())
}
