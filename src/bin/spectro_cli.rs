use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use spectro_dataset::config::AppConfig;
use spectro_dataset::dataset::{prune_non_images, MetadataExporter};
use spectro_dataset::pipeline::PipelineDriver;
use spectro_dataset::spectrogram::SpectrogramInverter;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(
    name = "spectro_cli",
    about = "Build labeled mel-spectrogram image datasets from raw audio folders"
)]
struct Cli {
    /// JSON configuration file (defaults are used for missing fields)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Segment, encode and write every audio file under the raw root
    Build {
        #[arg(long)]
        raw_root: PathBuf,
        #[arg(long)]
        data_root: PathBuf,
        /// Labels to process (repeatable); defaults to every subdirectory
        #[arg(long = "label")]
        labels: Vec<String>,
        /// Seed for reproducible train/test assignment
        #[arg(long)]
        seed: Option<u64>,
        /// Worker threads per label
        #[arg(long, default_value_t = 1)]
        jobs: usize,
        /// Do not write metadata.csv after the build
        #[arg(long)]
        skip_metadata: bool,
    },
    /// Write metadata.csv for an existing dataset tree
    Metadata {
        #[arg(long)]
        data_root: PathBuf,
    },
    /// Reconstruct approximate audio from a spectrogram image
    Invert {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
        /// Skip the spectral-gate noise reduction
        #[arg(long)]
        no_denoise: bool,
    },
    /// Remove non-image files from <root>/<class>/ directories
    Prune {
        #[arg(long)]
        root: PathBuf,
    },
    /// Print the effective configuration as JSON
    Config,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Build {
            raw_root,
            data_root,
            labels,
            seed,
            jobs,
            skip_metadata,
        } => {
            let mut driver = PipelineDriver::new(raw_root, data_root, config)
                .with_labels(labels)
                .with_jobs(jobs)
                .with_metadata(!skip_metadata);
            if let Some(seed) = seed {
                driver = driver.with_seed(seed);
            }
            run_build(&driver)
        }
        Commands::Metadata { data_root } => run_metadata(&config, data_root),
        Commands::Invert {
            image,
            output,
            seed,
            no_denoise,
        } => run_invert(config, image, output, seed, no_denoise),
        Commands::Prune { root } => run_prune(root),
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::from(0))
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };
    // Logs go to stderr so stdout carries only command output.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_build(driver: &PipelineDriver) -> Result<ExitCode> {
    let report = driver.run().context("building dataset")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::from(0))
}

fn run_metadata(config: &AppConfig, data_root: PathBuf) -> Result<ExitCode> {
    let rows = MetadataExporter::new(&config.dataset)
        .export(&data_root)
        .with_context(|| format!("writing metadata under {}", data_root.display()))?;
    println!("{}", rows);
    Ok(ExitCode::from(0))
}

fn run_invert(
    mut config: AppConfig,
    image: PathBuf,
    output: PathBuf,
    seed: Option<u64>,
    no_denoise: bool,
) -> Result<ExitCode> {
    if no_denoise {
        config.inversion.noise_reduction = false;
    }
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let inverter = SpectrogramInverter::new(&config.spectrogram, &config.inversion);
    let samples = inverter
        .invert_image_file(&image, &output, &mut rng)
        .with_context(|| format!("inverting {}", image.display()))?;
    println!("{}", samples);
    Ok(ExitCode::from(0))
}

fn run_prune(root: PathBuf) -> Result<ExitCode> {
    let removed =
        prune_non_images(&root).with_context(|| format!("pruning {}", root.display()))?;
    println!("{}", removed);
    Ok(ExitCode::from(0))
}
