//! Command line interface for converting arXiv papers to e-reader PDFs.
//!
//! This crate provides the `offprint` binary, a thin CLI over the `offprint`
//! library. It supports:
//! - Converting one or more papers by ID or URL in a single run
//! - Named screen presets and custom page dimensions
//! - Figure embedding (with `--no-images` to skip downloads) and math
//!   rasterization (with `--no-math-images` to set equations as text)
//! - Output naming by title or by arXiv ID
//!
//! # Usage
//!
//! ```bash
//! # Convert a paper for the default Kindle Paperwhite page size
//! offprint 2402.08954
//!
//! # Convert several papers into a directory, named by ID
//! offprint --use-id -o papers/ 2402.08954 2401.12345
//!
//! # Custom page dimensions in millimeters
//! offprint --width 158 --height 210 https://arxiv.org/abs/2402.08954
//!
//! # Show the preset table
//! offprint --list-screens
//! ```
//!
//! Each paper's outcome is reported on its own line; a batch always runs to
//! completion, and the process exits nonzero when any conversion failed.
//! Verbosity is raised with repeated `-v` flags.

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::path::PathBuf;

use clap::{builder::ArgAction, Parser};
use console::style;
use offprint::{
  compose::PageGeometry,
  convert::{ConvertOptions, Converter},
  fetch::ArxivFetcher,
  math::DEFAULT_MATH_DPI,
  screen::{ScreenPreset, SCREEN_PRESETS},
};
use tracing_subscriber::EnvFilter;

pub mod error;

use crate::error::*;

/// Prefix for success messages
static SUCCESS_PREFIX: &str = "✓ ";
/// Prefix for error messages
static ERROR_PREFIX: &str = "✗ ";

/// Command line interface configuration and argument parsing
#[derive(Parser)]
#[command(author, version, about = "Convert arXiv papers into e-reader sized PDFs")]
pub struct Cli {
  /// Papers to convert, as arXiv IDs or arxiv.org URLs
  #[arg(value_name = "PAPER", required_unless_present = "list_screens")]
  papers: Vec<String>,

  /// Verbose mode (-v, -vv, -vvv) for different levels of logging detail
  #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help = "Increase logging verbosity"
    )]
  verbose: u8,

  /// Screen preset to size pages for (see --list-screens)
  #[arg(short, long, default_value = "kindle-paperwhite")]
  screen: String,

  /// Custom page width in millimeters, overriding the preset
  #[arg(long, requires = "height")]
  width: Option<f64>,

  /// Custom page height in millimeters, overriding the preset
  #[arg(long, requires = "width")]
  height: Option<f64>,

  /// Skip figure image downloads; captions are kept as placeholders
  #[arg(long)]
  no_images: bool,

  /// Skip math rasterization; equations are set as Unicode text
  #[arg(long)]
  no_math_images: bool,

  /// Resolution math expressions are rasterized at
  #[arg(long, default_value_t = DEFAULT_MATH_DPI)]
  math_dpi: u32,

  /// Name output files after the arXiv ID instead of the paper title
  #[arg(long)]
  use_id: bool,

  /// Directory output PDFs are written to
  #[arg(short, long, default_value = ".")]
  output: PathBuf,

  /// List available screen presets and exit
  #[arg(long)]
  list_screens: bool,
}

/// Configures the logging system based on the verbosity level
///
/// The verbosity levels are:
/// - 0: error (default)
/// - 1: warn
/// - 2: info
/// - 3: debug
/// - 4+: trace
fn setup_logging(verbosity: u8) {
  let filter = match verbosity {
    0 => "error",
    1 => "warn",
    2 => "info",
    3 => "debug",
    _ => "trace",
  };

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

  tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

/// Prints the preset table for `--list-screens`.
fn print_screens() {
  println!("Available screen presets:\n");
  for preset in SCREEN_PRESETS.iter() {
    println!(
      "  {} {:>5} x {:<5} mm  {}",
      style(format!("{:<20}", preset.key)).cyan(),
      preset.width_mm,
      preset.height_mm,
      preset.description,
    );
  }
  println!("\nCustom dimensions: --width <MM> --height <MM>");
}

/// Resolves page geometry from the preset flag or explicit dimensions.
///
/// Explicit `--width`/`--height` take precedence over `--screen`; clap
/// guarantees the two always appear together.
fn resolve_geometry(cli: &Cli) -> Result<PageGeometry> {
  if let (Some(width), Some(height)) = (cli.width, cli.height) {
    if width <= 0.0 || height <= 0.0 {
      return Err(OffprintCliError::Usage(format!(
        "page dimensions must be positive, got {width}x{height}"
      )));
    }
    return Ok(PageGeometry::custom(width, height));
  }
  match ScreenPreset::lookup(&cli.screen) {
    Some(preset) => Ok(PageGeometry::from_preset(preset)),
    None => Err(OffprintCliError::Usage(format!(
      "unknown screen preset \"{}\"; run with --list-screens to see the available keys",
      cli.screen
    ))),
  }
}

/// Entry point for the offprint CLI application
///
/// Parses arguments, validates geometry before any network traffic, runs the
/// batch, and reports each paper's outcome on its own line followed by a
/// summary. Exits nonzero when any conversion in the batch failed.
#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  setup_logging(cli.verbose);

  if cli.list_screens {
    print_screens();
    return Ok(());
  }

  let geometry = resolve_geometry(&cli)?;
  let options = ConvertOptions {
    geometry,
    include_images: !cli.no_images,
    math_images: !cli.no_math_images,
    math_dpi: cli.math_dpi,
    use_id: cli.use_id,
    output_dir: cli.output.clone(),
  };

  let converter = Converter::new(ArxivFetcher::new(), options);
  let results = converter.convert_batch(&cli.papers).await;

  let mut failed = 0;
  for (input, result) in &results {
    match result {
      Ok(outcome) => {
        println!(
          "{} {} → {}",
          style(SUCCESS_PREFIX).green(),
          outcome.id,
          outcome.pdf_path.display()
        );
      },
      Err(err) => {
        failed += 1;
        eprintln!("{} {input}: {err}", style(ERROR_PREFIX).red());
      },
    }
  }

  let succeeded = results.len() - failed;
  println!("Summary: {succeeded} succeeded, {failed} failed");
  if failed > 0 {
    std::process::exit(1);
  }
  Ok(())
}
