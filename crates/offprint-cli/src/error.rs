//! Error types for the `offprint` command line interface.
//!
//! Wraps the library error and adds the CLI's own failure modes, mainly
//! argument combinations clap cannot express declaratively.

use thiserror::Error;

/// Errors the CLI can exit with.
#[derive(Debug, Error)]
pub enum OffprintCliError {
  /// A failure bubbled up from the conversion library.
  #[error(transparent)]
  Offprint(#[from] offprint::error::OffprintError),

  /// Invalid argument combination or value.
  #[error("{0}")]
  Usage(String),
}

/// CLI-wide result alias.
pub type Result<T> = core::result::Result<T, OffprintCliError>;
