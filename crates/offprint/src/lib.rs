//! Conversion of arXiv HTML papers into PDFs for e-reader screens.
//!
//! `offprint` fetches the HTML rendering that arXiv generates for a paper,
//! extracts its structured content, and lays that content out as a paginated
//! PDF sized for a particular e-reader display. The pipeline is three
//! composable steps:
//!
//! 1. **Fetch**: [`fetch::ArxivFetcher`] normalizes an identifier or URL and
//!    retrieves the paper's HTML rendering.
//! 2. **Parse**: [`parse::parse_paper`] turns the raw HTML into a structured
//!    [`paper::Paper`], rasterizing embedded LaTeX math along the way.
//! 3. **Compose**: [`compose::compose_pdf`] paginates the paper onto pages
//!    matching a named [`screen::ScreenPreset`] or custom dimensions.
//!
//! [`convert::Converter`] sequences the three steps for one or more papers and
//! handles output naming; the `offprint` binary is a thin CLI over it.
//!
//! # Getting started
//!
//! ```no_run
//! use offprint::{
//!   convert::{ConvertOptions, Converter},
//!   fetch::ArxivFetcher,
//!   prelude::*,
//! };
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!   let converter = Converter::new(ArxivFetcher::new(), ConvertOptions::default());
//!   let outcome = converter.convert("2402.08954").await?;
//!   println!("Wrote {}", outcome.pdf_path.display());
//!   Ok(())
//! }
//! ```
//!
//! # Module organization
//!
//! - [`paper`]: the structured document model produced by parsing
//! - [`fetch`]: identifier normalization and HTML retrieval
//! - [`parse`]: LaTeXML HTML extraction
//! - [`math`]: LaTeX math rasterization with graceful degradation
//! - [`compose`]: PDF layout and pagination
//! - [`screen`]: the e-reader page-size preset table
//! - [`convert`]: the fetch → parse → compose orchestrator
//! - [`error`]: the crate error type
//!
//! # Failure philosophy
//!
//! A single equation that cannot be typeset must never sink a whole paper, and
//! a single paper that cannot be converted must never sink a whole batch. Math
//! rendering degrades per-span to a textual placeholder, figure downloads
//! degrade per-figure to a caption-only block, and batch conversion reports
//! each identifier's outcome independently.

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

pub mod compose;
pub mod convert;
pub mod error;
pub mod fetch;
pub mod format;
pub mod math;
pub mod paper;
pub mod parse;
pub mod screen;

use crate::error::*;

/// Common traits and types for ergonomic imports.
///
/// A single glob import brings in the error type, the `Result` alias, and the
/// [`PaperSource`](fetch::PaperSource) seam used by the orchestrator:
///
/// ```no_run
/// use offprint::prelude::*;
///
/// async fn example() -> Result<()> {
///   let fetched = offprint::fetch::ArxivFetcher::new().fetch_html("2402.08954").await?;
///   println!("{}", fetched.id);
///   Ok(())
/// }
/// ```
pub mod prelude {
  pub use crate::{
    error::{OffprintError, Result},
    fetch::PaperSource,
  };
}
