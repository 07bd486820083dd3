//! Error types for the offprint library.
//!
//! One enum covers every failure mode in the conversion pipeline: identifier
//! validation, HTML retrieval, document extraction, and PDF composition.
//! Per-equation math failures are deliberately *not* represented here — the
//! math renderer absorbs them and substitutes a placeholder, so they never
//! propagate as errors (see [`crate::math`]).
//!
//! # Examples
//!
//! ```
//! use offprint::{error::OffprintError, fetch};
//!
//! match fetch::normalize_arxiv_id("not-a-valid-id") {
//!   Err(OffprintError::InvalidIdentifier(input)) => println!("rejected {input}"),
//!   _ => unreachable!(),
//! }
//! ```

use thiserror::Error;

/// Error type alias used for the [`offprint`](crate) crate.
pub type Result<T> = core::result::Result<T, OffprintError>;

/// Errors that can occur while converting a paper.
///
/// The variants map onto the pipeline stages: identifier handling and HTML
/// retrieval (`InvalidIdentifier`, `Network`, `NotFound`, `Api`), document
/// extraction (`Parse`), and PDF composition (`Render`, `Image`, `Io`).
#[derive(Error, Debug)]
pub enum OffprintError {
  /// The input could not be recognized as an arXiv identifier or URL.
  ///
  /// Accepted forms are new-style IDs ("2402.08954", optionally with a
  /// version suffix), old-style IDs ("hep-th/9901001"), `arxiv:`-prefixed
  /// IDs, and arxiv.org abs/html/pdf URLs. The string parameter carries the
  /// rejected input for error messages.
  #[error("Could not extract arXiv ID from \"{0}\"")]
  InvalidIdentifier(String),

  /// A network request failed in transport.
  ///
  /// Covers unreachable hosts, timeouts, and TLS failures from the
  /// underlying HTTP client.
  #[error(transparent)]
  Network(#[from] reqwest::Error),

  /// No HTML rendering exists for the requested paper.
  ///
  /// arXiv only generates HTML for papers with compatible LaTeX source;
  /// older papers and some formats have no HTML version at all. The
  /// parameter is the canonical paper ID.
  #[error("No HTML version available for arXiv paper {0}")]
  NotFound(String),

  /// arXiv answered with an unexpected status code.
  ///
  /// Anything that is neither success nor the 404 that signals a missing
  /// HTML rendering ends up here, with the status line for debugging.
  #[error("Unexpected arXiv response: {0}")]
  Api(String),

  /// The document structure was not recognizable as arXiv HTML.
  ///
  /// Raised only when the document carries none of the LaTeXML markers the
  /// parser keys off of. Missing optional fields (abstract, date, figures)
  /// never produce this error.
  #[error("Unrecognized document structure: {0}")]
  Parse(String),

  /// PDF composition failed.
  ///
  /// Wraps layout and rasterization failures from the PDF backend, including
  /// missing fonts and page-size problems. When this error is returned no
  /// output file has been written.
  #[error("PDF rendering failed: {0}")]
  Render(String),

  /// An image resource could not be decoded or embedded.
  #[error("Image error: {0}")]
  Image(String),

  /// A file system operation failed.
  #[error(transparent)]
  Io(#[from] std::io::Error),
}
