//! arXiv identifier normalization and HTML retrieval.
//!
//! This module turns the many ways a user can name a paper — bare IDs,
//! versioned IDs, old-style IDs, `arxiv:` prefixes, abs/html/pdf URLs — into
//! a canonical identifier, and fetches the HTML rendering that arXiv
//! generates for that paper's latest matching version.
//!
//! # Examples
//!
//! ```no_run
//! use offprint::fetch::{normalize_arxiv_id, ArxivFetcher, PaperSource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! assert_eq!(normalize_arxiv_id("https://arxiv.org/abs/2402.08954")?, "2402.08954");
//!
//! let fetched = ArxivFetcher::new().fetch_html("2402.08954").await?;
//! println!("{} bytes of HTML", fetched.html.len());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use super::*;

/// The HTML rendering of one paper, as retrieved from arXiv.
#[derive(Debug, Clone)]
pub struct FetchedPaper {
  /// Canonical arXiv identifier.
  pub id:       String,
  /// Raw HTML of the paper.
  pub html:     String,
  /// Base URL for resolving relative resource links in the HTML.
  pub base_url: Url,
}

/// Source of paper HTML, the seam between the orchestrator and the network.
///
/// Production code uses [`ArxivFetcher`]; tests substitute an in-memory
/// implementation so batch semantics can be exercised offline.
#[async_trait]
pub trait PaperSource: Send + Sync {
  /// Retrieves the HTML rendering for the paper named by `input`.
  async fn fetch_html(&self, input: &str) -> Result<FetchedPaper>;
}

lazy_static! {
  /// New-style ID, optionally versioned: "2402.08954", "2402.08954v2".
  static ref ARXIV_NEW: Regex = Regex::new(r"^\d{4}\.\d{4,5}(v\d+)?$").unwrap();
  /// Old-style ID, optionally versioned: "hep-th/9901001".
  static ref ARXIV_OLD: Regex = Regex::new(r"^[a-zA-Z-]+(\.[A-Z]{2})?/\d{7}(v\d+)?$").unwrap();
  /// ID embedded in an arxiv.org abs/html/pdf URL path.
  static ref URL_PATH_ID: Regex =
    Regex::new(r"^/(?:abs|html|pdf)/((?:\d{4}\.\d{4,5}|[a-zA-Z-]+(?:\.[A-Z]{2})?/\d{7})(?:v\d+)?)")
      .unwrap();
}

/// Normalizes an arXiv identifier or URL to a canonical ID.
///
/// Accepts bare new-style IDs (`2402.08954`, optionally `v2`-suffixed),
/// old-style IDs (`hep-th/9901001`), `arxiv:`-prefixed IDs, and
/// `arxiv.org/{abs,html,pdf}/...` URLs over http or https. Surrounding
/// whitespace is ignored. Anything else is
/// [`OffprintError::InvalidIdentifier`].
pub fn normalize_arxiv_id(input: &str) -> Result<String> {
  let trimmed = input.trim();
  let candidate = trimmed.strip_prefix("arxiv:").unwrap_or(trimmed);

  if ARXIV_NEW.is_match(candidate) || ARXIV_OLD.is_match(candidate) {
    return Ok(candidate.to_string());
  }

  if let Ok(url) = Url::parse(trimmed) {
    if matches!(url.host_str(), Some("arxiv.org") | Some("www.arxiv.org")) {
      if let Some(captures) = URL_PATH_ID.captures(url.path()) {
        return Ok(captures[1].to_string());
      }
    }
    return Err(OffprintError::InvalidIdentifier(input.to_string()));
  }

  Err(OffprintError::InvalidIdentifier(input.to_string()))
}

/// URL of the paper's HTML rendering.
pub fn html_url(id: &str) -> String {
  format!("https://arxiv.org/html/{id}")
}

/// URL of the paper's abstract page.
pub fn abs_url(id: &str) -> String {
  format!("https://arxiv.org/abs/{id}")
}

/// Client that retrieves paper HTML from arxiv.org.
///
/// Holds a reusable HTTP client; one fetcher serves any number of papers.
#[derive(Debug, Default)]
pub struct ArxivFetcher {
  /// Internal web client used for all requests.
  client: reqwest::Client,
}

impl ArxivFetcher {
  /// Creates a new fetcher with a fresh HTTP client.
  pub fn new() -> Self {
    Self { client: reqwest::Client::new() }
  }
}

#[async_trait]
impl PaperSource for ArxivFetcher {
  /// Fetches the HTML rendering for the paper named by `input`.
  ///
  /// The identifier is normalized first, so this accepts everything
  /// [`normalize_arxiv_id`] accepts.
  ///
  /// # Errors
  ///
  /// - [`OffprintError::InvalidIdentifier`] when the input cannot be parsed
  /// - [`OffprintError::NotFound`] when arXiv has no HTML version (404)
  /// - [`OffprintError::Network`] on transport failure
  /// - [`OffprintError::Api`] on any other non-success status
  async fn fetch_html(&self, input: &str) -> Result<FetchedPaper> {
    let id = normalize_arxiv_id(input)?;
    let url = html_url(&id);

    debug!("Fetching HTML rendering from {url}");
    let response = self.client.get(&url).send().await?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
      return Err(OffprintError::NotFound(id));
    }
    if !response.status().is_success() {
      return Err(OffprintError::Api(format!("{} for {url}", response.status())));
    }

    // The final URL (after any version redirect) is the base for relative
    // image links; a trailing slash makes joins resolve inside the document.
    let mut base = response.url().clone();
    if !base.path().ends_with('/') {
      base.set_path(&format!("{}/", base.path()));
    }

    let html = response.text().await?;
    Ok(FetchedPaper { id, html, base_url: base })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bare_id_new_format() {
    assert_eq!(normalize_arxiv_id("2402.08954").unwrap(), "2402.08954");
    assert_eq!(normalize_arxiv_id("2401.12345").unwrap(), "2401.12345");
  }

  #[test]
  fn bare_id_with_version() {
    assert_eq!(normalize_arxiv_id("2402.08954v1").unwrap(), "2402.08954v1");
    assert_eq!(normalize_arxiv_id("2402.08954v2").unwrap(), "2402.08954v2");
  }

  #[test]
  fn bare_id_old_format() {
    assert_eq!(normalize_arxiv_id("hep-th/9901001").unwrap(), "hep-th/9901001");
    assert_eq!(normalize_arxiv_id("cond-mat/0001234").unwrap(), "cond-mat/0001234");
  }

  #[test]
  fn abs_url_forms() {
    assert_eq!(normalize_arxiv_id("https://arxiv.org/abs/2402.08954").unwrap(), "2402.08954");
    assert_eq!(normalize_arxiv_id("http://arxiv.org/abs/2402.08954").unwrap(), "2402.08954");
  }

  #[test]
  fn html_and_pdf_urls() {
    assert_eq!(normalize_arxiv_id("https://arxiv.org/html/2402.08954").unwrap(), "2402.08954");
    assert_eq!(normalize_arxiv_id("https://arxiv.org/pdf/2402.08954").unwrap(), "2402.08954");
  }

  #[test]
  fn url_with_version() {
    assert_eq!(normalize_arxiv_id("https://arxiv.org/abs/2402.08954v1").unwrap(), "2402.08954v1");
  }

  #[test]
  fn arxiv_prefix_and_whitespace() {
    assert_eq!(normalize_arxiv_id("arxiv:2402.08954").unwrap(), "2402.08954");
    assert_eq!(normalize_arxiv_id("  2402.08954  ").unwrap(), "2402.08954");
  }

  #[test]
  fn old_style_url() {
    assert_eq!(
      normalize_arxiv_id("https://arxiv.org/abs/hep-th/9901001").unwrap(),
      "hep-th/9901001"
    );
  }

  #[test]
  fn invalid_inputs_rejected() {
    assert!(matches!(
      normalize_arxiv_id("not-a-valid-id"),
      Err(OffprintError::InvalidIdentifier(_))
    ));
    assert!(matches!(
      normalize_arxiv_id("https://example.com/paper"),
      Err(OffprintError::InvalidIdentifier(_))
    ));
  }

  #[test]
  fn url_helpers() {
    assert_eq!(html_url("2402.08954"), "https://arxiv.org/html/2402.08954");
    assert_eq!(abs_url("hep-th/9901001"), "https://arxiv.org/abs/hep-th/9901001");
  }

  // Hits the live arXiv service; run explicitly with `cargo test -- --ignored`.
  #[ignore]
  #[tokio::test]
  async fn live_fetch_has_html() {
    let fetched = ArxivFetcher::new().fetch_html("2402.08954").await.unwrap();
    assert!(fetched.html.contains("<html"));
  }
}
