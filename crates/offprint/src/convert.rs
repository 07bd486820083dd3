//! The fetch → parse → compose orchestrator.
//!
//! [`Converter`] sequences the whole pipeline for one paper: retrieve the
//! HTML, parse it, download figure images, lay out the PDF, and write it
//! under a collision-free name. [`Converter::convert_batch`] runs the same
//! pipeline over many identifiers with per-paper failure isolation: one
//! paper's error is reported and the batch moves on.
//!
//! The PDF is rendered fully in memory and written in one call, so a failed
//! conversion never leaves a truncated file on disk.

use crate::{
  compose::{self, PageGeometry, RenderOptions},
  fetch::PaperSource,
  format::format_title,
  math::{MathRenderer, DEFAULT_MATH_DPI},
  paper::{FigureImage, Paper},
};

use super::*;

/// Knobs controlling one converter instance.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
  /// Page dimensions and typography.
  pub geometry:       PageGeometry,
  /// Whether figure images are downloaded and embedded.
  pub include_images: bool,
  /// Whether math expressions are rasterized; when false every expression
  /// degrades to its textual form.
  pub math_images:    bool,
  /// Resolution math expressions are rasterized at.
  pub math_dpi:       u32,
  /// Name output files after the arXiv ID instead of the paper title.
  pub use_id:         bool,
  /// Directory output files are written to, created on demand.
  pub output_dir:     PathBuf,
}

impl Default for ConvertOptions {
  fn default() -> Self {
    Self {
      geometry:       PageGeometry::default(),
      include_images: true,
      math_images:    true,
      math_dpi:       DEFAULT_MATH_DPI,
      use_id:         false,
      output_dir:     PathBuf::from("."),
    }
  }
}

/// A successfully converted paper.
#[derive(Debug, Clone)]
pub struct Outcome {
  /// Canonical arXiv identifier.
  pub id:       String,
  /// The paper's title.
  pub title:    String,
  /// Where the PDF was written.
  pub pdf_path: PathBuf,
}

/// Runs the conversion pipeline over a [`PaperSource`].
pub struct Converter<S> {
  /// Where paper HTML comes from.
  source:   S,
  /// Conversion knobs.
  options:  ConvertOptions,
  /// HTTP client for figure image downloads.
  client:   reqwest::Client,
  /// Math rasterizer shared across papers.
  renderer: MathRenderer,
}

impl<S: PaperSource> Converter<S> {
  /// Creates a converter over the given source.
  pub fn new(source: S, options: ConvertOptions) -> Self {
    let renderer = if options.math_images {
      MathRenderer::new(options.math_dpi)
    } else {
      MathRenderer::text_only()
    };
    Self { source, options, client: reqwest::Client::new(), renderer }
  }

  /// Converts one paper and writes its PDF.
  ///
  /// # Errors
  ///
  /// Any stage's error propagates: identifier normalization, retrieval,
  /// parsing, composition, or the final write. Figure downloads are the
  /// exception; a failed download degrades that figure to caption-only.
  pub async fn convert(&self, input: &str) -> Result<Outcome> {
    let fetched = self.source.fetch_html(input).await?;
    let mut paper = parse::parse_paper(&fetched, &self.renderer)?;

    if self.options.include_images {
      self.hydrate_figures(&mut paper).await;
    }

    let render = RenderOptions {
      geometry:       self.options.geometry.clone(),
      include_images: self.options.include_images,
    };
    let pdf = compose::compose_pdf(&paper, &render)?;

    tokio::fs::create_dir_all(&self.options.output_dir).await?;
    let path = unique_path(&self.options.output_dir, &self.output_stem(&paper));
    tokio::fs::write(&path, &pdf).await?;

    debug!("Wrote {} ({} bytes)", path.display(), pdf.len());
    Ok(Outcome { id: paper.id.clone(), title: paper.title.clone(), pdf_path: path })
  }

  /// Converts a sequence of papers, isolating failures per paper.
  ///
  /// Returns one entry per input in order, pairing the original input with
  /// its outcome. The batch always runs to completion.
  pub async fn convert_batch(&self, inputs: &[String]) -> Vec<(String, Result<Outcome>)> {
    let mut results = Vec::with_capacity(inputs.len());
    for input in inputs {
      let result = self.convert(input).await;
      if let Err(err) = &result {
        warn!("conversion of {input} failed: {err}");
      }
      results.push((input.clone(), result));
    }
    results
  }

  /// Downloads figure images in place; failures degrade per figure.
  async fn hydrate_figures(&self, paper: &mut Paper) {
    for figure in &mut paper.figures {
      let Some(url) = figure.url.clone() else {
        continue;
      };
      match self.download_image(&url).await {
        Ok(image) => figure.image = Some(image),
        Err(err) => {
          warn!("figure {} download failed, keeping caption only: {err}", figure.id);
        },
      }
    }
  }

  /// Fetches one image resource.
  async fn download_image(&self, url: &Url) -> Result<FigureImage> {
    debug!("Downloading figure image from {url}");
    let response = self.client.get(url.as_str()).send().await?;
    if !response.status().is_success() {
      return Err(OffprintError::Image(format!("{} for {url}", response.status())));
    }
    let media_type = response
      .headers()
      .get(reqwest::header::CONTENT_TYPE)
      .and_then(|value| value.to_str().ok())
      .map(str::to_string)
      .unwrap_or_else(|| "application/octet-stream".to_string());
    let bytes = response.bytes().await?.to_vec();
    Ok(FigureImage { bytes, media_type })
  }

  /// Filename stem for a paper, from its title or its ID.
  fn output_stem(&self, paper: &Paper) -> String {
    if self.options.use_id {
      paper.id.replace('/', "_")
    } else {
      format_title(&paper.title, None)
    }
  }
}

/// First path under `dir` named `{stem}.pdf`, `{stem}-2.pdf`, `{stem}-3.pdf`,
/// ... that does not already exist.
fn unique_path(dir: &Path, stem: &str) -> PathBuf {
  let first = dir.join(format!("{stem}.pdf"));
  if !first.exists() {
    return first;
  }
  let mut n = 2u32;
  loop {
    let candidate = dir.join(format!("{stem}-{n}.pdf"));
    if !candidate.exists() {
      return candidate;
    }
    n += 1;
  }
}
