//! PDF layout and pagination.
//!
//! [`compose_pdf`] lays a parsed [`Paper`] out as a paginated PDF sized for
//! an e-reader screen: front matter (title, authors, date, abstract), then
//! each section with its paragraphs, equations, and figures in reading
//! order, then the bibliography. The document is rendered entirely into
//! memory; callers decide when bytes reach disk, so a rendering failure can
//! never leave a truncated file behind.
//!
//! Page dimensions come from a [`PageGeometry`], built either from a named
//! [`ScreenPreset`] or from explicit millimeter dimensions.

use genpdf::{elements::Paragraph, style::Style, Alignment, Element, Margins};

use super::*;
use crate::{
  paper::{Block, Figure, Inline, MathRendering, Paper},
  screen::{ScreenPreset, SCREEN_PRESETS},
};

pub mod elements;
pub mod fonts;

use elements::{FigureBlock, FlowItem, InlineFlow, InlineMath};

/// Default page margin in millimeters. E-reader screens are small; generous
/// print margins would waste a third of the panel.
pub const DEFAULT_MARGIN_MM: f64 = 9.0;

/// Physical page parameters for one output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
  /// Page width in millimeters.
  pub width_mm:     f64,
  /// Page height in millimeters.
  pub height_mm:    f64,
  /// Base body font size in points.
  pub base_font_pt: f64,
  /// Margin applied on all four edges, in millimeters.
  pub margin_mm:    f64,
}

impl PageGeometry {
  /// Page geometry for a named screen preset.
  pub fn from_preset(preset: &ScreenPreset) -> Self {
    Self {
      width_mm:     preset.width_mm,
      height_mm:    preset.height_mm,
      base_font_pt: preset.base_font_pt,
      margin_mm:    DEFAULT_MARGIN_MM,
    }
  }

  /// Page geometry for explicit dimensions.
  pub fn custom(width_mm: f64, height_mm: f64) -> Self {
    Self::from_preset(&ScreenPreset::custom(width_mm, height_mm))
  }

  /// Page dimensions as a (width, height) pair in millimeters.
  pub fn page_size(&self) -> (f64, f64) {
    (self.width_mm, self.height_mm)
  }
}

impl Default for PageGeometry {
  /// The `kindle-paperwhite` preset, the most common target device.
  fn default() -> Self {
    Self::from_preset(&SCREEN_PRESETS[0])
  }
}

/// Knobs controlling composition of one document.
#[derive(Debug, Clone)]
pub struct RenderOptions {
  /// Page dimensions and typography.
  pub geometry:       PageGeometry,
  /// Whether figure images are embedded; captions always are.
  pub include_images: bool,
}

impl Default for RenderOptions {
  fn default() -> Self {
    Self { geometry: PageGeometry::default(), include_images: true }
  }
}

/// Maps a PDF-layer failure into the crate error type.
fn pdf_err(err: genpdf::error::Error) -> OffprintError {
  OffprintError::Render(err.to_string())
}

/// Lays out a parsed paper as a complete PDF, returned as bytes.
///
/// # Errors
///
/// [`OffprintError::Render`] when fonts cannot be loaded or the layout
/// engine fails. Individual undecodable figures degrade to caption-only
/// placeholders rather than failing the document.
pub fn compose_pdf(paper: &Paper, options: &RenderOptions) -> Result<Vec<u8>> {
  let geometry = &options.geometry;
  let base_pt = geometry.base_font_pt;

  let family = fonts::document_font_family()?;
  let mut document = genpdf::Document::new(family);
  document.set_title(paper.title.clone());
  document.set_paper_size(genpdf::Size::new(geometry.width_mm, geometry.height_mm));
  document.set_font_size(base_pt as u8);

  let mut decorator = genpdf::SimplePageDecorator::new();
  decorator.set_margins(Margins::trbl(
    geometry.margin_mm,
    geometry.margin_mm,
    geometry.margin_mm,
    geometry.margin_mm,
  ));
  document.set_page_decorator(decorator);

  push_front_matter(&mut document, paper, base_pt);

  for section in &paper.sections {
    let size = match section.level {
      1 => base_pt + 3.0,
      2 => base_pt + 2.0,
      _ => base_pt + 1.0,
    };
    if !section.title.is_empty() {
      document.push(heading(&section.title, size, Alignment::Left));
    }
    for block in &section.blocks {
      match block {
        Block::Paragraph(inlines) => push_paragraph(&mut document, paper, inlines, base_pt)?,
        Block::Figure(index) => {
          if let Some(figure) = paper.figures.get(*index) {
            push_figure(&mut document, figure, options.include_images, base_pt);
          }
        },
      }
    }
  }

  if !paper.references.is_empty() {
    document.push(heading("References", base_pt + 2.0, Alignment::Left));
    for reference in &paper.references {
      document
        .push(Paragraph::new(reference.text.clone()).padded(Margins::trbl(0.0, 0.0, 1.2, 0.0)));
    }
  }

  debug!("Rendering {} sections to PDF", paper.sections.len());
  let mut buffer = Vec::new();
  document.render(&mut buffer).map_err(pdf_err)?;
  Ok(buffer)
}

/// A bold heading paragraph with space above and below.
fn heading(text: &str, size_pt: f64, alignment: Alignment) -> impl Element {
  let mut style = Style::new();
  style.set_bold();
  style.set_font_size(size_pt as u8);
  Paragraph::new(text)
    .aligned(alignment)
    .styled(style)
    .padded(Margins::trbl(2.0, 0.0, 1.5, 0.0))
}

/// Title, authors, arXiv identifier, date, and abstract at the top of the
/// document.
fn push_front_matter(document: &mut genpdf::Document, paper: &Paper, base_pt: f64) {
  document.push(heading(&paper.title, base_pt + 5.0, Alignment::Center));

  if !paper.authors.is_empty() {
    let mut style = Style::new();
    style.set_italic();
    document.push(
      Paragraph::new(paper.authors.join(", "))
        .aligned(Alignment::Center)
        .styled(style)
        .padded(Margins::trbl(0.0, 0.0, 1.0, 0.0)),
    );
  }

  let mut small = Style::new();
  small.set_font_size((base_pt - 1.0) as u8);
  let mut provenance = format!("arXiv:{}", paper.id);
  if let Some(date) = &paper.date {
    provenance.push_str(" · ");
    provenance.push_str(date);
  }
  document.push(
    Paragraph::new(provenance)
      .aligned(Alignment::Center)
      .styled(small)
      .padded(Margins::trbl(0.0, 0.0, 2.0, 0.0)),
  );

  if !paper.abstract_text.is_empty() {
    document.push(heading("Abstract", base_pt + 1.0, Alignment::Left));
    document.push(
      Paragraph::new(paper.abstract_text.clone()).padded(Margins::trbl(0.0, 0.0, 2.0, 0.0)),
    );
  }
}

/// Flushes accumulated flow items as one wrapped paragraph.
fn flush_flow(document: &mut genpdf::Document, items: &mut Vec<FlowItem>) {
  if !items.is_empty() {
    document
      .push(InlineFlow::new(std::mem::take(items)).padded(Margins::trbl(0.0, 0.0, 1.2, 0.0)));
  }
}

/// Lays out one paragraph, splitting around any display equations.
fn push_paragraph(
  document: &mut genpdf::Document,
  paper: &Paper,
  inlines: &[Inline],
  base_pt: f64,
) -> Result<()> {
  let mut items: Vec<FlowItem> = Vec::new();

  for inline in inlines {
    match inline {
      Inline::Text(text) => {
        items.extend(text.split_whitespace().map(|word| FlowItem::Word(word.to_string())));
      },
      Inline::Math(index) => {
        let Some(span) = paper.math.get(*index) else {
          continue;
        };
        match &span.rendering {
          MathRendering::Image(raster) if span.display => {
            flush_flow(document, &mut items);
            let image = elements::display_math(raster, base_pt).map_err(pdf_err)?;
            document.push(image.padded(Margins::trbl(1.0, 0.0, 1.0, 0.0)));
          },
          MathRendering::Image(raster) => {
            items.push(FlowItem::Math(InlineMath::new(raster, base_pt).map_err(pdf_err)?));
          },
          MathRendering::Text(text) if span.display => {
            flush_flow(document, &mut items);
            let mut style = Style::new();
            style.set_italic();
            document.push(
              Paragraph::new(text.clone())
                .aligned(Alignment::Center)
                .styled(style)
                .padded(Margins::trbl(1.0, 0.0, 1.0, 0.0)),
            );
          },
          MathRendering::Text(text) => {
            items.push(FlowItem::Fallback(text.clone()));
          },
        }
      },
    }
  }

  flush_flow(document, &mut items);
  Ok(())
}

/// Lays out one figure: the image with its caption when available, a
/// caption-only placeholder otherwise.
fn push_figure(document: &mut genpdf::Document, figure: &Figure, include_images: bool, base_pt: f64) {
  let mut caption_style = Style::new();
  caption_style.set_italic();
  caption_style.set_font_size((base_pt - 1.0) as u8);

  if include_images {
    if let Some(image) = &figure.image {
      match FigureBlock::new(&image.bytes, &figure.caption, caption_style) {
        Ok(block) => {
          document.push(block.padded(Margins::trbl(1.5, 0.0, 1.5, 0.0)));
          return;
        },
        Err(err) => warn!("figure {} could not be decoded, keeping caption only: {err}", figure.id),
      }
    }
  }

  let text = if figure.caption.is_empty() {
    format!("[Figure {}]", figure.id)
  } else {
    format!("[Figure: {}]", figure.caption)
  };
  document.push(
    Paragraph::new(text)
      .aligned(Alignment::Center)
      .styled(caption_style)
      .padded(Margins::trbl(1.0, 0.0, 1.0, 0.0)),
  );
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::paper::{FigureImage, MathSpan, Reference, Section};

  #[test]
  fn scribe_preset_matches_explicit_dimensions() {
    let preset = ScreenPreset::lookup("kindle-scribe").unwrap();
    let from_preset = PageGeometry::from_preset(preset);
    let custom = PageGeometry::custom(158.0, 210.0);
    assert_eq!(from_preset.page_size(), custom.page_size());
  }

  #[test]
  fn default_geometry_is_paperwhite() {
    let geometry = PageGeometry::default();
    assert_eq!(geometry.page_size(), (105.0, 140.0));
    assert_eq!(geometry.base_font_pt, 11.0);
  }

  fn sample_paper() -> Paper {
    Paper {
      id:            "2402.08954".to_string(),
      title:         "A Composition Test".to_string(),
      authors:       vec!["First Author".to_string(), "Second Author".to_string()],
      abstract_text: "A short abstract.".to_string(),
      date:          Some("2024/02/14".to_string()),
      sections:      vec![Section {
        id:     "S1".to_string(),
        title:  "Introduction".to_string(),
        level:  1,
        blocks: vec![Block::Paragraph(vec![
          Inline::Text("Consider the value".to_string()),
          Inline::Math(0),
          Inline::Text("in the following.".to_string()),
        ])],
      }],
      figures:       vec![],
      references:    vec![Reference { text: "A. Author. Prior work. 2020.".to_string() }],
      math:          vec![MathSpan {
        latex:     r"\alpha".to_string(),
        display:   false,
        rendering: MathRendering::Text("α".to_string()),
      }],
    }
  }

  #[test]
  fn renders_a_complete_document() {
    if !fonts::default_fonts_available() {
      return;
    }
    let bytes = compose_pdf(&sample_paper(), &RenderOptions::default()).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
  }

  #[test]
  fn custom_geometry_renders() {
    if !fonts::default_fonts_available() {
      return;
    }
    let options = RenderOptions { geometry: PageGeometry::custom(158.0, 210.0), ..Default::default() };
    let bytes = compose_pdf(&sample_paper(), &options).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
  }

  fn png_bytes() -> Vec<u8> {
    let buffer = image::ImageBuffer::from_pixel(60, 40, image::Rgb([128u8, 128, 128]));
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(buffer)
      .write_to(&mut png, image::ImageOutputFormat::Png)
      .unwrap();
    png
  }

  /// Counts image XObject dictionaries in a serialized PDF.
  fn count_image_objects(pdf: &[u8]) -> usize {
    pdf.windows(b"/Image".len()).filter(|window| *window == b"/Image").count()
  }

  #[test]
  fn disabling_images_embeds_fewer_rasters() {
    if !fonts::default_fonts_available() {
      return;
    }
    let mut paper = sample_paper();
    paper.figures.push(Figure {
      id:      "F1".to_string(),
      caption: "A plot.".to_string(),
      url:     None,
      image:   Some(FigureImage { bytes: png_bytes(), media_type: "image/png".to_string() }),
    });
    paper.sections[0].blocks.push(Block::Figure(0));

    let with_images = compose_pdf(&paper, &RenderOptions::default()).unwrap();
    let without =
      compose_pdf(&paper, &RenderOptions { include_images: false, ..Default::default() }).unwrap();
    assert!(count_image_objects(&with_images) > count_image_objects(&without));
  }
}
