//! The structured document model produced by parsing.
//!
//! A [`Paper`] is the parser's output and the composer's input: title,
//! authors, abstract, ordered sections of content blocks, figures,
//! bibliography entries, and rasterized math spans. Sections reference
//! figures and math spans by index into the paper's collections; after
//! parsing completes no index may dangle (see [`Paper::check_references`]).
//!
//! The model is deliberately free of rendering-crate types so it can be
//! serialized, inspected, or produced by other frontends without pulling in
//! the PDF stack.

use super::*;

/// A parsed arXiv paper.
///
/// Created by [`crate::parse::parse_paper`] from one HTML document and
/// treated as immutable afterwards; the only later mutation is figure-image
/// hydration, which fills [`Figure::image`] in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
  /// Canonical arXiv identifier, e.g. "2402.08954".
  pub id:            String,
  /// The paper's full title.
  pub title:         String,
  /// Author names in document order.
  pub authors:       Vec<String>,
  /// Full abstract text; empty when the paper has none.
  pub abstract_text: String,
  /// Publication date string from the document head, verbatim.
  pub date:          Option<String>,
  /// Sections in document order.
  pub sections:      Vec<Section>,
  /// Figures in document order.
  pub figures:       Vec<Figure>,
  /// Bibliography entries in document order.
  pub references:    Vec<Reference>,
  /// Math spans in document order.
  pub math:          Vec<MathSpan>,
}

/// One section of a paper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
  /// Document element id, e.g. "S1".
  pub id:     String,
  /// Heading text.
  pub title:  String,
  /// Nesting level: 1 for sections, 2 for subsections, 3 below that.
  pub level:  u8,
  /// Ordered content blocks.
  pub blocks: Vec<Block>,
}

/// A block of section content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Block {
  /// A paragraph of inline runs.
  Paragraph(Vec<Inline>),
  /// A figure placed at this position, by index into [`Paper::figures`].
  Figure(usize),
}

/// An inline run within a paragraph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Inline {
  /// Plain text.
  Text(String),
  /// An inline math span, by index into [`Paper::math`].
  Math(usize),
}

/// A figure with its caption and (once hydrated) its image bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
  /// Document element id, e.g. "F1".
  pub id:      String,
  /// Caption text; empty when the figure has none.
  pub caption: String,
  /// Absolute image URL resolved against the paper's base URL.
  pub url:     Option<Url>,
  /// Downloaded image, filled by the orchestrator before composition.
  pub image:   Option<FigureImage>,
}

/// An owned copy of a figure's image resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FigureImage {
  /// Raw image bytes as downloaded.
  pub bytes:      Vec<u8>,
  /// Media type reported by the server, e.g. "image/png".
  pub media_type: String,
}

/// One bibliography entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
  /// Flattened entry text, whitespace-normalized.
  pub text: String,
}

/// A LaTeX math expression and its rendering.
///
/// Created during parsing when an equation is encountered. Rendering may
/// degrade: when the expression cannot be rasterized the span permanently
/// carries a textual fallback instead of an image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MathSpan {
  /// Original LaTeX source, from the element's `alttext`.
  pub latex:     String,
  /// Whether this was display math rather than inline math.
  pub display:   bool,
  /// The rendering chosen for this span.
  pub rendering: MathRendering,
}

/// Outcome of rendering one math span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MathRendering {
  /// A raster image ready for inline placement.
  Image(MathImage),
  /// Textual placeholder used when rasterization was not possible.
  Text(String),
}

/// A rasterized math expression with baseline metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MathImage {
  /// PNG-encoded raster.
  pub png:         Vec<u8>,
  /// Raster width in pixels.
  pub width_px:    u32,
  /// Raster height in pixels.
  pub height_px:   u32,
  /// Descent below the text baseline, in pixels from the raster's bottom
  /// edge, used to align the image with surrounding text.
  pub baseline_px: u32,
  /// Resolution the raster was produced at.
  pub dpi:         u32,
}

impl Paper {
  /// Verifies that every figure and math index referenced from section
  /// content is in bounds.
  ///
  /// The parser guarantees this before returning; the check exists so tests
  /// and alternative frontends can assert the invariant cheaply.
  pub fn check_references(&self) -> Result<()> {
    for section in &self.sections {
      for block in &section.blocks {
        match block {
          Block::Figure(index) if *index >= self.figures.len() =>
            return Err(OffprintError::Parse(format!(
              "section {} references figure {index} but only {} exist",
              section.id,
              self.figures.len()
            ))),
          Block::Paragraph(inlines) =>
            for inline in inlines {
              if let Inline::Math(index) = inline {
                if *index >= self.math.len() {
                  return Err(OffprintError::Parse(format!(
                    "section {} references math span {index} but only {} exist",
                    section.id,
                    self.math.len()
                  )));
                }
              }
            },
          _ => {},
        }
      }
    }
    Ok(())
  }
}

impl MathSpan {
  /// The text shown when no image is available, also used by `--no-images`
  /// style degradations in terminals and logs.
  pub fn fallback_text(&self) -> Option<&str> {
    match &self.rendering {
      MathRendering::Text(text) => Some(text),
      MathRendering::Image(_) => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn paper_with(blocks: Vec<Block>, figures: usize, math: usize) -> Paper {
    Paper {
      id:            "2402.08954".to_string(),
      title:         "Test".to_string(),
      authors:       vec![],
      abstract_text: String::new(),
      date:          None,
      sections:      vec![Section {
        id: "S1".to_string(),
        title: "Intro".to_string(),
        level: 1,
        blocks,
      }],
      figures:       (0..figures)
        .map(|i| Figure {
          id:      format!("F{i}"),
          caption: String::new(),
          url:     None,
          image:   None,
        })
        .collect(),
      references:    vec![],
      math:          (0..math)
        .map(|_| MathSpan {
          latex:     r"\alpha".to_string(),
          display:   false,
          rendering: MathRendering::Text("α".to_string()),
        })
        .collect(),
    }
  }

  #[test]
  fn in_bounds_references_pass() {
    let paper = paper_with(
      vec![Block::Paragraph(vec![Inline::Text("x".into()), Inline::Math(0)]), Block::Figure(0)],
      1,
      1,
    );
    assert!(paper.check_references().is_ok());
  }

  #[test]
  fn dangling_figure_index_fails() {
    let paper = paper_with(vec![Block::Figure(2)], 1, 0);
    assert!(matches!(paper.check_references(), Err(OffprintError::Parse(_))));
  }

  #[test]
  fn dangling_math_index_fails() {
    let paper = paper_with(vec![Block::Paragraph(vec![Inline::Math(5)])], 0, 1);
    assert!(matches!(paper.check_references(), Err(OffprintError::Parse(_))));
  }
}
