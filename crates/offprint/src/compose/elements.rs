//! Custom layout elements the upstream PDF crate does not ship with.
//!
//! Two things in a paper need more than stock paragraphs: prose with inline
//! math images that must wrap and baseline-align like words
//! ([`InlineFlow`]), and figures with captions stacked underneath
//! ([`FigureBlock`]).

use genpdf::{
  elements::{Image, Paragraph},
  error::{Error as PdfError, ErrorKind},
  render,
  style::{Style, StyledString},
  Alignment, Element, Mm, Position, RenderResult, Scale, Size,
};
use image::GenericImageView;

use crate::{math, paper::MathImage};

/// Millimeters per inch, for pixel-density conversions.
pub(crate) const MM_PER_INCH: f64 = 25.4;
/// Pixel density genpdf assumes when sizing raster images.
const ASSUMED_IMAGE_DPI: f64 = 300.0;
/// Gap between a figure and its caption.
const CAPTION_SPACING_MM: f64 = 2.0;

/// Converts a plain f64 millimeter value into genpdf's unit type.
pub(crate) fn mm_from_f64(value: f64) -> Mm {
  Mm::from(printpdf::Mm(value))
}

/// Converts genpdf's unit type back to a plain f64.
pub(crate) fn mm_to_f64(value: Mm) -> f64 {
  let mm: printpdf::Mm = value.into();
  mm.0
}

/// Wraps an image decode failure in the PDF error type.
fn decode_error(err: image::ImageError) -> PdfError {
  PdfError::new(format!("failed to decode image: {err}"), ErrorKind::InvalidData)
}

/// A decoded math raster with its physical dimensions on the page.
///
/// The raster was produced at a known DPI and font size; `font_pt` rescales
/// it so the glyphs match the surrounding text.
pub struct InlineMath {
  /// Decoded raster.
  image:   image::DynamicImage,
  /// Physical width on the page.
  width:   Mm,
  /// Physical height on the page.
  height:  Mm,
  /// Physical descent below the text baseline.
  descent: Mm,
  /// Scale factor applied when the raster is placed.
  scale:   f64,
}

impl InlineMath {
  /// Decodes a math raster and computes its on-page dimensions for text set
  /// at `font_pt` points.
  pub fn new(raster: &MathImage, font_pt: f64) -> std::result::Result<Self, PdfError> {
    let image = image::load_from_memory(&raster.png).map_err(decode_error)?;
    let font_scale = font_pt / math::MATH_FONT_PT;
    let mm_per_px = font_scale * MM_PER_INCH / raster.dpi as f64;
    Ok(Self {
      image,
      width: mm_from_f64(raster.width_px as f64 * mm_per_px),
      height: mm_from_f64(raster.height_px as f64 * mm_per_px),
      descent: mm_from_f64(raster.baseline_px as f64 * mm_per_px),
      scale: font_scale * ASSUMED_IMAGE_DPI / raster.dpi as f64,
    })
  }

  /// Physical width on the page.
  pub fn width(&self) -> Mm {
    self.width
  }
}

/// One wrappable unit of paragraph content.
pub enum FlowItem {
  /// A single word.
  Word(String),
  /// An inline math image, placed like a word but baseline-aligned.
  Math(InlineMath),
  /// Textual math fallback, set in italics.
  Fallback(String),
}

/// What one positioned piece of a laid-out line renders as.
enum Piece {
  /// Text printed at the given x offset.
  Text { x: Mm, string: StyledString },
  /// A math image placed at the given x offset, by item index.
  Math { x: Mm, index: usize },
}

/// A paragraph of words and inline math images with word wrapping.
///
/// Lines are assembled greedily; each line's height grows to the tallest
/// item on it, and math images are shifted so their recorded baseline sits
/// on the text baseline. The element is resumable across pages: a render
/// call that runs out of vertical space reports `has_more` and continues
/// from the first unplaced item on the next call.
pub struct InlineFlow {
  /// The paragraph's content in reading order.
  items:  Vec<FlowItem>,
  /// Index of the first item not yet placed.
  cursor: usize,
}

impl InlineFlow {
  /// Creates a flow over the given items.
  pub fn new(items: Vec<FlowItem>) -> Self {
    Self { items, cursor: 0 }
  }
}

impl Element for InlineFlow {
  fn render(
    &mut self,
    context: &genpdf::Context,
    mut area: render::Area<'_>,
    style: Style,
  ) -> std::result::Result<RenderResult, PdfError> {
    let mut result = RenderResult::default();

    let text_height = style.line_height(&context.font_cache);
    let ascent = style.font(&context.font_cache).glyph_height(style.font_size());
    let text_descent = text_height - ascent;
    let space_width = StyledString::new(" ", style).width(&context.font_cache);
    let mut italic = style;
    italic.set_italic();

    while self.cursor < self.items.len() {
      let avail_width = area.size().width;

      // assemble one line
      let mut pieces: Vec<Piece> = Vec::new();
      let mut x = Mm::default();
      let mut line_ascent = ascent;
      let mut line_descent = text_descent;
      let mut end = self.cursor;
      while end < self.items.len() {
        let (width, item_ascent, item_descent) = match &self.items[end] {
          FlowItem::Word(word) =>
            (StyledString::new(word.clone(), style).width(&context.font_cache), ascent, text_descent),
          FlowItem::Fallback(text) =>
            (StyledString::new(text.clone(), italic).width(&context.font_cache), ascent, text_descent),
          FlowItem::Math(inline) => (inline.width, inline.height - inline.descent, inline.descent),
        };

        let lead = if pieces.is_empty() { Mm::default() } else { space_width };
        if x + lead + width > avail_width && !pieces.is_empty() {
          break;
        }

        let at = x + lead;
        match &self.items[end] {
          FlowItem::Word(word) =>
            pieces.push(Piece::Text { x: at, string: StyledString::new(word.clone(), style) }),
          FlowItem::Fallback(text) =>
            pieces.push(Piece::Text { x: at, string: StyledString::new(text.clone(), italic) }),
          FlowItem::Math(_) => pieces.push(Piece::Math { x: at, index: end }),
        }
        x = at + width;
        if item_ascent > line_ascent {
          line_ascent = item_ascent;
        }
        if item_descent > line_descent {
          line_descent = item_descent;
        }
        end += 1;
      }

      let line_height = line_ascent + line_descent;
      if line_height > area.size().height {
        result.has_more = true;
        return Ok(result);
      }

      for piece in &pieces {
        match piece {
          Piece::Text { x, string } => {
            let position = Position::new(*x, line_ascent - ascent);
            let Some(mut section) = area.text_section(&context.font_cache, position, style) else {
              result.has_more = true;
              return Ok(result);
            };
            section.print_str(&string.s, string.style)?;
          },
          Piece::Math { x, index } => {
            let FlowItem::Math(inline) = &self.items[*index] else {
              continue;
            };
            let mut image = Image::from_dynamic_image(inline.image.clone())?;
            image.set_scale(Scale::new(inline.scale, inline.scale));
            let mut sub_area = area.clone();
            sub_area
              .add_offset(Position::new(*x, line_ascent - (inline.height - inline.descent)));
            image.render(context, sub_area, style)?;
          },
        }
      }

      area.add_offset(Position::new(0, line_height));
      result.size = result.size.stack_vertical(Size::new(x, line_height));
      self.cursor = end;
    }

    Ok(result)
  }
}

/// A display equation, centered on its own line.
pub fn display_math(raster: &MathImage, font_pt: f64) -> std::result::Result<Image, PdfError> {
  let inline = InlineMath::new(raster, font_pt)?;
  let mut image = Image::from_dynamic_image(inline.image)?;
  image.set_alignment(Alignment::Center);
  image.set_scale(Scale::new(inline.scale, inline.scale));
  Ok(image)
}

/// A centered figure image with its caption stacked underneath.
///
/// The image is scaled down to the column width when it would overflow;
/// smaller images keep their natural size.
pub struct FigureBlock {
  /// The figure raster.
  image:         Image,
  /// Caption paragraph, centered under the image.
  caption:       Paragraph,
  /// Natural width at the assumed image density.
  natural_width: Mm,
  /// Gap between image and caption.
  spacing:       Mm,
}

impl FigureBlock {
  /// Decodes figure bytes and pairs them with a styled caption.
  pub fn new(bytes: &[u8], caption: &str, caption_style: Style) -> std::result::Result<Self, PdfError> {
    let dynamic = image::load_from_memory(bytes).map_err(decode_error)?;
    let (px_width, _) = dynamic.dimensions();
    let natural_width = mm_from_f64(px_width as f64 / ASSUMED_IMAGE_DPI * MM_PER_INCH);

    let mut image = Image::from_dynamic_image(dynamic)?;
    image.set_alignment(Alignment::Center);
    let caption =
      Paragraph::new(StyledString::new(caption, caption_style)).aligned(Alignment::Center);

    Ok(Self { image, caption, natural_width, spacing: mm_from_f64(CAPTION_SPACING_MM) })
  }
}

impl Element for FigureBlock {
  fn render(
    &mut self,
    context: &genpdf::Context,
    mut area: render::Area<'_>,
    style: Style,
  ) -> std::result::Result<RenderResult, PdfError> {
    let avail = area.size().width;
    if self.natural_width > avail {
      let scale = mm_to_f64(avail) / mm_to_f64(self.natural_width);
      self.image.set_scale(Scale::new(scale, scale));
    }

    let mut result = RenderResult::default();
    let image_result = self.image.render(context, area.clone(), style)?;
    result.size = result.size.stack_vertical(image_result.size);
    result.has_more |= image_result.has_more;

    area.add_offset(Position::new(0, image_result.size.height + self.spacing));
    result.size = result.size.stack_vertical(Size::new(0, self.spacing));

    let caption_result = self.caption.render(context, area, style)?;
    result.size = result.size.stack_vertical(caption_result.size);
    result.has_more |= caption_result.has_more;

    Ok(result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let buffer = image::ImageBuffer::from_pixel(width, height, image::Rgb([255u8, 255, 255]));
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(buffer)
      .write_to(&mut png, image::ImageOutputFormat::Png)
      .unwrap();
    png
  }

  #[test]
  fn inline_math_dimensions_follow_dpi() {
    // 254 dpi at the native font size makes each pixel exactly 0.1 mm
    let raster = MathImage {
      png:         png_bytes(50, 20),
      width_px:    50,
      height_px:   20,
      baseline_px: 5,
      dpi:         254,
    };
    let inline = InlineMath::new(&raster, math::MATH_FONT_PT).unwrap();
    assert!((mm_to_f64(inline.width) - 5.0).abs() < 1e-6);
    assert!((mm_to_f64(inline.height) - 2.0).abs() < 1e-6);
    assert!((mm_to_f64(inline.descent) - 0.5).abs() < 1e-6);
  }

  #[test]
  fn inline_math_scales_with_font_size() {
    let raster = MathImage {
      png:         png_bytes(50, 20),
      width_px:    50,
      height_px:   20,
      baseline_px: 5,
      dpi:         254,
    };
    let small = InlineMath::new(&raster, math::MATH_FONT_PT).unwrap();
    let large = InlineMath::new(&raster, math::MATH_FONT_PT * 2.0).unwrap();
    assert!((mm_to_f64(large.width) - 2.0 * mm_to_f64(small.width)).abs() < 1e-6);
    assert!((large.scale - 2.0 * small.scale).abs() < 1e-9);
  }

  #[test]
  fn corrupt_image_bytes_are_rejected() {
    let raster = MathImage {
      png:         vec![0, 1, 2, 3],
      width_px:    1,
      height_px:   1,
      baseline_px: 0,
      dpi:         200,
    };
    assert!(InlineMath::new(&raster, 11.0).is_err());
    assert!(FigureBlock::new(&[0, 1, 2, 3], "broken", Style::new()).is_err());
  }

  #[test]
  fn figure_block_accepts_valid_png() {
    let png = png_bytes(10, 10);
    assert!(FigureBlock::new(&png, "a caption", Style::new()).is_ok());
  }
}
