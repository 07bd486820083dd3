//! LaTeX math rasterization with graceful degradation.
//!
//! arXiv's HTML rendering carries each equation's original LaTeX source in
//! the `alttext` attribute of its `<math>` element. This module turns that
//! source into a small raster image suitable for inline placement in
//! reflowed text, with a recorded baseline offset so the image lines up with
//! the surrounding words.
//!
//! Rendering is an ordered chain of [`TypesetStrategy`] values tried in
//! sequence:
//!
//! 1. Unicode typesetting of the full expression (greek letters, operators,
//!    super/subscripts mapped to their Unicode forms, fractions and roots
//!    linearized), rasterized through an SVG text element.
//! 2. The same pipeline after stripping macros the converter does not know.
//! 3. A textual placeholder.
//!
//! The chain is **total**: [`MathRenderer::render`] always produces a
//! [`MathRendering`], never an error. A failed strategy is logged at `warn`
//! and the next one runs; a single stubborn equation can never abort parsing
//! of the rest of the document.

use std::{collections::HashMap, sync::Arc};

use resvg::{tiny_skia, usvg};

use super::*;
use crate::paper::{MathImage, MathRendering};

/// Default raster resolution, matching the CLI's `--math-dpi` default.
pub const DEFAULT_MATH_DPI: u32 = 200;

/// Font size math is typeset at, in points. Rasters are produced at the
/// requested DPI and scaled down by the composer, so this only fixes the
/// pixel budget per glyph.
pub(crate) const MATH_FONT_PT: f64 = 11.0;

/// Internal failure of a single typesetting strategy.
#[derive(Debug, thiserror::Error)]
enum TypesetError {
  /// The expression uses a macro the converter has no mapping for.
  #[error("unsupported macro \\{0}")]
  Unsupported(String),
  /// Nothing renderable was left after conversion.
  #[error("empty expression")]
  Empty,
  /// The SVG pipeline could not produce a raster.
  #[error("rasterization failed: {0}")]
  Raster(String),
}

/// One rung of the fallback ladder.
trait TypesetStrategy: Send + Sync {
  /// Short name used in log messages.
  fn name(&self) -> &'static str;
  /// Attempts to typeset `latex` at `dpi`.
  fn typeset(&self, latex: &str, dpi: u32) -> std::result::Result<MathImage, TypesetError>;
}

/// Strategy 1: convert the full expression, failing on unknown macros.
struct FullUnicode;

/// Strategy 2: strip unknown macros first, then convert what remains.
struct StrippedUnicode;

impl TypesetStrategy for FullUnicode {
  fn name(&self) -> &'static str {
    "unicode"
  }

  fn typeset(&self, latex: &str, dpi: u32) -> std::result::Result<MathImage, TypesetError> {
    let text = latex_to_unicode(latex, true)?;
    rasterize_text(&text, dpi)
  }
}

impl TypesetStrategy for StrippedUnicode {
  fn name(&self) -> &'static str {
    "stripped"
  }

  fn typeset(&self, latex: &str, dpi: u32) -> std::result::Result<MathImage, TypesetError> {
    let text = latex_to_unicode(latex, false)?;
    rasterize_text(&text, dpi)
  }
}

/// Renders LaTeX math to inline raster images, degrading gracefully.
pub struct MathRenderer {
  /// Raster resolution in dots per inch.
  dpi:        u32,
  /// Fallback ladder, tried in order.
  strategies: Vec<Box<dyn TypesetStrategy>>,
}

impl Default for MathRenderer {
  fn default() -> Self {
    Self::new(DEFAULT_MATH_DPI)
  }
}

impl MathRenderer {
  /// Creates a renderer producing rasters at the given resolution.
  pub fn new(dpi: u32) -> Self {
    Self { dpi, strategies: vec![Box::new(FullUnicode), Box::new(StrippedUnicode)] }
  }

  /// Creates a renderer that never rasterizes; every expression becomes a
  /// textual placeholder.
  pub fn text_only() -> Self {
    Self { dpi: DEFAULT_MATH_DPI, strategies: Vec::new() }
  }

  /// The resolution this renderer rasterizes at.
  pub fn dpi(&self) -> u32 {
    self.dpi
  }

  /// Renders one expression, always producing a usable result.
  ///
  /// Tries each strategy in order; when all fail the span becomes a
  /// [`MathRendering::Text`] placeholder carrying the best-effort Unicode
  /// form (or the raw LaTeX when even that is empty).
  pub fn render(&self, latex: &str) -> MathRendering {
    for strategy in &self.strategies {
      match strategy.typeset(latex, self.dpi) {
        Ok(image) => return MathRendering::Image(image),
        Err(err) => {
          debug!("math strategy {} failed for {latex:?}: {err}", strategy.name());
        },
      }
    }

    if !self.strategies.is_empty() {
      warn!("falling back to textual placeholder for math expression {latex:?}");
    }
    let placeholder = match latex_to_unicode(latex, false) {
      Ok(text) => text,
      Err(_) => latex.trim().to_string(),
    };
    if placeholder.is_empty() {
      MathRendering::Text(latex.trim().to_string())
    } else {
      MathRendering::Text(placeholder)
    }
  }
}

lazy_static! {
  /// LaTeX commands with a direct Unicode equivalent.
  static ref SYMBOLS: HashMap<&'static str, &'static str> = [
    // greek, lowercase
    ("alpha", "α"), ("beta", "β"), ("gamma", "γ"), ("delta", "δ"), ("epsilon", "ε"),
    ("varepsilon", "ε"), ("zeta", "ζ"), ("eta", "η"), ("theta", "θ"), ("vartheta", "ϑ"),
    ("iota", "ι"), ("kappa", "κ"), ("lambda", "λ"), ("mu", "μ"), ("nu", "ν"), ("xi", "ξ"),
    ("pi", "π"), ("rho", "ρ"), ("sigma", "σ"), ("tau", "τ"), ("upsilon", "υ"), ("phi", "φ"),
    ("varphi", "φ"), ("chi", "χ"), ("psi", "ψ"), ("omega", "ω"),
    // greek, uppercase
    ("Gamma", "Γ"), ("Delta", "Δ"), ("Theta", "Θ"), ("Lambda", "Λ"), ("Xi", "Ξ"), ("Pi", "Π"),
    ("Sigma", "Σ"), ("Upsilon", "Υ"), ("Phi", "Φ"), ("Psi", "Ψ"), ("Omega", "Ω"),
    // operators and relations
    ("times", "×"), ("cdot", "·"), ("pm", "±"), ("mp", "∓"), ("div", "÷"), ("ast", "∗"),
    ("leq", "≤"), ("le", "≤"), ("geq", "≥"), ("ge", "≥"), ("neq", "≠"), ("ne", "≠"),
    ("equiv", "≡"), ("approx", "≈"), ("sim", "∼"), ("simeq", "≃"), ("propto", "∝"),
    ("ll", "≪"), ("gg", "≫"),
    // arrows
    ("to", "→"), ("rightarrow", "→"), ("leftarrow", "←"), ("leftrightarrow", "↔"),
    ("Rightarrow", "⇒"), ("Leftarrow", "⇐"), ("Leftrightarrow", "⇔"), ("mapsto", "↦"),
    // big operators and calculus
    ("sum", "∑"), ("prod", "∏"), ("int", "∫"), ("oint", "∮"), ("partial", "∂"),
    ("nabla", "∇"), ("infty", "∞"),
    // sets and logic
    ("in", "∈"), ("notin", "∉"), ("subset", "⊂"), ("supset", "⊃"), ("subseteq", "⊆"),
    ("supseteq", "⊇"), ("cup", "∪"), ("cap", "∩"), ("setminus", "∖"), ("emptyset", "∅"),
    ("varnothing", "∅"), ("forall", "∀"), ("exists", "∃"), ("neg", "¬"), ("lnot", "¬"),
    ("land", "∧"), ("wedge", "∧"), ("lor", "∨"), ("vee", "∨"), ("oplus", "⊕"),
    ("otimes", "⊗"), ("perp", "⊥"), ("top", "⊤"), ("vdash", "⊢"), ("models", "⊨"),
    // dots and misc
    ("ldots", "…"), ("dots", "…"), ("cdots", "⋯"), ("vdots", "⋮"), ("ddots", "⋱"),
    ("prime", "′"), ("circ", "∘"), ("bullet", "•"), ("angle", "∠"), ("hbar", "ℏ"),
    ("ell", "ℓ"), ("Re", "ℜ"), ("Im", "ℑ"), ("aleph", "ℵ"), ("langle", "⟨"),
    ("rangle", "⟩"), ("lfloor", "⌊"), ("rfloor", "⌋"), ("lceil", "⌈"), ("rceil", "⌉"),
    ("quad", " "), ("qquad", "  "), ("mid", "∣"), ("|", "‖"),
    // named functions render as plain words
    ("sin", "sin"), ("cos", "cos"), ("tan", "tan"), ("log", "log"), ("ln", "ln"),
    ("exp", "exp"), ("min", "min"), ("max", "max"), ("arg", "arg"), ("det", "det"),
    ("dim", "dim"), ("lim", "lim"), ("sup", "sup"), ("inf", "inf"), ("mod", "mod"),
    ("Pr", "Pr"), ("gcd", "gcd"),
  ]
  .iter()
  .copied()
  .collect();

  /// Unicode superscript forms, keyed by the plain character.
  static ref SUPERSCRIPTS: HashMap<char, char> = [
    ('0', '⁰'), ('1', '¹'), ('2', '²'), ('3', '³'), ('4', '⁴'), ('5', '⁵'), ('6', '⁶'),
    ('7', '⁷'), ('8', '⁸'), ('9', '⁹'), ('a', 'ᵃ'), ('b', 'ᵇ'), ('c', 'ᶜ'), ('d', 'ᵈ'),
    ('e', 'ᵉ'), ('f', 'ᶠ'), ('g', 'ᵍ'), ('h', 'ʰ'), ('i', 'ⁱ'), ('j', 'ʲ'), ('k', 'ᵏ'),
    ('l', 'ˡ'), ('m', 'ᵐ'), ('n', 'ⁿ'), ('o', 'ᵒ'), ('p', 'ᵖ'), ('r', 'ʳ'), ('s', 'ˢ'),
    ('t', 'ᵗ'), ('u', 'ᵘ'), ('v', 'ᵛ'), ('w', 'ʷ'), ('x', 'ˣ'), ('y', 'ʸ'), ('z', 'ᶻ'),
    ('T', 'ᵀ'), ('+', '⁺'), ('-', '⁻'), ('=', '⁼'), ('(', '⁽'), (')', '⁾'),
  ]
  .iter()
  .copied()
  .collect();

  /// Unicode subscript forms, keyed by the plain character.
  static ref SUBSCRIPTS: HashMap<char, char> = [
    ('0', '₀'), ('1', '₁'), ('2', '₂'), ('3', '₃'), ('4', '₄'), ('5', '₅'), ('6', '₆'),
    ('7', '₇'), ('8', '₈'), ('9', '₉'), ('a', 'ₐ'), ('e', 'ₑ'), ('h', 'ₕ'), ('i', 'ᵢ'),
    ('j', 'ⱼ'), ('k', 'ₖ'), ('l', 'ₗ'), ('m', 'ₘ'), ('n', 'ₙ'), ('o', 'ₒ'), ('p', 'ₚ'),
    ('r', 'ᵣ'), ('s', 'ₛ'), ('t', 'ₜ'), ('u', 'ᵤ'), ('v', 'ᵥ'), ('x', 'ₓ'), ('+', '₊'),
    ('-', '₋'), ('=', '₌'), ('(', '₍'), (')', '₎'),
  ]
  .iter()
  .copied()
  .collect();

  /// Shared font database for SVG text shaping, loaded once per process.
  static ref FONT_DB: Arc<usvg::fontdb::Database> = {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    Arc::new(db)
  };
}

/// Style wrappers whose argument renders as-is.
const TRANSPARENT_MACROS: &[&str] = &[
  "text",
  "mathrm",
  "mathbf",
  "mathit",
  "mathsf",
  "mathtt",
  "mathcal",
  "mathbb",
  "mathfrak",
  "boldsymbol",
  "bm",
  "operatorname",
  "textrm",
  "textbf",
  "textit",
  "hat",
  "bar",
  "tilde",
  "vec",
  "dot",
  "ddot",
  "overline",
  "underline",
];

/// Converts a LaTeX expression to a single line of Unicode text.
///
/// With `strict` set, any macro without a mapping fails the conversion;
/// otherwise unknown macros are dropped and their brace arguments inlined.
fn latex_to_unicode(latex: &str, strict: bool) -> std::result::Result<String, TypesetError> {
  let mut converter = Converter { chars: latex.chars().collect(), pos: 0, strict };
  let mut out = String::new();
  converter.convert_until(&mut out, None)?;

  let squeezed = out.split_whitespace().collect::<Vec<_>>().join(" ");
  if squeezed.is_empty() {
    return Err(TypesetError::Empty);
  }
  Ok(squeezed)
}

/// Cursor over the LaTeX source.
struct Converter {
  /// Expression characters.
  chars:  Vec<char>,
  /// Current position.
  pos:    usize,
  /// Whether unknown macros abort the conversion.
  strict: bool,
}

impl Converter {
  /// Converts until `stop` (or end of input), appending to `out`.
  fn convert_until(
    &mut self,
    out: &mut String,
    stop: Option<char>,
  ) -> std::result::Result<(), TypesetError> {
    while let Some(&ch) = self.chars.get(self.pos) {
      if Some(ch) == stop {
        self.pos += 1;
        return Ok(());
      }
      self.pos += 1;
      match ch {
        '\\' => self.convert_command(out)?,
        '{' => self.convert_until(out, Some('}'))?,
        '}' => {}, // unbalanced close; ignore
        '^' => self.convert_script(out, &SUPERSCRIPTS, '^')?,
        '_' => self.convert_script(out, &SUBSCRIPTS, '_')?,
        '$' => {},
        '~' => out.push(' '),
        '%' => {
          while let Some(&c) = self.chars.get(self.pos) {
            self.pos += 1;
            if c == '\n' {
              break;
            }
          }
        },
        other => out.push(other),
      }
    }
    Ok(())
  }

  /// Handles one `\command` (or escaped punctuation).
  fn convert_command(&mut self, out: &mut String) -> std::result::Result<(), TypesetError> {
    let Some(&first) = self.chars.get(self.pos) else {
      return Ok(());
    };

    if !first.is_ascii_alphabetic() {
      self.pos += 1;
      match first {
        '\\' | ',' | ';' | ':' | ' ' => out.push(' '),
        '!' => {},
        '{' | '}' | '%' | '$' | '&' | '#' | '_' => out.push(first),
        '|' => out.push('‖'),
        other => out.push(other),
      }
      return Ok(());
    }

    let start = self.pos;
    while self.chars.get(self.pos).is_some_and(|c| c.is_ascii_alphabetic()) {
      self.pos += 1;
    }
    let name: String = self.chars[start..self.pos].iter().collect();

    if let Some(replacement) = SYMBOLS.get(name.as_str()) {
      out.push_str(replacement);
      return Ok(());
    }

    match name.as_str() {
      "frac" | "dfrac" | "tfrac" => {
        let numerator = self.convert_argument()?;
        let denominator = self.convert_argument()?;
        out.push_str(&format!("({numerator})/({denominator})"));
      },
      "sqrt" => {
        let radicand = self.convert_argument()?;
        out.push_str(&format!("√({radicand})"));
      },
      "left" | "right" | "big" | "Big" | "bigl" | "bigr" | "Bigl" | "Bigr" | "displaystyle" => {
        // sizing commands vanish; the delimiter that follows stays
        if self.chars.get(self.pos) == Some(&'.') {
          self.pos += 1;
        }
      },
      name if TRANSPARENT_MACROS.contains(&name) => {
        let inner = self.convert_argument()?;
        out.push_str(&inner);
      },
      other if self.strict => return Err(TypesetError::Unsupported(other.to_string())),
      _ => {}, // lenient mode: drop the macro, keep whatever follows
    }
    Ok(())
  }

  /// Converts a `^` or `_` argument, mapping to Unicode script forms when
  /// every character has one and falling back to `^(..)` notation otherwise.
  fn convert_script(
    &mut self,
    out: &mut String,
    table: &HashMap<char, char>,
    marker: char,
  ) -> std::result::Result<(), TypesetError> {
    let argument = self.convert_argument()?;
    let mapped: Option<String> = argument.chars().map(|c| table.get(&c).copied()).collect();
    match mapped {
      Some(script) if !script.is_empty() => out.push_str(&script),
      _ if argument.is_empty() => {},
      _ if argument.chars().count() == 1 => {
        out.push(marker);
        out.push_str(&argument);
      },
      _ => out.push_str(&format!("{marker}({argument})")),
    }
    Ok(())
  }

  /// Reads one macro argument: a braced group, a following command, or a
  /// single character.
  fn convert_argument(&mut self) -> std::result::Result<String, TypesetError> {
    let mut out = String::new();
    match self.chars.get(self.pos) {
      Some('{') => {
        self.pos += 1;
        self.convert_until(&mut out, Some('}'))?;
      },
      Some('\\') => {
        self.pos += 1;
        self.convert_command(&mut out)?;
      },
      Some(&ch) => {
        self.pos += 1;
        out.push(ch);
      },
      None => {},
    }
    Ok(out)
  }
}

/// Average glyph advance as a fraction of the font size, used to size the
/// raster canvas before shaping.
const GLYPH_ADVANCE_EM: f64 = 0.62;
/// Horizontal padding on each side of the rendered text, in pixels.
const PAD_PX: u32 = 2;

/// Escapes text for embedding in SVG.
fn xml_escape(text: &str) -> String {
  text
    .replace('&', "&amp;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
    .replace('"', "&quot;")
}

/// Rasterizes a line of Unicode text to a PNG at the given DPI.
fn rasterize_text(text: &str, dpi: u32) -> std::result::Result<MathImage, TypesetError> {
  if text.trim().is_empty() {
    return Err(TypesetError::Empty);
  }

  let font_px = MATH_FONT_PT * dpi as f64 / 72.0;
  let ascent = (font_px * 1.12).ceil();
  let descent = (font_px * 0.38).ceil();
  let height = (ascent + descent) as u32;
  let width =
    (font_px * GLYPH_ADVANCE_EM * text.chars().count() as f64).ceil() as u32 + 2 * PAD_PX;

  let svg = format!(
    concat!(
      r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}">"#,
      r#"<text x="{x}" y="{y}" font-family="serif" font-size="{size}">{text}</text>"#,
      "</svg>"
    ),
    w = width,
    h = height,
    x = PAD_PX,
    y = ascent,
    size = font_px,
    text = xml_escape(text),
  );

  let mut options = usvg::Options::default();
  options.fontdb = FONT_DB.clone();
  let tree = usvg::Tree::from_str(&svg, &options)
    .map_err(|e| TypesetError::Raster(format!("svg parse: {e}")))?;

  let mut pixmap = tiny_skia::Pixmap::new(width, height)
    .ok_or_else(|| TypesetError::Raster("zero-sized pixmap".to_string()))?;
  resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());

  let mut rgba = pixmap.data().to_vec();
  unpremultiply_rgba(&mut rgba);
  // flatten onto white so the PDF embedding needs no alpha handling
  for px in rgba.chunks_exact_mut(4) {
    let alpha = px[3] as u32;
    for channel in px.iter_mut().take(3) {
      *channel = ((*channel as u32 * alpha + 255 * (255 - alpha)) / 255) as u8;
    }
    px[3] = 255;
  }

  let buffer = image::ImageBuffer::from_raw(width, height, rgba)
    .ok_or_else(|| TypesetError::Raster("pixmap buffer size mismatch".to_string()))?;
  let dynamic = image::DynamicImage::ImageRgba8(buffer).to_rgb8();

  let mut png = Vec::new();
  image::DynamicImage::ImageRgb8(dynamic)
    .write_to(&mut png, image::ImageOutputFormat::Png)
    .map_err(|e| TypesetError::Raster(format!("png encode: {e}")))?;

  Ok(MathImage { png, width_px: width, height_px: height, baseline_px: descent as u32, dpi })
}

/// Converts premultiplied RGBA (tiny-skia's native format) back to straight
/// alpha.
fn unpremultiply_rgba(data: &mut [u8]) {
  for px in data.chunks_exact_mut(4) {
    let alpha = px[3] as u32;
    if alpha > 0 && alpha < 255 {
      for channel in px.iter_mut().take(3) {
        *channel = ((*channel as u32 * 255) / alpha).min(255) as u8;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn greek_and_operators_convert() {
    assert_eq!(latex_to_unicode(r"\alpha + \beta \leq \gamma", true).unwrap(), "α + β ≤ γ");
  }

  #[test]
  fn scripts_map_to_unicode_forms() {
    assert_eq!(latex_to_unicode("x^2", true).unwrap(), "x²");
    assert_eq!(latex_to_unicode("a_{ij}", true).unwrap(), "aᵢⱼ");
    assert_eq!(latex_to_unicode("x^{n+1}", true).unwrap(), "xⁿ⁺¹");
  }

  #[test]
  fn unmappable_script_keeps_marker_notation() {
    assert_eq!(latex_to_unicode(r"x^{\alpha\beta}", true).unwrap(), "x^(αβ)");
  }

  #[test]
  fn fractions_and_roots_linearize() {
    assert_eq!(latex_to_unicode(r"\frac{a}{b}", true).unwrap(), "(a)/(b)");
    assert_eq!(latex_to_unicode(r"\sqrt{x+1}", true).unwrap(), "√(x+1)");
  }

  #[test]
  fn style_wrappers_are_transparent() {
    assert_eq!(latex_to_unicode(r"\mathbf{x} \in \mathbb{R}", true).unwrap(), "x ∈ R");
  }

  #[test]
  fn strict_mode_rejects_unknown_macros() {
    assert!(matches!(
      latex_to_unicode(r"\xleftarrow{f}", true),
      Err(TypesetError::Unsupported(_))
    ));
  }

  #[test]
  fn lenient_mode_drops_unknown_macros() {
    assert_eq!(latex_to_unicode(r"\xcancel{y} + z", false).unwrap(), "y + z");
  }

  #[test]
  fn empty_expression_is_an_error() {
    assert!(matches!(latex_to_unicode("  ", true), Err(TypesetError::Empty)));
    assert!(matches!(latex_to_unicode("{}", true), Err(TypesetError::Empty)));
  }

  #[test]
  fn renderer_is_total() {
    let renderer = MathRenderer::new(96);
    // valid, malformed, unknown-macro, and empty inputs all yield a rendering
    for latex in [r"E = mc^2", r"\frac{a}{", r"\unknowncommand{x}", "", "{{{"] {
      match renderer.render(latex) {
        MathRendering::Image(image) => {
          assert!(!image.png.is_empty());
          assert!(image.width_px > 0 && image.height_px > 0);
          assert!(image.baseline_px < image.height_px);
        },
        MathRendering::Text(_) => {},
      }
    }
  }

  #[test]
  fn placeholder_prefers_unicode_form() {
    let renderer = MathRenderer::new(96);
    if let MathRendering::Text(text) = renderer.render(r"\unknowncommand{\alpha}") {
      assert!(text.contains('α') || text.contains("unknowncommand"));
    }
  }

  #[test]
  fn text_only_renderer_never_rasterizes() {
    let renderer = MathRenderer::text_only();
    for latex in [r"E = mc^2", r"\alpha + \beta", r"x_i"] {
      match renderer.render(latex) {
        MathRendering::Text(text) => assert!(!text.is_empty()),
        MathRendering::Image(_) => panic!("text-only renderer produced an image for {latex:?}"),
      }
    }
  }
}
