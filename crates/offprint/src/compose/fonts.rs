//! Font discovery for PDF output.
//!
//! The composer embeds a serif family from TTF files on disk. The directory
//! is resolved in order from the `OFFPRINT_FONTS_DIR` environment variable,
//! an `assets/fonts` directory next to the running executable, and finally
//! the crate's own `assets/fonts` (the development layout). See
//! `assets/fonts/README.md` for which files are expected.

use std::env;

use genpdf::fonts::{self, FontData, FontFamily};

use super::*;

/// Environment variable overriding the font directory.
pub const FONTS_DIR_VAR: &str = "OFFPRINT_FONTS_DIR";

/// File-name prefix of the embedded family.
pub const FONT_FAMILY_NAME: &str = "NotoSerif";

/// The four faces genpdf needs for a complete family.
const FONT_FILES: &[&str] = &[
  "NotoSerif-Regular.ttf",
  "NotoSerif-Bold.ttf",
  "NotoSerif-Italic.ttf",
  "NotoSerif-BoldItalic.ttf",
];

/// Directories searched for the font files, in priority order.
fn candidate_directories() -> Vec<PathBuf> {
  let mut candidates = Vec::new();
  if let Ok(dir) = env::var(FONTS_DIR_VAR) {
    candidates.push(PathBuf::from(dir));
  }
  if let Ok(exe) = env::current_exe() {
    if let Some(dir) = exe.parent() {
      candidates.push(dir.join("assets/fonts"));
    }
  }
  candidates.push(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts"));
  candidates
}

/// Whether a directory holds all four faces.
fn has_all_faces(dir: &Path) -> bool {
  FONT_FILES.iter().all(|name| dir.join(name).is_file())
}

/// The first candidate directory holding a complete family.
fn font_directory() -> Option<PathBuf> {
  candidate_directories().into_iter().find(|dir| has_all_faces(dir))
}

/// Loads the document font family from disk.
///
/// # Errors
///
/// [`OffprintError::Render`] when no candidate directory holds all four
/// faces or the files cannot be parsed as fonts.
pub fn document_font_family() -> Result<FontFamily<FontData>> {
  let Some(directory) = font_directory() else {
    let searched = candidate_directories()
      .iter()
      .map(|dir| dir.display().to_string())
      .collect::<Vec<_>>()
      .join(", ");
    return Err(OffprintError::Render(format!(
      "no complete {FONT_FAMILY_NAME} font family found; searched {searched} \
       (see assets/fonts/README.md, or set {FONTS_DIR_VAR})"
    )));
  };

  debug!("Loading fonts from {}", directory.display());
  fonts::from_files(&directory, FONT_FAMILY_NAME, None).map_err(|err| {
    OffprintError::Render(format!(
      "failed to load {FONT_FAMILY_NAME} from {}: {err}",
      directory.display()
    ))
  })
}

/// Whether the embedded family is present, used by tests to skip PDF
/// rendering on machines without the font files.
pub fn default_fonts_available() -> bool {
  font_directory().is_some()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn candidates_end_with_manifest_fallback() {
    let candidates = candidate_directories();
    assert!(!candidates.is_empty());
    assert!(candidates.last().unwrap().ends_with("assets/fonts"));
  }

  #[test]
  fn missing_family_reports_searched_directories() {
    if default_fonts_available() {
      return;
    }
    let err = document_font_family().unwrap_err();
    assert!(matches!(err, OffprintError::Render(_)));
    assert!(err.to_string().contains(FONT_FAMILY_NAME));
  }
}
