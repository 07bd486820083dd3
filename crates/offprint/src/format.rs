//! Filename formatting helpers.
//!
//! Converts paper titles into filesystem-safe output names that behave on
//! Linux, macOS, and Windows alike.

use super::*;

/// Default maximum length for a title-derived filename stem.
pub const MAX_TITLE_LEN: usize = 80;

lazy_static! {
  /// Characters that are invalid in filenames on at least one platform.
  static ref FORBIDDEN: Regex = Regex::new(r#"[<>"|?*\x00-\x1f]"#).unwrap();
  /// Runs of whitespace, collapsed to a single underscore.
  static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
  /// Runs of dashes, collapsed to one.
  static ref DASHES: Regex = Regex::new(r"-+").unwrap();
  /// Runs of underscores, collapsed to one.
  static ref UNDERSCORES: Regex = Regex::new(r"_+").unwrap();
  /// Mixed dash/underscore runs left over after the collapses above.
  static ref MIXED: Regex = Regex::new(r"[-_]{2,}").unwrap();
}

/// Converts a paper title into a safe filename stem.
///
/// Path separators and colons become dashes, characters that any major
/// platform rejects are removed, whitespace collapses to underscores, and the
/// result is capped at `max_len` characters (cut at an underscore boundary
/// where possible). An empty result falls back to `"paper"`.
///
/// # Examples
///
/// ```
/// use offprint::format::format_title;
///
/// assert_eq!(format_title("Attention Is All You Need", None), "Attention_Is_All_You_Need");
/// assert_eq!(format_title("GPT-4: A Review", None), "GPT-4_A_Review");
/// ```
pub fn format_title(title: &str, max_len: Option<usize>) -> String {
  let max_len = max_len.unwrap_or(MAX_TITLE_LEN);

  let name = title.replace([':', '/', '\\'], "-");
  let name = FORBIDDEN.replace_all(&name, "");
  let name = WHITESPACE.replace_all(&name, "_");
  let name = DASHES.replace_all(&name, "-");
  let name = UNDERSCORES.replace_all(&name, "_");
  let name = MIXED.replace_all(&name, "_");
  let mut name = name.trim_matches(['_', '-']).to_string();

  if name.chars().count() > max_len {
    let truncated: String = name.chars().take(max_len).collect();
    name = match truncated.rsplit_once('_') {
      Some((head, _)) => head.trim_matches(['_', '-']).to_string(),
      None => truncated,
    };
  }

  if name.is_empty() {
    "paper".to_string()
  } else {
    name
  }
}
