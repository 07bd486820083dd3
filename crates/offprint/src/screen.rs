//! E-reader screen size presets.
//!
//! Each preset names the usable page area of a specific e-reader display
//! along with the panel's pixel density and a base font size that reads well
//! at that physical size. The table is process-wide read-only data,
//! initialized once and looked up by key; custom dimensions bypass the table
//! entirely via [`ScreenPreset::custom`].

use super::*;

/// A named physical page-size configuration for a specific e-reader model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenPreset {
  /// Stable lookup key, e.g. "kindle-paperwhite".
  pub key:          String,
  /// Human-readable device name.
  pub name:         String,
  /// Page width in millimeters.
  pub width_mm:     f64,
  /// Page height in millimeters.
  pub height_mm:    f64,
  /// Panel pixel density in pixels per inch.
  pub ppi:          u32,
  /// Base body font size in points.
  pub base_font_pt: f64,
  /// One-line description shown by `--list-screens`.
  pub description:  String,
}

/// Builds one table entry.
fn preset(
  key: &str,
  name: &str,
  width_mm: f64,
  height_mm: f64,
  ppi: u32,
  base_font_pt: f64,
  description: &str,
) -> ScreenPreset {
  ScreenPreset {
    key: key.to_string(),
    name: name.to_string(),
    width_mm,
    height_mm,
    ppi,
    base_font_pt,
    description: description.to_string(),
  }
}

lazy_static! {
  /// The process-wide preset table, in display order.
  pub static ref SCREEN_PRESETS: Vec<ScreenPreset> = vec![
    preset(
      "kindle-paperwhite",
      "Kindle Paperwhite 6.8\"",
      105.0,
      140.0,
      300,
      11.0,
      "Kindle Paperwhite 6.8-inch (2021+)",
    ),
    preset(
      "kindle-paperwhite-6",
      "Kindle Paperwhite 6\"",
      91.0,
      123.0,
      300,
      10.0,
      "Kindle Paperwhite 6-inch (older models)",
    ),
    preset("kindle-scribe", "Kindle Scribe", 158.0, 210.0, 300, 12.0, "Kindle Scribe 10.2-inch"),
    preset("kobo-clara", "Kobo Clara", 91.0, 123.0, 300, 10.0, "Kobo Clara 6-inch"),
    preset("kobo-libra", "Kobo Libra", 107.0, 142.0, 300, 11.0, "Kobo Libra 7-inch"),
    preset("remarkable", "reMarkable 2", 158.0, 210.0, 226, 12.0, "reMarkable 2 10.3-inch"),
    preset("a5", "A5 Paper", 148.0, 210.0, 300, 11.0, "A5 paper size (148x210mm)"),
  ];
}

impl ScreenPreset {
  /// Looks up a preset by key.
  pub fn lookup(key: &str) -> Option<&'static ScreenPreset> {
    SCREEN_PRESETS.iter().find(|p| p.key == key)
  }

  /// Creates a custom preset from explicit page dimensions.
  ///
  /// Custom geometry carries the default 11pt base font and a 300 ppi
  /// density, matching the table's most common entries.
  pub fn custom(width_mm: f64, height_mm: f64) -> ScreenPreset {
    ScreenPreset {
      key:          "custom".to_string(),
      name:         "Custom".to_string(),
      width_mm,
      height_mm,
      ppi:          300,
      base_font_pt: 11.0,
      description:  format!("Custom {width_mm}x{height_mm}mm"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn table_matches_documented_dimensions() {
    let expect = [
      ("kindle-paperwhite", 105.0, 140.0),
      ("kindle-paperwhite-6", 91.0, 123.0),
      ("kindle-scribe", 158.0, 210.0),
      ("kobo-clara", 91.0, 123.0),
      ("kobo-libra", 107.0, 142.0),
      ("remarkable", 158.0, 210.0),
      ("a5", 148.0, 210.0),
    ];
    assert_eq!(SCREEN_PRESETS.len(), expect.len());
    for (key, width, height) in expect {
      let preset = ScreenPreset::lookup(key).unwrap();
      assert_eq!(preset.width_mm, width, "{key} width");
      assert_eq!(preset.height_mm, height, "{key} height");
    }
  }

  #[test]
  fn lookup_unknown_key_is_none() {
    assert!(ScreenPreset::lookup("kindle-oasis").is_none());
  }

  #[test]
  fn custom_preset_carries_dimensions() {
    let preset = ScreenPreset::custom(150.0, 200.0);
    assert_eq!(preset.width_mm, 150.0);
    assert_eq!(preset.height_mm, 200.0);
    assert_eq!(preset.base_font_pt, 11.0);
  }
}
