//! Text metrics for line wrapping.
//!
//! Text is always drawn with the PDF builtin Helvetica faces. Measurement
//! defaults to an average-advance heuristic; when metric-compatible TrueType
//! faces are configured their advances are read once with `ttf-parser` and
//! used instead.

use std::collections::HashMap;
use std::fs;

use crate::config::MetricFonts;

/// Per-face advances in em units.
#[derive(Debug, Clone)]
struct FaceMetrics {
    advances: HashMap<char, f32>,
    /// Advance used for characters the face has no glyph for.
    missing: f32,
    ascender: f32,
}

impl FaceMetrics {
    fn parse(bytes: &[u8]) -> Result<Self, String> {
        let face = ttf_parser::Face::parse(bytes, 0).map_err(|e| format!("invalid font data: {e}"))?;
        let upem = face.units_per_em() as f32;
        if upem <= 0.0 {
            return Err("font reports zero units per em".to_string());
        }

        // Everything reachable through the WinAnsi encoding lives in Latin-1
        // plus a handful of punctuation marks.
        let extra = ['\u{2013}', '\u{2014}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2026}', '\u{20AC}'];
        let advances = (' '..='\u{FF}')
            .chain(extra)
            .filter_map(|ch| {
                let gid = face.glyph_index(ch)?;
                let advance = face.glyph_hor_advance(gid)?;
                Some((ch, advance as f32 / upem))
            })
            .collect::<HashMap<_, _>>();
        if advances.is_empty() {
            return Err("font has no Latin glyphs".to_string());
        }

        Ok(Self {
            missing: advances.get(&'n').copied().unwrap_or(0.5),
            ascender: face.ascender() as f32 / upem,
            advances,
        })
    }

    fn width(&self, text: &str) -> f32 {
        text.chars()
            .map(|ch| self.advances.get(&ch).copied().unwrap_or(self.missing))
            .sum()
    }
}

/// Font metrics used by layout.
#[derive(Debug, Clone, Default)]
pub struct FontBook {
    regular: Option<FaceMetrics>,
    bold: Option<FaceMetrics>,
}

impl FontBook {
    /// Heuristic Helvetica metrics only.
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Load the configured metric faces. Any configured face that cannot be
    /// read or parsed is an error.
    pub fn from_config(fonts: &MetricFonts) -> Result<Self, String> {
        let load = |path: &std::path::Path| -> Result<FaceMetrics, String> {
            let bytes = fs::read(path).map_err(|e| format!("cannot read font {}: {e}", path.display()))?;
            FaceMetrics::parse(&bytes).map_err(|e| format!("{}: {e}", path.display()))
        };
        let book = Self {
            regular: fonts.regular.as_deref().map(load).transpose()?,
            bold: fonts.bold.as_deref().map(load).transpose()?,
        };
        if book.has_metric_faces() {
            log::debug!(
                "Loaded metric fonts (regular: {}, bold: {})",
                book.regular.is_some(),
                book.bold.is_some()
            );
        }
        Ok(book)
    }

    /// Load a single regular face from bytes.
    pub fn with_regular_face(mut self, bytes: &[u8]) -> Result<Self, String> {
        self.regular = Some(FaceMetrics::parse(bytes)?);
        Ok(self)
    }

    pub fn has_metric_faces(&self) -> bool {
        self.regular.is_some() || self.bold.is_some()
    }

    fn face(&self, bold: bool) -> Option<&FaceMetrics> {
        if bold {
            self.bold.as_ref().or(self.regular.as_ref())
        } else {
            self.regular.as_ref()
        }
    }

    /// Width of `text` in points.
    pub fn measure(&self, text: &str, font_size: f32, bold: bool) -> f32 {
        match self.face(bold) {
            Some(face) => face.width(text) * font_size,
            None => {
                // Average Helvetica advance; bold runs about 10% wider.
                let avg = if bold { 0.55 } else { 0.5 };
                text.chars().count() as f32 * font_size * avg
            }
        }
    }

    /// Distance from the top of a line box to the baseline.
    pub fn ascender(&self, font_size: f32, bold: bool) -> f32 {
        self.face(bold).map_or(0.75, |f| f.ascender) * font_size
    }

    /// Greedy word wrap to `max_width`. Explicit newlines always break.
    pub fn wrap_text(&self, text: &str, font_size: f32, bold: bool, max_width: f32) -> Vec<String> {
        if max_width <= 0.0 {
            return vec![text.trim().to_string()];
        }

        let mut lines = Vec::new();
        for paragraph in text.split('\n') {
            let mut current = String::new();
            for word in paragraph.split_whitespace() {
                if current.is_empty() {
                    current.push_str(word);
                    continue;
                }
                let candidate = format!("{current} {word}");
                if self.measure(&candidate, font_size, bold) > max_width {
                    lines.push(std::mem::replace(&mut current, word.to_string()));
                } else {
                    current = candidate;
                }
            }
            lines.push(current);
        }
        // A trailing <br> leaves an empty last line that would only add height.
        while lines.len() > 1 && lines.last().is_some_and(String::is_empty) {
            lines.pop();
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_widths() {
        let fonts = FontBook::builtin();
        assert!((fonts.measure("Receita", 10.0, false) - 35.0).abs() < 0.01);
        assert!((fonts.measure("Receita", 10.0, true) - 38.5).abs() < 0.01);
        assert!((fonts.ascender(10.0, false) - 7.5).abs() < 0.01);
    }

    #[test]
    fn wraps_on_word_boundaries() {
        let fonts = FontBook::builtin();
        let lines = fonts.wrap_text("Tomar um comprimido ao dia", 10.0, false, 60.0);
        assert!(lines.len() >= 2, "expected wrapping, got {lines:?}");
        assert!(lines.iter().all(|l| !l.starts_with(' ')));
        assert_eq!(lines.join(" "), "Tomar um comprimido ao dia");
    }

    #[test]
    fn explicit_newlines_break_lines() {
        let fonts = FontBook::builtin();
        let lines = fonts.wrap_text("Rua A\nSão Paulo\n", 10.0, false, 500.0);
        assert_eq!(lines, vec!["Rua A".to_string(), "São Paulo".to_string()]);
    }

    #[test]
    fn unparseable_face_is_rejected() {
        let err = FontBook::builtin().with_regular_face(b"not a font").unwrap_err();
        assert!(err.contains("invalid font data"));
    }

    #[test]
    fn missing_font_file_is_an_error() {
        let fonts = MetricFonts {
            regular: Some("/nonexistent/rx-forge/regular.ttf".into()),
            bold: None,
        };
        assert!(FontBook::from_config(&fonts).is_err());
    }
}
