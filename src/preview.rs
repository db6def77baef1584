//! Terminal preview of the live capture.
//!
//! A [`PreviewSink`] is bound to one capture session while it is granted
//! and unbound when the user stops or goes home. The ASCII sink averages
//! the grayscale preview frame into character cells and maps brightness
//! onto a density ramp.

use crate::capture::{CaptureStream, PreviewFrame};
use crate::controller::SessionId;

/// Standard ASCII density ramp (10 levels), darkest to brightest.
pub const STANDARD_CHARSET: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Block character set (5 levels).
pub const BLOCKS_CHARSET: &[char] = &[' ', '░', '▒', '▓', '█'];

/// Minimal character set (4 levels).
pub const MINIMAL_CHARSET: &[char] = &[' ', '.', ':', '#'];

/// Character ramp used for the preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharSet {
    #[default]
    Standard,
    Blocks,
    Minimal,
}

impl CharSet {
    pub fn chars(&self) -> &'static [char] {
        match self {
            CharSet::Standard => STANDARD_CHARSET,
            CharSet::Blocks => BLOCKS_CHARSET,
            CharSet::Minimal => MINIMAL_CHARSET,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CharSet::Standard => "standard",
            CharSet::Blocks => "blocks",
            CharSet::Minimal => "minimal",
        }
    }

    /// Parse a config name; unknown names give `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "standard" => Some(CharSet::Standard),
            "blocks" => Some(CharSet::Blocks),
            "minimal" => Some(CharSet::Minimal),
            _ => None,
        }
    }
}

/// Surface that shows frames of a bound capture session.
pub trait PreviewSink {
    /// Associate the sink with a session's stream.
    fn bind(&mut self, session: SessionId);

    /// Drop the association. Safe to call when unbound.
    fn unbind(&mut self);

    fn bound_session(&self) -> Option<SessionId>;

    /// Render the stream's latest frame if the sink is bound.
    fn render(&mut self, stream: Option<&dyn CaptureStream>) -> Option<String>;
}

/// Preview that draws frames as ASCII art.
#[derive(Debug, Clone)]
pub struct AsciiPreview {
    charset: CharSet,
    invert: bool,
    columns: u16,
    rows: u16,
    bound: Option<SessionId>,
}

impl AsciiPreview {
    pub fn new(columns: u16, rows: u16) -> Self {
        Self {
            charset: CharSet::default(),
            invert: false,
            columns,
            rows,
            bound: None,
        }
    }

    pub fn with_charset(mut self, charset: CharSet) -> Self {
        self.charset = charset;
        self
    }

    /// Invert brightness (for light terminals)
    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    /// ASCII art for one frame, `rows` lines of `columns` characters.
    pub fn draw(&self, frame: &PreviewFrame) -> String {
        let cells = downsample(&frame.data, frame.width, frame.height, self.columns, self.rows);
        let chars = map_to_chars(&cells, self.charset.chars(), self.invert);
        chars
            .chunks(self.columns.max(1) as usize)
            .map(|row| row.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl PreviewSink for AsciiPreview {
    fn bind(&mut self, session: SessionId) {
        log::debug!("Preview bound to session {}", session);
        self.bound = Some(session);
    }

    fn unbind(&mut self) {
        if let Some(session) = self.bound.take() {
            log::debug!("Preview unbound from session {}", session);
        }
    }

    fn bound_session(&self) -> Option<SessionId> {
        self.bound
    }

    fn render(&mut self, stream: Option<&dyn CaptureStream>) -> Option<String> {
        self.bound?;
        let frame = stream?.latest_frame()?;
        Some(self.draw(&frame))
    }
}

/// Average a grayscale image into a `columns x rows` grid of cells.
///
/// Cells that cover no pixels (image smaller than the grid) are 0.
pub fn downsample(gray: &[u8], width: u32, height: u32, columns: u16, rows: u16) -> Vec<u8> {
    if columns == 0 || rows == 0 || width == 0 || height == 0 || gray.is_empty() {
        return Vec::new();
    }

    let cell_w = width as f32 / columns as f32;
    let cell_h = height as f32 / rows as f32;
    let mut result = Vec::with_capacity(columns as usize * rows as usize);

    for cy in 0..rows as u32 {
        for cx in 0..columns as u32 {
            let start_x = (cx as f32 * cell_w) as u32;
            let end_x = ((cx + 1) as f32 * cell_w) as u32;
            let start_y = (cy as f32 * cell_h) as u32;
            let end_y = ((cy + 1) as f32 * cell_h) as u32;

            let mut sum = 0u32;
            let mut count = 0u32;
            for py in start_y..end_y {
                for px in start_x..end_x {
                    if let Some(&v) = gray.get((py * width + px) as usize) {
                        sum += v as u32;
                        count += 1;
                    }
                }
            }
            result.push(if count > 0 { (sum / count) as u8 } else { 0 });
        }
    }

    result
}

/// Map brightness values (0-255) to characters of `charset`.
pub fn map_to_chars(brightness: &[u8], charset: &[char], invert: bool) -> Vec<char> {
    if charset.is_empty() {
        return vec![' '; brightness.len()];
    }

    let levels = charset.len();
    brightness
        .iter()
        .map(|&b| {
            let b = if invert { 255 - b } else { b };
            charset[(b as usize * (levels - 1)) / 255]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_to_chars_extremes() {
        let chars = map_to_chars(&[0, 255], STANDARD_CHARSET, false);
        assert_eq!(chars, vec![' ', '@']);
        let inverted = map_to_chars(&[0, 255], STANDARD_CHARSET, true);
        assert_eq!(inverted, vec!['@', ' ']);
    }

    #[test]
    fn test_map_to_chars_empty_charset() {
        assert_eq!(map_to_chars(&[10, 20], &[], false), vec![' ', ' ']);
    }

    #[test]
    fn test_downsample_averages_cells() {
        // 4x2 image into 2x1 cells: left half 0/100, right half 200/255
        let gray = [0, 100, 200, 255, 0, 100, 200, 255];
        let cells = downsample(&gray, 4, 2, 2, 1);
        assert_eq!(cells, vec![50, 227]);
    }

    #[test]
    fn test_downsample_degenerate() {
        assert!(downsample(&[], 4, 4, 2, 2).is_empty());
        assert!(downsample(&[1, 2, 3, 4], 2, 2, 0, 2).is_empty());
    }

    #[test]
    fn test_draw_shape() {
        let frame = PreviewFrame::new(vec![255; 8 * 4], 8, 4).unwrap();
        let art = AsciiPreview::new(4, 2).draw(&frame);
        assert_eq!(art, "@@@@\n@@@@");
    }

    #[test]
    fn test_unbound_preview_renders_nothing() {
        let mut preview = AsciiPreview::new(4, 2);
        assert!(preview.render(None).is_none());
        preview.bind(7);
        assert_eq!(preview.bound_session(), Some(7));
        assert!(preview.render(None).is_none());
        preview.unbind();
        preview.unbind();
        assert_eq!(preview.bound_session(), None);
    }

    #[test]
    fn test_charset_names() {
        for cs in [CharSet::Standard, CharSet::Blocks, CharSet::Minimal] {
            assert_eq!(CharSet::from_name(cs.name()), Some(cs));
        }
        assert_eq!(CharSet::from_name("BLOCKS"), Some(CharSet::Blocks));
        assert_eq!(CharSet::from_name("braille"), None);
    }
}
