mod layout;
mod pdf;

pub use layout::{compute_layout, ColumnPlan, TableLayout};
pub use pdf::TableRenderer;

use std::path::PathBuf;
use std::str::FromStr;

/// Page dimensions in PDF points (1/72 inch), portrait orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    Letter,
    A4,
}

impl PageSize {
    pub fn dimensions_pt(&self) -> (f32, f32) {
        match self {
            PageSize::Letter => (612.0, 792.0),
            PageSize::A4 => (595.0, 842.0),
        }
    }
}

impl FromStr for PageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LETTER" => Ok(PageSize::Letter),
            "A4" => Ok(PageSize::A4),
            other => Err(format!("invalid page size: {other} (must be LETTER or A4)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            other => Err(format!(
                "invalid orientation: {other} (must be portrait or landscape)"
            )),
        }
    }
}

/// RGB color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

/// Cosmetic table parameters. Deterministic for a given config; nothing
/// here affects which rows land on which page beyond the font sizes.
#[derive(Debug, Clone, PartialEq)]
pub struct TableStyle {
    pub header_fill: Color,
    pub header_text: Color,
    pub body_text: Color,
    pub stripe_fill: Color,
    pub grid: Color,
    pub header_font_size: f32,
    pub body_font_size: f32,
}

impl Default for TableStyle {
    fn default() -> Self {
        Self {
            // Steel blue header over whitesmoke text, light gray stripes.
            header_fill: Color::new(0.18, 0.525, 0.67),
            header_text: Color::new(0.96, 0.96, 0.96),
            body_text: Color::new(0.1, 0.1, 0.1),
            stripe_fill: Color::new(0.96, 0.96, 0.96),
            grid: Color::new(0.6, 0.6, 0.6),
            header_font_size: 10.0,
            body_font_size: 8.0,
        }
    }
}

/// Everything one render needs besides the data and the output path.
/// Immutable for the duration of a render. The renderer never reads the
/// clock: timestamps belong in `subtitle`, supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub page_size: PageSize,
    pub orientation: Orientation,
    pub title: String,
    pub subtitle: Option<String>,
    pub style: TableStyle,
    pub null_placeholder: String,
    pub max_cell_chars: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::Letter,
            orientation: Orientation::Landscape,
            title: "Dashboard Export".to_string(),
            subtitle: None,
            style: TableStyle::default(),
            null_placeholder: "—".to_string(),
            max_cell_chars: 60,
        }
    }
}

impl RenderConfig {
    /// Page dimensions in points after applying orientation.
    pub fn page_dimensions_pt(&self) -> (f32, f32) {
        let (w, h) = self.page_size.dimensions_pt();
        match self.orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }
}

/// The artifact a render produces. The file belongs to the caller from
/// here on; nothing in this crate deletes it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub path: PathBuf,
    pub bytes: u64,
    pub page_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_parses_case_insensitively() {
        assert_eq!("letter".parse::<PageSize>().unwrap(), PageSize::Letter);
        assert_eq!("A4".parse::<PageSize>().unwrap(), PageSize::A4);
        assert!("legal".parse::<PageSize>().is_err());
    }

    #[test]
    fn test_orientation_parses_case_insensitively() {
        assert_eq!(
            "Landscape".parse::<Orientation>().unwrap(),
            Orientation::Landscape
        );
        assert!("diagonal".parse::<Orientation>().is_err());
    }

    #[test]
    fn test_landscape_swaps_dimensions() {
        let config = RenderConfig {
            page_size: PageSize::Letter,
            orientation: Orientation::Landscape,
            ..RenderConfig::default()
        };
        assert_eq!(config.page_dimensions_pt(), (792.0, 612.0));
    }
}
