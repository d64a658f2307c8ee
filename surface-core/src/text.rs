//! Text layout parameters for text-backed surfaces.

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::{CoreError, CoreResult};
use crate::geometry::Padding;

/// Default font size in pixels.
const DEFAULT_FONT_SIZE: f32 = 14.0;

/// Default font family.
const DEFAULT_FONT_FAMILY: &str = "sans-serif";

/// Font slant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    /// Upright glyphs.
    #[default]
    Normal,
    /// Slanted glyphs synthesized from the upright face.
    Oblique,
    /// True italic face.
    Italic,
}

impl FontStyle {
    /// CSS/SVG keyword for this style.
    #[must_use]
    pub const fn as_css(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Oblique => "oblique",
            Self::Italic => "italic",
        }
    }
}

/// Horizontal placement of each line inside the layout box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextHorizontalAlignment {
    /// Lines start at the left inset.
    #[default]
    Left,
    /// Lines end at the right inset.
    Right,
    /// Lines are centered.
    Center,
    /// Every wrapped line except the last is stretched to the full width.
    Justified,
}

/// Vertical placement of the text block inside the layout box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextVerticalAlignment {
    /// Block starts at the top inset.
    #[default]
    Top,
    /// Block is centered.
    Center,
    /// Block ends at the bottom inset.
    Bottom,
}

/// Line breaking policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WordWrapping {
    /// Break between words; words wider than a line are split.
    #[default]
    Wrap,
    /// Never wrap; only explicit newlines start a line.
    NoWrap,
    /// Break between words only; long words overflow.
    WholeWord,
    /// Break between any two characters.
    Character,
    /// Break between words, splitting a word only when it cannot fit alone.
    EmergencyBreak,
}

/// Everything needed to lay out and rasterize a text surface.
///
/// A `width` or `height` of zero sizes the surface to fit the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextLayoutOptions {
    /// Layout box width in pixels (0 = fit text).
    pub width: f32,
    /// Layout box height in pixels (0 = fit text).
    pub height: f32,
    /// Font family name.
    pub font_family: String,
    /// Font size in pixels.
    pub font_size: f32,
    /// Font slant.
    pub font_style: FontStyle,
    /// Horizontal line alignment.
    pub horizontal_alignment: TextHorizontalAlignment,
    /// Vertical block alignment.
    pub vertical_alignment: TextVerticalAlignment,
    /// Line breaking policy.
    pub word_wrapping: WordWrapping,
    /// Insets between the surface edge and the text.
    pub padding: Padding,
    /// Glyph color.
    pub foreground_color: Color,
    /// Fill behind the text.
    pub background_color: Color,
}

impl Default for TextLayoutOptions {
    fn default() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_size: DEFAULT_FONT_SIZE,
            font_style: FontStyle::Normal,
            horizontal_alignment: TextHorizontalAlignment::Left,
            vertical_alignment: TextVerticalAlignment::Top,
            word_wrapping: WordWrapping::Wrap,
            padding: Padding::default(),
            foreground_color: Color::BLACK,
            background_color: Color::TRANSPARENT,
        }
    }
}

impl TextLayoutOptions {
    /// Check that sizes are finite and non-negative and the font size is positive.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidLayout`] naming the offending field.
    pub fn validate(&self) -> CoreResult<()> {
        let lengths = [
            ("width", self.width),
            ("height", self.height),
            ("padding.left", self.padding.left),
            ("padding.top", self.padding.top),
            ("padding.right", self.padding.right),
            ("padding.bottom", self.padding.bottom),
        ];
        for (name, value) in lengths {
            if !value.is_finite() || value < 0.0 {
                return Err(CoreError::InvalidLayout(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(CoreError::InvalidLayout(format!(
                "font_size must be positive, got {}",
                self.font_size
            )));
        }
        if self.font_family.trim().is_empty() {
            return Err(CoreError::InvalidLayout(
                "font_family must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the layout box width is derived from the text.
    #[must_use]
    pub fn fits_width(&self) -> bool {
        self.width <= 0.0
    }

    /// Whether the layout box height is derived from the text.
    #[must_use]
    pub fn fits_height(&self) -> bool {
        self.height <= 0.0
    }
}
