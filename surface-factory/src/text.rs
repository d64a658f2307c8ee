//! Text layout and rasterization.
//!
//! Lines are measured and wrapped against the layout box, emitted as SVG
//! `<text>` elements and rasterized with resvg. Fonts come from the system
//! font database, loaded once per process.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};

use surface_core::{
    Color, TextHorizontalAlignment, TextLayoutOptions, TextVerticalAlignment, WordWrapping,
};

use crate::error::{RenderError, RenderResult};
use crate::image::Bitmap;

/// Line height as a multiple of the font size.
const LINE_HEIGHT_FACTOR: f32 = 1.2;

/// Distance from the top of the em box to the baseline, as a multiple of
/// the font size.
const ASCENT_FACTOR: f32 = 0.8;

static FONT_DB: OnceLock<Arc<usvg::fontdb::Database>> = OnceLock::new();

fn font_database() -> Arc<usvg::fontdb::Database> {
    Arc::clone(FONT_DB.get_or_init(|| {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        tracing::debug!("Loaded {} system font faces", db.len());
        Arc::new(db)
    }))
}

/// One laid out line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Line {
    pub(crate) text: String,
    /// Last line of its paragraph (never stretched when justifying).
    pub(crate) ends_paragraph: bool,
}

impl Line {
    fn new(text: impl Into<String>, ends_paragraph: bool) -> Self {
        Self {
            text: text.into(),
            ends_paragraph,
        }
    }
}

/// Break `text` into lines no wider than `max_width`.
///
/// Explicit newlines always start a new line. `None` for `max_width`
/// disables wrapping.
pub(crate) fn wrap_lines<M>(
    text: &str,
    max_width: Option<f32>,
    wrapping: WordWrapping,
    measure: &mut M,
) -> RenderResult<Vec<Line>>
where
    M: FnMut(&str) -> RenderResult<f32>,
{
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let paragraph = paragraph.strip_suffix('\r').unwrap_or(paragraph);

        let wrapped = match (max_width, wrapping) {
            (None, _) | (_, WordWrapping::NoWrap) => vec![paragraph.to_string()],
            (Some(max), WordWrapping::Character) => split_characters(paragraph, max, measure)?,
            (Some(max), mode) => wrap_words(paragraph, max, mode, measure)?,
        };

        let count = wrapped.len();
        lines.extend(
            wrapped
                .into_iter()
                .enumerate()
                .map(|(i, line)| Line::new(line, i + 1 == count)),
        );
    }

    Ok(lines)
}

fn wrap_words<M>(
    paragraph: &str,
    max_width: f32,
    wrapping: WordWrapping,
    measure: &mut M,
) -> RenderResult<Vec<String>>
where
    M: FnMut(&str) -> RenderResult<f32>,
{
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in paragraph.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if measure(&candidate)? <= max_width {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }

        if wrapping == WordWrapping::WholeWord || measure(word)? <= max_width {
            current = word.to_string();
        } else {
            let mut pieces = split_characters(word, max_width, measure)?;
            current = pieces.pop().unwrap_or_default();
            lines.extend(pieces);
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    Ok(lines)
}

fn split_characters<M>(text: &str, max_width: f32, measure: &mut M) -> RenderResult<Vec<String>>
where
    M: FnMut(&str) -> RenderResult<f32>,
{
    let mut lines = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        let mut candidate = current.clone();
        candidate.push(ch);
        if current.is_empty() || measure(&candidate)? <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, ch.to_string()));
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    Ok(lines)
}

/// Measures rendered line widths, caching per string.
struct LineMeasurer<'a> {
    options: &'a TextLayoutOptions,
    svg_options: usvg::Options<'static>,
    cache: HashMap<String, f32>,
}

impl<'a> LineMeasurer<'a> {
    fn new(options: &'a TextLayoutOptions) -> Self {
        let svg_options = usvg::Options {
            fontdb: font_database(),
            ..usvg::Options::default()
        };
        Self {
            options,
            svg_options,
            cache: HashMap::new(),
        }
    }

    fn width(&mut self, line: &str) -> RenderResult<f32> {
        if line.trim().is_empty() {
            return Ok(0.0);
        }
        if let Some(width) = self.cache.get(line) {
            return Ok(*width);
        }

        let mut svg = String::from(r#"<svg xmlns="http://www.w3.org/2000/svg" width="1" height="1">"#);
        write_text_element(&mut svg, self.options, line, 0.0, 0.0, None);
        svg.push_str("</svg>");

        let tree = usvg::Tree::from_str(&svg, &self.svg_options)
            .map_err(|e| RenderError::Text(format!("Cannot measure text: {e}")))?;
        let root = tree.root();
        let width = if root.has_children() {
            root.abs_bounding_box().width()
        } else {
            0.0
        };

        self.cache.insert(line.to_string(), width);
        Ok(width)
    }
}

/// Lay out and rasterize `text` into a bitmap.
///
/// The bitmap takes the layout box size, or the size of the text plus
/// padding along any axis whose box length is zero.
///
/// # Errors
///
/// Returns [`RenderError::Text`] if the options are invalid or the text
/// cannot be rasterized.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn render_text(text: &str, options: &TextLayoutOptions) -> RenderResult<Bitmap> {
    options.validate()?;
    let padding = options.padding;

    let available_width = if options.fits_width() {
        None
    } else {
        Some((options.width - padding.horizontal()).max(0.0))
    };

    let mut measurer = LineMeasurer::new(options);
    let lines = wrap_lines(text, available_width, options.word_wrapping, &mut |line: &str| {
        measurer.width(line)
    })?;
    let widths = lines
        .iter()
        .map(|line| measurer.width(&line.text))
        .collect::<RenderResult<Vec<_>>>()?;

    let line_height = options.font_size * LINE_HEIGHT_FACTOR;
    let content_width = widths.iter().copied().fold(0.0_f32, f32::max);
    let content_height = line_height * lines.len() as f32;

    let width = if options.fits_width() {
        content_width + padding.horizontal()
    } else {
        options.width
    };
    let height = if options.fits_height() {
        content_height + padding.vertical()
    } else {
        options.height
    };
    let pixel_width = (width.ceil() as u32).max(1);
    let pixel_height = (height.ceil() as u32).max(1);

    let box_width = (width - padding.horizontal()).max(0.0);
    let box_height = (height - padding.vertical()).max(0.0);
    let top = match options.vertical_alignment {
        TextVerticalAlignment::Top => padding.top,
        TextVerticalAlignment::Center => padding.top + (box_height - content_height) / 2.0,
        TextVerticalAlignment::Bottom => padding.top + box_height - content_height,
    };

    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{pixel_width}" height="{pixel_height}" viewBox="0 0 {pixel_width} {pixel_height}">"#
    );
    if !options.background_color.is_transparent() {
        let _ = write!(
            svg,
            r#"<rect x="0" y="0" width="{pixel_width}" height="{pixel_height}" {}/>"#,
            fill_attributes(options.background_color)
        );
    }

    for (index, (line, line_width)) in lines.iter().zip(&widths).enumerate() {
        if line.text.trim().is_empty() {
            continue;
        }
        let x = match options.horizontal_alignment {
            TextHorizontalAlignment::Left | TextHorizontalAlignment::Justified => padding.left,
            TextHorizontalAlignment::Right => padding.left + box_width - line_width,
            TextHorizontalAlignment::Center => padding.left + (box_width - line_width) / 2.0,
        };
        let stretch = (options.horizontal_alignment == TextHorizontalAlignment::Justified
            && !line.ends_paragraph)
            .then_some(box_width);
        let baseline = top
            + line_height * index as f32
            + (line_height - options.font_size) / 2.0
            + options.font_size * ASCENT_FACTOR;

        write_text_element(&mut svg, options, &line.text, x, baseline, stretch);
    }
    svg.push_str("</svg>");

    let tree = usvg::Tree::from_str(&svg, &measurer.svg_options)
        .map_err(|e| RenderError::Text(format!("SVG parsing failed: {e}")))?;
    let mut pixmap = tiny_skia::Pixmap::new(pixel_width, pixel_height)
        .ok_or_else(|| RenderError::Text("Failed to create pixmap".to_string()))?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    tracing::debug!(
        lines = lines.len(),
        "Rendered text into {}x{}",
        pixel_width,
        pixel_height
    );
    Ok(Bitmap::from_pixmap(pixmap))
}

fn write_text_element(
    svg: &mut String,
    options: &TextLayoutOptions,
    text: &str,
    x: f32,
    baseline: f32,
    stretch_to: Option<f32>,
) {
    let _ = write!(
        svg,
        r#"<text x="{x:.2}" y="{baseline:.2}" font-family="{}" font-size="{:.2}" font-style="{}" xml:space="preserve" {}"#,
        escape_xml(&options.font_family),
        options.font_size,
        options.font_style.as_css(),
        fill_attributes(options.foreground_color),
    );
    if let Some(length) = stretch_to {
        let _ = write!(svg, r#" textLength="{length:.2}" lengthAdjust="spacing""#);
    }
    let _ = write!(svg, ">{}</text>", escape_xml(text));
}

fn fill_attributes(color: Color) -> String {
    format!(
        r#"fill="rgb({},{},{})" fill-opacity="{:.3}""#,
        color.r,
        color.g,
        color.b,
        color.alpha_f32()
    )
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
