use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use surface_core::{
    Color, FontStyle, Padding, TextHorizontalAlignment, TextLayoutOptions, TextVerticalAlignment,
    WordWrapping,
};

use super::ManagedSurface;
use crate::error::{RenderError, RenderResult};
use crate::event::SubscriptionId;
use crate::factory::SurfaceFactory;
use crate::surface::DrawingSurface;

struct TextRecipe {
    text: String,
    options: TextLayoutOptions,
}

struct TextShared {
    factory: SurfaceFactory,
    surface: DrawingSurface,
    recipe: Mutex<TextRecipe>,
}

impl TextShared {
    fn redraw(&self) -> RenderResult<()> {
        let (text, options) = {
            let recipe = self.recipe.lock();
            (recipe.text.clone(), recipe.options.clone())
        };
        self.factory.draw_text(&self.surface, &text, &options)
    }

    fn spawn_redraw(self: &Arc<Self>) {
        let shared = Arc::clone(self);
        let _ = self
            .factory
            .context()
            .runtime()
            .spawn_blocking(move || {
                if let Err(e) = shared.redraw() {
                    tracing::warn!(surface_id = %shared.surface.id(), "Text redraw failed: {e}");
                }
            });
    }
}

/// A surface rendered from text and layout options.
///
/// The surface takes the size the layout produces.
pub struct TextSurface {
    shared: Arc<TextShared>,
    subscription: SubscriptionId,
}

impl TextSurface {
    pub(crate) fn new(
        factory: SurfaceFactory,
        text: String,
        options: TextLayoutOptions,
    ) -> RenderResult<Self> {
        let surface = factory.create_surface(None)?;
        let shared = Arc::new(TextShared {
            factory,
            surface,
            recipe: Mutex::new(TextRecipe { text, options }),
        });

        let weak = Arc::downgrade(&shared);
        let subscription = shared.factory.on_device_replaced(move |_| {
            if let Some(shared) = weak.upgrade() {
                shared.spawn_redraw();
            }
        });

        Ok(Self {
            shared,
            subscription,
        })
    }

    /// Lay out and draw the current recipe on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Text`] for invalid layout options.
    pub fn redraw_surface(&self) -> RenderResult<()> {
        self.shared.redraw()
    }

    /// Current text.
    #[must_use]
    pub fn text(&self) -> String {
        self.shared.recipe.lock().text.clone()
    }

    /// Replace the text. Does not redraw.
    pub fn set_text(&self, text: impl Into<String>) {
        self.shared.recipe.lock().text = text.into();
    }

    /// Current layout options.
    #[must_use]
    pub fn options(&self) -> TextLayoutOptions {
        self.shared.recipe.lock().options.clone()
    }

    /// Replace every layout option. Does not redraw.
    pub fn set_options(&self, options: TextLayoutOptions) {
        self.shared.recipe.lock().options = options;
    }

    /// Edit the layout options in place. Does not redraw.
    pub fn update_options(&self, update: impl FnOnce(&mut TextLayoutOptions)) {
        update(&mut self.shared.recipe.lock().options);
    }

    /// Layout box width (0 = fit text).
    pub fn set_width(&self, width: f32) {
        self.update_options(|o| o.width = width);
    }

    /// Layout box height (0 = fit text).
    pub fn set_height(&self, height: f32) {
        self.update_options(|o| o.height = height);
    }

    /// Font family name.
    pub fn set_font_family(&self, family: impl Into<String>) {
        let family = family.into();
        self.update_options(|o| o.font_family = family);
    }

    /// Font size in pixels.
    pub fn set_font_size(&self, size: f32) {
        self.update_options(|o| o.font_size = size);
    }

    /// Font slant.
    pub fn set_font_style(&self, style: FontStyle) {
        self.update_options(|o| o.font_style = style);
    }

    /// Horizontal line alignment.
    pub fn set_horizontal_alignment(&self, alignment: TextHorizontalAlignment) {
        self.update_options(|o| o.horizontal_alignment = alignment);
    }

    /// Vertical block alignment.
    pub fn set_vertical_alignment(&self, alignment: TextVerticalAlignment) {
        self.update_options(|o| o.vertical_alignment = alignment);
    }

    /// Line breaking policy.
    pub fn set_word_wrapping(&self, wrapping: WordWrapping) {
        self.update_options(|o| o.word_wrapping = wrapping);
    }

    /// Insets around the text.
    pub fn set_padding(&self, padding: Padding) {
        self.update_options(|o| o.padding = padding);
    }

    /// Glyph color.
    pub fn set_foreground_color(&self, color: Color) {
        self.update_options(|o| o.foreground_color = color);
    }

    /// Background fill.
    pub fn set_background_color(&self, color: Color) {
        self.update_options(|o| o.background_color = color);
    }
}

#[async_trait]
impl ManagedSurface for TextSurface {
    fn surface(&self) -> &DrawingSurface {
        &self.shared.surface
    }

    async fn redraw_async(&self) -> RenderResult<()> {
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || shared.redraw())
            .await
            .map_err(|e| RenderError::Text(format!("Text redraw task failed: {e}")))?
    }

    fn redraw(&self) {
        self.shared.spawn_redraw();
    }
}

impl Drop for TextSurface {
    fn drop(&mut self) {
        self.shared
            .factory
            .remove_device_replaced_handler(self.subscription);
    }
}

impl std::fmt::Debug for TextSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let recipe = self.shared.recipe.lock();
        f.debug_struct("TextSurface")
            .field("surface", &self.shared.surface)
            .field("text", &recipe.text)
            .field("options", &recipe.options)
            .finish()
    }
}
