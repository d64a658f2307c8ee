use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use surface_core::{InterpolationMode, Size};
use url::Url;

use super::ManagedSurface;
use crate::error::RenderResult;
use crate::event::SubscriptionId;
use crate::factory::SurfaceFactory;
use crate::surface::DrawingSurface;

#[derive(Debug, Clone)]
struct UriRecipe {
    source: Option<Url>,
    size: Option<Size>,
    interpolation: InterpolationMode,
}

struct UriShared {
    factory: SurfaceFactory,
    surface: DrawingSurface,
    recipe: Mutex<UriRecipe>,
}

impl UriShared {
    async fn redraw(&self) -> RenderResult<()> {
        let recipe = self.recipe.lock().clone();
        self.factory
            .draw_surface(
                &self.surface,
                recipe.source.as_ref(),
                recipe.size,
                recipe.interpolation,
            )
            .await
    }

    fn spawn_redraw(self: &Arc<Self>) {
        let shared = Arc::clone(self);
        let _ = self.factory.context().runtime().spawn(async move {
            if let Err(e) = shared.redraw().await {
                tracing::warn!(surface_id = %shared.surface.id(), "Redraw failed: {e}");
            }
        });
    }
}

/// A surface drawn from an image URI.
///
/// With no source the surface is a 1×1 transparent placeholder.
pub struct UriSurface {
    shared: Arc<UriShared>,
    subscription: SubscriptionId,
}

impl UriSurface {
    pub(crate) fn new(
        factory: SurfaceFactory,
        source: Option<Url>,
        size: Option<Size>,
        interpolation: InterpolationMode,
    ) -> RenderResult<Self> {
        let surface = factory.create_surface(size)?;
        let shared = Arc::new(UriShared {
            factory,
            surface,
            recipe: Mutex::new(UriRecipe {
                source,
                size,
                interpolation,
            }),
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

    /// Current image source.
    #[must_use]
    pub fn source(&self) -> Option<Url> {
        self.shared.recipe.lock().source.clone()
    }

    /// Replace the image source. Does not redraw.
    pub fn set_source(&self, source: Option<Url>) {
        self.shared.recipe.lock().source = source;
    }

    /// Requested size (`None` = the image's natural size).
    #[must_use]
    pub fn size(&self) -> Option<Size> {
        self.shared.recipe.lock().size
    }

    /// Change the requested size. Does not resize or redraw.
    pub fn set_size(&self, size: Option<Size>) {
        self.shared.recipe.lock().size = size;
    }

    /// Current interpolation mode.
    #[must_use]
    pub fn interpolation(&self) -> InterpolationMode {
        self.shared.recipe.lock().interpolation
    }

    /// Change the interpolation mode. Does not redraw.
    pub fn set_interpolation(&self, interpolation: InterpolationMode) {
        self.shared.recipe.lock().interpolation = interpolation;
    }

    /// Resize the surface now and remember the size. Does not redraw.
    ///
    /// # Errors
    ///
    /// Fails if the factory was uninitialized.
    pub fn resize(&self, size: Size) -> RenderResult<()> {
        self.shared
            .factory
            .resize_surface(&self.shared.surface, size)?;
        self.set_size(Some(size));
        Ok(())
    }
}

#[async_trait]
impl ManagedSurface for UriSurface {
    fn surface(&self) -> &DrawingSurface {
        &self.shared.surface
    }

    async fn redraw_async(&self) -> RenderResult<()> {
        self.shared.redraw().await
    }

    fn redraw(&self) {
        self.shared.spawn_redraw();
    }
}

impl Drop for UriSurface {
    fn drop(&mut self) {
        self.shared
            .factory
            .remove_device_replaced_handler(self.subscription);
    }
}

impl std::fmt::Debug for UriSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UriSurface")
            .field("surface", &self.shared.surface)
            .field("recipe", &*self.shared.recipe.lock())
            .finish()
    }
}
