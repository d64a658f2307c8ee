use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use surface_core::{InterpolationMode, Size};

use super::ManagedSurface;
use crate::error::RenderResult;
use crate::event::SubscriptionId;
use crate::factory::SurfaceFactory;
use crate::image::Bitmap;
use crate::surface::DrawingSurface;

struct BitmapRecipe {
    bitmap: Bitmap,
    size: Option<Size>,
    interpolation: InterpolationMode,
}

struct BitmapShared {
    factory: SurfaceFactory,
    surface: DrawingSurface,
    recipe: Mutex<BitmapRecipe>,
}

impl BitmapShared {
    fn redraw(&self) -> RenderResult<()> {
        let (bitmap, size, interpolation) = {
            let recipe = self.recipe.lock();
            (recipe.bitmap.clone(), recipe.size, recipe.interpolation)
        };
        self.factory
            .draw_bitmap(&self.surface, &bitmap, size, interpolation)
    }

    fn spawn_redraw(self: &Arc<Self>) {
        let shared = Arc::clone(self);
        let _ = self
            .factory
            .context()
            .runtime()
            .spawn_blocking(move || {
                if let Err(e) = shared.redraw() {
                    tracing::warn!(surface_id = %shared.surface.id(), "Bitmap redraw failed: {e}");
                }
            });
    }
}

/// A surface drawn from an in-memory pixel buffer.
pub struct BitmapSurface {
    shared: Arc<BitmapShared>,
    subscription: SubscriptionId,
}

impl BitmapSurface {
    pub(crate) fn new(
        factory: SurfaceFactory,
        bitmap: Bitmap,
        size: Option<Size>,
        interpolation: InterpolationMode,
    ) -> RenderResult<Self> {
        let surface = factory.create_surface(size)?;
        let shared = Arc::new(BitmapShared {
            factory,
            surface,
            recipe: Mutex::new(BitmapRecipe {
                bitmap,
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

    /// Draw the current recipe on the calling thread.
    ///
    /// # Errors
    ///
    /// Fails if the factory was uninitialized or a borrowed device is lost.
    pub fn redraw_surface(&self) -> RenderResult<()> {
        self.shared.redraw()
    }

    /// Replace the source pixels. Does not redraw.
    pub fn set_bitmap(&self, bitmap: Bitmap) {
        self.shared.recipe.lock().bitmap = bitmap;
    }

    /// Change the requested size. Does not redraw.
    pub fn set_size(&self, size: Option<Size>) {
        self.shared.recipe.lock().size = size;
    }

    /// Change the interpolation mode. Does not redraw.
    pub fn set_interpolation(&self, interpolation: InterpolationMode) {
        self.shared.recipe.lock().interpolation = interpolation;
    }
}

#[async_trait]
impl ManagedSurface for BitmapSurface {
    fn surface(&self) -> &DrawingSurface {
        &self.shared.surface
    }

    async fn redraw_async(&self) -> RenderResult<()> {
        self.shared.redraw()
    }

    fn redraw(&self) {
        self.shared.spawn_redraw();
    }
}

impl Drop for BitmapSurface {
    fn drop(&mut self) {
        self.shared
            .factory
            .remove_device_replaced_handler(self.subscription);
    }
}

impl std::fmt::Debug for BitmapSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitmapSurface")
            .field("surface", &self.shared.surface)
            .finish_non_exhaustive()
    }
}
