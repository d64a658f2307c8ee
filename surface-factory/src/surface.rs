//! Drawing surfaces and the sessions that paint into them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockWriteGuard};
use surface_core::{Color, InterpolationMode, Size};
use tiny_skia::{BlendMode, Pixmap, PixmapPaint, Transform};

use crate::compositor::{CompositionGraphicsDevice, SurfaceObserver, SurfaceOperation};
use crate::device::GpuDevice;
use crate::error::{RenderError, RenderResult};
use crate::image::Bitmap;
use crate::interpolation::filter_quality;
use crate::lock::DrawingLockSession;

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u64);

impl SurfaceId {
    fn next() -> Self {
        Self(NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

struct SurfaceContent {
    size: Size,
    // `None` for a 0×0 surface.
    pixmap: Option<Pixmap>,
}

impl SurfaceContent {
    fn allocate(size: Size) -> RenderResult<Self> {
        let pixmap = if size.is_zero_area() {
            None
        } else {
            Some(Pixmap::new(size.width, size.height).ok_or_else(|| {
                RenderError::Resource(format!("Cannot allocate a {size} surface"))
            })?)
        };
        Ok(Self { size, pixmap })
    }
}

struct SurfaceInner {
    id: SurfaceId,
    graphics: CompositionGraphicsDevice,
    content: RwLock<SurfaceContent>,
}

/// A pixel buffer handed to the compositor.
///
/// Clones refer to the same surface. Mutation requires a
/// [`DrawingLockSession`]; reads do not.
#[derive(Clone)]
pub struct DrawingSurface {
    inner: Arc<SurfaceInner>,
}

impl DrawingSurface {
    pub(crate) fn allocate(graphics: CompositionGraphicsDevice, size: Size) -> RenderResult<Self> {
        let surface = Self {
            inner: Arc::new(SurfaceInner {
                id: SurfaceId::next(),
                graphics,
                content: RwLock::new(SurfaceContent::allocate(size)?),
            }),
        };
        tracing::debug!(surface_id = %surface.id(), %size, "Drawing surface allocated");
        Ok(surface)
    }

    /// Identifier of this surface.
    #[must_use]
    pub fn id(&self) -> SurfaceId {
        self.inner.id
    }

    /// Current pixel size.
    #[must_use]
    pub fn size(&self) -> Size {
        self.inner.content.read().size
    }

    /// The graphics device the surface was allocated from.
    #[must_use]
    pub fn graphics_device(&self) -> &CompositionGraphicsDevice {
        &self.inner.graphics
    }

    /// Straight-alpha color at a pixel, or `None` outside the surface.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        let content = self.inner.content.read();
        content.pixmap.as_ref()?.pixel(x, y).map(|p| {
            let c = p.demultiply();
            Color::rgba(c.red(), c.green(), c.blue(), c.alpha())
        })
    }

    /// Snapshot of the contents as straight-alpha RGBA bytes.
    #[must_use]
    pub fn to_rgba8(&self) -> Vec<u8> {
        let content = self.inner.content.read();
        let Some(pixmap) = content.pixmap.as_ref() else {
            return Vec::new();
        };
        let mut bytes = Vec::with_capacity(pixmap.data().len());
        for pixel in pixmap.pixels() {
            let c = pixel.demultiply();
            bytes.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        bytes
    }

    /// Whether `other` is a handle to the same surface.
    #[must_use]
    pub fn same_surface(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Reallocate the surface at `size`. Previous contents are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidState`] if the graphics device was
    /// disposed, or [`RenderError::Resource`] if the buffer cannot be
    /// allocated.
    pub fn resize(&self, _lock: &DrawingLockSession<'_>, size: Size) -> RenderResult<()> {
        self.inner.graphics.ensure_not_disposed()?;
        let _span = ObservedOperation::start(self, SurfaceOperation::Resize);

        let content = SurfaceContent::allocate(size)?;
        *self.inner.content.write() = content;
        tracing::debug!(surface_id = %self.id(), %size, "Surface resized");
        Ok(())
    }

    /// Open a drawing session on the surface.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidState`] if the graphics device was
    /// disposed, or [`RenderError::DeviceLost`] if its GPU device cannot be
    /// drawn to.
    pub fn create_drawing_session<'a>(
        &'a self,
        _lock: &'a DrawingLockSession<'_>,
    ) -> RenderResult<SurfaceDrawingSession<'a>> {
        self.inner.graphics.ensure_not_disposed()?;
        let device = self
            .inner
            .graphics
            .gpu_device()
            .filter(GpuDevice::is_usable)
            .ok_or_else(|| {
                RenderError::DeviceLost(format!(
                    "graphics device {} has no usable GPU device",
                    self.inner.graphics.id()
                ))
            })?;

        let observed = ObservedOperation::start(self, SurfaceOperation::Draw);
        Ok(SurfaceDrawingSession {
            content: self.inner.content.write(),
            device,
            _observed: observed,
        })
    }
}

impl std::fmt::Debug for DrawingSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawingSurface")
            .field("id", &self.inner.id)
            .field("size", &self.size())
            .finish()
    }
}

/// Reports start and finish of an operation to the compositor's observer.
struct ObservedOperation {
    observer: Option<Arc<dyn SurfaceObserver>>,
    surface: SurfaceId,
    operation: SurfaceOperation,
}

impl ObservedOperation {
    fn start(surface: &DrawingSurface, operation: SurfaceOperation) -> Self {
        let observer = surface.inner.graphics.observer().cloned();
        if let Some(observer) = &observer {
            observer.operation_started(surface.id(), operation);
        }
        Self {
            observer,
            surface: surface.id(),
            operation,
        }
    }
}

impl Drop for ObservedOperation {
    fn drop(&mut self) {
        if let Some(observer) = &self.observer {
            observer.operation_finished(self.surface, self.operation);
        }
    }
}

/// An open drawing session on one surface. Closes on drop.
pub struct SurfaceDrawingSession<'a> {
    content: RwLockWriteGuard<'a, SurfaceContent>,
    device: GpuDevice,
    // Declared last so the observer sees the finish after the write guard
    // is released.
    _observed: ObservedOperation,
}

impl SurfaceDrawingSession<'_> {
    /// The device this session draws with.
    #[must_use]
    pub fn device(&self) -> &GpuDevice {
        &self.device
    }

    /// Size of the target surface.
    #[must_use]
    pub fn size(&self) -> Size {
        self.content.size
    }

    /// Fill the whole surface with `color`, replacing what was there.
    pub fn clear(&mut self, color: Color) {
        if let Some(pixmap) = self.content.pixmap.as_mut() {
            pixmap.fill(tiny_skia::Color::from_rgba8(
                color.r, color.g, color.b, color.a,
            ));
        }
    }

    /// Blend `bitmap` over the surface, scaled to `dest` from the top-left
    /// corner.
    pub fn draw_image(
        &mut self,
        bitmap: &Bitmap,
        dest: Size,
        opacity: f32,
        interpolation: InterpolationMode,
    ) {
        let Some(pixmap) = self.content.pixmap.as_mut() else {
            return;
        };
        if dest.is_zero_area() {
            return;
        }

        let sx = dest.width as f32 / bitmap.width() as f32;
        let sy = dest.height as f32 / bitmap.height() as f32;
        let paint = PixmapPaint {
            opacity: opacity.clamp(0.0, 1.0),
            blend_mode: BlendMode::SourceOver,
            quality: filter_quality(interpolation),
        };

        pixmap.draw_pixmap(
            0,
            0,
            bitmap.pixmap().as_ref(),
            &paint,
            Transform::from_scale(sx, sy),
            None,
        );
    }
}

impl std::fmt::Debug for SurfaceDrawingSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceDrawingSession")
            .field("size", &self.content.size)
            .field("device", &self.device.id())
            .finish()
    }
}
