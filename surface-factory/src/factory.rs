//! The surface factory: allocation, decode-and-draw, resize and raw pixel
//! uploads, all serialized by the context's drawing lock.

use std::sync::Arc;

use surface_core::{Color, InterpolationMode, Size, SurfaceFactoryOptions, TextLayoutOptions};
use tokio::runtime::Handle;
use url::Url;

use crate::compositor::{CompositionGraphicsDevice, Compositor, RenderingDeviceReplacedEvent};
use crate::context::DeviceContext;
use crate::error::{RenderError, RenderResult};
use crate::event::SubscriptionId;
use crate::image::{Bitmap, PixelFormat};
use crate::loader::{DefaultImageLoader, ImageLoader};
use crate::lock::{DrawingLock, DrawingLockSession};
use crate::managed::{BitmapSurface, ManagedSurface, TextSurface, UriSurface};
use crate::surface::DrawingSurface;
use crate::text::render_text;

/// Configures and builds a [`SurfaceFactory`].
#[derive(Default)]
pub struct SurfaceFactoryBuilder {
    options: SurfaceFactoryOptions,
    loader: Option<Arc<dyn ImageLoader>>,
    runtime: Option<Handle>,
    lock: Option<DrawingLock>,
}

impl SurfaceFactoryBuilder {
    /// Start from default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Device options used when the factory creates its own devices.
    #[must_use]
    pub fn options(mut self, options: SurfaceFactoryOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the default image loader.
    #[must_use]
    pub fn image_loader(mut self, loader: Arc<dyn ImageLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Runtime for background draws. Defaults to the current runtime.
    #[must_use]
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Share a drawing lock with other factories adopting the same
    /// graphics device. Ignored by [`build_from_compositor`](Self::build_from_compositor).
    #[must_use]
    pub fn drawing_lock(mut self, lock: DrawingLock) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Build a factory that creates and owns its devices.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::NoRuntime`] when no runtime was given and the
    /// caller is not inside one.
    pub fn build_from_compositor(self, compositor: &Compositor) -> RenderResult<SurfaceFactory> {
        let runtime = resolve_runtime(self.runtime)?;
        let context = DeviceContext::from_compositor(compositor, self.options, runtime);
        Ok(SurfaceFactory::assemble(context, self.loader))
    }

    /// Build a factory that draws to a graphics device owned elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::NoRuntime`] when no runtime is available, or
    /// [`RenderError::InvalidState`] if the graphics device is disposed.
    pub fn build_from_graphics_device(
        self,
        graphics: CompositionGraphicsDevice,
    ) -> RenderResult<SurfaceFactory> {
        let runtime = resolve_runtime(self.runtime)?;
        let context = DeviceContext::from_graphics_device(graphics, self.lock, runtime)?;
        Ok(SurfaceFactory::assemble(context, self.loader))
    }
}

fn resolve_runtime(runtime: Option<Handle>) -> RenderResult<Handle> {
    match runtime {
        Some(handle) => Ok(handle),
        None => Handle::try_current().map_err(|e| RenderError::NoRuntime(e.to_string())),
    }
}

struct FactoryInner {
    context: DeviceContext,
    loader: Arc<dyn ImageLoader>,
}

impl Drop for FactoryInner {
    fn drop(&mut self) {
        self.context.close();
    }
}

/// Creates drawing surfaces and fills them from images, raw pixels or
/// text.
///
/// Clones share one device context. The context closes when the last clone
/// (and the last managed surface created from it) is dropped.
#[derive(Clone)]
pub struct SurfaceFactory {
    inner: Arc<FactoryInner>,
}

impl SurfaceFactory {
    /// Start configuring a factory.
    #[must_use]
    pub fn builder() -> SurfaceFactoryBuilder {
        SurfaceFactoryBuilder::new()
    }

    /// Create a factory owning fresh devices on `compositor`, using the
    /// current runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::NoRuntime`] outside a tokio runtime.
    pub fn from_compositor(
        compositor: &Compositor,
        options: SurfaceFactoryOptions,
    ) -> RenderResult<Self> {
        SurfaceFactoryBuilder::new()
            .options(options)
            .build_from_compositor(compositor)
    }

    /// Create a factory drawing to a graphics device owned elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::NoRuntime`] outside a tokio runtime, or
    /// [`RenderError::InvalidState`] if the graphics device is disposed.
    pub fn from_graphics_device(
        graphics: CompositionGraphicsDevice,
        lock: Option<DrawingLock>,
    ) -> RenderResult<Self> {
        let mut builder = SurfaceFactoryBuilder::new();
        builder.lock = lock;
        builder.build_from_graphics_device(graphics)
    }

    fn assemble(context: DeviceContext, loader: Option<Arc<dyn ImageLoader>>) -> Self {
        let loader = loader.unwrap_or_else(|| Arc::new(DefaultImageLoader::new()));
        Self {
            inner: Arc::new(FactoryInner { context, loader }),
        }
    }

    /// The device context behind this factory.
    #[must_use]
    pub fn context(&self) -> &DeviceContext {
        &self.inner.context
    }

    /// The graphics device surfaces are allocated from.
    #[must_use]
    pub fn graphics_device(&self) -> CompositionGraphicsDevice {
        self.inner.context.graphics_device()
    }

    /// Handle to the drawing lock, for sharing with other factories.
    #[must_use]
    pub fn drawing_lock(&self) -> DrawingLock {
        self.inner.context.drawing_lock().clone()
    }

    /// Whether this factory created (and owns) its graphics device.
    #[must_use]
    pub fn is_graphics_device_creator(&self) -> bool {
        self.inner.context.is_graphics_device_creator()
    }

    /// Allocate a surface immediately. `None` gives a 0×0 placeholder.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidState`] after [`uninitialize`](Self::uninitialize).
    pub fn create_surface(&self, size: Option<Size>) -> RenderResult<DrawingSurface> {
        let context = &self.inner.context;
        let _session = context.lock();
        context.ensure_active()?;
        context
            .graphics_device()
            .create_drawing_surface(size.unwrap_or(Size::ZERO))
    }

    /// Allocate a surface and draw `uri` into it in the background.
    ///
    /// Returns before the image is decoded. A failed decode is logged and
    /// leaves the surface as it was; use
    /// [`create_surface_from_uri_async`](Self::create_surface_from_uri_async)
    /// to observe failures.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidState`] after [`uninitialize`](Self::uninitialize).
    pub fn create_surface_from_uri(
        &self,
        uri: Url,
        size: Option<Size>,
        interpolation: InterpolationMode,
    ) -> RenderResult<DrawingSurface> {
        let surface = self.create_surface(size)?;
        let factory = self.clone();
        let target = surface.clone();
        let _ = self.inner.context.runtime().spawn(async move {
            if let Err(e) = factory
                .draw_surface(&target, Some(&uri), size, interpolation)
                .await
            {
                tracing::warn!(surface_id = %target.id(), %uri, "Background draw failed: {e}");
            }
        });
        Ok(surface)
    }

    /// Allocate a surface and draw `uri` into it, returning once drawn.
    ///
    /// # Errors
    ///
    /// Returns the loader's error if the image cannot be fetched or
    /// decoded, or [`RenderError::InvalidState`] after teardown.
    pub async fn create_surface_from_uri_async(
        &self,
        uri: Url,
        size: Option<Size>,
        interpolation: InterpolationMode,
    ) -> RenderResult<DrawingSurface> {
        let surface = self.create_surface(size)?;
        self.draw_surface(&surface, Some(&uri), size, interpolation)
            .await?;
        Ok(surface)
    }

    /// Decode `uri` and draw it into `surface`.
    ///
    /// `None` resets the surface to a 1×1 transparent placeholder.
    ///
    /// # Errors
    ///
    /// Returns the loader's error if the image cannot be fetched or
    /// decoded, or [`RenderError::InvalidState`] after teardown.
    pub async fn draw_surface(
        &self,
        surface: &DrawingSurface,
        uri: Option<&Url>,
        size: Option<Size>,
        interpolation: InterpolationMode,
    ) -> RenderResult<()> {
        let Some(uri) = uri else {
            return self.clear_to_placeholder(surface);
        };

        self.inner.context.ensure_active()?;
        let bitmap = self.inner.loader.load(uri).await?;
        self.draw_bitmap(surface, &bitmap, size, interpolation)
    }

    fn clear_to_placeholder(&self, surface: &DrawingSurface) -> RenderResult<()> {
        let session = self.prepare(surface)?;
        surface.resize(&session, Size::new(1, 1))?;
        self.inner
            .context
            .create_drawing_session(surface, &session)?
            .clear(Color::TRANSPARENT);
        Ok(())
    }

    /// Draw `bitmap` into `surface` under a single lock acquisition.
    ///
    /// Without `size` the surface is first resized to the bitmap's natural
    /// size. With `size` the caller is expected to have sized the surface
    /// already; only a still empty surface is resized to it. The surface is
    /// cleared to transparent, then the whole bitmap is scaled onto the
    /// `size` rect (the whole surface when `size` is `None`) at full
    /// opacity.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidState`] after teardown or for a surface
    /// from another graphics device, or [`RenderError::DeviceLost`] when a
    /// borrowed device is lost.
    pub fn draw_bitmap(
        &self,
        surface: &DrawingSurface,
        bitmap: &Bitmap,
        size: Option<Size>,
        interpolation: InterpolationMode,
    ) -> RenderResult<()> {
        let session = self.prepare(surface)?;

        let target = size.unwrap_or_else(|| bitmap.size());
        let current = surface.size();
        if current != target && (size.is_none() || current.is_zero_area()) {
            surface.resize(&session, target)?;
        }

        let mut draw = self.inner.context.create_drawing_session(surface, &session)?;
        draw.clear(Color::TRANSPARENT);
        draw.draw_image(bitmap, target, 1.0, interpolation);
        drop(draw);

        tracing::debug!(
            surface_id = %surface.id(),
            size = %target,
            ?interpolation,
            "Bitmap drawn"
        );
        Ok(())
    }

    /// Resize `surface` without redrawing it.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidState`] after teardown or for a surface
    /// from another graphics device.
    pub fn resize_surface(&self, surface: &DrawingSurface, size: Size) -> RenderResult<()> {
        let context = &self.inner.context;
        let session = context.lock();
        context.ensure_active()?;
        self.check_surface(surface)?;
        surface.resize(&session, size)
    }

    /// Create a surface from tightly packed straight-alpha RGBA bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidPixelData`] if `bytes` does not hold
    /// `width * height` pixels.
    pub fn create_surface_from_bytes(
        &self,
        bytes: &[u8],
        width: u32,
        height: u32,
        size: Option<Size>,
        interpolation: InterpolationMode,
    ) -> RenderResult<DrawingSurface> {
        self.create_surface_from_pixels(
            bytes,
            width,
            height,
            PixelFormat::Rgba8,
            size,
            interpolation,
        )
    }

    /// Create a surface from a raw pixel buffer in `format`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidPixelData`] if `bytes` does not hold
    /// `width * height` pixels.
    pub fn create_surface_from_pixels(
        &self,
        bytes: &[u8],
        width: u32,
        height: u32,
        format: PixelFormat,
        size: Option<Size>,
        interpolation: InterpolationMode,
    ) -> RenderResult<DrawingSurface> {
        let bitmap = Bitmap::from_pixels(bytes, width, height, format)?;

        let _session = self.inner.context.lock();
        let surface = self.create_surface(size)?;
        self.draw_bitmap(&surface, &bitmap, size, interpolation)?;
        Ok(surface)
    }

    /// Lay out `text` and draw it into `surface`, resizing the surface to
    /// the rendered size.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Text`] for invalid layout options.
    pub fn draw_text(
        &self,
        surface: &DrawingSurface,
        text: &str,
        options: &TextLayoutOptions,
    ) -> RenderResult<()> {
        self.inner.context.ensure_active()?;
        let bitmap = render_text(text, options)?;
        self.draw_bitmap(surface, &bitmap, None, InterpolationMode::NearestNeighbor)
    }

    /// Create a managed image surface and start its first draw in the
    /// background.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidState`] after teardown.
    pub fn create_managed_surface_from_uri(
        &self,
        uri: Option<Url>,
        size: Option<Size>,
        interpolation: InterpolationMode,
    ) -> RenderResult<UriSurface> {
        let managed = UriSurface::new(self.clone(), uri, size, interpolation)?;
        managed.redraw();
        Ok(managed)
    }

    /// Create a managed image surface and wait for its first draw.
    ///
    /// # Errors
    ///
    /// Returns the loader's error if the first draw fails.
    pub async fn create_managed_surface_from_uri_async(
        &self,
        uri: Option<Url>,
        size: Option<Size>,
        interpolation: InterpolationMode,
    ) -> RenderResult<UriSurface> {
        let managed = UriSurface::new(self.clone(), uri, size, interpolation)?;
        managed.redraw_async().await?;
        Ok(managed)
    }

    /// Create a managed surface from raw RGBA pixels and draw it.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidPixelData`] for a malformed buffer.
    pub fn create_managed_surface_from_bytes(
        &self,
        bytes: &[u8],
        width: u32,
        height: u32,
        size: Option<Size>,
        interpolation: InterpolationMode,
    ) -> RenderResult<BitmapSurface> {
        let bitmap = Bitmap::from_pixels(bytes, width, height, PixelFormat::Rgba8)?;
        let managed = BitmapSurface::new(self.clone(), bitmap, size, interpolation)?;
        managed.redraw_surface()?;
        Ok(managed)
    }

    /// Create a managed text surface and draw it.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Text`] for invalid layout options.
    pub fn create_text_surface(
        &self,
        text: impl Into<String>,
        options: TextLayoutOptions,
    ) -> RenderResult<TextSurface> {
        let managed = TextSurface::new(self.clone(), text.into(), options)?;
        managed.redraw_surface()?;
        Ok(managed)
    }

    /// Subscribe to device replacement. Handlers run on the runtime.
    pub fn on_device_replaced<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&RenderingDeviceReplacedEvent) + Send + Sync + 'static,
    {
        self.inner.context.on_device_replaced(handler)
    }

    /// Remove a device replacement subscription.
    pub fn remove_device_replaced_handler(&self, id: SubscriptionId) -> bool {
        self.inner.context.remove_device_replaced_handler(id)
    }

    /// Tear down the device context. Idempotent. Every later operation
    /// fails with [`RenderError::InvalidState`].
    pub fn uninitialize(&self) {
        self.inner.context.close();
    }

    /// Lock, check the context, and make sure the device can be drawn to.
    fn prepare(&self, surface: &DrawingSurface) -> RenderResult<DrawingLockSession<'_>> {
        let context = &self.inner.context;
        let session = context.lock();
        context.ensure_device(&session)?;
        self.check_surface(surface)?;
        Ok(session)
    }

    fn check_surface(&self, surface: &DrawingSurface) -> RenderResult<()> {
        if surface
            .graphics_device()
            .same_device(&self.inner.context.graphics_device())
        {
            Ok(())
        } else {
            Err(RenderError::InvalidState(format!(
                "{} belongs to another graphics device",
                surface.id()
            )))
        }
    }
}

impl std::fmt::Debug for SurfaceFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceFactory")
            .field("context", &self.inner.context)
            .finish_non_exhaustive()
    }
}
