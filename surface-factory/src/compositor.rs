//! The compositor-facing side: the compositor handle and the graphics
//! devices surfaces are allocated from.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use surface_core::Size;
use uuid::Uuid;

use crate::device::{DeviceId, GpuDevice};
use crate::error::{RenderError, RenderResult};
use crate::event::{EventHandlers, SubscriptionId};
use crate::surface::{DrawingSurface, SurfaceId};

/// Kind of mutation performed on a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceOperation {
    /// The surface was reallocated at a new size.
    Resize,
    /// A drawing session was open on the surface.
    Draw,
}

/// Instrumentation hook receiving the start and end of every surface
/// mutation performed through a compositor's graphics devices.
pub trait SurfaceObserver: Send + Sync {
    /// A mutation is about to start.
    fn operation_started(&self, surface: SurfaceId, operation: SurfaceOperation);

    /// A mutation finished.
    fn operation_finished(&self, surface: SurfaceId, operation: SurfaceOperation);
}

struct CompositorInner {
    id: Uuid,
    observer: Option<Arc<dyn SurfaceObserver>>,
}

/// Handle to the composition runtime that consumes surfaces.
#[derive(Clone)]
pub struct Compositor {
    inner: Arc<CompositorInner>,
}

impl Compositor {
    /// Create a compositor handle.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CompositorInner {
                id: Uuid::new_v4(),
                observer: None,
            }),
        }
    }

    /// Create a compositor that reports every surface mutation to `observer`.
    #[must_use]
    pub fn with_observer(observer: Arc<dyn SurfaceObserver>) -> Self {
        Self {
            inner: Arc::new(CompositorInner {
                id: Uuid::new_v4(),
                observer: Some(observer),
            }),
        }
    }

    /// Create a graphics device bound to `device`.
    #[must_use]
    pub fn create_graphics_device(&self, device: &GpuDevice) -> CompositionGraphicsDevice {
        let graphics = CompositionGraphicsDevice {
            inner: Arc::new(GraphicsInner {
                id: GraphicsDeviceId(Uuid::new_v4()),
                compositor: self.clone(),
                gpu: RwLock::new(Some(device.clone())),
                replaced_handlers: EventHandlers::new(),
                disposed: AtomicBool::new(false),
            }),
        };
        tracing::info!(
            graphics_device_id = %graphics.id(),
            device_id = %device.id(),
            "Composition graphics device created"
        );
        graphics
    }

    pub(crate) fn observer(&self) -> Option<&Arc<dyn SurfaceObserver>> {
        self.inner.observer.as_ref()
    }

    /// Whether `other` is a handle to the same compositor.
    #[must_use]
    pub fn same_compositor(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("id", &self.inner.id)
            .field("observed", &self.inner.observer.is_some())
            .finish()
    }
}

/// Unique identifier for a graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphicsDeviceId(Uuid);

impl std::fmt::Display for GraphicsDeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raised when a graphics device is rebound to another GPU device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderingDeviceReplacedEvent {
    /// The graphics device that was rebound.
    pub graphics_device_id: GraphicsDeviceId,
    /// The device it was bound to before, if any.
    pub previous_device_id: Option<DeviceId>,
    /// The device it is bound to now.
    pub device_id: DeviceId,
}

struct GraphicsInner {
    id: GraphicsDeviceId,
    compositor: Compositor,
    gpu: RwLock<Option<GpuDevice>>,
    replaced_handlers: EventHandlers<RenderingDeviceReplacedEvent>,
    disposed: AtomicBool,
}

/// The device surfaces are allocated from.
///
/// Its identity is stable for its whole life; only the GPU device behind it
/// changes, so surfaces created from it stay valid across device loss.
#[derive(Clone)]
pub struct CompositionGraphicsDevice {
    inner: Arc<GraphicsInner>,
}

impl CompositionGraphicsDevice {
    /// Unique id of this graphics device.
    #[must_use]
    pub fn id(&self) -> GraphicsDeviceId {
        self.inner.id
    }

    /// The compositor this device belongs to.
    #[must_use]
    pub fn compositor(&self) -> &Compositor {
        &self.inner.compositor
    }

    /// The GPU device currently bound, if any.
    #[must_use]
    pub fn gpu_device(&self) -> Option<GpuDevice> {
        self.inner.gpu.read().clone()
    }

    /// Rebind to another GPU device and raise the replacement notification
    /// on the calling thread.
    pub fn set_gpu_device(&self, device: &GpuDevice) {
        let previous = self.inner.gpu.write().replace(device.clone());
        let event = RenderingDeviceReplacedEvent {
            graphics_device_id: self.id(),
            previous_device_id: previous.as_ref().map(GpuDevice::id),
            device_id: device.id(),
        };
        tracing::info!(
            graphics_device_id = %self.id(),
            device_id = %device.id(),
            "Rendering device replaced"
        );
        self.inner.replaced_handlers.raise(&event);
    }

    /// Allocate a surface of `size` (0×0 allowed).
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidState`] if the device was disposed.
    pub fn create_drawing_surface(&self, size: Size) -> RenderResult<DrawingSurface> {
        self.ensure_not_disposed()?;
        DrawingSurface::allocate(self.clone(), size)
    }

    /// Subscribe to rebinding notifications.
    pub fn on_rendering_device_replaced<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&RenderingDeviceReplacedEvent) + Send + Sync + 'static,
    {
        self.inner.replaced_handlers.subscribe(handler)
    }

    /// Remove a rebinding subscription.
    pub fn remove_rendering_device_replaced_handler(&self, id: SubscriptionId) -> bool {
        self.inner.replaced_handlers.unsubscribe(id)
    }

    /// Release the device. Idempotent. Surfaces allocated from it can no
    /// longer be resized or drawn.
    pub fn dispose(&self) {
        if !self.inner.disposed.swap(true, Ordering::AcqRel) {
            self.inner.replaced_handlers.clear();
            self.inner.gpu.write().take();
            tracing::debug!(graphics_device_id = %self.id(), "Graphics device disposed");
        }
    }

    /// Whether the device was disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Whether `other` is a handle to the same graphics device.
    #[must_use]
    pub fn same_device(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn ensure_not_disposed(&self) -> RenderResult<()> {
        if self.is_disposed() {
            return Err(RenderError::InvalidState(format!(
                "graphics device {} has been disposed",
                self.id()
            )));
        }
        Ok(())
    }

    pub(crate) fn observer(&self) -> Option<&Arc<dyn SurfaceObserver>> {
        self.inner.compositor.observer()
    }
}

impl std::fmt::Debug for CompositionGraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositionGraphicsDevice")
            .field("id", &self.inner.id)
            .field("gpu_device", &self.gpu_device().map(|d| d.id()))
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
