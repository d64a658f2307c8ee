//! Device ownership, device-loss recovery and the drawing lock.
//!
//! A [`DeviceContext`] either creates its own GPU device and graphics device
//! from a [`Compositor`] (and then recovers from device loss by itself), or
//! adopts a graphics device someone else owns. In both cases every mutation
//! runs under the context's [`DrawingLock`].

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use surface_core::SurfaceFactoryOptions;
use tokio::runtime::Handle;

use crate::compositor::{CompositionGraphicsDevice, Compositor, RenderingDeviceReplacedEvent};
use crate::device::{DeviceId, GpuDevice};
use crate::error::{RenderError, RenderResult};
use crate::event::{EventHandlers, SubscriptionId};
use crate::lock::{DrawingLock, DrawingLockSession};
use crate::monitor::DeviceLostMonitor;
use crate::surface::{DrawingSurface, SurfaceDrawingSession};

/// Attempts at opening a drawing session while devices keep getting lost.
const SESSION_ATTEMPTS: usize = 3;

/// Whether the context is responsible for disposing a device.
#[derive(Debug, Clone)]
pub enum DeviceOwnership<T> {
    /// Created by the context; disposed on close.
    Owned(T),
    /// Supplied by the caller; never disposed by the context.
    Borrowed(T),
}

impl<T> DeviceOwnership<T> {
    /// The wrapped device.
    pub fn get(&self) -> &T {
        match self {
            Self::Owned(device) | Self::Borrowed(device) => device,
        }
    }

    /// Whether the context owns the device.
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }
}

/// Lifecycle of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextPhase {
    /// Usable.
    Active,
    /// Closed; every operation fails.
    Disposed,
}

struct Watch {
    monitor: DeviceLostMonitor,
    subscription: SubscriptionId,
}

struct ContextState {
    phase: ContextPhase,
    graphics: DeviceOwnership<CompositionGraphicsDevice>,
    // Only set when the context created the GPU device.
    gpu: Option<GpuDevice>,
    watch: Option<Watch>,
    replaced_subscription: Option<SubscriptionId>,
}

struct ContextInner {
    lock: DrawingLock,
    runtime: Handle,
    options: SurfaceFactoryOptions,
    state: Mutex<ContextState>,
    device_replaced: EventHandlers<RenderingDeviceReplacedEvent>,
}

/// Shared handle to a device context.
#[derive(Clone)]
pub struct DeviceContext {
    inner: Arc<ContextInner>,
}

impl DeviceContext {
    /// Create a GPU device and a graphics device on `compositor` and own
    /// both. Device loss is recovered automatically.
    #[must_use]
    pub fn from_compositor(
        compositor: &Compositor,
        options: SurfaceFactoryOptions,
        runtime: Handle,
    ) -> Self {
        let gpu = GpuDevice::create(options.use_software_renderer);
        let graphics = compositor.create_graphics_device(&gpu);

        let context = Self::assemble(
            DeviceOwnership::Owned(graphics),
            Some(gpu.clone()),
            DrawingLock::new(),
            options,
            runtime,
        );

        let monitor = DeviceLostMonitor::new();
        let weak = Arc::downgrade(&context.inner);
        let subscription = monitor.on_device_lost(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_device_lost(event.device_id);
            }
        });
        monitor.watch(&gpu);
        context.inner.state.lock().watch = Some(Watch {
            monitor,
            subscription,
        });

        tracing::info!(device_id = %gpu.id(), "Device context created");
        context
    }

    /// Adopt a graphics device owned elsewhere.
    ///
    /// Pass `lock` to serialize with other contexts drawing to the same
    /// graphics device; otherwise the context uses a private lock.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidState`] if the graphics device was
    /// already disposed.
    pub fn from_graphics_device(
        graphics: CompositionGraphicsDevice,
        lock: Option<DrawingLock>,
        runtime: Handle,
    ) -> RenderResult<Self> {
        graphics.ensure_not_disposed()?;
        let graphics_device_id = graphics.id();
        let context = Self::assemble(
            DeviceOwnership::Borrowed(graphics),
            None,
            lock.unwrap_or_default(),
            SurfaceFactoryOptions::default(),
            runtime,
        );
        tracing::info!(%graphics_device_id, "Device context adopted graphics device");
        Ok(context)
    }

    fn assemble(
        graphics: DeviceOwnership<CompositionGraphicsDevice>,
        gpu: Option<GpuDevice>,
        lock: DrawingLock,
        options: SurfaceFactoryOptions,
        runtime: Handle,
    ) -> Self {
        let device = graphics.get().clone();
        let inner = Arc::new(ContextInner {
            lock,
            runtime: runtime.clone(),
            options,
            state: Mutex::new(ContextState {
                phase: ContextPhase::Active,
                graphics,
                gpu,
                watch: None,
                replaced_subscription: None,
            }),
            device_replaced: EventHandlers::new(),
        });

        let weak: Weak<ContextInner> = Arc::downgrade(&inner);
        let subscription = device.on_rendering_device_replaced(move |event| {
            let event = *event;
            let weak = weak.clone();
            // Never re-raise on the thread that rebound the device.
            runtime.spawn(async move {
                if let Some(inner) = weak.upgrade() {
                    inner.device_replaced.raise(&event);
                }
            });
        });
        inner.state.lock().replaced_subscription = Some(subscription);

        Self { inner }
    }

    /// Acquire the drawing lock.
    #[must_use]
    pub fn lock(&self) -> DrawingLockSession<'_> {
        self.inner.lock.lock()
    }

    /// Handle to the drawing lock, for sharing with other contexts.
    #[must_use]
    pub fn drawing_lock(&self) -> &DrawingLock {
        &self.inner.lock
    }

    /// Runtime background draws and notifications are scheduled on.
    #[must_use]
    pub fn runtime(&self) -> &Handle {
        &self.inner.runtime
    }

    /// The graphics device surfaces are allocated from.
    #[must_use]
    pub fn graphics_device(&self) -> CompositionGraphicsDevice {
        self.inner.state.lock().graphics.get().clone()
    }

    /// Whether this context created (and owns) the graphics device.
    #[must_use]
    pub fn is_graphics_device_creator(&self) -> bool {
        self.inner.state.lock().graphics.is_owned()
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> ContextPhase {
        self.inner.state.lock().phase
    }

    /// Fail with [`RenderError::InvalidState`] once the context is closed.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidState`] after [`close`](Self::close).
    pub fn ensure_active(&self) -> RenderResult<()> {
        self.inner.ensure_active()
    }

    /// Make sure the bound GPU device can be drawn to, recovering it first
    /// if this context owns it and it was lost.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidState`] after close, or
    /// [`RenderError::DeviceLost`] when a borrowed device is lost.
    pub fn ensure_device(&self, session: &DrawingLockSession<'_>) -> RenderResult<()> {
        self.inner.ensure_device(session)
    }

    /// Open a drawing session on `surface` with a usable GPU device.
    ///
    /// A loss reported between the device check and the session opening is
    /// recovered in place when this context owns the device, so callers of
    /// an owned context never see [`RenderError::DeviceLost`].
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidState`] after close, or
    /// [`RenderError::DeviceLost`] when a borrowed device is lost.
    pub fn create_drawing_session<'a>(
        &self,
        surface: &'a DrawingSurface,
        session: &'a DrawingLockSession<'_>,
    ) -> RenderResult<SurfaceDrawingSession<'a>> {
        self.inner.create_drawing_session(surface, session)
    }

    /// Subscribe to device replacement. Handlers run on the runtime, never
    /// on the thread that performed the replacement.
    pub fn on_device_replaced<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&RenderingDeviceReplacedEvent) + Send + Sync + 'static,
    {
        self.inner.device_replaced.subscribe(handler)
    }

    /// Remove a device replacement subscription.
    pub fn remove_device_replaced_handler(&self, id: SubscriptionId) -> bool {
        self.inner.device_replaced.unsubscribe(id)
    }

    /// Release every subscription and dispose owned devices. Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }
}

impl std::fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("DeviceContext")
            .field("phase", &state.phase)
            .field("graphics_device", &state.graphics.get().id())
            .field("owned", &state.graphics.is_owned())
            .finish()
    }
}

impl ContextInner {
    fn ensure_active(&self) -> RenderResult<()> {
        match self.state.lock().phase {
            ContextPhase::Active => Ok(()),
            ContextPhase::Disposed => Err(RenderError::InvalidState(
                "device context has been closed".to_string(),
            )),
        }
    }

    fn ensure_device(&self, session: &DrawingLockSession<'_>) -> RenderResult<()> {
        let (graphics, owned) = {
            let state = self.state.lock();
            if state.phase == ContextPhase::Disposed {
                return Err(RenderError::InvalidState(
                    "device context has been closed".to_string(),
                ));
            }
            (state.graphics.get().clone(), state.graphics.is_owned())
        };

        let Some(device) = graphics.gpu_device() else {
            return Err(RenderError::InvalidState(format!(
                "graphics device {} has no GPU device",
                graphics.id()
            )));
        };
        if device.is_usable() {
            return Ok(());
        }
        if !owned {
            return Err(RenderError::DeviceLost(format!(
                "GPU device {} behind borrowed graphics device {} is lost",
                device.id(),
                graphics.id()
            )));
        }

        self.recover_locked(session, device.id());
        Ok(())
    }

    fn create_drawing_session<'a>(
        &self,
        surface: &'a DrawingSurface,
        session: &'a DrawingLockSession<'_>,
    ) -> RenderResult<SurfaceDrawingSession<'a>> {
        let mut attempt = 1;
        loop {
            self.ensure_device(session)?;
            match surface.create_drawing_session(session) {
                Err(RenderError::DeviceLost(reason))
                    if attempt < SESSION_ATTEMPTS && self.state.lock().graphics.is_owned() =>
                {
                    tracing::debug!(
                        surface_id = %surface.id(),
                        attempt,
                        "Device lost while opening a drawing session: {reason}"
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn handle_device_lost(&self, lost: DeviceId) {
        let session = self.lock.lock();
        self.recover_locked(&session, lost);
    }

    /// Replace the lost device. Returns `false` for stale or late events.
    fn recover_locked(&self, _session: &DrawingLockSession<'_>, lost: DeviceId) -> bool {
        let (graphics, monitor, previous, replacement) = {
            let mut state = self.state.lock();
            if state.phase == ContextPhase::Disposed {
                return false;
            }
            let bound = state.gpu.as_ref().map(GpuDevice::id);
            if bound != Some(lost) {
                tracing::debug!(device_id = %lost, "Ignoring loss of a device that is no longer bound");
                return false;
            }

            let replacement = GpuDevice::create(self.options.use_software_renderer);
            let previous = state.gpu.replace(replacement.clone());
            let monitor = state.watch.as_ref().map(|w| w.monitor.clone());
            (state.graphics.get().clone(), monitor, previous, replacement)
        };

        if let Some(monitor) = monitor {
            monitor.watch(&replacement);
        }
        graphics.set_gpu_device(&replacement);
        if let Some(previous) = previous {
            previous.dispose();
        }

        tracing::info!(
            lost_device_id = %lost,
            device_id = %replacement.id(),
            graphics_device_id = %graphics.id(),
            "Recovered from device loss"
        );
        true
    }

    fn close(&self) {
        let _session = self.lock.lock();
        let mut state = self.state.lock();
        if state.phase == ContextPhase::Disposed {
            return;
        }
        state.phase = ContextPhase::Disposed;

        if let Some(id) = state.replaced_subscription.take() {
            state.graphics.get().remove_rendering_device_replaced_handler(id);
        }
        if let Some(watch) = state.watch.take() {
            watch.monitor.remove_device_lost_handler(watch.subscription);
            watch.monitor.stop_watching();
        }
        if let DeviceOwnership::Owned(graphics) = &state.graphics {
            graphics.dispose();
        }
        if let Some(gpu) = state.gpu.take() {
            gpu.dispose();
        }
        self.device_replaced.clear();

        tracing::info!(
            graphics_device_id = %state.graphics.get().id(),
            owned = state.graphics.is_owned(),
            "Device context closed"
        );
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        self.close();
    }
}
