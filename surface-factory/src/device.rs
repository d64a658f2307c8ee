//! The decode/draw device and its loss notification.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::backend::{self, AdapterSummary};
use crate::event::{EventHandlers, SubscriptionId};

/// Unique identifier for a GPU device instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(Uuid);

impl DeviceId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What actually rasterizes for a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceBackend {
    /// A hardware adapter was found; rasterization is still CPU side but
    /// the device is tied to the adapter's lifetime.
    Hardware(AdapterSummary),
    /// Pure CPU rasterization.
    Software,
}

/// Why a device stopped being usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceLostReason {
    /// The adapter was physically removed or disabled.
    Removed,
    /// The driver reset the device.
    Reset,
    /// The driver reported an internal error.
    DriverInternalError,
    /// The platform gave no reason.
    Unknown,
}

/// Notification raised once when a device is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLostEvent {
    /// The device that was lost.
    pub device_id: DeviceId,
    /// Reported cause.
    pub reason: DeviceLostReason,
}

struct DeviceInner {
    id: DeviceId,
    force_software_renderer: bool,
    backend: DeviceBackend,
    lost: AtomicBool,
    disposed: AtomicBool,
    lost_handlers: EventHandlers<DeviceLostEvent>,
}

/// Handle to one decode/draw device.
///
/// Clones refer to the same device. A lost device is never revived; the
/// owner replaces it with a new instance.
#[derive(Clone)]
pub struct GpuDevice {
    inner: Arc<DeviceInner>,
}

impl GpuDevice {
    /// Create a device.
    ///
    /// With `force_software_renderer` unset the device tries to bind a
    /// hardware adapter and falls back to software when none is available.
    #[must_use]
    pub fn create(force_software_renderer: bool) -> Self {
        let backend = if force_software_renderer {
            DeviceBackend::Software
        } else {
            match backend::probe_hardware_adapter() {
                Ok(adapter) => DeviceBackend::Hardware(adapter),
                Err(e) => {
                    tracing::warn!("Hardware adapter unavailable, falling back to software: {e}");
                    DeviceBackend::Software
                }
            }
        };

        let device = Self {
            inner: Arc::new(DeviceInner {
                id: DeviceId::new(),
                force_software_renderer,
                backend,
                lost: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                lost_handlers: EventHandlers::new(),
            }),
        };
        tracing::info!(
            device_id = %device.id(),
            software = force_software_renderer,
            "GPU device created with backend {:?}",
            device.inner.backend
        );
        device
    }

    /// Unique id of this instance.
    #[must_use]
    pub fn id(&self) -> DeviceId {
        self.inner.id
    }

    /// The software-rendering preference the device was created with.
    #[must_use]
    pub fn force_software_renderer(&self) -> bool {
        self.inner.force_software_renderer
    }

    /// The backend that was selected at creation.
    #[must_use]
    pub fn backend(&self) -> &DeviceBackend {
        &self.inner.backend
    }

    /// Whether the device has been lost.
    #[must_use]
    pub fn is_lost(&self) -> bool {
        self.inner.lost.load(Ordering::Acquire)
    }

    /// Whether the owner disposed the device.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Whether draws may target this device.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.is_lost() && !self.is_disposed()
    }

    /// Platform hook: mark the device lost and notify subscribers.
    ///
    /// Subscribers run on the calling thread. Only the first report for a
    /// device raises the notification; later reports return `false`.
    pub fn report_lost(&self, reason: DeviceLostReason) -> bool {
        if self.inner.lost.swap(true, Ordering::AcqRel) {
            return false;
        }
        tracing::warn!(device_id = %self.id(), ?reason, "GPU device lost");
        self.inner.lost_handlers.raise(&DeviceLostEvent {
            device_id: self.id(),
            reason,
        });
        true
    }

    /// Release the device. Idempotent.
    pub fn dispose(&self) {
        if !self.inner.disposed.swap(true, Ordering::AcqRel) {
            self.inner.lost_handlers.clear();
            tracing::debug!(device_id = %self.id(), "GPU device disposed");
        }
    }

    /// Subscribe to this device's loss notification.
    pub fn on_device_lost<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&DeviceLostEvent) + Send + Sync + 'static,
    {
        self.inner.lost_handlers.subscribe(handler)
    }

    /// Remove a loss subscription.
    pub fn remove_device_lost_handler(&self, id: SubscriptionId) -> bool {
        self.inner.lost_handlers.unsubscribe(id)
    }

    /// Whether `other` is a handle to the same device.
    #[must_use]
    pub fn same_device(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for GpuDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuDevice")
            .field("id", &self.inner.id)
            .field("backend", &self.inner.backend)
            .field("lost", &self.is_lost())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
