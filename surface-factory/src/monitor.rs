//! Watches a single device for loss.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::device::{DeviceLostEvent, GpuDevice};
use crate::event::{EventHandlers, SubscriptionId};

struct Watched {
    device: GpuDevice,
    subscription: SubscriptionId,
}

struct MonitorInner {
    watched: Mutex<Option<Watched>>,
    handlers: EventHandlers<DeviceLostEvent>,
}

/// Re-raises the loss notification of whichever device it currently watches.
///
/// The monitor never creates a replacement device; that is left to its
/// subscriber.
#[derive(Clone)]
pub struct DeviceLostMonitor {
    inner: Arc<MonitorInner>,
}

impl DeviceLostMonitor {
    /// Create a monitor that watches nothing.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                watched: Mutex::new(None),
                handlers: EventHandlers::new(),
            }),
        }
    }

    /// Start watching `device`, dropping any previous device first.
    pub fn watch(&self, device: &GpuDevice) {
        let weak: Weak<MonitorInner> = Arc::downgrade(&self.inner);
        let mut watched = self.inner.watched.lock();

        if let Some(previous) = watched.take() {
            previous
                .device
                .remove_device_lost_handler(previous.subscription);
        }

        let subscription = device.on_device_lost(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.handlers.raise(event);
            }
        });
        tracing::debug!(device_id = %device.id(), "Watching device for loss");

        *watched = Some(Watched {
            device: device.clone(),
            subscription,
        });
    }

    /// Stop watching. Idempotent.
    pub fn stop_watching(&self) {
        if let Some(previous) = self.inner.watched.lock().take() {
            previous
                .device
                .remove_device_lost_handler(previous.subscription);
            tracing::debug!(device_id = %previous.device.id(), "Stopped watching device");
        }
    }

    /// The device currently watched, if any.
    #[must_use]
    pub fn watched_device(&self) -> Option<GpuDevice> {
        self.inner
            .watched
            .lock()
            .as_ref()
            .map(|watched| watched.device.clone())
    }

    /// Subscribe to loss of the watched device.
    pub fn on_device_lost<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&DeviceLostEvent) + Send + Sync + 'static,
    {
        self.inner.handlers.subscribe(handler)
    }

    /// Remove a loss subscription.
    pub fn remove_device_lost_handler(&self, id: SubscriptionId) -> bool {
        self.inner.handlers.unsubscribe(id)
    }
}

impl Default for DeviceLostMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DeviceLostMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLostMonitor")
            .field("watched", &self.watched_device().map(|d| d.id()))
            .field("subscribers", &self.inner.handlers.len())
            .finish()
    }
}
