//! Integration tests for device loss, ownership and teardown
//! (surface-factory).

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use common::{eventually, init_tracing, solid_png_uri, RecordingObserver};
use parking_lot::Mutex;
use surface_factory::{
    Bitmap, Color, Compositor, ContextPhase, DeviceLostReason, GpuDevice, InterpolationMode,
    ManagedSurface, RenderError, Size, SurfaceFactory, SurfaceFactoryOptions, SurfaceId,
    SurfaceObserver, SurfaceOperation, TextLayoutOptions,
};

fn software_factory_on(compositor: &Compositor) -> SurfaceFactory {
    init_tracing();
    SurfaceFactory::from_compositor(compositor, SurfaceFactoryOptions::software()).expect("factory")
}

fn lose_current_device(factory: &SurfaceFactory) -> GpuDevice {
    let device = factory
        .graphics_device()
        .gpu_device()
        .expect("bound device");
    assert!(device.report_lost(DeviceLostReason::Removed));
    device
}

fn text_options() -> TextLayoutOptions {
    TextLayoutOptions {
        width: 64.0,
        height: 24.0,
        ..TextLayoutOptions::default()
    }
}

/// Reports the loss of the armed device from another thread at the next
/// resize, and waits until the device is marked lost.
#[derive(Default)]
struct LoseOnResize {
    armed: Mutex<Option<GpuDevice>>,
}

impl SurfaceObserver for LoseOnResize {
    fn operation_started(&self, _surface: SurfaceId, operation: SurfaceOperation) {
        if operation != SurfaceOperation::Resize {
            return;
        }
        let Some(device) = self.armed.lock().take() else {
            return;
        };
        let reporter = device.clone();
        thread::spawn(move || {
            reporter.report_lost(DeviceLostReason::Reset);
        });
        while !device.is_lost() {
            thread::yield_now();
        }
    }

    fn operation_finished(&self, _surface: SurfaceId, _operation: SurfaceOperation) {}
}

// ==========================================================================
// Recovery
// ==========================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_loss_reported_during_draw_is_recovered_in_place() {
    let observer = Arc::new(LoseOnResize::default());
    let compositor = Compositor::with_observer(observer.clone());
    let factory = software_factory_on(&compositor);
    let surface = factory.create_surface(None).unwrap();
    let device = factory.graphics_device().gpu_device().unwrap();
    *observer.armed.lock() = Some(device.clone());

    let bitmap = Bitmap::solid(4, 4, Color::WHITE).unwrap();
    let result = factory.draw_bitmap(&surface, &bitmap, None, InterpolationMode::Linear);

    assert!(result.is_ok(), "{result:?}");
    assert!(observer.armed.lock().is_none());
    assert!(device.is_lost());
    let current = factory.graphics_device().gpu_device().unwrap();
    assert_ne!(current.id(), device.id());
    assert!(current.is_usable());
    assert_eq!(surface.size(), Size::new(4, 4));
    assert_eq!(surface.pixel(3, 3), Some(Color::WHITE));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_loss_reported_during_placeholder_clear_is_recovered_in_place() {
    let observer = Arc::new(LoseOnResize::default());
    let compositor = Compositor::with_observer(observer.clone());
    let factory = software_factory_on(&compositor);
    let surface = factory.create_surface(Some(Size::new(3, 3))).unwrap();
    *observer.armed.lock() = factory.graphics_device().gpu_device();

    factory
        .draw_surface(&surface, None, None, InterpolationMode::Linear)
        .await
        .unwrap();

    assert!(observer.armed.lock().is_none());
    assert_eq!(surface.size(), Size::new(1, 1));
    assert_eq!(surface.pixel(0, 0), Some(Color::TRANSPARENT));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_loss_keeps_graphics_device_and_surfaces() {
    let factory = software_factory_on(&Compositor::new());
    let graphics_id = factory.graphics_device().id();
    let surface = factory
        .create_surface_from_bytes(&[255, 0, 0, 255], 1, 1, None, InterpolationMode::Linear)
        .unwrap();

    let lost = lose_current_device(&factory);

    let graphics = factory.graphics_device();
    let current = graphics.gpu_device().unwrap();
    assert_eq!(graphics.id(), graphics_id);
    assert_ne!(current.id(), lost.id());
    assert!(current.is_usable());
    assert!(lost.is_disposed());
    assert!(surface.graphics_device().same_device(&graphics));

    let green = Bitmap::solid(2, 2, Color::rgb(0, 255, 0)).unwrap();
    factory
        .draw_bitmap(&surface, &green, None, InterpolationMode::NearestNeighbor)
        .unwrap();
    assert_eq!(surface.pixel(1, 1), Some(Color::rgb(0, 255, 0)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_repeated_losses_recover_each_time() {
    let factory = software_factory_on(&Compositor::new());
    let mut seen = Vec::new();

    for _ in 0..3 {
        seen.push(lose_current_device(&factory).id());
    }

    let current = factory.graphics_device().gpu_device().unwrap();
    assert!(current.is_usable());
    assert!(!seen.contains(&current.id()));
    assert_eq!(factory.context().phase(), ContextPhase::Active);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_device_replaced_is_raised_off_the_reporting_thread() {
    let factory = software_factory_on(&Compositor::new());
    let handler_thread = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&handler_thread);
    factory.on_device_replaced(move |_| {
        *sink.lock() = Some(thread::current().id());
    });

    let reporter = thread::current().id();
    lose_current_device(&factory);

    assert!(eventually(|| handler_thread.lock().is_some()).await);
    assert_ne!(*handler_thread.lock(), Some(reporter));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_removed_device_replaced_handler_is_not_called() {
    let factory = software_factory_on(&Compositor::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&calls);
    let id = factory.on_device_replaced(move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
    });
    assert!(factory.remove_device_replaced_handler(id));

    lose_current_device(&factory);
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_managed_surfaces_redraw_after_loss() {
    let observer = RecordingObserver::new();
    let compositor = Compositor::with_observer(observer.clone());
    let factory = software_factory_on(&compositor);

    let image = factory
        .create_managed_surface_from_uri_async(
            Some(solid_png_uri(3, 3, [9, 9, 9, 255])),
            None,
            InterpolationMode::Linear,
        )
        .await
        .unwrap();
    let pixels = factory
        .create_managed_surface_from_bytes(&[1, 2, 3, 255], 1, 1, None, InterpolationMode::Linear)
        .unwrap();
    let text = factory.create_text_surface("Hi", text_options()).unwrap();

    let image_draws = observer.draws_on(image.surface().id());
    let pixel_draws = observer.draws_on(pixels.surface().id());
    let text_draws = observer.draws_on(text.surface().id());

    lose_current_device(&factory);

    assert!(eventually(|| observer.draws_on(image.surface().id()) > image_draws).await);
    assert!(eventually(|| observer.draws_on(pixels.surface().id()) > pixel_draws).await);
    assert!(eventually(|| observer.draws_on(text.surface().id()) > text_draws).await);
    assert_eq!(text.surface().size(), Size::new(64, 24));
    assert_eq!(image.surface().size(), Size::new(3, 3));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dropped_managed_surface_is_not_redrawn() {
    let observer = RecordingObserver::new();
    let compositor = Compositor::with_observer(observer.clone());
    let factory = software_factory_on(&compositor);

    let kept = factory
        .create_managed_surface_from_bytes(&[1, 1, 1, 255], 1, 1, None, InterpolationMode::Linear)
        .unwrap();
    let dropped = factory
        .create_managed_surface_from_bytes(&[2, 2, 2, 255], 1, 1, None, InterpolationMode::Linear)
        .unwrap();
    let dropped_id = dropped.surface().id();
    let dropped_draws = observer.draws_on(dropped_id);
    let kept_draws = observer.draws_on(kept.surface().id());
    drop(dropped);

    lose_current_device(&factory);

    assert!(eventually(|| observer.draws_on(kept.surface().id()) > kept_draws).await);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(observer.draws_on(dropped_id), dropped_draws);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dropped_text_surface_is_not_redrawn() {
    let observer = RecordingObserver::new();
    let compositor = Compositor::with_observer(observer.clone());
    let factory = software_factory_on(&compositor);

    let kept = factory.create_text_surface("kept", text_options()).unwrap();
    let dropped = factory.create_text_surface("gone", text_options()).unwrap();
    let dropped_id = dropped.surface().id();
    let dropped_draws = observer.draws_on(dropped_id);
    let kept_draws = observer.draws_on(kept.surface().id());
    drop(dropped);

    lose_current_device(&factory);

    assert!(eventually(|| observer.draws_on(kept.surface().id()) > kept_draws).await);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(observer.draws_on(dropped_id), dropped_draws);
}

// ==========================================================================
// Ownership
// ==========================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_owned_devices_are_disposed_on_uninitialize() {
    let factory = software_factory_on(&Compositor::new());
    assert!(factory.is_graphics_device_creator());
    let graphics = factory.graphics_device();
    let gpu = graphics.gpu_device().unwrap();

    factory.uninitialize();

    assert!(graphics.is_disposed());
    assert!(gpu.is_disposed());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_owned_devices_are_disposed_when_last_handle_drops() {
    let factory = software_factory_on(&Compositor::new());
    let graphics = factory.graphics_device();
    let clone = factory.clone();

    drop(factory);
    assert!(!graphics.is_disposed());

    drop(clone);
    assert!(graphics.is_disposed());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_borrowed_graphics_device_survives_teardown() {
    init_tracing();
    let gpu = GpuDevice::create(true);
    let graphics = Compositor::new().create_graphics_device(&gpu);

    let factory = SurfaceFactory::from_graphics_device(graphics.clone(), None).unwrap();
    assert!(!factory.is_graphics_device_creator());
    let surface = factory.create_surface(Some(Size::new(2, 2))).unwrap();

    factory.uninitialize();
    drop(factory);

    assert!(!graphics.is_disposed());
    assert!(!gpu.is_disposed());
    assert_eq!(surface.size(), Size::new(2, 2));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_borrowed_device_loss_is_reported_to_the_caller() {
    init_tracing();
    let gpu = GpuDevice::create(true);
    let graphics = Compositor::new().create_graphics_device(&gpu);
    let factory = SurfaceFactory::from_graphics_device(graphics.clone(), None).unwrap();
    let surface = factory.create_surface(Some(Size::new(1, 1))).unwrap();

    gpu.report_lost(DeviceLostReason::DriverInternalError);

    let bitmap = Bitmap::solid(1, 1, Color::WHITE).unwrap();
    let err = factory
        .draw_bitmap(&surface, &bitmap, None, InterpolationMode::Linear)
        .unwrap_err();
    assert!(matches!(err, RenderError::DeviceLost(_)));

    // The owner recovers by rebinding; the factory then draws again.
    graphics.set_gpu_device(&GpuDevice::create(true));
    factory
        .draw_bitmap(&surface, &bitmap, None, InterpolationMode::Linear)
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_factories_sharing_a_graphics_device_share_its_lock() {
    init_tracing();
    let graphics = Compositor::new().create_graphics_device(&GpuDevice::create(true));
    let first = SurfaceFactory::from_graphics_device(graphics.clone(), None).unwrap();
    let second =
        SurfaceFactory::from_graphics_device(graphics, Some(first.drawing_lock())).unwrap();

    assert!(first.drawing_lock().same_lock(&second.drawing_lock()));
    let surface = first.create_surface(Some(Size::new(1, 1))).unwrap();
    second.resize_surface(&surface, Size::new(4, 4)).unwrap();
    assert_eq!(surface.size(), Size::new(4, 4));
}

// ==========================================================================
// Teardown
// ==========================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_operations_after_uninitialize_fail() {
    let factory = software_factory_on(&Compositor::new());
    let surface = factory.create_surface(Some(Size::new(1, 1))).unwrap();
    factory.uninitialize();
    factory.uninitialize();

    assert_eq!(factory.context().phase(), ContextPhase::Disposed);
    assert!(matches!(
        factory.create_surface(None),
        Err(RenderError::InvalidState(_))
    ));
    assert!(matches!(
        factory.resize_surface(&surface, Size::new(2, 2)),
        Err(RenderError::InvalidState(_))
    ));
    assert!(matches!(
        factory
            .create_surface_from_uri_async(
                solid_png_uri(1, 1, [0, 0, 0, 255]),
                None,
                InterpolationMode::Linear
            )
            .await,
        Err(RenderError::InvalidState(_))
    ));
    assert!(matches!(
        factory
            .draw_surface(&surface, None, None, InterpolationMode::Linear)
            .await,
        Err(RenderError::InvalidState(_))
    ));
}
