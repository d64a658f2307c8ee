//! Integration tests for surface creation and drawing (surface-factory).
//!
//! Covers placeholder surfaces, URI decode paths, raw pixel uploads and
//! managed surfaces.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{assert_color_close, data_uri, eventually, init_tracing, solid_png_uri};
use surface_factory::{
    Bitmap, Color, Compositor, InterpolationMode, ManagedSurface, RenderError, Size, SurfaceFactory,
    SurfaceFactoryOptions, TextLayoutOptions, Url,
};

fn software_factory() -> SurfaceFactory {
    init_tracing();
    SurfaceFactory::from_compositor(&Compositor::new(), SurfaceFactoryOptions::software())
        .expect("factory")
}

// ==========================================================================
// URI surfaces
// ==========================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_uri_surface_starts_empty_then_takes_natural_size() {
    let factory = software_factory();
    let uri = solid_png_uri(8, 6, [200, 30, 30, 255]);

    let surface = factory
        .create_surface_from_uri(uri, None, InterpolationMode::Linear)
        .unwrap();

    // Whatever the decode timing, the surface is either still the
    // placeholder or already the finished image.
    let size = surface.size();
    assert!(size == Size::ZERO || size == Size::new(8, 6));

    assert!(eventually(|| surface.size() == Size::new(8, 6)).await);
    assert_color_close(surface.pixel(4, 3), Color::rgb(200, 30, 30));
    assert_eq!(surface.pixel(0, 0).unwrap().a, 255);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_async_uri_surface_is_drawn_on_return() {
    let factory = software_factory();
    let uri = solid_png_uri(2, 2, [0, 0, 255, 255]);

    let surface = factory
        .create_surface_from_uri_async(uri, None, InterpolationMode::Cubic)
        .await
        .unwrap();

    assert_eq!(surface.size(), Size::new(2, 2));
    assert_color_close(surface.pixel(1, 1), Color::rgb(0, 0, 255));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_explicit_size_scales_the_image() {
    let factory = software_factory();
    let uri = solid_png_uri(2, 2, [0, 128, 0, 255]);

    let surface = factory
        .create_surface_from_uri_async(
            uri,
            Some(Size::new(10, 4)),
            InterpolationMode::NearestNeighbor,
        )
        .await
        .unwrap();

    assert_eq!(surface.size(), Size::new(10, 4));
    assert_eq!(surface.pixel(9, 3), Some(Color::rgb(0, 128, 0)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_decode_failure_propagates_to_awaiting_caller() {
    let factory = software_factory();
    let corrupt = data_uri(b"definitely not a png");

    let err = factory
        .create_surface_from_uri_async(corrupt, None, InterpolationMode::Linear)
        .await
        .unwrap_err();
    assert!(matches!(err, RenderError::Decode(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fire_and_forget_failure_keeps_placeholder() {
    let factory = software_factory();
    let corrupt = data_uri(b"definitely not a png");

    let surface = factory
        .create_surface_from_uri(corrupt, None, InterpolationMode::Linear)
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    assert_eq!(surface.size(), Size::ZERO);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unsupported_scheme_is_reported() {
    let factory = software_factory();
    let uri = Url::parse("gopher://example.com/image.png").unwrap();

    let err = factory
        .create_surface_from_uri_async(uri, None, InterpolationMode::Linear)
        .await
        .unwrap_err();
    assert!(matches!(err, RenderError::UnsupportedUri(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_draw_surface_without_uri_clears_to_one_pixel() {
    let factory = software_factory();
    let surface = factory
        .create_surface_from_uri_async(
            solid_png_uri(4, 4, [255, 255, 255, 255]),
            None,
            InterpolationMode::Linear,
        )
        .await
        .unwrap();

    factory
        .draw_surface(&surface, None, None, InterpolationMode::Linear)
        .await
        .unwrap();

    assert_eq!(surface.size(), Size::new(1, 1));
    assert_eq!(surface.pixel(0, 0), Some(Color::TRANSPARENT));
}

// ==========================================================================
// Raw pixels
// ==========================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_bytes_upscale_keeps_opaque_source_opaque() {
    let factory = software_factory();
    let mut pixels = Vec::with_capacity(4 * 4 * 4);
    for i in 0..16u8 {
        pixels.extend_from_slice(&[i * 16, 255 - i * 16, 64, 255]);
    }

    let surface = factory
        .create_surface_from_bytes(&pixels, 4, 4, Some(Size::new(8, 8)), InterpolationMode::Linear)
        .unwrap();

    assert_eq!(surface.size(), Size::new(8, 8));
    let rgba = surface.to_rgba8();
    assert_eq!(rgba.len(), 8 * 8 * 4);
    assert!(rgba.chunks_exact(4).all(|px| px[3] == 255));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_bytes_without_size_use_natural_size() {
    let factory = software_factory();
    let surface = factory
        .create_surface_from_bytes(&[9, 8, 7, 255, 1, 2, 3, 255], 2, 1, None, InterpolationMode::Linear)
        .unwrap();

    assert_eq!(surface.size(), Size::new(2, 1));
    assert_color_close(surface.pixel(0, 0), Color::rgb(9, 8, 7));
    assert_color_close(surface.pixel(1, 0), Color::rgb(1, 2, 3));
}

// ==========================================================================
// Managed surfaces
// ==========================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_managed_uri_redraw_is_bit_identical() {
    let factory = software_factory();
    let managed = factory
        .create_managed_surface_from_uri_async(
            Some(solid_png_uri(5, 5, [10, 20, 30, 128])),
            None,
            InterpolationMode::HighQualityCubic,
        )
        .await
        .unwrap();

    let first = managed.surface().to_rgba8();
    managed.redraw_async().await.unwrap();
    let second = managed.surface().to_rgba8();

    assert_eq!(first, second);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_managed_uri_setters_do_not_redraw() {
    let factory = software_factory();
    let managed = factory
        .create_managed_surface_from_uri_async(
            Some(solid_png_uri(3, 3, [255, 0, 0, 255])),
            None,
            InterpolationMode::Linear,
        )
        .await
        .unwrap();

    let blue = solid_png_uri(6, 2, [0, 0, 255, 255]);
    managed.set_source(Some(blue.clone()));
    managed.set_interpolation(InterpolationMode::NearestNeighbor);
    assert_eq!(managed.surface().size(), Size::new(3, 3));
    assert_eq!(managed.source(), Some(blue));

    managed.redraw_async().await.unwrap();
    assert_eq!(managed.surface().size(), Size::new(6, 2));
    assert_eq!(managed.surface().pixel(5, 1), Some(Color::rgb(0, 0, 255)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_managed_uri_resize_records_size_without_redraw() {
    let factory = software_factory();
    let managed = factory
        .create_managed_surface_from_uri_async(
            Some(solid_png_uri(2, 2, [0, 255, 0, 255])),
            None,
            InterpolationMode::Linear,
        )
        .await
        .unwrap();

    managed.resize(Size::new(4, 4)).unwrap();
    assert_eq!(managed.size(), Some(Size::new(4, 4)));
    assert_eq!(managed.surface().pixel(0, 0), Some(Color::TRANSPARENT));

    managed.redraw_async().await.unwrap();
    assert_eq!(managed.surface().size(), Size::new(4, 4));
    assert_color_close(managed.surface().pixel(3, 3), Color::rgb(0, 255, 0));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_managed_surface_without_source_is_placeholder() {
    let factory = software_factory();
    let managed = factory
        .create_managed_surface_from_uri_async(None, None, InterpolationMode::Linear)
        .await
        .unwrap();

    assert_eq!(managed.surface().size(), Size::new(1, 1));
    assert_eq!(managed.surface().pixel(0, 0), Some(Color::TRANSPARENT));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fire_and_forget_managed_surface_eventually_draws() {
    let factory = software_factory();
    let managed = factory
        .create_managed_surface_from_uri(
            Some(solid_png_uri(7, 3, [1, 2, 3, 255])),
            None,
            InterpolationMode::Linear,
        )
        .unwrap();

    assert!(eventually(|| managed.surface().size() == Size::new(7, 3)).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_managed_bytes_surface_redraws_new_pixels() {
    let factory = software_factory();
    let managed = factory
        .create_managed_surface_from_bytes(&[255, 0, 0, 255], 1, 1, None, InterpolationMode::Linear)
        .unwrap();
    assert_color_close(managed.surface().pixel(0, 0), Color::rgb(255, 0, 0));

    managed.set_bitmap(Bitmap::solid(2, 2, Color::WHITE).unwrap());
    assert_eq!(managed.surface().size(), Size::new(1, 1));

    managed.redraw_async().await.unwrap();
    assert_eq!(managed.surface().size(), Size::new(2, 2));
    assert_color_close(managed.surface().pixel(1, 1), Color::WHITE);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_managed_bytes_setters_do_not_wait_for_pending_redraw() {
    let factory = software_factory();
    let managed = Arc::new(
        factory
            .create_managed_surface_from_bytes(&[0, 0, 0, 255], 1, 1, None, InterpolationMode::Linear)
            .unwrap(),
    );

    let lock = factory.drawing_lock();
    let held = lock.lock();
    let pending = {
        let managed = Arc::clone(&managed);
        thread::spawn(move || managed.redraw_surface())
    };
    thread::sleep(Duration::from_millis(50));

    // The pending redraw is parked on the drawing lock; setters still go
    // through.
    managed.set_bitmap(Bitmap::solid(2, 2, Color::WHITE).unwrap());
    managed.set_interpolation(InterpolationMode::NearestNeighbor);
    drop(held);

    pending.join().unwrap().unwrap();
    managed.redraw_surface().unwrap();
    assert_eq!(managed.surface().size(), Size::new(2, 2));
    assert_eq!(managed.surface().pixel(1, 1), Some(Color::WHITE));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_explicit_size_draws_without_resizing() {
    let factory = software_factory();
    let surface = factory.create_surface(Some(Size::new(4, 4))).unwrap();
    let red = Bitmap::solid(1, 1, Color::rgb(255, 0, 0)).unwrap();

    factory
        .draw_bitmap(&surface, &red, Some(Size::new(2, 2)), InterpolationMode::NearestNeighbor)
        .unwrap();

    assert_eq!(surface.size(), Size::new(4, 4));
    assert_eq!(surface.pixel(1, 1), Some(Color::rgb(255, 0, 0)));
    assert_eq!(surface.pixel(3, 3), Some(Color::TRANSPARENT));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_explicit_size_sizes_an_empty_surface() {
    let factory = software_factory();
    let surface = factory.create_surface(None).unwrap();
    let red = Bitmap::solid(1, 1, Color::rgb(255, 0, 0)).unwrap();

    factory
        .draw_bitmap(&surface, &red, Some(Size::new(3, 2)), InterpolationMode::NearestNeighbor)
        .unwrap();

    assert_eq!(surface.size(), Size::new(3, 2));
    assert_eq!(surface.pixel(2, 1), Some(Color::rgb(255, 0, 0)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_text_surface_setters_wait_for_redraw() {
    let factory = software_factory();
    let options = TextLayoutOptions {
        width: 64.0,
        height: 24.0,
        background_color: Color::rgb(255, 255, 0),
        ..TextLayoutOptions::default()
    };

    let text = factory.create_text_surface("Hello", options).unwrap();
    assert_eq!(text.surface().size(), Size::new(64, 24));
    assert_eq!(text.surface().pixel(63, 0), Some(Color::rgb(255, 255, 0)));

    text.set_text("Hello, world");
    text.set_background_color(Color::rgb(0, 255, 255));
    text.set_width(32.0);
    assert_eq!(text.surface().size(), Size::new(64, 24));
    assert_eq!(text.surface().pixel(63, 0), Some(Color::rgb(255, 255, 0)));

    text.redraw_async().await.unwrap();
    assert_eq!(text.surface().size(), Size::new(32, 24));
    assert_eq!(text.surface().pixel(31, 0), Some(Color::rgb(0, 255, 255)));
    assert_eq!(text.text(), "Hello, world");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_text_surface_rejects_invalid_layout() {
    let factory = software_factory();
    let options = TextLayoutOptions {
        font_size: 0.0,
        ..TextLayoutOptions::default()
    };
    let err = factory.create_text_surface("x", options).unwrap_err();
    assert!(matches!(err, RenderError::Text(_)));
}
