//! Shared helpers for the surface factory integration tests.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::Mutex;
use surface_factory::{Color, SurfaceId, SurfaceObserver, SurfaceOperation, Url};

/// Install a test-friendly fmt subscriber once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Encode a solid-color PNG.
pub fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode png");
    bytes
}

/// Wrap encoded image bytes in a base64 data URI.
pub fn data_uri(bytes: &[u8]) -> Url {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Url::parse(&format!("data:image/png;base64,{encoded}")).expect("data uri")
}

/// A solid-color PNG as a data URI.
pub fn solid_png_uri(width: u32, height: u32, rgba: [u8; 4]) -> Url {
    data_uri(&solid_png(width, height, rgba))
}

/// Poll `condition` every 10ms for up to two seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// One observer callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// `operation_started`
    Started,
    /// `operation_finished`
    Finished,
}

/// A recorded observer callback.
#[derive(Debug, Clone, Copy)]
pub struct Record {
    pub surface: SurfaceId,
    pub operation: SurfaceOperation,
    pub phase: Phase,
    pub at: Instant,
}

/// Observer that records every callback in order.
#[derive(Default)]
pub struct RecordingObserver {
    records: Mutex<Vec<Record>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    /// Completed drawing sessions on `surface`.
    pub fn draws_on(&self, surface: SurfaceId) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| {
                r.surface == surface
                    && r.operation == SurfaceOperation::Draw
                    && r.phase == Phase::Finished
            })
            .count()
    }

    fn push(&self, surface: SurfaceId, operation: SurfaceOperation, phase: Phase) {
        self.records.lock().push(Record {
            surface,
            operation,
            phase,
            at: Instant::now(),
        });
    }
}

impl SurfaceObserver for RecordingObserver {
    fn operation_started(&self, surface: SurfaceId, operation: SurfaceOperation) {
        self.push(surface, operation, Phase::Started);
    }

    fn operation_finished(&self, surface: SurfaceId, operation: SurfaceOperation) {
        self.push(surface, operation, Phase::Finished);
    }
}

/// Assert a pixel matches `expected` within filtering rounding error.
#[track_caller]
pub fn assert_color_close(actual: Option<Color>, expected: Color) {
    let actual = actual.expect("pixel inside the surface");
    let channels = [
        (actual.r, expected.r),
        (actual.g, expected.g),
        (actual.b, expected.b),
        (actual.a, expected.a),
    ];
    assert!(
        channels.iter().all(|(a, e)| a.abs_diff(*e) <= 2),
        "expected {expected:?}, got {actual:?}"
    );
}
