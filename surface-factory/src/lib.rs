//! # Surface Factory
//!
//! Creates composition drawing surfaces and fills them from image URIs, raw
//! pixel buffers or text, asynchronously and without ever handing the
//! caller a surface that dies with its GPU device.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                  SurfaceFactory                   │
//! │  create / draw / resize   managed surfaces        │
//! ├────────────────────────┬─────────────────────────┤
//! │     DeviceContext      │      ImageLoader         │
//! │  drawing lock          │  data: / file: / http:   │
//! │  loss recovery         │  decode off the runtime  │
//! ├────────────────────────┴─────────────────────────┤
//! │  CompositionGraphicsDevice  ──►  GpuDevice        │
//! │  (stable identity)              (replaceable)     │
//! ├──────────────────────────────────────────────────┤
//! │  DrawingSurface  (tiny-skia pixel buffer)         │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! When the GPU device is lost, the context builds a replacement, rebinds
//! the graphics device to it and announces the replacement; managed
//! surfaces redraw themselves in response. Surface handles stay valid
//! throughout.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod compositor;
pub mod context;
pub mod device;
pub mod error;
pub mod event;
pub mod factory;
pub mod image;
pub mod interpolation;
pub mod loader;
pub mod lock;
pub mod managed;
pub mod monitor;
pub mod surface;
pub mod text;

pub use compositor::{
    CompositionGraphicsDevice, Compositor, GraphicsDeviceId, RenderingDeviceReplacedEvent,
    SurfaceObserver, SurfaceOperation,
};
pub use context::{ContextPhase, DeviceContext, DeviceOwnership};
pub use device::{DeviceBackend, DeviceId, DeviceLostEvent, DeviceLostReason, GpuDevice};
pub use error::{RenderError, RenderResult};
pub use event::{EventHandlers, SubscriptionId};
pub use factory::{SurfaceFactory, SurfaceFactoryBuilder};
pub use image::{decode_image, Bitmap, ImageFormat, PixelFormat};
pub use loader::{DefaultImageLoader, ImageLoader};
pub use lock::{DrawingLock, DrawingLockSession};
pub use managed::{BitmapSurface, ManagedSurface, TextSurface, UriSurface};
pub use monitor::DeviceLostMonitor;
pub use surface::{DrawingSurface, SurfaceDrawingSession, SurfaceId};
pub use text::render_text;

pub use surface_core::{
    Color, InterpolationMode, Padding, Size, SurfaceFactoryOptions, TextLayoutOptions,
};
pub use url::Url;
