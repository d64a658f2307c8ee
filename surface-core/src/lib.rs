//! # Surface Core
//!
//! Value types shared by every consumer of the surface factory.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                surface-core                 │
//! ├─────────────────────────────────────────────┤
//! │  Geometry        │  Drawing parameters      │
//! │  - Size          │  - InterpolationMode     │
//! │  - Padding       │  - Color                 │
//! ├─────────────────────────────────────────────┤
//! │  Text layout     │  Configuration           │
//! │  - Alignment     │  - SurfaceFactoryOptions │
//! │  - Word wrapping │                          │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Nothing in this crate touches a device; the engine lives in
//! `surface-factory`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod color;
pub mod error;
pub mod geometry;
pub mod interpolation;
pub mod options;
pub mod text;

pub use color::Color;
pub use error::{CoreError, CoreResult};
pub use geometry::{Padding, Size};
pub use interpolation::InterpolationMode;
pub use options::SurfaceFactoryOptions;
pub use text::{
    FontStyle, TextHorizontalAlignment, TextLayoutOptions, TextVerticalAlignment, WordWrapping,
};

/// Surface core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
