//! Surfaces that remember how to redraw themselves.
//!
//! A managed surface pairs a [`DrawingSurface`] with its recipe. Changing
//! the recipe never redraws; redrawing is always an explicit call, or
//! happens automatically after the factory's device is replaced. Dropping
//! a managed surface detaches it from the factory's notifications.

mod bitmap;
mod text;
mod uri;

use async_trait::async_trait;

pub use bitmap::BitmapSurface;
pub use text::TextSurface;
pub use uri::UriSurface;

use crate::error::RenderResult;
use crate::surface::DrawingSurface;

/// Common interface of every managed surface.
#[async_trait]
pub trait ManagedSurface: Send + Sync {
    /// The surface handed to the compositor.
    fn surface(&self) -> &DrawingSurface;

    /// Re-render from the current recipe and wait for completion.
    async fn redraw_async(&self) -> RenderResult<()>;

    /// Re-render from the current recipe in the background. Failures are
    /// logged.
    fn redraw(&self);
}
