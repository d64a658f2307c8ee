//! Construction-time options for a surface factory.

use serde::{Deserialize, Serialize};

/// Immutable parameters fixed when a factory creates its own devices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SurfaceFactoryOptions {
    /// Force CPU rasterization instead of probing for a hardware adapter.
    pub use_software_renderer: bool,
}

impl SurfaceFactoryOptions {
    /// Options that force the software renderer.
    #[must_use]
    pub const fn software() -> Self {
        Self {
            use_software_renderer: true,
        }
    }
}
