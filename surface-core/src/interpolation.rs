//! Abstract interpolation modes used when a bitmap is scaled onto a surface.

use serde::{Deserialize, Serialize};

/// How source pixels are sampled when the destination size differs.
///
/// The renderer maps each mode onto the closest filter its rasterizer
/// supports, so several modes may sample identically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InterpolationMode {
    /// Pick the nearest source pixel.
    NearestNeighbor,
    /// Bilinear filtering.
    #[default]
    Linear,
    /// Bicubic filtering.
    Cubic,
    /// Linear filtering over multiple samples.
    MultiSampleLinear,
    /// Anisotropic filtering.
    Anisotropic,
    /// Bicubic filtering tuned for quality.
    HighQualityCubic,
}

impl InterpolationMode {
    /// All modes, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::NearestNeighbor,
        Self::Linear,
        Self::Cubic,
        Self::MultiSampleLinear,
        Self::Anisotropic,
        Self::HighQualityCubic,
    ];
}
