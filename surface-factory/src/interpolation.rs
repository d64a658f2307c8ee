//! Maps abstract interpolation modes onto the rasterizer's sampling filters.

use surface_core::InterpolationMode;
use tiny_skia::FilterQuality;

/// The sampling filter used for a given interpolation mode.
#[must_use]
pub fn filter_quality(mode: InterpolationMode) -> FilterQuality {
    match mode {
        InterpolationMode::NearestNeighbor => FilterQuality::Nearest,
        InterpolationMode::Linear
        | InterpolationMode::MultiSampleLinear
        | InterpolationMode::Anisotropic => FilterQuality::Bilinear,
        InterpolationMode::Cubic | InterpolationMode::HighQualityCubic => FilterQuality::Bicubic,
    }
}
