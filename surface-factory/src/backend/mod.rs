//! Hardware adapter discovery.
//!
//! Rasterization always happens on the CPU; a hardware adapter only decides
//! whether a device is reported as hardware-backed. Without the `gpu`
//! feature every probe fails and devices fall back to software.

#[cfg(feature = "gpu")]
pub mod wgpu;

use crate::RenderResult;

/// Identifying information about the adapter a device is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterSummary {
    /// Adapter name as reported by the driver.
    pub name: String,
    /// Graphics API backend (Vulkan, Metal, DX12, ...).
    pub backend: String,
    /// Whether the adapter is itself a software implementation.
    pub is_cpu: bool,
}

/// Look for a usable hardware adapter.
///
/// # Errors
///
/// Returns [`crate::RenderError::GpuInit`] if no adapter is available.
pub fn probe_hardware_adapter() -> RenderResult<AdapterSummary> {
    #[cfg(feature = "gpu")]
    {
        self::wgpu::probe_adapter()
    }
    #[cfg(not(feature = "gpu"))]
    {
        Err(crate::RenderError::GpuInit(
            "built without the `gpu` feature".to_string(),
        ))
    }
}
