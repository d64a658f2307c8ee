//! wgpu adapter probing.
//!
//! A device is only considered hardware-backed if wgpu can hand out both an
//! adapter and a device for it.

use crate::{RenderError, RenderResult};

use super::AdapterSummary;

/// Request a high-performance adapter and a device on it, blocking.
///
/// # Errors
///
/// Returns [`RenderError::GpuInit`] if no adapter is found or the device
/// request fails.
pub fn probe_adapter() -> RenderResult<AdapterSummary> {
    pollster::block_on(request_adapter())
}

async fn request_adapter() -> RenderResult<AdapterSummary> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| RenderError::GpuInit("No suitable GPU adapter found".to_string()))?;

    let (_device, _queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Surface Factory Probe Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        )
        .await
        .map_err(|e| RenderError::GpuInit(e.to_string()))?;

    let info = adapter.get_info();
    tracing::info!("wgpu adapter available: {:?}", info);

    Ok(AdapterSummary {
        name: info.name,
        backend: format!("{:?}", info.backend),
        is_cpu: info.device_type == wgpu::DeviceType::Cpu,
    })
}
