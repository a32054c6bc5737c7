use std::time::Instant;

use crate::backend::BackendKind;

use super::report::{vendor_name, DiagnosticReport};

/// Source of host facts for the selector.
///
/// [`WgpuProbe`] is the real thing; tests substitute fixed reports.
pub trait CapabilityProbe {
    fn probe(&self, iterations: u32) -> DiagnosticReport;
}

/// Probes real adapters through wgpu and times a clear-pass benchmark.
///
/// Creates and drops a throwaway instance, device and 16×16 target; nothing
/// persists after [`probe`](CapabilityProbe::probe) returns.
#[derive(Debug, Default, Copy, Clone)]
pub struct WgpuProbe;

const PROBE_SIZE: u32 = 16;

impl CapabilityProbe for WgpuProbe {
    fn probe(&self, iterations: u32) -> DiagnosticReport {
        let mut report = DiagnosticReport {
            cpu_threads: cpu_threads(),
            device_memory_gb: device_memory_gb(),
            ..DiagnosticReport::cpu_only()
        };

        let Some((api, adapter)) = best_adapter() else {
            log::debug!("probe: no GPU adapter; CPU backend only");
            return report;
        };

        let info = adapter.get_info();
        report.api = api;
        report.gpu_vendor = Some(
            vendor_name(info.vendor)
                .map(str::to_string)
                .unwrap_or_else(|| format!("0x{:04X}", info.vendor)),
        )
        .filter(|_| info.vendor != 0);
        report.gpu_renderer = Some(info.name.clone()).filter(|n| !n.is_empty());
        report.perf_score = benchmark(&adapter, iterations);

        report
    }
}

/// Tries WebGPU-class backends first, then GL.
fn best_adapter() -> Option<(BackendKind, wgpu::Adapter)> {
    if let Some(adapter) = request_adapter(wgpu::Backends::PRIMARY) {
        return Some((BackendKind::WebGpu, adapter));
    }

    let adapter = request_adapter(wgpu::Backends::GL)?;
    let api = match adapter.get_downlevel_capabilities().shader_model {
        wgpu::ShaderModel::Sm2 => BackendKind::WebGl,
        _ => BackendKind::WebGl2,
    };
    Some((api, adapter))
}

fn request_adapter(backends: wgpu::Backends) -> Option<wgpu::Adapter> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends,
        ..Default::default()
    });

    pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .ok()
}

/// Clear passes per second on a throwaway target (encode + submit).
fn benchmark(adapter: &wgpu::Adapter, iterations: u32) -> Option<f64> {
    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("easel probe device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
        experimental_features: wgpu::ExperimentalFeatures::disabled(),
        memory_hints: wgpu::MemoryHints::MemoryUsage,
        trace: wgpu::Trace::Off,
    }))
    .map_err(|e| log::debug!("probe: device request failed: {e}"))
    .ok()?;

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("easel probe target"),
        size: wgpu::Extent3d {
            width: PROBE_SIZE,
            height: PROBE_SIZE,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    let iterations = iterations.max(1);
    let start = Instant::now();
    for i in 0..iterations {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("easel probe encoder"),
        });
        {
            let shade = (i % 255) as f64 / 255.0;
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("easel probe pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: shade,
                            g: 0.0,
                            b: 0.0,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }
        queue.submit(std::iter::once(encoder.finish()));
    }
    let elapsed = start.elapsed().as_secs_f64();

    texture.destroy();
    Some(iterations as f64 / elapsed.max(1e-9))
}

fn cpu_threads() -> Option<usize> {
    std::thread::available_parallelism().ok().map(|n| n.get())
}

/// Installed memory in GB, rounded to the nearest power of two the way
/// browsers coarsen `deviceMemory`.
#[cfg(target_os = "linux")]
fn device_memory_gb() -> Option<f64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    let kb = parse_mem_total_kb(&meminfo)?;
    Some(coarsen_gb(kb as f64 / (1024.0 * 1024.0)))
}

#[cfg(not(target_os = "linux"))]
fn device_memory_gb() -> Option<f64> {
    None
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_mem_total_kb(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find_map(|line| line.strip_prefix("MemTotal:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|n| n.parse().ok())
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn coarsen_gb(gb: f64) -> f64 {
    if !(gb > 0.0) {
        return 0.0;
    }
    2f64.powi(gb.log2().round() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_total_is_parsed() {
        let sample = "MemFree:  100 kB\nMemTotal:       16318588 kB\n";
        assert_eq!(parse_mem_total_kb(sample), Some(16_318_588));
        assert_eq!(parse_mem_total_kb("nothing here"), None);
    }

    #[test]
    fn memory_is_coarsened_to_powers_of_two() {
        assert_eq!(coarsen_gb(3.8), 4.0);
        assert_eq!(coarsen_gb(15.56), 16.0);
        assert_eq!(coarsen_gb(0.0), 0.0);
    }

    #[test]
    fn threads_are_known_on_test_hosts() {
        assert!(cpu_threads().is_some_and(|n| n >= 1));
    }
}
