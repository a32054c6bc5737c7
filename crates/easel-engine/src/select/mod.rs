//! Runtime backend selection.
//!
//! The selector probes the host once (adapter classes, a clear-pass
//! benchmark, CPU threads, memory) and applies a fixed precedence:
//!
//! 1. `WebGpu` when a WebGPU-class adapter exists and the host is strong on
//!    every axis;
//! 2. otherwise the best API if it is a GL class and the benchmark clears a
//!    lower bar (a WebGPU-class host that misses step 1 does not get here);
//! 3. otherwise the CPU `Canvas2d` backend, which always works.

mod probe;
mod report;

pub use probe::{CapabilityProbe, WgpuProbe};
pub use report::{vendor_name, DiagnosticReport};

use crate::backend::BackendKind;
use crate::config::{SelectorConfig, Thresholds};

/// Environment variable that forces a backend, e.g. `EASEL_BACKEND=webgl2`.
pub const BACKEND_ENV: &str = "EASEL_BACKEND";

/// Outcome of [`choose`]. `report` is `None` when the backend was forced.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub backend: BackendKind,
    pub report: Option<DiagnosticReport>,
}

/// Picks a backend using the real wgpu probe.
pub fn choose(forced: Option<BackendKind>, config: &SelectorConfig) -> Selection {
    choose_with(&WgpuProbe, forced, config)
}

/// Picks a backend using `probe`.
///
/// A forced backend is returned as-is without probing; the caller is
/// responsible for it being usable.
pub fn choose_with(
    probe: &dyn CapabilityProbe,
    forced: Option<BackendKind>,
    config: &SelectorConfig,
) -> Selection {
    if let Some(backend) = forced {
        log::info!("backend forced to {backend}; skipping capability probe");
        return Selection {
            backend,
            report: None,
        };
    }

    let report = probe.probe(config.iterations);
    let backend = decide(&report, &config.thresholds);
    log::info!("selected {backend} backend ({report})");

    Selection {
        backend,
        report: Some(report),
    }
}

/// Applies the fixed precedence to a report. Unknown values never qualify.
pub fn decide(report: &DiagnosticReport, thresholds: &Thresholds) -> BackendKind {
    let score = report.perf_score.unwrap_or(0.0);

    let strong_host = report
        .cpu_threads
        .is_some_and(|n| n >= thresholds.min_cpu_threads)
        && report
            .device_memory_gb
            .is_some_and(|gb| gb >= thresholds.min_memory_gb);

    if report.api == BackendKind::WebGpu && score > thresholds.webgpu_score && strong_host {
        return BackendKind::WebGpu;
    }

    match report.api {
        kind @ (BackendKind::WebGl2 | BackendKind::WebGl) if score > thresholds.webgl_score => {
            kind
        }
        _ => BackendKind::Canvas2d,
    }
}

/// Reads a forced backend from [`BACKEND_ENV`]. Invalid values are ignored
/// with a warning.
pub fn forced_from_env() -> Option<BackendKind> {
    let value = std::env::var(BACKEND_ENV).ok()?;
    match value.parse() {
        Ok(kind) => Some(kind),
        Err(e) => {
            log::warn!("ignoring {BACKEND_ENV}={value:?}: {e}");
            None
        }
    }
}
