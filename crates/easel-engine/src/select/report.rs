use std::fmt;

use crate::backend::BackendKind;

/// What the selector learned about the host. `None` means "unknown".
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticReport {
    /// Most capable API class an adapter was found for.
    pub api: BackendKind,
    pub gpu_vendor: Option<String>,
    pub gpu_renderer: Option<String>,
    pub cpu_threads: Option<usize>,
    pub device_memory_gb: Option<f64>,
    /// Clear passes per second from the probe benchmark.
    pub perf_score: Option<f64>,
}

impl DiagnosticReport {
    /// Report for a host with no GPU adapter at all.
    pub fn cpu_only() -> Self {
        Self {
            api: BackendKind::Canvas2d,
            gpu_vendor: None,
            gpu_renderer: None,
            cpu_threads: None,
            device_memory_gb: None,
            perf_score: None,
        }
    }
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn or_unknown<T: fmt::Display>(v: &Option<T>) -> String {
            v.as_ref().map_or_else(|| "unknown".to_string(), T::to_string)
        }

        write!(
            f,
            "api={} vendor={} renderer={} threads={} memory_gb={} score={}",
            self.api,
            or_unknown(&self.gpu_vendor),
            or_unknown(&self.gpu_renderer),
            or_unknown(&self.cpu_threads),
            or_unknown(&self.device_memory_gb),
            self.perf_score
                .map_or_else(|| "unknown".to_string(), |s| format!("{s:.0}")),
        )
    }
}

/// PCI vendor id to a readable name.
pub fn vendor_name(id: u32) -> Option<&'static str> {
    Some(match id {
        0x10DE => "NVIDIA",
        0x1002 | 0x1022 => "AMD",
        0x8086 => "Intel",
        0x106B => "Apple",
        0x13B5 => "ARM",
        0x5143 => "Qualcomm",
        0x1010 => "ImgTec",
        0x14E4 => "Broadcom",
        0x1AE0 => "Google",
        0x10005 => "Mesa",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vendors() {
        assert_eq!(vendor_name(0x10DE), Some("NVIDIA"));
        assert_eq!(vendor_name(0x8086), Some("Intel"));
        assert_eq!(vendor_name(0), None);
    }

    #[test]
    fn display_marks_unknowns() {
        let report = DiagnosticReport::cpu_only();
        let text = report.to_string();
        assert!(text.starts_with("api=canvas2d"));
        assert!(text.contains("threads=unknown"));
        assert!(text.contains("score=unknown"));
    }
}
