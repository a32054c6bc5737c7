use crate::error::{RenderError, Result};

/// Parses and validates a WGSL module with naga.
///
/// Parse failures are `ShaderCompile`; type or interface failures are
/// `PipelineLink`.
pub fn validate_wgsl(label: &str, source: &str) -> Result<()> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| RenderError::ShaderCompile {
        label: label.to_string(),
        message: e.emit_to_string(source),
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .map_err(|e| RenderError::PipelineLink {
        label: label.to_string(),
        message: e.emit_to_string(source),
    })?;

    Ok(())
}

/// Validates `source` up front, then hands it to the device.
///
/// wgpu reports shader errors asynchronously through the device error
/// handler; validating first turns them into init errors.
pub fn compile_wgsl(device: &wgpu::Device, label: &str, source: &str) -> Result<wgpu::ShaderModule> {
    validate_wgsl(label, source)?;
    log::debug!("shader \"{label}\" validated");

    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    }))
}
