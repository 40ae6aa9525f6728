//! SPIR-V loading and shader module creation, grounded on `rust_engine`'s
//! `render::vulkan::shader::ShaderModule`.

use std::ffi::CStr;
use std::fs::File;
use std::io::Read as _;
use std::path::Path;

use ash::{vk, Device};
use log::debug;

use crate::error::PipelineError;
use crate::pipeline::recipe::ShaderSource;

/// RAII wrapper around a `VkShaderModule`.
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create a shader module from SPIR-V bytecode already in memory.
    pub fn from_words(device: Device, words: &[u32]) -> Result<Self, PipelineError> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(words);
        let module = unsafe { device.create_shader_module(&create_info, None) }
            .map_err(PipelineError::ShaderModuleCreationFailed)?;
        debug!("created shader module ({} words)", words.len());
        Ok(Self { device, module })
    }

    /// Load SPIR-V from a file path and create the module.
    pub fn from_file<P: AsRef<Path>>(device: Device, path: P) -> Result<Self, PipelineError> {
        let path_ref = path.as_ref();
        let mut file = File::open(path_ref)
            .map_err(|e| PipelineError::SpirvReadFailed { path: path_ref.display().to_string(), message: e.to_string() })?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| PipelineError::SpirvReadFailed { path: path_ref.display().to_string(), message: e.to_string() })?;

        let words = bytes_to_words(&bytes).map_err(|message| PipelineError::SpirvReadFailed {
            path: path_ref.display().to_string(),
            message,
        })?;
        Self::from_words(device, &words)
    }

    /// Resolve a `ShaderSource` (path or in-memory bytecode) into a module.
    pub fn from_source(device: Device, source: &ShaderSource) -> Result<Self, PipelineError> {
        match source {
            ShaderSource::Path(path) => Self::from_file(device, path),
            ShaderSource::Bytecode(words) => Self::from_words(device, words),
        }
    }

    /// The underlying handle.
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Build a `PipelineShaderStageCreateInfo` for this module at `stage`,
    /// entering at `entry_point` (conventionally `main`).
    pub fn stage_info(&self, stage: vk::ShaderStageFlags, entry_point: &CStr) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder().stage(stage).module(self.module).name(entry_point).build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe { self.device.destroy_shader_module(self.module, None) };
    }
}

fn bytes_to_words(bytes: &[u8]) -> Result<Vec<u32>, String> {
    if bytes.len() % 4 != 0 {
        return Err("SPIR-V byte length is not a multiple of 4".to_string());
    }
    let mut words = Vec::with_capacity(bytes.len() / 4);
    for chunk in bytes.chunks_exact(4) {
        words.push(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(words)
}

/// Build a `VkPipelineLayout` from descriptor set layouts and push-constant
/// ranges, or return the recipe's externally-supplied layout unchanged.
pub fn resolve_pipeline_layout(
    device: &Device,
    set_layouts: &[vk::DescriptorSetLayout],
    push_constant_ranges: &[vk::PushConstantRange],
    external: Option<vk::PipelineLayout>,
) -> Result<vk::PipelineLayout, PipelineError> {
    if let Some(layout) = external {
        return Ok(layout);
    }
    let create_info =
        vk::PipelineLayoutCreateInfo::builder().set_layouts(set_layouts).push_constant_ranges(push_constant_ranges);
    unsafe { device.create_pipeline_layout(&create_info, None) }.map_err(PipelineError::PipelineLayoutCreationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_misaligned_spirv_length() {
        let bytes = [0u8; 5];
        assert!(bytes_to_words(&bytes).is_err());
    }

    #[test]
    fn decodes_little_endian_words() {
        let bytes = [0x03, 0x02, 0x23, 0x07];
        let words = bytes_to_words(&bytes).unwrap();
        assert_eq!(words, vec![0x0723_0203]);
    }
}
