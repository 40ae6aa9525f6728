//! Pipeline cache blob persistence (§4.2 add, §6 "Persisted state").
//!
//! The Vulkan pipeline cache's serialized form is opaque; this wrapper only
//! owns the `VkPipelineCache` object's lifetime and the load/merge/export
//! calls a caller needs to persist it to disk across runs.

use ash::{vk, Device};

use crate::error::PipelineError;

/// RAII wrapper around a `VkPipelineCache`.
pub struct PipelineCache {
    device: Device,
    cache: vk::PipelineCache,
}

impl PipelineCache {
    /// Create a cache, optionally seeded from a previously-serialized blob
    /// (e.g. loaded from disk at application startup).
    pub fn new(device: Device, initial_data: &[u8]) -> Result<Self, PipelineError> {
        let create_info = vk::PipelineCacheCreateInfo::builder().initial_data(initial_data);
        let cache = unsafe { device.create_pipeline_cache(&create_info, None) }
            .map_err(PipelineError::CacheProbeFailed)?;
        Ok(Self { device, cache })
    }

    /// The underlying handle, passed to `vkCreateGraphicsPipelines`.
    pub fn handle(&self) -> vk::PipelineCache {
        self.cache
    }

    /// Export the merged cache contents for the caller to persist to disk.
    pub fn serialize(&self) -> Result<Vec<u8>, PipelineError> {
        unsafe { self.device.get_pipeline_cache_data(self.cache) }.map_err(PipelineError::CacheProbeFailed)
    }
}

impl Drop for PipelineCache {
    fn drop(&mut self) {
        unsafe { self.device.destroy_pipeline_cache(self.cache, None) };
    }
}
