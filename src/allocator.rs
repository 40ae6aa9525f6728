//! The GPU memory allocator boundary (§6): "an auto-usage heap manager
//! exposing buffer/image creation with optional host mapping." Consumed
//! via a trait so this crate compiles without a real allocator linked;
//! `VkMemAllocator` is the default implementation grounded on `vk-mem`.

use ash::vk;

use crate::error::{GraphError, GraphResult};

/// A created image allocation.
pub struct AllocatedImage {
    /// The image handle.
    pub image: vk::Image,
    /// The view the graph uses for attachments/bindings.
    pub view: vk::ImageView,
    /// Opaque allocation token passed back to `destroy_image`.
    pub allocation: vk_mem::Allocation,
}

/// A created buffer allocation.
pub struct AllocatedBuffer {
    /// The buffer handle.
    pub buffer: vk::Buffer,
    /// Opaque allocation token passed back to `destroy_buffer`.
    pub allocation: vk_mem::Allocation,
    /// Host-mapped pointer, if `host_mapped` was requested and the memory
    /// type allows it.
    pub mapped_ptr: Option<*mut u8>,
}

/// The GPU allocator boundary consumed by the transient pool and by
/// external buffer/image builders (§6).
pub trait GpuAllocator {
    /// Create an image with VMA's "auto usage" policy.
    fn create_image(
        &self,
        create_info: &vk::ImageCreateInfo,
        view_info: &vk::ImageViewCreateInfo,
    ) -> GraphResult<AllocatedImage>;

    /// Create a buffer, optionally requesting a host-mapped pointer.
    fn create_buffer(&self, create_info: &vk::BufferCreateInfo, host_mapped: bool) -> GraphResult<AllocatedBuffer>;

    /// Destroy a previously created image.
    fn destroy_image(&self, image: AllocatedImage);

    /// Destroy a previously created buffer.
    fn destroy_buffer(&self, buffer: AllocatedBuffer);
}

/// Default `GpuAllocator` backed by `vk-mem`'s automatic memory-usage
/// heuristics, mirroring `rust_engine::foundation::memory`'s allocator wrapper.
pub struct VkMemAllocator {
    allocator: vk_mem::Allocator,
    device: ash::Device,
}

impl VkMemAllocator {
    /// Wrap an already-constructed `vk-mem` allocator.
    pub fn new(allocator: vk_mem::Allocator, device: ash::Device) -> Self {
        Self { allocator, device }
    }
}

impl GpuAllocator for VkMemAllocator {
    fn create_image(
        &self,
        create_info: &vk::ImageCreateInfo,
        view_info: &vk::ImageViewCreateInfo,
    ) -> GraphResult<AllocatedImage> {
        let alloc_info = vk_mem::AllocationCreateInfo { usage: vk_mem::MemoryUsage::AutoPreferDevice, ..Default::default() };

        let (image, mut allocation) = unsafe { self.allocator.create_image(create_info, &alloc_info) }
            // vk-mem's own allocation errors (out of pool memory, fragmentation, ...)
            // don't carry a Vulkan result code, unlike the image-view creation
            // failure below which calls straight into `ash`.
            .map_err(|e| GraphError::TransientAllocationFailed { name: format!("image: {e}"), source: None })?;

        let mut view_info = *view_info;
        view_info.image = image;
        let view = match unsafe { self.device.create_image_view(&view_info, None) } {
            Ok(view) => view,
            Err(e) => {
                unsafe { self.allocator.destroy_image(image, &mut allocation) };
                return Err(GraphError::TransientAllocationFailed { name: "image view".to_string(), source: Some(e) });
            }
        };

        Ok(AllocatedImage { image, view, allocation })
    }

    fn create_buffer(&self, create_info: &vk::BufferCreateInfo, host_mapped: bool) -> GraphResult<AllocatedBuffer> {
        let mut alloc_info = vk_mem::AllocationCreateInfo { usage: vk_mem::MemoryUsage::AutoPreferDevice, ..Default::default() };
        if host_mapped {
            alloc_info.flags = vk_mem::AllocationCreateFlags::MAPPED
                | vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE;
        }

        let (buffer, allocation) = unsafe { self.allocator.create_buffer(create_info, &alloc_info) }
            .map_err(|e| GraphError::TransientAllocationFailed { name: format!("buffer: {e}"), source: None })?;

        let mapped_ptr = if host_mapped {
            let ptr = self.allocator.get_allocation_info(&allocation).mapped_data;
            if ptr.is_null() { None } else { Some(ptr as *mut u8) }
        } else {
            None
        };

        Ok(AllocatedBuffer { buffer, allocation, mapped_ptr })
    }

    fn destroy_image(&self, mut image: AllocatedImage) {
        unsafe {
            self.device.destroy_image_view(image.view, None);
            self.allocator.destroy_image(image.image, &mut image.allocation);
        }
    }

    fn destroy_buffer(&self, mut buffer: AllocatedBuffer) {
        unsafe {
            self.allocator.destroy_buffer(buffer.buffer, &mut buffer.allocation);
        }
    }
}
