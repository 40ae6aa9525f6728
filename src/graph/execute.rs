//! Pass execution (§4.3): per-pass barrier emission, `PassContext`
//! construction, record-callback invocation, and state-override draining.

use std::cell::RefCell;

use ash::vk;
use log::warn;
use slotmap::SlotMap;

use crate::barrier::BarrierBatch;
use crate::descriptor::resolver::ResolvedSet;
use crate::error::{GraphError, GraphResult};
use crate::handle::ResourceHandle;
use crate::resource::{GpuHandle, ResourceEntry};
use crate::subresource_range::SubresourceRange;
use crate::sync_state::ResourceState;

/// Rendering attachment state resolved at compile time (§4.2 phase 10),
/// ready to feed a `vk::RenderingInfo` at execute time.
#[derive(Debug, Clone, Default)]
pub struct PreparedRenderingInfo {
    /// Render area, derived from the first declared target's extent.
    pub render_area: vk::Rect2D,
    /// Color attachments, indexed as declared (holes filled with a null
    /// `image_view` attachment that dynamic rendering ignores only if the
    /// slot itself is never populated — holes are skipped at emission).
    pub color_attachments: Vec<Option<vk::RenderingAttachmentInfo>>,
    /// Depth/stencil attachment, if declared.
    pub depth_attachment: Option<vk::RenderingAttachmentInfo>,
}

/// A state override pushed by a record callback into the context's stash,
/// drained after the callback returns (§4.3 step 4) — used when a callback
/// transitions a resource behind the graph's back (e.g. a swapchain
/// presentation-layout transition).
#[derive(Debug, Clone, Copy)]
pub struct StateOverride {
    /// The resource being overridden.
    pub resource: ResourceHandle,
    /// The subresource range the override applies to.
    pub range: SubresourceRange,
    /// The state to commit in place of whatever the graph tracked.
    pub state: ResourceState,
}

/// Per-pass context handed to a record callback: concrete GPU handles,
/// pre-computed rendering info, pre-resolved descriptor sets, and the
/// override stash (§4.3 step 2).
pub struct PassContext<'a> {
    resources: &'a SlotMap<ResourceHandle, ResourceEntry>,
    rendering_info: Option<&'a PreparedRenderingInfo>,
    descriptor_sets: &'a [ResolvedSet],
    overrides: RefCell<Vec<StateOverride>>,
    rendering_active: std::cell::Cell<bool>,
}

impl<'a> PassContext<'a> {
    pub(crate) fn new(
        resources: &'a SlotMap<ResourceHandle, ResourceEntry>,
        rendering_info: Option<&'a PreparedRenderingInfo>,
        descriptor_sets: &'a [ResolvedSet],
    ) -> Self {
        Self {
            resources,
            rendering_info,
            descriptor_sets,
            overrides: RefCell::new(Vec::new()),
            rendering_active: std::cell::Cell::new(false),
        }
    }

    /// Begin dynamic rendering using the pre-computed rendering info. Panics
    /// in debug builds if this pass declared no render target.
    pub fn begin_rendering(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        let info = self.rendering_info.expect("begin_rendering called on a pass with no render target");
        let color: Vec<vk::RenderingAttachmentInfo> = info.color_attachments.iter().filter_map(|a| *a).collect();
        let mut begin_info =
            vk::RenderingInfo::builder().render_area(info.render_area).layer_count(1).color_attachments(&color);
        if let Some(depth) = &info.depth_attachment {
            begin_info = begin_info.depth_attachment(depth);
        }
        unsafe { device.cmd_begin_rendering(cmd, &begin_info) };
        self.rendering_active.set(true);
    }

    /// End dynamic rendering begun via `begin_rendering`.
    pub fn end_rendering(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        unsafe { device.cmd_end_rendering(cmd) };
        self.rendering_active.set(false);
    }

    /// The concrete `(vk::Image, vk::ImageView)` backing `handle`.
    pub fn image(&self, handle: ResourceHandle) -> GraphResult<(vk::Image, vk::ImageView)> {
        match self.resources.get(handle).map(|e| e.gpu_handle) {
            Some(GpuHandle::Image { image, view }) => Ok((image, view)),
            Some(_) => Err(GraphError::StaleHandle(handle)),
            None => Err(GraphError::StaleHandle(handle)),
        }
    }

    /// The concrete `vk::Buffer` backing `handle`.
    pub fn buffer(&self, handle: ResourceHandle) -> GraphResult<vk::Buffer> {
        match self.resources.get(handle).map(|e| e.gpu_handle) {
            Some(GpuHandle::Buffer { buffer }) => Ok(buffer),
            Some(_) => Err(GraphError::StaleHandle(handle)),
            None => Err(GraphError::StaleHandle(handle)),
        }
    }

    /// The pass's pre-computed rendering info, if it declared render targets.
    pub fn rendering_info(&self) -> Option<&PreparedRenderingInfo> {
        self.rendering_info
    }

    /// The descriptor set resolved for `set_index`, if any bind-map entry
    /// touched that set.
    pub fn descriptor_set(&self, set_index: u32) -> Option<vk::DescriptorSet> {
        self.descriptor_sets.iter().find(|s| s.set_index == set_index).map(|s| s.descriptor_set)
    }

    /// Every resolved descriptor set for this pass, in set-index order.
    pub fn descriptor_sets(&self) -> &[ResolvedSet] {
        self.descriptor_sets
    }

    /// Push a state override to be committed after the record callback
    /// returns (§4.3 step 4).
    pub fn override_state(&self, resource: ResourceHandle, range: SubresourceRange, state: ResourceState) {
        self.overrides.borrow_mut().push(StateOverride { resource, range, state });
    }

    fn rendering_left_open(&self) -> bool {
        self.rendering_active.get()
    }

    pub(crate) fn take_overrides(self) -> Vec<StateOverride> {
        self.overrides.into_inner()
    }
}

/// Emit one pass's barriers (if any), build its context, invoke its record
/// callback, then return the overrides it pushed for the caller to commit.
pub(crate) fn run_pass(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    pass_name: &str,
    barriers: &BarrierBatch,
    resources: &SlotMap<ResourceHandle, ResourceEntry>,
    rendering_info: Option<&PreparedRenderingInfo>,
    descriptor_sets: &[ResolvedSet],
    record: &mut dyn FnMut(&PassContext<'_>, vk::CommandBuffer),
) -> Vec<StateOverride> {
    if !barriers.is_empty() {
        let dependency_info = vk::DependencyInfo::builder()
            .image_memory_barriers(&barriers.image_barriers)
            .buffer_memory_barriers(&barriers.buffer_barriers);
        unsafe { device.cmd_pipeline_barrier2(cmd, &dependency_info) };
    }

    let context = PassContext::new(resources, rendering_info, descriptor_sets);
    record(&context, cmd);

    if context.rendering_left_open() {
        warn!("pass '{pass_name}' began dynamic rendering but never ended it");
    }

    context.take_overrides()
}
