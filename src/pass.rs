//! Pass declaration (§4.1): `PassDecl`, `AccessDecl`, and the three-layer
//! `PassBuilder` surface passed into a pass's setup closure.

use std::collections::HashMap;
use std::sync::Arc;

use ash::vk;

use crate::barrier::AccessIntent;
use crate::handle::ResourceHandle;
use crate::descriptor::reflection::ReflectionInfo;
use crate::pipeline::handle::PipelineHandle;
use crate::subresource_range::SubresourceRange;
use crate::sync_state::AccessType;

/// What kind of queue a pass executes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassType {
    /// Rasterization pass — may declare render targets.
    Graphics,
    /// Compute dispatch.
    Compute,
    /// Copy/blit/clear-only pass.
    Transfer,
}

/// One resource touch declared within a pass (§3 "AccessDecl").
#[derive(Debug, Clone, Copy)]
pub struct AccessDecl {
    /// The resource being touched.
    pub resource: ResourceHandle,
    /// Read, write, or read-write.
    pub access_type: AccessType,
    /// The state the pass wants to see at entry.
    pub desired: AccessIntent,
    /// The subresource range affected (images only; ignored for buffers).
    pub range: SubresourceRange,
}

/// Color attachment load behavior and clear value, set via
/// `PassBuilder::set_color_target`.
#[derive(Debug, Clone, Copy)]
pub struct ColorTargetDecl {
    /// The image resource bound as this color attachment.
    pub resource: ResourceHandle,
    /// Load operation.
    pub load_op: vk::AttachmentLoadOp,
    /// Clear value, used when `load_op == CLEAR`.
    pub clear_value: vk::ClearColorValue,
}

/// Whether a depth attachment is bound for writing or read-only testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthWrite {
    /// Depth-writable layout.
    Enabled,
    /// Read-only depth/stencil layout (e.g. a later pass samples depth).
    ReadOnly,
}

/// Depth/stencil attachment declaration, set via `set_depth_target`.
#[derive(Debug, Clone, Copy)]
pub struct DepthTargetDecl {
    /// The image resource bound as the depth/stencil attachment.
    pub resource: ResourceHandle,
    /// Load operation.
    pub load_op: vk::AttachmentLoadOp,
    /// Whether depth writes are enabled.
    pub depth_write: DepthWrite,
    /// Clear depth, used when `load_op == CLEAR`.
    pub clear_depth: f32,
    /// Clear stencil, used when `load_op == CLEAR`.
    pub clear_stencil: u32,
}

/// Render-target state captured by Layer 1 of the `PassBuilder`.
#[derive(Debug, Clone, Default)]
pub struct RenderTargetDecl {
    /// Color attachments indexed 0..N. `None` entries are holes (no
    /// attachment bound at that index).
    pub color: Vec<Option<ColorTargetDecl>>,
    /// Optional depth/stencil attachment.
    pub depth: Option<DepthTargetDecl>,
}

/// A Layer-2 descriptor bind-map entry: a reflected binding name mapped to
/// a resource and an optional sampler override.
#[derive(Debug, Clone, Copy)]
pub struct BindEntry {
    /// The bound resource.
    pub resource: ResourceHandle,
    /// Sampler to use instead of the pass's default, if any.
    pub sampler_override: Option<vk::Sampler>,
}

/// The pipeline + layout + reflection triple enabling Layer 2 auto-bind
/// (§4.1 `addPass` with the pipeline/layout/reflection overload).
pub struct PipelineBinding {
    /// The pipeline to bind when recording this pass. Shared (not owned by
    /// the declaration) since a `PipelineHandle`'s `Drop` destroys real
    /// Vulkan objects, and the same pipeline is rebound across many frames'
    /// worth of `reset()`-then-redeclare cycles.
    pub pipeline: Arc<PipelineHandle>,
    /// The pipeline's layout (for push constants / descriptor set binding).
    pub layout: vk::PipelineLayout,
    /// Shader reflection data used to resolve the bind-map into writes.
    pub reflection: ReflectionInfo,
}

/// The record callback invoked during `execute()` for one pass.
pub type RecordFn = Box<dyn FnMut(&crate::graph::execute::PassContext<'_>, vk::CommandBuffer)>;

/// One declared pass (§3 "PassDecl").
pub struct PassDecl {
    /// Debug name.
    pub name: String,
    /// Graphics/Compute/Transfer.
    pub pass_type: PassType,
    /// Every resource touch declared in `setup_fn`.
    pub accesses: Vec<AccessDecl>,
    /// Render target state, if any was declared via Layer 1.
    pub render_target: Option<RenderTargetDecl>,
    /// Pipeline/layout/reflection triple, if this pass uses Layer 2.
    pub pipeline_binding: Option<PipelineBinding>,
    /// Default sampler for Layer-2 binds that don't override one.
    pub default_sampler: Option<vk::Sampler>,
    /// Reflected-binding-name -> resource bind-map.
    pub bind_map: HashMap<String, BindEntry>,
    /// The callback invoked during `execute()`.
    pub record: RecordFn,
}

/// The builder passed into a pass's `setup_fn`, exposing the three access
/// layers described in §4.1.
pub struct PassBuilder<'a> {
    accesses: &'a mut Vec<AccessDecl>,
    render_target: &'a mut Option<RenderTargetDecl>,
    default_sampler: &'a mut Option<vk::Sampler>,
    bind_map: &'a mut HashMap<String, BindEntry>,
}

impl<'a> PassBuilder<'a> {
    pub(crate) fn new(
        accesses: &'a mut Vec<AccessDecl>,
        render_target: &'a mut Option<RenderTargetDecl>,
        default_sampler: &'a mut Option<vk::Sampler>,
        bind_map: &'a mut HashMap<String, BindEntry>,
    ) -> Self {
        Self { accesses, render_target, default_sampler, bind_map }
    }

    // ---- Layer 0: explicit access ----------------------------------

    /// The direct escape hatch: declare an access with an explicit desired
    /// state and subresource range.
    pub fn access(
        &mut self,
        resource: ResourceHandle,
        access_type: AccessType,
        desired: AccessIntent,
        range: SubresourceRange,
    ) -> &mut Self {
        self.accesses.push(AccessDecl { resource, access_type, desired, range });
        self
    }

    fn access_whole(&mut self, resource: ResourceHandle, access_type: AccessType, desired: AccessIntent) -> &mut Self {
        self.access(resource, access_type, desired, SubresourceRange::whole_resource())
    }

    /// Declare a storage-image write (compute/fragment UAV write).
    pub fn write_storage_image(&mut self, resource: ResourceHandle) -> &mut Self {
        self.access_whole(
            resource,
            AccessType::Write,
            AccessIntent {
                stage: vk::PipelineStageFlags2::COMPUTE_SHADER,
                access: vk::AccessFlags2::SHADER_STORAGE_WRITE,
                layout: vk::ImageLayout::GENERAL,
                queue_family: vk::QUEUE_FAMILY_IGNORED,
            },
        )
    }

    /// Declare a storage-image read.
    pub fn read_storage_image(&mut self, resource: ResourceHandle) -> &mut Self {
        self.access_whole(
            resource,
            AccessType::Read,
            AccessIntent {
                stage: vk::PipelineStageFlags2::COMPUTE_SHADER,
                access: vk::AccessFlags2::SHADER_STORAGE_READ,
                layout: vk::ImageLayout::GENERAL,
                queue_family: vk::QUEUE_FAMILY_IGNORED,
            },
        )
    }

    /// Declare a sampled-image read (fragment shader texture fetch).
    pub fn sample_image(&mut self, resource: ResourceHandle) -> &mut Self {
        self.access_whole(
            resource,
            AccessType::Read,
            AccessIntent {
                stage: vk::PipelineStageFlags2::FRAGMENT_SHADER,
                access: vk::AccessFlags2::SHADER_SAMPLED_READ,
                layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                queue_family: vk::QUEUE_FAMILY_IGNORED,
            },
        )
    }

    /// Declare an input-attachment read (subpass-local fragment read).
    pub fn read_input_attachment(&mut self, resource: ResourceHandle) -> &mut Self {
        self.access_whole(
            resource,
            AccessType::Read,
            AccessIntent {
                stage: vk::PipelineStageFlags2::FRAGMENT_SHADER,
                access: vk::AccessFlags2::INPUT_ATTACHMENT_READ,
                layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                queue_family: vk::QUEUE_FAMILY_IGNORED,
            },
        )
    }

    /// Declare a storage-buffer write.
    pub fn write_storage_buffer(&mut self, resource: ResourceHandle) -> &mut Self {
        self.access_whole(
            resource,
            AccessType::Write,
            AccessIntent {
                stage: vk::PipelineStageFlags2::COMPUTE_SHADER,
                access: vk::AccessFlags2::SHADER_STORAGE_WRITE,
                layout: vk::ImageLayout::UNDEFINED,
                queue_family: vk::QUEUE_FAMILY_IGNORED,
            },
        )
    }

    /// Declare a storage-buffer read.
    pub fn read_storage_buffer(&mut self, resource: ResourceHandle) -> &mut Self {
        self.access_whole(
            resource,
            AccessType::Read,
            AccessIntent {
                stage: vk::PipelineStageFlags2::COMPUTE_SHADER,
                access: vk::AccessFlags2::SHADER_STORAGE_READ,
                layout: vk::ImageLayout::UNDEFINED,
                queue_family: vk::QUEUE_FAMILY_IGNORED,
            },
        )
    }

    /// Declare a uniform-buffer read.
    pub fn read_uniform_buffer(&mut self, resource: ResourceHandle) -> &mut Self {
        self.access_whole(
            resource,
            AccessType::Read,
            AccessIntent {
                stage: vk::PipelineStageFlags2::VERTEX_SHADER | vk::PipelineStageFlags2::FRAGMENT_SHADER,
                access: vk::AccessFlags2::UNIFORM_READ,
                layout: vk::ImageLayout::UNDEFINED,
                queue_family: vk::QUEUE_FAMILY_IGNORED,
            },
        )
    }

    /// Declare a vertex-buffer read.
    pub fn read_vertex_buffer(&mut self, resource: ResourceHandle) -> &mut Self {
        self.access_whole(
            resource,
            AccessType::Read,
            AccessIntent {
                stage: vk::PipelineStageFlags2::VERTEX_INPUT,
                access: vk::AccessFlags2::VERTEX_ATTRIBUTE_READ,
                layout: vk::ImageLayout::UNDEFINED,
                queue_family: vk::QUEUE_FAMILY_IGNORED,
            },
        )
    }

    /// Declare an index-buffer read.
    pub fn read_index_buffer(&mut self, resource: ResourceHandle) -> &mut Self {
        self.access_whole(
            resource,
            AccessType::Read,
            AccessIntent {
                stage: vk::PipelineStageFlags2::INDEX_INPUT,
                access: vk::AccessFlags2::INDEX_READ,
                layout: vk::ImageLayout::UNDEFINED,
                queue_family: vk::QUEUE_FAMILY_IGNORED,
            },
        )
    }

    /// Declare an indirect-draw-argument buffer read.
    pub fn read_indirect_buffer(&mut self, resource: ResourceHandle) -> &mut Self {
        self.access_whole(
            resource,
            AccessType::Read,
            AccessIntent {
                stage: vk::PipelineStageFlags2::DRAW_INDIRECT,
                access: vk::AccessFlags2::INDIRECT_COMMAND_READ,
                layout: vk::ImageLayout::UNDEFINED,
                queue_family: vk::QUEUE_FAMILY_IGNORED,
            },
        )
    }

    // ---- Layer 1: render targets ------------------------------------

    /// Bind `resource` as color attachment `index`, implicitly adding a
    /// Write access with the color-attachment layout.
    pub fn set_color_target(
        &mut self,
        index: usize,
        resource: ResourceHandle,
        load_op: vk::AttachmentLoadOp,
        clear_value: vk::ClearColorValue,
    ) -> &mut Self {
        self.access_whole(
            resource,
            AccessType::Write,
            AccessIntent {
                stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                access: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                queue_family: vk::QUEUE_FAMILY_IGNORED,
            },
        );
        let rt = self.render_target.get_or_insert_with(RenderTargetDecl::default);
        if rt.color.len() <= index {
            rt.color.resize(index + 1, None);
        }
        rt.color[index] = Some(ColorTargetDecl { resource, load_op, clear_value });
        self
    }

    /// Convenience: `write_color_attachment` with `LOAD` and no clear.
    pub fn write_color_attachment(&mut self, index: usize, resource: ResourceHandle) -> &mut Self {
        self.set_color_target(index, resource, vk::AttachmentLoadOp::LOAD, vk::ClearColorValue::default())
    }

    /// Bind `resource` as the depth/stencil attachment.
    pub fn set_depth_target(
        &mut self,
        resource: ResourceHandle,
        load_op: vk::AttachmentLoadOp,
        depth_write: DepthWrite,
        clear_depth: f32,
        clear_stencil: u32,
    ) -> &mut Self {
        let layout = match depth_write {
            DepthWrite::Enabled => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            DepthWrite::ReadOnly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        };
        let access_type = match depth_write {
            DepthWrite::Enabled => AccessType::ReadWrite,
            DepthWrite::ReadOnly => AccessType::Read,
        };
        self.access_whole(
            resource,
            access_type,
            AccessIntent {
                stage: vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
                access: vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE
                    | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ,
                layout,
                queue_family: vk::QUEUE_FAMILY_IGNORED,
            },
        );
        let rt = self.render_target.get_or_insert_with(RenderTargetDecl::default);
        rt.depth = Some(DepthTargetDecl { resource, load_op, depth_write, clear_depth, clear_stencil });
        self
    }

    /// Convenience: `write_depth_attachment` with `LOAD` and writes enabled.
    pub fn write_depth_attachment(&mut self, resource: ResourceHandle) -> &mut Self {
        self.set_depth_target(resource, vk::AttachmentLoadOp::LOAD, DepthWrite::Enabled, 1.0, 0)
    }

    // ---- Layer 2: descriptor binding ---------------------------------

    /// Set the default sampler used for Layer-2 binds without an override.
    pub fn set_sampler(&mut self, sampler: vk::Sampler) -> &mut Self {
        *self.default_sampler = Some(sampler);
        self
    }

    /// Bind `resource` to the reflected binding named `name`. Must be used
    /// with the pipeline+reflection overload of `add_pass`.
    pub fn bind(&mut self, name: &str, resource: ResourceHandle, sampler_override: Option<vk::Sampler>) -> &mut Self {
        self.bind_map.insert(name.to_string(), BindEntry { resource, sampler_override });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_target_grows_sparse_slots() {
        let mut accesses = Vec::new();
        let mut rt = None;
        let mut sampler = None;
        let mut bind_map = HashMap::new();
        let mut builder = PassBuilder::new(&mut accesses, &mut rt, &mut sampler, &mut bind_map);
        let h = crate::handle::ResourceHandle::default();
        builder.set_color_target(2, h, vk::AttachmentLoadOp::CLEAR, vk::ClearColorValue::default());
        let rt = rt.unwrap();
        assert_eq!(rt.color.len(), 3);
        assert!(rt.color[0].is_none());
        assert!(rt.color[1].is_none());
        assert!(rt.color[2].is_some());
    }
}
