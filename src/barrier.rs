//! The barrier compiler (§4.4): a stateless routine synthesizing
//! synchronization-2 barriers between a source and destination resource
//! state. Never fails — it is a pure function over states (§7).

use ash::vk;

use crate::subresource_range::SubresourceRange;
use crate::sync_state::ResourceState;

/// The resource state a pass wants to see at its entry, as declared by an
/// `AccessDecl` (§3).
#[derive(Debug, Clone, Copy)]
pub struct AccessIntent {
    /// Pipeline stage the access happens in.
    pub stage: vk::PipelineStageFlags2,
    /// Access mask of the access.
    pub access: vk::AccessFlags2,
    /// Desired image layout. Ignored for buffer accesses.
    pub layout: vk::ImageLayout,
    /// Desired owning queue family, or `vk::QUEUE_FAMILY_IGNORED`.
    pub queue_family: u32,
}

/// A raw stage/access/layout transition computed by the barrier compiler,
/// before being materialized into an `ash` barrier struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Transition {
    src_stage: vk::PipelineStageFlags2,
    src_access: vk::AccessFlags2,
    dst_stage: vk::PipelineStageFlags2,
    dst_access: vk::AccessFlags2,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
}

impl Transition {
    fn is_noop(&self) -> bool {
        self.old_layout == self.new_layout
            && self.src_stage == vk::PipelineStageFlags2::TOP_OF_PIPE
            && self.src_access.is_empty()
    }
}

/// An ordered batch of barriers to emit as one `vkCmdPipelineBarrier2`
/// call before a pass's record callback (§3 "BarrierBatch").
#[derive(Debug, Clone, Default)]
pub struct BarrierBatch {
    /// Image memory barriers, in emission order.
    pub image_barriers: Vec<vk::ImageMemoryBarrier2>,
    /// Buffer memory barriers, in emission order.
    pub buffer_barriers: Vec<vk::BufferMemoryBarrier2>,
}

impl BarrierBatch {
    /// True if there is nothing to emit — callers skip the pipeline-barrier
    /// call entirely in that case (§4.3 execute step 1).
    pub fn is_empty(&self) -> bool {
        self.image_barriers.is_empty() && self.buffer_barriers.is_empty()
    }

    /// Total barrier count, for `Stats`.
    pub fn len(&self) -> usize {
        self.image_barriers.len() + self.buffer_barriers.len()
    }
}

/// Queue-family transitions are rejected (single-queue-family Non-goal,
/// §5). Returns the two mismatched families when both are set and unequal.
pub fn check_queue_family_transition(src: u32, dst: u32) -> Option<(u32, u32)> {
    if src != vk::QUEUE_FAMILY_IGNORED && dst != vk::QUEUE_FAMILY_IGNORED && src != dst {
        Some((src, dst))
    } else {
        None
    }
}

fn compute_transition(src: ResourceState, dst: AccessIntent, is_read: bool) -> Option<Transition> {
    let layout_transition = src.current_layout != dst.layout;

    let (src_stage, src_access) = if is_read {
        if layout_transition {
            // Layout transitions always need a real dependency, even from a
            // visible read state, since the layout write itself must be
            // ordered after any pending access.
            (
                src.last_write_stage | src.read_stages_since_write,
                src.last_write_access,
            )
        } else if !src.has_pending_write() {
            // Read-after-read with nothing ever written: no-op.
            (vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::empty())
        } else if src.already_visible_to(dst.stage) {
            // Multi-reader fan-out: data already visible to this stage.
            // Execution-only dependency against the writer.
            (src.last_write_stage, vk::AccessFlags2::empty())
        } else {
            (src.last_write_stage, src.last_write_access)
        }
    } else {
        // Destination is a write: wait for the writer AND every reader
        // since that write (WAW folds in trivially since readers are empty).
        (
            src.last_write_stage | src.read_stages_since_write,
            src.last_write_access,
        )
    };

    let transition = Transition {
        src_stage,
        src_access,
        dst_stage: dst.stage,
        dst_access: dst.access,
        old_layout: src.current_layout,
        new_layout: dst.layout,
    };

    if transition.is_noop() {
        None
    } else {
        Some(transition)
    }
}

/// Compute and append an image barrier for one clipped subresource range,
/// if one is needed. `src` is the range's current tracked state; `dst` is
/// the access's desired state. Returns an error if the access declares a
/// cross-queue-family transition.
#[allow(clippy::too_many_arguments)]
pub fn append_image_barrier(
    batch: &mut BarrierBatch,
    image: vk::Image,
    aspect_mask: vk::ImageAspectFlags,
    range: SubresourceRange,
    src: ResourceState,
    dst: AccessIntent,
    is_read: bool,
) -> Result<(), (u32, u32)> {
    if let Some(mismatch) = check_queue_family_transition(src.queue_family, dst.queue_family) {
        return Err(mismatch);
    }

    if let Some(t) = compute_transition(src, dst, is_read) {
        let barrier = vk::ImageMemoryBarrier2::builder()
            .src_stage_mask(t.src_stage)
            .src_access_mask(t.src_access)
            .dst_stage_mask(t.dst_stage)
            .dst_access_mask(t.dst_access)
            .old_layout(t.old_layout)
            .new_layout(t.new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask,
                base_mip_level: range.base_mip,
                level_count: range.mip_count,
                base_array_layer: range.base_layer,
                layer_count: range.layer_count,
            })
            .build();
        batch.image_barriers.push(barrier);
    }
    Ok(())
}

/// As `append_image_barrier`, for a buffer access. Buffers carry no layout,
/// so `dst.layout` is ignored.
pub fn append_buffer_barrier(
    batch: &mut BarrierBatch,
    buffer: vk::Buffer,
    offset: vk::DeviceSize,
    size: vk::DeviceSize,
    src: ResourceState,
    dst: AccessIntent,
    is_read: bool,
) -> Result<(), (u32, u32)> {
    if let Some(mismatch) = check_queue_family_transition(src.queue_family, dst.queue_family) {
        return Err(mismatch);
    }

    // Buffers have no layout; force old==new so only stage/access drive the no-op check.
    let src_for_compute = ResourceState { current_layout: dst.layout, ..src };
    if let Some(t) = compute_transition(src_for_compute, dst, is_read) {
        let barrier = vk::BufferMemoryBarrier2::builder()
            .src_stage_mask(t.src_stage)
            .src_access_mask(t.src_access)
            .dst_stage_mask(t.dst_stage)
            .dst_access_mask(t.dst_access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(buffer)
            .offset(offset)
            .size(size)
            .build();
        batch.buffer_barriers.push(barrier);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2, layout: vk::ImageLayout) -> AccessIntent {
        AccessIntent { stage, access, layout, queue_family: vk::QUEUE_FAMILY_IGNORED }
    }

    #[test]
    fn undefined_to_color_attachment_is_top_of_pipe() {
        let src = ResourceState::undefined();
        let dst = intent(
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        );
        let t = compute_transition(src, dst, false).expect("must emit a barrier");
        assert_eq!(t.src_stage, vk::PipelineStageFlags2::TOP_OF_PIPE);
        assert!(t.src_access.is_empty());
        assert_eq!(t.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(t.new_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    }

    #[test]
    fn write_then_read_same_layout_same_stage_no_layout_change() {
        let writer = ResourceState::undefined().commit_write(
            vk::PipelineStageFlags2::COMPUTE_SHADER,
            vk::AccessFlags2::SHADER_STORAGE_WRITE,
            vk::ImageLayout::GENERAL,
        );
        let dst = intent(
            vk::PipelineStageFlags2::COMPUTE_SHADER,
            vk::AccessFlags2::SHADER_STORAGE_READ,
            vk::ImageLayout::GENERAL,
        );
        let t = compute_transition(writer, dst, true).expect("read must sync against the writer");
        assert_eq!(t.src_stage, vk::PipelineStageFlags2::COMPUTE_SHADER);
        assert_eq!(t.src_access, vk::AccessFlags2::SHADER_STORAGE_WRITE);
        assert_eq!(t.dst_access, vk::AccessFlags2::SHADER_STORAGE_READ);
    }

    #[test]
    fn read_after_read_without_prior_write_is_noop() {
        let fresh = ResourceState::undefined();
        let dst = intent(
            vk::PipelineStageFlags2::FRAGMENT_SHADER,
            vk::AccessFlags2::SHADER_SAMPLED_READ,
            vk::ImageLayout::UNDEFINED,
        );
        assert!(compute_transition(fresh, dst, true).is_none());
    }

    #[test]
    fn multi_reader_fanout_is_execution_only() {
        let state = ResourceState::undefined()
            .commit_write(
                vk::PipelineStageFlags2::COMPUTE_SHADER,
                vk::AccessFlags2::SHADER_STORAGE_WRITE,
                vk::ImageLayout::GENERAL,
            )
            .commit_read(
                vk::PipelineStageFlags2::COMPUTE_SHADER,
                vk::AccessFlags2::SHADER_STORAGE_READ,
                vk::ImageLayout::GENERAL,
            );
        let dst = intent(
            vk::PipelineStageFlags2::COMPUTE_SHADER,
            vk::AccessFlags2::SHADER_STORAGE_READ,
            vk::ImageLayout::GENERAL,
        );
        let t = compute_transition(state, dst, true).expect("same-stage second read is a no-op, not this case");
        assert!(t.src_access.is_empty());
        assert_eq!(t.src_stage, vk::PipelineStageFlags2::COMPUTE_SHADER);
    }

    #[test]
    fn two_reader_fanout_different_stage_execution_only() {
        let after_first_read = ResourceState::undefined()
            .commit_write(
                vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            )
            .commit_read(
                vk::PipelineStageFlags2::COMPUTE_SHADER,
                vk::AccessFlags2::SHADER_SAMPLED_READ,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            );
        let second_reader = intent(
            vk::PipelineStageFlags2::FRAGMENT_SHADER,
            vk::AccessFlags2::SHADER_SAMPLED_READ,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        );
        let t = compute_transition(after_first_read, second_reader, true).unwrap();
        assert!(t.src_access.is_empty());
        assert_eq!(t.src_stage, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
    }

    #[test]
    fn write_after_two_readers_unions_reader_stages() {
        let writer = ResourceState::undefined().commit_write(
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        );
        let after_two_reads = writer
            .commit_read(
                vk::PipelineStageFlags2::COMPUTE_SHADER,
                vk::AccessFlags2::SHADER_SAMPLED_READ,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            )
            .commit_read(
                vk::PipelineStageFlags2::FRAGMENT_SHADER,
                vk::AccessFlags2::SHADER_SAMPLED_READ,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            );
        let next_writer = intent(
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        );
        let t = compute_transition(after_two_reads, next_writer, false).unwrap();
        let expect_stage = vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags2::COMPUTE_SHADER
            | vk::PipelineStageFlags2::FRAGMENT_SHADER;
        assert_eq!(t.src_stage, expect_stage);
    }

    #[test]
    fn queue_family_mismatch_is_rejected() {
        assert_eq!(check_queue_family_transition(0, 1), Some((0, 1)));
        assert_eq!(check_queue_family_transition(0, 0), None);
        assert_eq!(check_queue_family_transition(vk::QUEUE_FAMILY_IGNORED, 0), None);
    }
}
