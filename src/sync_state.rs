//! Resource synchronization state (§3 "ResourceState").
//!
//! A `ResourceState` records the last write to a resource (or subresource
//! slice) and the union of every read since that write. The barrier
//! compiler (`crate::barrier`) consumes a source/destination pair of these
//! to decide what, if anything, needs to be emitted between two accesses.

use ash::vk;

/// The synchronization state of a resource or resource slice at a point in
/// the declared pass order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceState {
    /// Pipeline stage of the write that last dirtied this resource.
    pub last_write_stage: vk::PipelineStageFlags2,
    /// Access mask of the write that last dirtied this resource.
    pub last_write_access: vk::AccessFlags2,
    /// Union of every reader stage since `last_write_stage`.
    pub read_stages_since_write: vk::PipelineStageFlags2,
    /// Union of every reader access mask since `last_write_access`.
    pub read_access_since_write: vk::AccessFlags2,
    /// Current image layout. Ignored for buffers.
    pub current_layout: vk::ImageLayout,
    /// Owning queue family, or `vk::QUEUE_FAMILY_IGNORED` if untracked.
    pub queue_family: u32,
}

impl ResourceState {
    /// The state of a resource that has never been written or read —
    /// used as the initial state of a transient resource at allocation.
    pub const fn undefined() -> Self {
        Self {
            last_write_stage: vk::PipelineStageFlags2::TOP_OF_PIPE,
            last_write_access: vk::AccessFlags2::empty(),
            read_stages_since_write: vk::PipelineStageFlags2::empty(),
            read_access_since_write: vk::AccessFlags2::empty(),
            current_layout: vk::ImageLayout::UNDEFINED,
            queue_family: vk::QUEUE_FAMILY_IGNORED,
        }
    }

    /// Construct the initial state for an imported resource.
    pub const fn imported(
        layout: vk::ImageLayout,
        stage: vk::PipelineStageFlags2,
        access: vk::AccessFlags2,
        queue_family: u32,
    ) -> Self {
        Self {
            last_write_stage: stage,
            last_write_access: access,
            read_stages_since_write: vk::PipelineStageFlags2::empty(),
            read_access_since_write: vk::AccessFlags2::empty(),
            current_layout: layout,
            queue_family,
        }
    }

    /// True if `stage` is already a member of `read_stages_since_write`,
    /// meaning a prior barrier already made the writer's output visible to
    /// it — the "multi-reader fan-out" idiom from §4.4.
    pub fn already_visible_to(&self, stage: vk::PipelineStageFlags2) -> bool {
        !self.read_stages_since_write.is_empty() && self.read_stages_since_write.contains(stage)
    }

    /// True if any write is pending (there has been a write since the
    /// resource was last fully consumed/reset).
    pub fn has_pending_write(&self) -> bool {
        !self.last_write_access.is_empty() || self.last_write_stage != vk::PipelineStageFlags2::TOP_OF_PIPE
    }

    /// Commit a read into this state: merge the reader's stage/access into
    /// the "since write" union, preserving the writer info (§4.2 step 9).
    pub fn commit_read(
        &self,
        stage: vk::PipelineStageFlags2,
        access: vk::AccessFlags2,
        layout: vk::ImageLayout,
    ) -> Self {
        Self {
            last_write_stage: self.last_write_stage,
            last_write_access: self.last_write_access,
            read_stages_since_write: self.read_stages_since_write | stage,
            read_access_since_write: self.read_access_since_write | access,
            current_layout: layout,
            queue_family: self.queue_family,
        }
    }

    /// Commit a write into this state: the new state becomes
    /// (writer stage, writer access, no readers, new layout).
    pub fn commit_write(
        &self,
        stage: vk::PipelineStageFlags2,
        access: vk::AccessFlags2,
        layout: vk::ImageLayout,
    ) -> Self {
        Self {
            last_write_stage: stage,
            last_write_access: access,
            read_stages_since_write: vk::PipelineStageFlags2::empty(),
            read_access_since_write: vk::AccessFlags2::empty(),
            current_layout: layout,
            queue_family: self.queue_family,
        }
    }

    /// Merge two states covering overlapping ranges, for
    /// `ImageSubresourceMap::queryState`. Stage/access masks are OR'd;
    /// layout is taken from `self` (callers only merge ranges that are
    /// consistent after an appropriate barrier, per §4.5).
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            last_write_stage: self.last_write_stage | other.last_write_stage,
            last_write_access: self.last_write_access | other.last_write_access,
            read_stages_since_write: self.read_stages_since_write | other.read_stages_since_write,
            read_access_since_write: self.read_access_since_write | other.read_access_since_write,
            current_layout: self.current_layout,
            queue_family: self.queue_family,
        }
    }
}

/// How a pass touches a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    /// Read-only access.
    Read,
    /// Write-only access.
    Write,
    /// Simultaneous read and write (e.g. a storage image read-modify-write).
    ReadWrite,
}

impl AccessType {
    /// True for `Write` and `ReadWrite`.
    pub fn is_write(self) -> bool {
        matches!(self, AccessType::Write | AccessType::ReadWrite)
    }

    /// True for `Read` and `ReadWrite`.
    pub fn is_read(self) -> bool {
        matches!(self, AccessType::Read | AccessType::ReadWrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_reader_is_not_already_visible() {
        let state = ResourceState::undefined();
        assert!(!state.already_visible_to(vk::PipelineStageFlags2::COMPUTE_SHADER));
    }

    #[test]
    fn commit_read_then_same_stage_is_visible() {
        let state = ResourceState::undefined().commit_write(
            vk::PipelineStageFlags2::COMPUTE_SHADER,
            vk::AccessFlags2::SHADER_STORAGE_WRITE,
            vk::ImageLayout::GENERAL,
        );
        let after_read = state.commit_read(
            vk::PipelineStageFlags2::FRAGMENT_SHADER,
            vk::AccessFlags2::SHADER_STORAGE_READ,
            vk::ImageLayout::GENERAL,
        );
        assert!(after_read.already_visible_to(vk::PipelineStageFlags2::FRAGMENT_SHADER));
        assert!(!after_read.already_visible_to(vk::PipelineStageFlags2::COMPUTE_SHADER));
    }

    #[test]
    fn commit_write_clears_pending_readers() {
        let state = ResourceState::undefined()
            .commit_write(
                vk::PipelineStageFlags2::COMPUTE_SHADER,
                vk::AccessFlags2::SHADER_STORAGE_WRITE,
                vk::ImageLayout::GENERAL,
            )
            .commit_read(
                vk::PipelineStageFlags2::FRAGMENT_SHADER,
                vk::AccessFlags2::SHADER_STORAGE_READ,
                vk::ImageLayout::GENERAL,
            )
            .commit_write(
                vk::PipelineStageFlags2::COMPUTE_SHADER,
                vk::AccessFlags2::SHADER_STORAGE_WRITE,
                vk::ImageLayout::GENERAL,
            );
        assert!(state.read_stages_since_write.is_empty());
    }
}
