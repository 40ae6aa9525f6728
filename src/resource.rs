//! Resource declarations (§3 "ResourceEntry").

use ash::vk;

use crate::handle::ResourceHandle;
use crate::subresource_map::ImageSubresourceMap;
use crate::sync_state::ResourceState;

/// Whether a resource is owned by the graph or came from outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceTag {
    /// Owned outside the graph; the graph only tracks its sync state.
    External,
    /// Declared inside the graph; lifetime is a single frame, backed by the
    /// transient pool.
    Transient,
}

/// Declaration-time description of a transient image (§4.1 `createImage`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Pixel format.
    pub format: vk::Format,
    /// Usage flags. May start at `empty()`; accumulated from access layouts
    /// during compile (§4.2 phase 2).
    pub usage: vk::ImageUsageFlags,
    /// Mip level count.
    pub mip_levels: u32,
    /// Array layer count.
    pub array_layers: u32,
    /// Sample count.
    pub sample_count: vk::SampleCountFlags,
    /// Aspect mask (color, depth, stencil, or depth|stencil).
    pub aspect: vk::ImageAspectFlags,
}

impl ImageDesc {
    /// Byte-identical check used by the transient pool's slow-path scan
    /// (§4.2 phase 7) — usage is excluded since it is accumulated after the
    /// descriptor is first declared and the pool compares pre-accumulation
    /// shape (dimensions/format/mips/layers/samples/aspect).
    pub fn same_shape(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.format == other.format
            && self.mip_levels == other.mip_levels
            && self.array_layers == other.array_layers
            && self.sample_count == other.sample_count
            && self.aspect == other.aspect
    }
}

/// Declaration-time description of a transient buffer (§4.1 `createBuffer`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    /// Size in bytes.
    pub size: vk::DeviceSize,
    /// Usage flags, accumulated from access masks during compile.
    pub usage: vk::BufferUsageFlags,
}

impl BufferDesc {
    /// Byte-identical shape check for the transient pool's slow path.
    pub fn same_shape(&self, other: &Self) -> bool {
        self.size == other.size
    }
}

/// The concrete GPU handle backing a resource.
#[derive(Debug, Clone, Copy)]
pub enum GpuHandle {
    /// An image plus the view the graph uses for attachments/bindings.
    Image { image: vk::Image, view: vk::ImageView },
    /// A buffer.
    Buffer { buffer: vk::Buffer },
    /// Declared but not yet allocated (transient, pre-compile).
    Unbound,
}

/// One row of the graph's resource table (§3 "ResourceEntry").
pub struct ResourceEntry {
    /// External vs. transient.
    pub tag: ResourceTag,
    /// Image or buffer description.
    pub kind: ResourceKind,
    /// Debug name, used only in diagnostics and error messages.
    pub name: String,
    /// The concrete GPU handle.
    pub gpu_handle: GpuHandle,
    /// The allocator-owned token backing `gpu_handle`, present only for
    /// transient resources once §4.2 phase 7 has allocated them. `None` for
    /// external resources (never owned by the graph) and for transients not
    /// yet allocated this frame.
    pub allocation: Option<vk_mem::Allocation>,
    /// The resource's synchronization state at compile time.
    pub sync: SyncTracker,
    /// The synchronization state this resource entered the graph with
    /// (used to reset external resources' tracking to a known point, and
    /// to initialize a freshly-allocated transient).
    pub initial_state: ResourceState,
    /// Position (in topological order) of the first pass that touches
    /// this resource, filled during §4.2 phase 6.
    pub first_pass: Option<usize>,
    /// Position of the last pass that touches this resource.
    pub last_pass: Option<usize>,
}

/// Per-resource-kind data and state tracker.
pub enum ResourceKind {
    /// An image resource: its declared shape plus a subresource map.
    Image(ImageDesc),
    /// A buffer resource: its declared shape.
    Buffer(BufferDesc),
}

/// The live synchronization tracker for a resource: a full subresource map
/// for images, a single state for buffers (§4.2 phase 8).
pub enum SyncTracker {
    /// Per-(mip,layer) tracking.
    Image(ImageSubresourceMap),
    /// Single whole-resource tracking.
    Buffer(ResourceState),
}

impl ResourceEntry {
    /// The resource's display name, for error messages and `dump_log`.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A back-reference pairing a `ResourceHandle` with its declared kind, used
/// when iterating the resource table during adjacency construction.
#[derive(Debug, Clone, Copy)]
pub struct ResourceRef {
    /// The handle.
    pub handle: ResourceHandle,
}
