//! Error types for the render graph and pipeline compiler.
//!
//! Mirrors the shape `rust_engine`'s `VulkanError` uses: one `thiserror`
//! enum per subsystem, every variant carrying an operation name, the
//! underlying `vk::Result` when one exists, and a human-readable message.

use ash::vk;
use thiserror::Error;

/// Errors raised while declaring or compiling a render graph.
///
/// Declaration-time errors (cycle, queue-family mismatch) and
/// resource-exhaustion errors (allocation/descriptor failures) are both
/// represented here; the graph's state is left unchanged on any of them
/// (no partial commit — see `Graph::compile`).
#[derive(Error, Debug)]
pub enum GraphError {
    /// A cycle was detected during topological sort.
    #[error("cycle detected among passes: {passes:?}")]
    CycleDetected {
        /// Indices (declaration order) of passes left unsorted by Kahn's algorithm.
        passes: Vec<usize>,
    },

    /// An access declared a transition across queue families, which this
    /// graph does not support (single-queue-family Non-goal).
    #[error("queue-family transition rejected for resource {resource:?}: {src} -> {dst}")]
    QueueFamilyTransitionRejected {
        /// The resource whose access declared the transition.
        resource: crate::handle::ResourceHandle,
        /// Source queue family index.
        src: u32,
        /// Destination queue family index.
        dst: u32,
    },

    /// A `ResourceHandle` was used that was not created by this graph
    /// instance, or was created in a prior `reset()` generation.
    #[error("stale or foreign resource handle: {0:?}")]
    StaleHandle(crate::handle::ResourceHandle),

    /// Transient image or buffer allocation failed.
    #[error("transient allocation failed for '{name}': {source:?}")]
    TransientAllocationFailed {
        /// Debug name of the resource that failed to allocate, with the
        /// allocator's own error message folded in when it came from
        /// `vk-mem` (which doesn't expose a Vulkan result code).
        name: String,
        /// `Some` only when the failure came from a raw Vulkan call (e.g.
        /// image view creation) rather than from `vk-mem`'s own allocator.
        source: Option<vk::Result>,
    },

    /// Descriptor set layout creation failed.
    #[error("descriptor set layout creation failed: {0:?}")]
    DescriptorSetLayoutCreationFailed(vk::Result),

    /// Descriptor set allocation failed (pool exhausted and growth failed).
    #[error("descriptor set allocation failed: {0:?}")]
    DescriptorSetAllocationFailed(vk::Result),

    /// `execute()` was called before a successful `compile()`.
    #[error("execute() called on an uncompiled graph")]
    NotCompiled,

    /// A raw Vulkan API call failed.
    #[error("vulkan API error during '{operation}': {result:?}")]
    Api {
        /// Name of the operation being attempted.
        operation: &'static str,
        /// The Vulkan result code.
        result: vk::Result,
    },
}

/// Result alias for render graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors surfaced by the pipeline compiler.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Reading SPIR-V bytes from disk or an embedded source failed.
    #[error("failed to read SPIR-V for '{path}': {message}")]
    SpirvReadFailed {
        /// Path or identifier of the SPIR-V source.
        path: String,
        /// Underlying I/O error message.
        message: String,
    },

    /// `vkCreateShaderModule` failed.
    #[error("shader module creation failed: {0:?}")]
    ShaderModuleCreationFailed(vk::Result),

    /// `vkCreateGraphicsPipelines` (monolithic or GPL fast-link/optimize) failed.
    #[error("pipeline creation failed during {stage:?}: {result:?}")]
    PipelineCreationFailed {
        /// Which acquisition stage failed.
        stage: PipelineStage,
        /// The Vulkan result code.
        result: vk::Result,
    },

    /// `vkCreatePipelineLayout` failed.
    #[error("pipeline layout creation failed: {0:?}")]
    PipelineLayoutCreationFailed(vk::Result),

    /// A cache probe failed with a code other than "compile required".
    #[error("pipeline cache probe failed: {0:?}")]
    CacheProbeFailed(vk::Result),
}

/// Which step of pipeline acquisition an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// The cache-probe attempt (`PIPELINE_COMPILE_REQUIRED` expected).
    CacheProbe,
    /// Monolithic synchronous build.
    Monolithic,
    /// GPL fast-link of the four library parts.
    FastLink,
    /// GPL background optimization re-link.
    Optimize,
    /// Building one of the four GPL library parts.
    LibraryPart,
}

/// Result alias for pipeline compiler operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Unifies `GraphError` and `PipelineError` so a caller driving both a
/// `Graph` and a `PipelineCompiler` in the same function can propagate
/// either with a single `?`.
#[derive(Error, Debug)]
pub enum RenderGraphError {
    /// A render graph declaration or compilation error.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// A pipeline compiler error.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Result alias for call sites that mix graph and pipeline-compiler calls.
pub type RenderGraphResult<T> = Result<T, RenderGraphError>;
