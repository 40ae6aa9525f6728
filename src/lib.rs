//! A frame-granularity Vulkan 1.3 render graph compiler and GPL-backed
//! pipeline compiler.
//!
//! [`graph::Graph`] is the entry point: declare resources and passes every
//! frame, `compile()` to resolve barriers/descriptors/transient backing
//! storage, then `execute()` to replay the compiled schedule onto a command
//! buffer. [`pipeline::PipelineCompiler`] builds and hot-swaps pipelines
//! independently of the graph, handing back an [`pipeline::PipelineHandle`]
//! that a pass can bind.

pub mod allocator;
pub mod barrier;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod graph;
pub mod handle;
pub mod hash;
pub mod pass;
pub mod pipeline;
pub mod resource;
pub mod subresource_map;
pub mod subresource_range;
pub mod sync_state;
pub mod transient;

pub use allocator::{AllocatedBuffer, AllocatedImage, GpuAllocator, VkMemAllocator};
pub use config::{GraphConfig, PipelineCompilerPolicy, PlatformCapabilities};
pub use error::{
    GraphError, GraphResult, PipelineError, PipelineResult, PipelineStage, RenderGraphError, RenderGraphResult,
};
pub use graph::{Graph, PassContext, PhaseMicros, Stats};
pub use handle::ResourceHandle;
pub use pass::{AccessDecl, PassBuilder, PassType};
pub use pipeline::{PipelineCompiler, PipelineHandle, PipelineRecipe, ShaderSource};
pub use resource::{BufferDesc, GpuHandle, ImageDesc, ResourceTag};
pub use sync_state::{AccessType, ResourceState};
