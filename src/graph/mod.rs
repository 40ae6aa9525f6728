//! The render graph (§3 "Graph", §4): declaration, compilation, and
//! execution of a single frame's worth of passes.

pub mod compile;
pub mod execute;
pub mod stats;
pub mod structural_hash;

pub use execute::{PassContext, PreparedRenderingInfo, StateOverride};
pub use stats::{PhaseMicros, Stats};

use std::collections::HashMap;
use std::sync::Arc;

use ash::{vk, Device};
use log::debug;
use slotmap::SlotMap;

use crate::allocator::{AllocatedBuffer, AllocatedImage, GpuAllocator};
use crate::barrier::BarrierBatch;
use crate::config::{GraphConfig, PlatformCapabilities};
use crate::descriptor::allocator::DescriptorAllocator;
use crate::descriptor::reflection::ReflectionInfo;
use crate::descriptor::resolver::{LayoutCache, ResolvedSet};
use crate::error::{GraphError, GraphResult};
use crate::handle::ResourceHandle;
use crate::pass::{PassBuilder, PassDecl, PassType, PipelineBinding};
use crate::pipeline::handle::PipelineHandle;
use crate::resource::{BufferDesc, GpuHandle, ImageDesc, ResourceEntry, ResourceKind, ResourceTag, SyncTracker};
use crate::subresource_map::ImageSubresourceMap;
use crate::sync_state::ResourceState;
use crate::transient::TransientPool;

/// The topological order and structural hash from the most recent cache
/// miss, reused across frames whose structural hash is unchanged (§4.2
/// phase 3).
struct CachedSchedule {
    hash: u64,
    order: Vec<usize>,
}

/// Everything `execute()` needs, produced by the most recent `compile()`.
struct CompiledGraph {
    order: Vec<usize>,
    barriers: Vec<BarrierBatch>,
    rendering_info: Vec<Option<PreparedRenderingInfo>>,
    descriptor_sets: Vec<Vec<ResolvedSet>>,
}

/// Barriers and rendering info from the most recent compile, kept around
/// across `reset()` so a handle-stable frame can reuse them instead of
/// re-running phases 8-10 (§4.2). Unlike `CompiledGraph`, nothing here is
/// owned by the descriptor pool or layout cache that `reset()` recycles, so
/// it stays valid across a reset/redeclare cycle as long as the structural
/// hash and every external resource's raw handle are unchanged.
struct StableBarriers {
    hash: u64,
    barriers: Vec<BarrierBatch>,
    rendering_info: Vec<Option<PreparedRenderingInfo>>,
    external_handles: HashMap<String, u64>,
}

/// A single frame's render graph: declared resources and passes, compiled
/// into a barrier-correct, topologically-ordered command sequence (§3, §4).
///
/// Resources and passes are declared fresh every frame; `reset()` clears
/// both back to empty while recycling transient allocations into the
/// pool for next frame's `compile()` to reclaim.
pub struct Graph {
    device: Device,
    allocator: Arc<dyn GpuAllocator>,
    config: GraphConfig,
    capabilities: PlatformCapabilities,
    resources: SlotMap<ResourceHandle, ResourceEntry>,
    passes: Vec<PassDecl>,
    transient_pool: TransientPool,
    descriptor_allocator: DescriptorAllocator,
    layout_cache: LayoutCache,
    cached_schedule: Option<CachedSchedule>,
    compiled: Option<CompiledGraph>,
    stable_barriers: Option<StableBarriers>,
    stats: Stats,
}

impl Graph {
    /// Construct a graph with default tunables and no opportunistic
    /// platform capabilities enabled.
    pub fn new(device: Device, allocator: Arc<dyn GpuAllocator>) -> GraphResult<Self> {
        Self::with_config(device, allocator, GraphConfig::default(), PlatformCapabilities::empty())
    }

    /// Construct a graph with explicit tunables and platform capabilities
    /// (§6 `Graph::withConfig`).
    pub fn with_config(
        device: Device,
        allocator: Arc<dyn GpuAllocator>,
        config: GraphConfig,
        capabilities: PlatformCapabilities,
    ) -> GraphResult<Self> {
        let descriptor_allocator = DescriptorAllocator::new(device.clone())?;
        Ok(Self {
            resources: SlotMap::with_capacity_and_key(config.max_resources_hint),
            passes: Vec::with_capacity(config.max_passes_hint),
            transient_pool: TransientPool::default(),
            descriptor_allocator,
            layout_cache: LayoutCache::default(),
            cached_schedule: None,
            compiled: None,
            stable_barriers: None,
            stats: Stats::default(),
            device,
            allocator,
            config,
            capabilities,
        })
    }

    /// Clear declared state for the next frame, recycling this frame's
    /// transient allocations into the pool rather than destroying them
    /// (§6 `Graph::reset`).
    pub fn reset(&mut self) -> GraphResult<()> {
        let mut images = Vec::new();
        let mut buffers = Vec::new();

        for (_, entry) in self.resources.iter_mut() {
            if entry.tag != ResourceTag::Transient {
                continue;
            }
            let Some(allocation) = entry.allocation.take() else {
                continue;
            };
            match (&entry.kind, entry.gpu_handle) {
                (ResourceKind::Image(desc), GpuHandle::Image { image, view }) => {
                    images.push((*desc, AllocatedImage { image, view, allocation }));
                }
                (ResourceKind::Buffer(desc), GpuHandle::Buffer { buffer }) => {
                    buffers.push((*desc, AllocatedBuffer { buffer, allocation, mapped_ptr: None }));
                }
                _ => {}
            }
        }

        self.transient_pool.push_images(images);
        self.transient_pool.push_buffers(buffers);

        self.passes.clear();
        self.layout_cache.clear(&self.device);
        self.descriptor_allocator.reset_pools()?;
        self.resources.clear();
        // `cached_schedule` and `stable_barriers` deliberately survive a
        // reset: neither holds anything owned by the pools/caches just
        // cleared above, and `compile()` needs them intact to recognize a
        // handle-stable frame across the reset/redeclare cycle. `compiled`
        // must still be cleared — its `descriptor_sets` reference sets
        // allocated from the pool just reset.
        self.compiled = None;

        Ok(())
    }

    /// Import an image owned outside the graph, tracking its sync state
    /// from `initial_state` onward (§4.1 `importImage`).
    pub fn import_image(
        &mut self,
        name: impl Into<String>,
        desc: ImageDesc,
        image: vk::Image,
        view: vk::ImageView,
        initial_state: ResourceState,
    ) -> ResourceHandle {
        let sync = SyncTracker::Image(ImageSubresourceMap::new(desc.mip_levels, desc.array_layers, initial_state));
        self.resources.insert(ResourceEntry {
            tag: ResourceTag::External,
            kind: ResourceKind::Image(desc),
            name: name.into(),
            gpu_handle: GpuHandle::Image { image, view },
            allocation: None,
            sync,
            initial_state,
            first_pass: None,
            last_pass: None,
        })
    }

    /// Import a buffer owned outside the graph (§4.1 `importBuffer`).
    pub fn import_buffer(
        &mut self,
        name: impl Into<String>,
        desc: BufferDesc,
        buffer: vk::Buffer,
        initial_state: ResourceState,
    ) -> ResourceHandle {
        self.resources.insert(ResourceEntry {
            tag: ResourceTag::External,
            kind: ResourceKind::Buffer(desc),
            name: name.into(),
            gpu_handle: GpuHandle::Buffer { buffer },
            allocation: None,
            sync: SyncTracker::Buffer(initial_state),
            initial_state,
            first_pass: None,
            last_pass: None,
        })
    }

    /// Declare a transient image, backed by the pool once `compile()` runs
    /// phase 7 (§4.1 `createImage`).
    pub fn create_image(&mut self, name: impl Into<String>, desc: ImageDesc) -> ResourceHandle {
        let initial_state = ResourceState::undefined();
        let sync = SyncTracker::Image(ImageSubresourceMap::new(desc.mip_levels, desc.array_layers, initial_state));
        self.resources.insert(ResourceEntry {
            tag: ResourceTag::Transient,
            kind: ResourceKind::Image(desc),
            name: name.into(),
            gpu_handle: GpuHandle::Unbound,
            allocation: None,
            sync,
            initial_state,
            first_pass: None,
            last_pass: None,
        })
    }

    /// Declare a transient buffer (§4.1 `createBuffer`).
    pub fn create_buffer(&mut self, name: impl Into<String>, desc: BufferDesc) -> ResourceHandle {
        let initial_state = ResourceState::undefined();
        self.resources.insert(ResourceEntry {
            tag: ResourceTag::Transient,
            kind: ResourceKind::Buffer(desc),
            name: name.into(),
            gpu_handle: GpuHandle::Unbound,
            allocation: None,
            sync: SyncTracker::Buffer(initial_state),
            initial_state,
            first_pass: None,
            last_pass: None,
        })
    }

    /// Declare a pass with no pipeline (Layer 0/1 access only).
    pub fn add_pass(
        &mut self,
        name: impl Into<String>,
        pass_type: PassType,
        setup_fn: impl FnOnce(&mut PassBuilder<'_>),
        record_fn: impl FnMut(&PassContext<'_>, vk::CommandBuffer) + 'static,
    ) {
        let mut accesses = Vec::new();
        let mut render_target = None;
        let mut default_sampler = None;
        let mut bind_map = HashMap::new();
        let mut builder = PassBuilder::new(&mut accesses, &mut render_target, &mut default_sampler, &mut bind_map);
        setup_fn(&mut builder);

        self.passes.push(PassDecl {
            name: name.into(),
            pass_type,
            accesses,
            render_target,
            pipeline_binding: None,
            default_sampler,
            bind_map,
            record: Box::new(record_fn),
        });
    }

    /// Declare a pass bound to a pipeline, enabling Layer 2's reflection-driven
    /// `PassBuilder::bind` (§4.1 `addPass` pipeline overload).
    pub fn add_pass_pipeline(
        &mut self,
        name: impl Into<String>,
        pass_type: PassType,
        pipeline: Arc<PipelineHandle>,
        layout: vk::PipelineLayout,
        reflection: ReflectionInfo,
        setup_fn: impl FnOnce(&mut PassBuilder<'_>),
        record_fn: impl FnMut(&PassContext<'_>, vk::CommandBuffer) + 'static,
    ) {
        let mut accesses = Vec::new();
        let mut render_target = None;
        let mut default_sampler = None;
        let mut bind_map = HashMap::new();
        let mut builder = PassBuilder::new(&mut accesses, &mut render_target, &mut default_sampler, &mut bind_map);
        setup_fn(&mut builder);

        self.passes.push(PassDecl {
            name: name.into(),
            pass_type,
            accesses,
            render_target,
            pipeline_binding: Some(PipelineBinding { pipeline, layout, reflection }),
            default_sampler,
            bind_map,
            record: Box::new(record_fn),
        });
    }

    /// Replay the compiled schedule: per pass, emit its barriers, build its
    /// context, invoke its record callback, then commit any overrides it
    /// pushed (§4.3).
    pub fn execute(&mut self, cmd: vk::CommandBuffer) -> GraphResult<()> {
        let compiled = self.compiled.as_ref().ok_or(GraphError::NotCompiled)?;
        let order_len = compiled.order.len();
        let mut pending_overrides = Vec::new();

        for pos in 0..order_len {
            let compiled = self.compiled.as_ref().expect("checked above");
            let pass_idx = compiled.order[pos];
            let barriers = compiled.barriers[pos].clone();
            let rendering_info = compiled.rendering_info[pos].clone();
            let descriptor_sets = compiled.descriptor_sets[pos]
                .iter()
                .map(|s| ResolvedSet { set_index: s.set_index, descriptor_set: s.descriptor_set, layout: s.layout })
                .collect::<Vec<_>>();

            let pass = &mut self.passes[pass_idx];
            let overrides = execute::run_pass(
                &self.device,
                cmd,
                &pass.name,
                &barriers,
                &self.resources,
                rendering_info.as_ref(),
                &descriptor_sets,
                pass.record.as_mut(),
            );
            pending_overrides.extend(overrides);
        }

        for over in pending_overrides {
            self.commit_override(over);
        }

        Ok(())
    }

    /// Compile then immediately execute, the common single-call path.
    pub fn compile_and_execute(&mut self, cmd: vk::CommandBuffer) -> GraphResult<()> {
        self.compile()?;
        self.execute(cmd)
    }

    /// Compile and immediately reset, to force pipeline/descriptor-layout
    /// creation ahead of the first real frame without submitting any work.
    pub fn prewarm(&mut self) -> GraphResult<()> {
        self.compile()?;
        self.reset()
    }

    /// Timings and counters from the most recent `compile()`.
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Log every pass's barriers at debug level, for manual inspection of a
    /// compiled frame.
    pub fn dump_log(&self) {
        let Some(compiled) = &self.compiled else {
            debug!("dump_log: graph not compiled");
            return;
        };

        for (pos, &pass_idx) in compiled.order.iter().enumerate() {
            let pass = &self.passes[pass_idx];
            let batch = &compiled.barriers[pos];
            debug!(
                "pass[{pos}] '{}': {} image barrier(s), {} buffer barrier(s)",
                pass.name,
                batch.image_barriers.len(),
                batch.buffer_barriers.len(),
            );
            for b in &batch.image_barriers {
                debug!(
                    "  image {:?}: {:?} -> {:?}, {:?}@{:?} -> {:?}@{:?}",
                    b.image, b.old_layout, b.new_layout, b.src_access_mask, b.src_stage_mask, b.dst_access_mask, b.dst_stage_mask,
                );
            }
            for b in &batch.buffer_barriers {
                debug!(
                    "  buffer {:?}: {:?}@{:?} -> {:?}@{:?}",
                    b.buffer, b.src_access_mask, b.src_stage_mask, b.dst_access_mask, b.dst_stage_mask,
                );
            }
        }
    }

    fn commit_override(&mut self, over: StateOverride) {
        let Some(entry) = self.resources.get_mut(over.resource) else {
            return;
        };
        match &mut entry.sync {
            SyncTracker::Image(map) => map.set_state(over.range, over.state),
            SyncTracker::Buffer(state) => *state = over.state,
        }
    }
}
