//! `Graph::compile()` (§4.2): the eleven timed phases, run in order.

use std::collections::{HashMap, VecDeque};

use ash::vk;
use ash::vk::Handle;
use log::debug;

use crate::barrier::{self, BarrierBatch};
use crate::config::PlatformCapabilities;
use crate::descriptor::resolver::{self, BoundView, ResolvedSet};
use crate::error::{GraphError, GraphResult};
use crate::graph::execute::PreparedRenderingInfo;
use crate::graph::stats::{self, Stats};
use crate::graph::structural_hash;
use crate::graph::{CachedSchedule, CompiledGraph, Graph, StableBarriers};
use crate::handle::ResourceHandle;
use crate::resource::{BufferDesc, GpuHandle, ImageDesc, ResourceEntry, ResourceKind, ResourceTag, SyncTracker};
use crate::sync_state::AccessType;

impl Graph {
    /// Compile the declared passes into a ready-to-execute command list
    /// (§4.2). Leaves the graph's declared state untouched on error — a
    /// failed compile never partially commits.
    pub fn compile(&mut self) -> GraphResult<()> {
        let compile_start = std::time::Instant::now();
        let mut stats = Stats { pass_count: self.passes.len(), ..Stats::default() };

        stats::timed(&mut stats.resolve, || self.resolve_subresources());
        stats::timed(&mut stats.usage, || self.accumulate_transient_usage());

        let hash = stats::timed(&mut stats.hash, || structural_hash::compute(&self.passes, &self.resources));

        let cache_hit = self.cached_schedule.as_ref().is_some_and(|c| c.hash == hash);
        stats.cache_hit = cache_hit;

        let order = if cache_hit {
            self.cached_schedule.as_ref().expect("cache_hit implies a cached schedule").order.clone()
        } else {
            let adjacency = stats::timed(&mut stats.adjacency, || self.build_adjacency());
            let order = stats::timed(&mut stats.sort, || Self::topological_sort(&adjacency))?;
            stats::timed(&mut stats.lifetime, || self.compute_lifetimes(&order));
            self.cached_schedule = Some(CachedSchedule { hash, order: order.clone() });
            order
        };

        let transient_allocations = stats::timed(&mut stats.alloc, || self.allocate_transients())?;
        stats.transient_allocations = transient_allocations;

        // A frame is handle-stable only if the schedule hit cache, no new
        // transient backing storage was allocated, and every externally
        // imported resource's raw Vulkan handle is unchanged since the
        // barriers/rendering info now cached in `stable_barriers` were
        // built for it. The third check catches the case a caller re-
        // imports a swapchain image under a different `vk::Image` behind
        // the same resource name.
        let externally_stable = self
            .stable_barriers
            .as_ref()
            .is_some_and(|c| c.hash == hash && !self.external_handles_changed(&c.external_handles));
        stats.handle_stable = cache_hit && transient_allocations == 0 && externally_stable;

        let (barriers, rendering_info) = if stats.handle_stable {
            let cached = self.stable_barriers.as_ref().expect("handle_stable implies cached barriers");
            (cached.barriers.clone(), cached.rendering_info.clone())
        } else {
            stats::timed(&mut stats.state_init, || self.init_state_trackers());
            let barriers = stats::timed(&mut stats.barriers, || self.compile_barriers(&order))?;
            let rendering_info = stats::timed(&mut stats.render_targets, || self.resolve_render_targets(&order))?;
            (barriers, rendering_info)
        };

        stats.image_barrier_count = barriers.iter().map(|b| b.image_barriers.len()).sum();
        stats.buffer_barrier_count = barriers.iter().map(|b| b.buffer_barriers.len()).sum();

        // Descriptor sets are always re-resolved: they're allocated from
        // `descriptor_allocator`'s pools, which `reset()` recycles every
        // frame regardless of handle stability, so there's nothing from a
        // prior frame that could safely be reused here.
        let descriptor_sets = stats::timed(&mut stats.descriptors, || self.resolve_descriptors(&order))?;

        self.stable_barriers = Some(StableBarriers {
            hash,
            barriers: barriers.clone(),
            rendering_info: rendering_info.clone(),
            external_handles: self.external_handle_snapshot(),
        });

        self.compiled = Some(CompiledGraph { order, barriers, rendering_info, descriptor_sets });
        stats.compile_time = compile_start.elapsed().into();
        self.stats = stats;

        debug!(
            "compile(): {} passes, {} image barriers, {} buffer barriers, cache_hit={}, handle_stable={}",
            self.stats.pass_count,
            self.stats.image_barrier_count,
            self.stats.buffer_barrier_count,
            self.stats.cache_hit,
            self.stats.handle_stable,
        );

        Ok(())
    }

    /// Raw Vulkan handle value of every externally imported resource, keyed
    /// by declared name, used to detect whether `stable_barriers` is still
    /// valid for the current set of external resources (§4.2 handle-
    /// stability fast path).
    fn external_handle_snapshot(&self) -> HashMap<String, u64> {
        self.resources
            .iter()
            .filter(|(_, e)| e.tag == ResourceTag::External)
            .map(|(_, e)| (e.name.clone(), raw_handle_value(e.gpu_handle)))
            .collect()
    }

    fn external_handles_changed(&self, prev: &HashMap<String, u64>) -> bool {
        self.external_handle_snapshot() != *prev
    }

    // ---- Phase 1: subresource resolution -----------------------------

    fn resolve_subresources(&mut self) {
        let resources = &self.resources;
        for pass in &mut self.passes {
            for access in &mut pass.accesses {
                if let Some(ResourceKind::Image(desc)) = resources.get(access.resource).map(|e| &e.kind) {
                    access.range = access.range.resolved(desc.mip_levels, desc.array_layers);
                }
            }
        }
    }

    // ---- Phase 2: transient usage accumulation -----------------------

    fn accumulate_transient_usage(&mut self) {
        let mut image_usage: HashMap<ResourceHandle, vk::ImageUsageFlags> = HashMap::new();
        let mut buffer_usage: HashMap<ResourceHandle, vk::BufferUsageFlags> = HashMap::new();

        for pass in &self.passes {
            for access in &pass.accesses {
                match self.resources.get(access.resource).map(|e| &e.kind) {
                    Some(ResourceKind::Image(_)) => {
                        let usage = image_usage_for(access.desired.layout, access.desired.access);
                        *image_usage.entry(access.resource).or_insert_with(vk::ImageUsageFlags::empty) |= usage;
                    }
                    Some(ResourceKind::Buffer(_)) => {
                        let usage = buffer_usage_for(access.desired.access);
                        *buffer_usage.entry(access.resource).or_insert_with(vk::BufferUsageFlags::empty) |= usage;
                    }
                    None => {}
                }
            }
        }

        for (handle, usage) in image_usage {
            if let Some(entry) = self.resources.get_mut(handle) {
                if entry.tag == ResourceTag::Transient {
                    if let ResourceKind::Image(desc) = &mut entry.kind {
                        desc.usage |= usage;
                    }
                }
            }
        }
        for (handle, usage) in buffer_usage {
            if let Some(entry) = self.resources.get_mut(handle) {
                if entry.tag == ResourceTag::Transient {
                    if let ResourceKind::Buffer(desc) = &mut entry.kind {
                        desc.usage |= usage;
                    }
                }
            }
        }
    }

    // ---- Phase 4: adjacency construction ------------------------------

    fn build_adjacency(&self) -> Vec<Vec<usize>> {
        let n = self.passes.len();
        let mut writers: HashMap<ResourceHandle, Vec<usize>> = HashMap::new();
        let mut readers: HashMap<ResourceHandle, Vec<usize>> = HashMap::new();

        for (i, pass) in self.passes.iter().enumerate() {
            for access in &pass.accesses {
                if access.access_type.is_write() {
                    writers.entry(access.resource).or_default().push(i);
                }
                if access.access_type.is_read() {
                    readers.entry(access.resource).or_default().push(i);
                }
            }
        }

        let mut edges = vec![vec![false; n]; n];

        for (resource, w) in &writers {
            if let Some(r) = readers.get(resource) {
                for &wi in w {
                    for &ri in r {
                        if wi < ri {
                            edges[wi][ri] = true;
                        }
                    }
                }
            }
            let mut sorted = w.clone();
            sorted.sort_unstable();
            for pair in sorted.windows(2) {
                edges[pair[0]][pair[1]] = true;
            }
        }
        for (resource, r) in &readers {
            if let Some(w) = writers.get(resource) {
                for &ri in r {
                    for &wi in w {
                        if ri < wi {
                            edges[ri][wi] = true;
                        }
                    }
                }
            }
        }

        (0..n).map(|i| (0..n).filter(|&j| edges[i][j]).collect()).collect()
    }

    // ---- Phase 5: topological sort (Kahn's algorithm, FIFO-stable) ---

    fn topological_sort(adjacency: &[Vec<usize>]) -> GraphResult<Vec<usize>> {
        let n = adjacency.len();
        let mut indegree = vec![0usize; n];
        for edges in adjacency {
            for &to in edges {
                indegree[to] += 1;
            }
        }

        let mut queue: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        let mut seen = vec![false; n];

        while let Some(i) = queue.pop_front() {
            order.push(i);
            seen[i] = true;
            for &to in &adjacency[i] {
                indegree[to] -= 1;
                if indegree[to] == 0 {
                    queue.push_back(to);
                }
            }
        }

        if order.len() < n {
            let remaining: Vec<usize> = (0..n).filter(|&i| !seen[i]).collect();
            return Err(GraphError::CycleDetected { passes: remaining });
        }

        Ok(order)
    }

    // ---- Phase 6: lifetime computation --------------------------------

    fn compute_lifetimes(&mut self, order: &[usize]) {
        let mut position = vec![0usize; order.len()];
        for (pos, &pass_idx) in order.iter().enumerate() {
            position[pass_idx] = pos;
        }

        let mut first: HashMap<ResourceHandle, usize> = HashMap::new();
        let mut last: HashMap<ResourceHandle, usize> = HashMap::new();

        for (pass_idx, pass) in self.passes.iter().enumerate() {
            let pos = position[pass_idx];
            for access in &pass.accesses {
                first.entry(access.resource).and_modify(|p| *p = (*p).min(pos)).or_insert(pos);
                last.entry(access.resource).and_modify(|p| *p = (*p).max(pos)).or_insert(pos);
            }
        }

        let handles: Vec<ResourceHandle> = self.resources.keys().collect();
        for handle in handles {
            if let Some(entry) = self.resources.get_mut(handle) {
                entry.first_pass = first.get(&handle).copied();
                entry.last_pass = last.get(&handle).copied();
            }
        }
    }

    // ---- Phase 7: transient allocation --------------------------------

    fn allocate_transients(&mut self) -> GraphResult<usize> {
        let image_handles: Vec<ResourceHandle> = self
            .resources
            .iter()
            .filter(|(_, e)| e.tag == ResourceTag::Transient && matches!(e.kind, ResourceKind::Image(_)))
            .map(|(h, _)| h)
            .collect();
        let buffer_handles: Vec<ResourceHandle> = self
            .resources
            .iter()
            .filter(|(_, e)| e.tag == ResourceTag::Transient && matches!(e.kind, ResourceKind::Buffer(_)))
            .map(|(h, _)| h)
            .collect();

        let image_fast = self.transient_pool.image_fast_path_eligible(image_handles.len());
        let buffer_fast = self.transient_pool.buffer_fast_path_eligible(buffer_handles.len());
        let mut new_allocations = 0usize;

        for (i, &handle) in image_handles.iter().enumerate() {
            let desc = match &self.resources[handle].kind {
                ResourceKind::Image(d) => *d,
                ResourceKind::Buffer(_) => unreachable!("filtered to images above"),
            };

            let allocated = if image_fast {
                self.transient_pool.take_image_fast(i)
            } else if let Some(found) = self.transient_pool.find_image_slow(&desc) {
                found
            } else {
                new_allocations += 1;
                let (create_info, view_info) = image_create_info(&desc);
                self.allocator.create_image(&create_info, &view_info)?
            };

            let entry = &mut self.resources[handle];
            entry.gpu_handle = GpuHandle::Image { image: allocated.image, view: allocated.view };
            entry.allocation = Some(allocated.allocation);
        }

        for (i, &handle) in buffer_handles.iter().enumerate() {
            let desc = match &self.resources[handle].kind {
                ResourceKind::Buffer(d) => *d,
                ResourceKind::Image(_) => unreachable!("filtered to buffers above"),
            };

            let allocated = if buffer_fast {
                self.transient_pool.take_buffer_fast(i)
            } else if let Some(found) = self.transient_pool.find_buffer_slow(&desc) {
                found
            } else {
                new_allocations += 1;
                let create_info = buffer_create_info(&desc);
                self.allocator.create_buffer(&create_info, false)?
            };

            let entry = &mut self.resources[handle];
            entry.gpu_handle = GpuHandle::Buffer { buffer: allocated.buffer };
            entry.allocation = Some(allocated.allocation);
        }

        self.transient_pool.destroy_unmatched(self.allocator.as_ref());
        Ok(new_allocations)
    }

    // ---- Phase 8: state tracker initialization ------------------------

    fn init_state_trackers(&mut self) {
        for (_, entry) in self.resources.iter_mut() {
            if entry.tag != ResourceTag::Transient {
                continue;
            }
            let initial = entry.initial_state;
            match (&entry.kind, &mut entry.sync) {
                (ResourceKind::Image(desc), SyncTracker::Image(map)) => {
                    map.reset_state(desc.mip_levels, desc.array_layers, initial);
                }
                (ResourceKind::Buffer(_), SyncTracker::Buffer(state)) => {
                    *state = initial;
                }
                _ => {}
            }
        }
    }

    // ---- Phase 9: barrier compilation ---------------------------------

    fn compile_barriers(&mut self, order: &[usize]) -> GraphResult<Vec<BarrierBatch>> {
        let unified_layouts = self.capabilities.contains(PlatformCapabilities::UNIFIED_IMAGE_LAYOUTS);
        let mut batches = Vec::with_capacity(order.len());

        for &pass_idx in order {
            let mut batch = BarrierBatch::default();
            let accesses = self.passes[pass_idx].accesses.clone();

            for access in &accesses {
                let is_read_only = access.access_type == AccessType::Read;
                let entry = self.resources.get_mut(access.resource).ok_or(GraphError::StaleHandle(access.resource))?;

                match (&entry.kind, &mut entry.sync, entry.gpu_handle) {
                    (ResourceKind::Image(desc), SyncTracker::Image(map), GpuHandle::Image { image, .. }) => {
                        let aspect = desc.aspect;
                        let overlaps = map.query_slices_overlapping(access.range);
                        for (clipped, mut src) in overlaps {
                            let mut dst = access.desired;
                            if unified_layouts && src.current_layout != vk::ImageLayout::UNDEFINED {
                                src.current_layout = vk::ImageLayout::GENERAL;
                                dst.layout = vk::ImageLayout::GENERAL;
                            }

                            barrier::append_image_barrier(&mut batch, image, aspect, clipped, src, dst, is_read_only)
                                .map_err(|(s, d)| GraphError::QueueFamilyTransitionRejected {
                                    resource: access.resource,
                                    src: s,
                                    dst: d,
                                })?;

                            let committed = if is_read_only {
                                src.commit_read(dst.stage, dst.access, dst.layout)
                            } else {
                                src.commit_write(dst.stage, dst.access, dst.layout)
                            };
                            map.set_state(clipped, committed);
                        }
                    }
                    (ResourceKind::Buffer(_), SyncTracker::Buffer(state), GpuHandle::Buffer { buffer }) => {
                        let src = *state;
                        let dst = access.desired;
                        barrier::append_buffer_barrier(&mut batch, buffer, 0, vk::WHOLE_SIZE, src, dst, is_read_only)
                            .map_err(|(s, d)| GraphError::QueueFamilyTransitionRejected {
                                resource: access.resource,
                                src: s,
                                dst: d,
                            })?;
                        *state = if is_read_only {
                            src.commit_read(dst.stage, dst.access, dst.layout)
                        } else {
                            src.commit_write(dst.stage, dst.access, dst.layout)
                        };
                    }
                    _ => {}
                }
            }

            batches.push(batch);
        }

        Ok(batches)
    }

    // ---- Phase 10: render-target resolution ---------------------------

    fn resolve_render_targets(&self, order: &[usize]) -> GraphResult<Vec<Option<PreparedRenderingInfo>>> {
        let mut result = Vec::with_capacity(order.len());

        for (pos, &pass_idx) in order.iter().enumerate() {
            let pass = &self.passes[pass_idx];
            let Some(rt) = &pass.render_target else {
                result.push(None);
                continue;
            };

            let mut render_area = vk::Rect2D::default();
            let mut found_extent = false;
            let mut color_attachments = Vec::with_capacity(rt.color.len());

            for slot in &rt.color {
                match slot {
                    Some(c) => {
                        let entry = self.resources.get(c.resource).ok_or(GraphError::StaleHandle(c.resource))?;
                        let (view, width, height) = image_view_and_extent(entry, c.resource)?;
                        if !found_extent {
                            render_area.extent = vk::Extent2D { width, height };
                            found_extent = true;
                        }
                        let store_op = store_op_for(entry, pos);
                        color_attachments.push(Some(
                            vk::RenderingAttachmentInfo::builder()
                                .image_view(view)
                                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                                .load_op(c.load_op)
                                .store_op(store_op)
                                .clear_value(vk::ClearValue { color: c.clear_value })
                                .build(),
                        ));
                    }
                    None => color_attachments.push(None),
                }
            }

            let depth_attachment = match &rt.depth {
                Some(d) => {
                    let entry = self.resources.get(d.resource).ok_or(GraphError::StaleHandle(d.resource))?;
                    let (view, width, height) = image_view_and_extent(entry, d.resource)?;
                    if !found_extent {
                        render_area.extent = vk::Extent2D { width, height };
                        found_extent = true;
                    }
                    let layout = match d.depth_write {
                        crate::pass::DepthWrite::Enabled => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
                        crate::pass::DepthWrite::ReadOnly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
                    };
                    let store_op = store_op_for(entry, pos);
                    Some(
                        vk::RenderingAttachmentInfo::builder()
                            .image_view(view)
                            .image_layout(layout)
                            .load_op(d.load_op)
                            .store_op(store_op)
                            .clear_value(vk::ClearValue {
                                depth_stencil: vk::ClearDepthStencilValue { depth: d.clear_depth, stencil: d.clear_stencil },
                            })
                            .build(),
                    )
                }
                None => None,
            };

            result.push(Some(PreparedRenderingInfo { render_area, color_attachments, depth_attachment }));
        }

        Ok(result)
    }

    // ---- Phase 11: descriptor resolution -------------------------------

    fn resolve_descriptors(&mut self, order: &[usize]) -> GraphResult<Vec<Vec<ResolvedSet>>> {
        let mut result = Vec::with_capacity(order.len());

        for &pass_idx in order {
            let pass = &self.passes[pass_idx];
            let Some(binding) = &pass.pipeline_binding else {
                result.push(Vec::new());
                continue;
            };

            let mut bound_views: HashMap<String, BoundView> = HashMap::new();
            for (name, bind_entry) in &pass.bind_map {
                let Some(entry) = self.resources.get(bind_entry.resource) else {
                    return Err(GraphError::StaleHandle(bind_entry.resource));
                };
                let access_layout =
                    pass.accesses.iter().find(|a| a.resource == bind_entry.resource).map(|a| a.desired.layout);

                match entry.gpu_handle {
                    GpuHandle::Image { view, .. } => {
                        let layout = access_layout.unwrap_or(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
                        bound_views.insert(name.clone(), BoundView::Image { view, layout, sampler: bind_entry.sampler_override });
                    }
                    GpuHandle::Buffer { buffer } => {
                        let range = match &entry.kind {
                            ResourceKind::Buffer(desc) => desc.size,
                            ResourceKind::Image(_) => vk::WHOLE_SIZE,
                        };
                        bound_views.insert(name.clone(), BoundView::Buffer { buffer, offset: 0, range });
                    }
                    GpuHandle::Unbound => continue,
                }
            }

            let resolved = resolver::resolve_pass_descriptors(
                &self.device,
                &mut self.descriptor_allocator,
                &mut self.layout_cache,
                &binding.reflection,
                &pass.bind_map,
                &bound_views,
                pass.default_sampler,
                self.config.strict_bind_map,
            )?;
            result.push(resolved);
        }

        Ok(result)
    }
}

fn image_view_and_extent(entry: &ResourceEntry, resource: ResourceHandle) -> GraphResult<(vk::ImageView, u32, u32)> {
    match (&entry.kind, entry.gpu_handle) {
        (ResourceKind::Image(desc), GpuHandle::Image { view, .. }) => Ok((view, desc.width, desc.height)),
        _ => Err(GraphError::StaleHandle(resource)),
    }
}

fn store_op_for(entry: &ResourceEntry, pos: usize) -> vk::AttachmentStoreOp {
    match entry.tag {
        // Open question resolved: STORE is preserved unconditionally for
        // external attachments, regardless of last-use position.
        ResourceTag::External => vk::AttachmentStoreOp::STORE,
        ResourceTag::Transient => {
            if entry.last_pass == Some(pos) {
                vk::AttachmentStoreOp::DONT_CARE
            } else {
                vk::AttachmentStoreOp::STORE
            }
        }
    }
}

fn raw_handle_value(handle: GpuHandle) -> u64 {
    match handle {
        GpuHandle::Image { image, view } => image.as_raw() ^ view.as_raw(),
        GpuHandle::Buffer { buffer } => buffer.as_raw(),
        GpuHandle::Unbound => 0,
    }
}

fn image_usage_for(layout: vk::ImageLayout, access: vk::AccessFlags2) -> vk::ImageUsageFlags {
    let mut usage = match layout {
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => vk::ImageUsageFlags::COLOR_ATTACHMENT,
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL | vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL => {
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
        }
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => vk::ImageUsageFlags::SAMPLED,
        vk::ImageLayout::GENERAL => vk::ImageUsageFlags::STORAGE,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => vk::ImageUsageFlags::TRANSFER_SRC,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => vk::ImageUsageFlags::TRANSFER_DST,
        _ => vk::ImageUsageFlags::empty(),
    };
    // Input-attachment reads share SHADER_READ_ONLY_OPTIMAL with plain sampled
    // reads (see `PassBuilder::read_input_attachment`/`sample_image`), so the
    // layout alone can't distinguish them; check the access mask as well.
    if access.contains(vk::AccessFlags2::INPUT_ATTACHMENT_READ) {
        usage |= vk::ImageUsageFlags::INPUT_ATTACHMENT;
    }
    usage
}

fn buffer_usage_for(access: vk::AccessFlags2) -> vk::BufferUsageFlags {
    let mut usage = vk::BufferUsageFlags::empty();
    if access.contains(vk::AccessFlags2::UNIFORM_READ) {
        usage |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if access.contains(vk::AccessFlags2::SHADER_STORAGE_READ) || access.contains(vk::AccessFlags2::SHADER_STORAGE_WRITE) {
        usage |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    if access.contains(vk::AccessFlags2::VERTEX_ATTRIBUTE_READ) {
        usage |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if access.contains(vk::AccessFlags2::INDEX_READ) {
        usage |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if access.contains(vk::AccessFlags2::INDIRECT_COMMAND_READ) {
        usage |= vk::BufferUsageFlags::INDIRECT_BUFFER;
    }
    if access.contains(vk::AccessFlags2::TRANSFER_READ) {
        usage |= vk::BufferUsageFlags::TRANSFER_SRC;
    }
    if access.contains(vk::AccessFlags2::TRANSFER_WRITE) {
        usage |= vk::BufferUsageFlags::TRANSFER_DST;
    }
    usage
}

fn image_create_info(desc: &ImageDesc) -> (vk::ImageCreateInfo, vk::ImageViewCreateInfo) {
    let create_info = vk::ImageCreateInfo::builder()
        .image_type(vk::ImageType::TYPE_2D)
        .format(desc.format)
        .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
        .mip_levels(desc.mip_levels)
        .array_layers(desc.array_layers)
        .samples(desc.sample_count)
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(desc.usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .build();

    // `image` is filled in by the allocator once the image handle exists.
    let view_info = vk::ImageViewCreateInfo::builder()
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(desc.format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: desc.aspect,
            base_mip_level: 0,
            level_count: desc.mip_levels,
            base_array_layer: 0,
            layer_count: desc.array_layers,
        })
        .build();

    (create_info, view_info)
}

fn buffer_create_info(desc: &BufferDesc) -> vk::BufferCreateInfo {
    vk::BufferCreateInfo::builder().size(desc.size).usage(desc.usage).sharing_mode(vk::SharingMode::EXCLUSIVE).build()
}
