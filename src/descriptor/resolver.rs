//! Per-pass descriptor resolution (§4.2 phase 11).
//!
//! Groups a pass's reflected bindings by descriptor set index; for each set
//! touched by at least one bind-map entry, builds (and caches) a set
//! layout, allocates a descriptor set, and writes every bound entry. Names
//! absent from the bind-map are left unwritten ("partial-bind").

use std::collections::{BTreeMap, HashMap};

use ash::{vk, Device};
use log::warn;

use crate::descriptor::allocator::DescriptorAllocator;
use crate::descriptor::reflection::ReflectionInfo;
use crate::error::{GraphError, GraphResult};
use crate::pass::BindEntry;

/// One resolved descriptor set ready to bind at `execute()` time.
pub struct ResolvedSet {
    /// Descriptor set index this corresponds to.
    pub set_index: u32,
    /// The allocated descriptor set.
    pub descriptor_set: vk::DescriptorSet,
    /// The layout it was allocated against (owned by the resolver's cache;
    /// not destroyed per-set).
    pub layout: vk::DescriptorSetLayout,
}

/// Resolved image or buffer view for one bind-map entry, already looked up
/// from the resource table by the caller (`Graph::compile`).
pub enum BoundView {
    /// An image binding (sampled/storage/input attachment).
    Image { view: vk::ImageView, layout: vk::ImageLayout, sampler: Option<vk::Sampler> },
    /// A buffer binding.
    Buffer { buffer: vk::Buffer, offset: vk::DeviceSize, range: vk::DeviceSize },
}

/// Caches descriptor set layouts by their exact binding list so repeated
/// passes with identical reflected sets don't recreate a `VkDescriptorSetLayout`
/// every frame. Destroyed wholesale at `Graph::reset()`.
#[derive(Default)]
pub struct LayoutCache {
    by_bindings: HashMap<Vec<(u32, vk::DescriptorType, u32, vk::ShaderStageFlags)>, vk::DescriptorSetLayout>,
}

impl LayoutCache {
    fn get_or_create(
        &mut self,
        device: &Device,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> GraphResult<vk::DescriptorSetLayout> {
        let key: Vec<_> =
            bindings.iter().map(|b| (b.binding, b.descriptor_type, b.descriptor_count, b.stage_flags)).collect();

        if let Some(layout) = self.by_bindings.get(&key) {
            return Ok(*layout);
        }

        let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(bindings);
        let layout = unsafe { device.create_descriptor_set_layout(&create_info, None) }
            .map_err(GraphError::DescriptorSetLayoutCreationFailed)?;
        self.by_bindings.insert(key, layout);
        Ok(layout)
    }

    /// Destroy every cached layout. Called from `Graph::reset()`.
    pub fn clear(&mut self, device: &Device) {
        for layout in self.by_bindings.values() {
            unsafe { device.destroy_descriptor_set_layout(*layout, None) };
        }
        self.by_bindings.clear();
    }
}

/// Resolve one pass's reflection + bind-map into zero or more descriptor
/// sets, writing every bound entry found in `bound_views`.
///
/// `strict` mirrors `GraphConfig::strict_bind_map` (§9): when true, a
/// bind-map entry absent from the reflection is a `GraphError` instead of
/// being silently skipped.
pub fn resolve_pass_descriptors(
    device: &Device,
    allocator: &mut DescriptorAllocator,
    layout_cache: &mut LayoutCache,
    reflection: &ReflectionInfo,
    bind_map: &HashMap<String, BindEntry>,
    bound_views: &HashMap<String, BoundView>,
    default_sampler: Option<vk::Sampler>,
    strict: bool,
) -> GraphResult<Vec<ResolvedSet>> {
    if strict {
        for name in bind_map.keys() {
            if reflection.find(name).is_none() {
                return Err(GraphError::Api { operation: "resolve_pass_descriptors", result: vk::Result::ERROR_UNKNOWN });
            }
        }
    }

    let mut by_set: BTreeMap<u32, Vec<&crate::descriptor::reflection::ReflectedBinding>> = BTreeMap::new();
    for binding in &reflection.bindings {
        by_set.entry(binding.set).or_default().push(binding);
    }

    let mut resolved = Vec::new();

    for (set_index, bindings) in by_set {
        let touched = bindings.iter().any(|b| bind_map.contains_key(&b.name));
        if !touched {
            continue;
        }

        let layout_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::builder()
                    .binding(b.binding)
                    .descriptor_type(b.descriptor_type)
                    .descriptor_count(b.count)
                    .stage_flags(b.stage_flags)
                    .build()
            })
            .collect();

        let layout = layout_cache.get_or_create(device, &layout_bindings)?;
        let descriptor_set = allocator.allocate(layout)?;

        let mut writes = Vec::with_capacity(bindings.len());
        // Reserved up front: `WriteDescriptorSet` holds a raw pointer into
        // these vecs once built, so they must not reallocate mid-loop.
        let mut buffer_infos = Vec::with_capacity(bindings.len());
        let mut image_infos = Vec::with_capacity(bindings.len());

        for binding in &bindings {
            let Some(entry) = bind_map.get(&binding.name) else {
                continue;
            };
            let Some(view) = bound_views.get(&binding.name) else {
                warn!("bind-map entry '{}' has no resolved resource view; skipping write", binding.name);
                continue;
            };

            match view {
                BoundView::Image { view, layout, sampler } => {
                    let sampler = entry.sampler_override.or(*sampler).or(default_sampler).unwrap_or(vk::Sampler::null());
                    image_infos.push(vk::DescriptorImageInfo { sampler, image_view: *view, image_layout: *layout });
                    let info_index = image_infos.len() - 1;
                    writes.push(
                        vk::WriteDescriptorSet::builder()
                            .dst_set(descriptor_set)
                            .dst_binding(binding.binding)
                            .dst_array_element(0)
                            .descriptor_type(binding.descriptor_type)
                            .image_info(std::slice::from_ref(&image_infos[info_index]))
                            .build(),
                    );
                }
                BoundView::Buffer { buffer, offset, range } => {
                    buffer_infos.push(vk::DescriptorBufferInfo { buffer: *buffer, offset: *offset, range: *range });
                    let info_index = buffer_infos.len() - 1;
                    writes.push(
                        vk::WriteDescriptorSet::builder()
                            .dst_set(descriptor_set)
                            .dst_binding(binding.binding)
                            .dst_array_element(0)
                            .descriptor_type(binding.descriptor_type)
                            .buffer_info(std::slice::from_ref(&buffer_infos[info_index]))
                            .build(),
                    );
                }
            }
        }

        if !writes.is_empty() {
            unsafe { device.update_descriptor_sets(&writes, &[]) };
        }

        resolved.push(ResolvedSet { set_index, descriptor_set, layout });
    }

    Ok(resolved)
}
