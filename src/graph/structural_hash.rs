//! The graph structural hash (§3 "Graph structural hash", §4.2 phase 3).
//!
//! Order-independent with respect to bind-map iteration order (entries are
//! XOR-combined), order-dependent with respect to pass declaration order
//! (each pass's contribution is folded in sequence via `write`).

use std::hash::{Hash, Hasher};

use ash::vk::Handle;
use slotmap::SlotMap;

use crate::hash::Fnv1a64;
use crate::handle::ResourceHandle;
use crate::pass::PassDecl;
use crate::resource::ResourceEntry;

/// A resource's hash identity is its declared name, not its `ResourceHandle`.
/// A handle's raw slotmap value embeds a generation counter that `reset()`
/// bumps on every `SlotMap::clear()` call, so two frames that redeclare the
/// exact same resource under the exact same name still mint handles with
/// different FFI values — hashing those would make the structural hash
/// differ every frame and permanently defeat `cache_hit`. The name is stable
/// across frames as long as the caller names a logical resource
/// consistently, which §4.1's "declare fresh every frame" model assumes.
fn resource_name<'a>(resources: &'a SlotMap<ResourceHandle, ResourceEntry>, handle: ResourceHandle) -> &'a str {
    resources.get(handle).map_or("", |e| e.name.as_str())
}

fn hash_access(h: &mut Fnv1a64, resources: &SlotMap<ResourceHandle, ResourceEntry>, access: &crate::pass::AccessDecl) {
    resource_name(resources, access.resource).hash(&mut Adapter(h));
    (access.access_type as u8).hash(&mut Adapter(h));
    access.desired.layout.as_raw().hash(&mut Adapter(h));
    (access.range.base_mip, access.range.mip_count, access.range.base_layer, access.range.layer_count).hash(&mut Adapter(h));
}

fn hash_render_target(h: &mut Fnv1a64, resources: &SlotMap<ResourceHandle, ResourceEntry>, rt: &crate::pass::RenderTargetDecl) {
    for slot in &rt.color {
        match slot {
            Some(c) => {
                1u8.hash(&mut Adapter(h));
                resource_name(resources, c.resource).hash(&mut Adapter(h));
                c.load_op.as_raw().hash(&mut Adapter(h));
            }
            None => 0u8.hash(&mut Adapter(h)),
        }
    }
    if let Some(d) = &rt.depth {
        1u8.hash(&mut Adapter(h));
        resource_name(resources, d.resource).hash(&mut Adapter(h));
        d.load_op.as_raw().hash(&mut Adapter(h));
        (matches!(d.depth_write, crate::pass::DepthWrite::Enabled)).hash(&mut Adapter(h));
    } else {
        0u8.hash(&mut Adapter(h));
    }
}

fn hash_bind_map(resources: &SlotMap<ResourceHandle, ResourceEntry>, pass: &PassDecl) -> u64 {
    let mut combined = Fnv1a64::new();
    for (name, entry) in &pass.bind_map {
        let mut per_entry = Fnv1a64::new();
        name.hash(&mut Adapter(&mut per_entry));
        resource_name(resources, entry.resource).hash(&mut Adapter(&mut per_entry));
        combined.xor_combine(per_entry.finish());
    }
    combined.finish()
}

/// Compute the structural hash over every declared pass and the resource
/// table. Resource identity is taken from each access's resolved name
/// (`resource_name`) rather than its `ResourceHandle`, so the hash is stable
/// across a `reset()` even though handles themselves aren't (§3).
pub fn compute(passes: &[PassDecl], resources: &SlotMap<ResourceHandle, ResourceEntry>) -> u64 {
    let mut h = Fnv1a64::new();

    passes.len().hash(&mut Adapter(&mut h));
    resources.len().hash(&mut Adapter(&mut h));

    for pass in passes {
        (pass.pass_type as u8).hash(&mut Adapter(&mut h));
        for access in &pass.accesses {
            hash_access(&mut h, resources, access);
        }
        if let Some(rt) = &pass.render_target {
            hash_render_target(&mut h, resources, rt);
        }
        // Pipeline/reflection identity contributes via the pipeline
        // layout's raw handle value — a stand-in for "pointer identity"
        // in a language without raw addressable function pointers here.
        if let Some(binding) = &pass.pipeline_binding {
            binding.layout.as_raw().hash(&mut Adapter(&mut h));
        } else {
            0u64.hash(&mut Adapter(&mut h));
        }
        h.xor_combine(hash_bind_map(resources, pass));
    }

    h.finish()
}

/// Bridges `Hash::hash` onto our concrete `Fnv1a64` accumulator.
struct Adapter<'a>(&'a mut Fnv1a64);

impl Hasher for Adapter<'_> {
    fn finish(&self) -> u64 {
        self.0.finish()
    }
    fn write(&mut self, bytes: &[u8]) {
        self.0.write(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrier::AccessIntent;
    use crate::pass::{AccessDecl, PassType};
    use crate::resource::{GpuHandle, ResourceKind, ResourceTag, SyncTracker};
    use crate::subresource_range::SubresourceRange;
    use crate::sync_state::{AccessType, ResourceState};
    use ash::vk;

    fn dummy_resource(name: &str) -> ResourceEntry {
        let initial_state = ResourceState::undefined();
        ResourceEntry {
            tag: ResourceTag::Transient,
            kind: ResourceKind::Buffer(crate::resource::BufferDesc { size: 0, usage: vk::BufferUsageFlags::empty() }),
            name: name.to_string(),
            gpu_handle: GpuHandle::Unbound,
            allocation: None,
            sync: SyncTracker::Buffer(initial_state),
            initial_state,
            first_pass: None,
            last_pass: None,
        }
    }

    fn dummy_pass(name: &str, resource: ResourceHandle) -> PassDecl {
        PassDecl {
            name: name.to_string(),
            pass_type: PassType::Compute,
            accesses: vec![AccessDecl {
                resource,
                access_type: AccessType::Write,
                desired: AccessIntent {
                    stage: vk::PipelineStageFlags2::COMPUTE_SHADER,
                    access: vk::AccessFlags2::SHADER_STORAGE_WRITE,
                    layout: vk::ImageLayout::GENERAL,
                    queue_family: vk::QUEUE_FAMILY_IGNORED,
                },
                range: SubresourceRange::whole_resource(),
            }],
            render_target: None,
            pipeline_binding: None,
            default_sampler: None,
            bind_map: Default::default(),
            record: Box::new(|_, _| {}),
        }
    }

    #[test]
    fn identical_declarations_hash_identically() {
        let mut sm = SlotMap::<ResourceHandle, ResourceEntry>::new();
        let r = sm.insert(dummy_resource("r"));
        let passes_a = vec![dummy_pass("p", r)];
        let passes_b = vec![dummy_pass("p", r)];
        assert_eq!(compute(&passes_a, &sm), compute(&passes_b, &sm));
    }

    #[test]
    fn hash_is_stable_across_handle_regeneration() {
        // Simulates reset(): clear() bumps every slot's generation, so a
        // freshly-inserted resource under the same name gets a handle with
        // a different raw FFI value, but the same declared name.
        let mut sm = SlotMap::<ResourceHandle, ResourceEntry>::new();
        let r1 = sm.insert(dummy_resource("r"));
        let hash_before = compute(&[dummy_pass("p", r1)], &sm);

        sm.clear();
        let r2 = sm.insert(dummy_resource("r"));
        assert_ne!(r1, r2, "slotmap generation must differ after clear()");
        let hash_after = compute(&[dummy_pass("p", r2)], &sm);

        assert_eq!(hash_before, hash_after);
    }

    #[test]
    fn bind_map_iteration_order_does_not_matter() {
        let mut sm = SlotMap::<ResourceHandle, ResourceEntry>::new();
        let r1 = sm.insert(dummy_resource("r1"));
        let r2 = sm.insert(dummy_resource("r2"));

        let mut pass_a = dummy_pass("p", r1);
        pass_a.bind_map.insert("a".to_string(), crate::pass::BindEntry { resource: r1, sampler_override: None });
        pass_a.bind_map.insert("b".to_string(), crate::pass::BindEntry { resource: r2, sampler_override: None });

        let mut pass_b = dummy_pass("p", r1);
        pass_b.bind_map.insert("b".to_string(), crate::pass::BindEntry { resource: r2, sampler_override: None });
        pass_b.bind_map.insert("a".to_string(), crate::pass::BindEntry { resource: r1, sampler_override: None });

        assert_eq!(hash_bind_map(&sm, &pass_a), hash_bind_map(&sm, &pass_b));
    }

    #[test]
    fn declaration_order_changes_hash() {
        let mut sm = SlotMap::<ResourceHandle, ResourceEntry>::new();
        let r1 = sm.insert(dummy_resource("r1"));
        let r2 = sm.insert(dummy_resource("r2"));
        let forward = vec![dummy_pass("a", r1), dummy_pass("b", r2)];
        let backward = vec![dummy_pass("b", r2), dummy_pass("a", r1)];
        assert_ne!(compute(&forward, &sm), compute(&backward, &sm));
    }
}
