//! The "pool of pools" descriptor allocator (§4.7).

use ash::{vk, Device};
use log::{debug, warn};

use crate::error::{GraphError, GraphResult};

/// A fixed set of pool-size ratios, scaled by the pool's `max_sets` when a
/// new backing `vk::DescriptorPool` is created. Chosen so a typical frame's
/// mix of sampled-image / storage-image / uniform-buffer / storage-buffer
/// descriptors fits in one pool.
const POOL_SIZE_RATIOS: &[(vk::DescriptorType, f32)] = &[
    (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 4.0),
    (vk::DescriptorType::SAMPLED_IMAGE, 4.0),
    (vk::DescriptorType::STORAGE_IMAGE, 1.0),
    (vk::DescriptorType::UNIFORM_BUFFER, 2.0),
    (vk::DescriptorType::STORAGE_BUFFER, 2.0),
    (vk::DescriptorType::SAMPLER, 1.0),
    (vk::DescriptorType::INPUT_ATTACHMENT, 1.0),
];

const BASE_SETS_PER_POOL: u32 = 1000;

fn make_pool(device: &Device, sets_per_pool: u32) -> GraphResult<vk::DescriptorPool> {
    let sizes: Vec<vk::DescriptorPoolSize> = POOL_SIZE_RATIOS
        .iter()
        .map(|(ty, ratio)| {
            vk::DescriptorPoolSize::builder()
                .ty(*ty)
                .descriptor_count(((sets_per_pool as f32) * ratio) as u32)
                .build()
        })
        .collect();

    let create_info = vk::DescriptorPoolCreateInfo::builder()
        .max_sets(sets_per_pool)
        .pool_sizes(&sizes);

    unsafe { device.create_descriptor_pool(&create_info, None) }
        .map_err(GraphError::DescriptorSetAllocationFailed)
}

/// Owns a growing list of descriptor pools and hands out sets from them,
/// transparently creating new (possibly larger) pools on exhaustion.
///
/// The caller resets the allocator once per frame via `reset_pools`, which
/// recycles every backing pool without destroying it — the next frame's
/// allocations reuse the same driver-side heap.
pub struct DescriptorAllocator {
    device: Device,
    sets_per_pool: u32,
    /// Head of the list: the pool currently being allocated from.
    usable: Vec<vk::DescriptorPool>,
    /// Pools that reported exhaustion this cycle; recycled on `reset_pools`.
    full: Vec<vk::DescriptorPool>,
}

impl DescriptorAllocator {
    /// Create an allocator with one initial pool sized for `BASE_SETS_PER_POOL` sets.
    pub fn new(device: Device) -> GraphResult<Self> {
        let first = make_pool(&device, BASE_SETS_PER_POOL)?;
        Ok(Self { device, sets_per_pool: BASE_SETS_PER_POOL, usable: vec![first], full: Vec::new() })
    }

    fn grab_pool(&mut self) -> GraphResult<vk::DescriptorPool> {
        if let Some(pool) = self.usable.last().copied() {
            return Ok(pool);
        }
        // All known pools are exhausted; grow.
        self.sets_per_pool = (self.sets_per_pool * 3 / 2).max(1);
        debug!("descriptor allocator growing to {} sets/pool", self.sets_per_pool);
        let pool = make_pool(&self.device, self.sets_per_pool)?;
        self.usable.push(pool);
        Ok(pool)
    }

    /// Allocate one descriptor set with layout `dsl`, growing the pool list
    /// on exhaustion (§4.7).
    pub fn allocate(&mut self, dsl: vk::DescriptorSetLayout) -> GraphResult<vk::DescriptorSet> {
        let layouts = [dsl];
        loop {
            let pool = self.grab_pool()?;
            let alloc_info = vk::DescriptorSetAllocateInfo::builder().descriptor_pool(pool).set_layouts(&layouts);

            match unsafe { self.device.allocate_descriptor_sets(&alloc_info) } {
                Ok(sets) => return Ok(sets[0]),
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
                    warn!("descriptor pool exhausted, rotating to a new pool");
                    let exhausted = self.usable.pop().expect("grab_pool always leaves a pool on success");
                    self.full.push(exhausted);
                    continue;
                }
                Err(e) => return Err(GraphError::DescriptorSetAllocationFailed(e)),
            }
        }
    }

    /// Recycle every pool (usable and full) back to empty, without
    /// destroying the underlying `vk::DescriptorPool` objects.
    pub fn reset_pools(&mut self) -> GraphResult<()> {
        self.full.append(&mut self.usable);
        for pool in &self.full {
            unsafe { self.device.reset_descriptor_pool(*pool, vk::DescriptorPoolResetFlags::empty()) }
                .map_err(GraphError::DescriptorSetAllocationFailed)?;
        }
        self.usable.append(&mut self.full);
        Ok(())
    }
}

impl Drop for DescriptorAllocator {
    fn drop(&mut self) {
        for pool in self.usable.drain(..).chain(self.full.drain(..)) {
            unsafe { self.device.destroy_descriptor_pool(pool, None) };
        }
    }
}
