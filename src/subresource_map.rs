//! Per-image subresource synchronization tracking (§4.5).

use crate::subresource_range::SubresourceRange;
use crate::sync_state::ResourceState;

/// Maps disjoint (mip x layer) rectangles of one image to a `ResourceState`.
///
/// Invariant: the stored slices always tile `[0, mips) x [0, layers)`
/// exactly — they never overlap and never leave a gap.
#[derive(Debug, Clone)]
pub struct ImageSubresourceMap {
    mips: u32,
    layers: u32,
    slices: Vec<(SubresourceRange, ResourceState)>,
}

impl ImageSubresourceMap {
    /// A single slice covering the full resource with `initial_state`.
    pub fn new(mips: u32, layers: u32, initial_state: ResourceState) -> Self {
        let whole = SubresourceRange { base_mip: 0, mip_count: mips, base_layer: 0, layer_count: layers };
        Self { mips, layers, slices: vec![(whole, initial_state)] }
    }

    /// Every stored slice whose range intersects `range`, each clipped to
    /// `range` (the rectangle the barrier compiler should actually act on)
    /// paired with that slice's state.
    pub fn query_slices_overlapping(&self, range: SubresourceRange) -> Vec<(SubresourceRange, ResourceState)> {
        self.slices
            .iter()
            .filter_map(|(slice_range, state)| slice_range.intersection(range).map(|clipped| (clipped, *state)))
            .collect()
    }

    /// The merged state across every slice overlapping `range`.
    ///
    /// Panics in debug builds if `range` does not intersect any stored
    /// slice, since callers only query ranges within `[0,mips) x [0,layers)`.
    pub fn query_state(&self, range: SubresourceRange) -> ResourceState {
        let mut overlapping = self.query_slices_overlapping(range).into_iter();
        let (_, first) = overlapping.next().expect("query_state: range has no overlapping slices");
        overlapping.fold(first, |acc, (_, state)| acc.merge(&state))
    }

    /// Split existing slices at `range`'s boundary, replacing the covered
    /// area with `new_state`. Implements §4.5 `setState`.
    pub fn set_state(&mut self, range: SubresourceRange, new_state: ResourceState) {
        let mut next = Vec::with_capacity(self.slices.len() + 1);
        for (slice_range, state) in self.slices.drain(..) {
            for remainder in slice_range.subtract(range) {
                next.push((remainder, state));
            }
        }
        next.push((range, new_state));
        self.slices = next;
        self.coalesce();
    }

    /// Collapse back to a single slice covering the whole resource —
    /// used on frame reset to avoid repeated heap churn (§4.5 `resetState`).
    pub fn reset_state(&mut self, mips: u32, layers: u32, state: ResourceState) {
        self.mips = mips;
        self.layers = layers;
        self.slices.clear();
        let whole = SubresourceRange { base_mip: 0, mip_count: mips, base_layer: 0, layer_count: layers };
        self.slices.push((whole, state));
    }

    /// Number of mip levels this map covers.
    pub fn mips(&self) -> u32 {
        self.mips
    }

    /// Number of array layers this map covers.
    pub fn layers(&self) -> u32 {
        self.layers
    }

    /// Merge adjacent slices that carry an identical state, so steady-state
    /// graphs (one barrier per frame, same state everywhere) don't let the
    /// slice list grow without bound.
    fn coalesce(&mut self) {
        loop {
            let mut merged = None;
            'search: for i in 0..self.slices.len() {
                for j in 0..self.slices.len() {
                    if i == j {
                        continue;
                    }
                    let (a, sa) = self.slices[i];
                    let (b, sb) = self.slices[j];
                    if sa != sb {
                        continue;
                    }
                    if let Some(combined) = adjacent_union(a, b) {
                        merged = Some((i, j, combined));
                        break 'search;
                    }
                }
            }
            match merged {
                Some((i, j, combined)) => {
                    let state = self.slices[i].1;
                    let (hi, lo) = if i > j { (i, j) } else { (j, i) };
                    self.slices.remove(hi);
                    self.slices.remove(lo);
                    self.slices.push((combined, state));
                }
                None => break,
            }
        }
    }
}

/// If `a` and `b` are adjacent along exactly one axis and equal along the
/// other, return their union rectangle.
fn adjacent_union(a: SubresourceRange, b: SubresourceRange) -> Option<SubresourceRange> {
    let same_layers = a.base_layer == b.base_layer && a.layer_count == b.layer_count;
    let same_mips = a.base_mip == b.base_mip && a.mip_count == b.mip_count;

    if same_layers && a.base_mip + a.mip_count == b.base_mip {
        return Some(SubresourceRange {
            base_mip: a.base_mip,
            mip_count: a.mip_count + b.mip_count,
            base_layer: a.base_layer,
            layer_count: a.layer_count,
        });
    }
    if same_mips && a.base_layer + a.layer_count == b.base_layer {
        return Some(SubresourceRange {
            base_mip: a.base_mip,
            mip_count: a.mip_count,
            base_layer: a.base_layer,
            layer_count: a.layer_count + b.layer_count,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;

    fn state_a() -> ResourceState {
        ResourceState::undefined().commit_write(
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        )
    }

    fn total_subresources(map: &ImageSubresourceMap) -> u32 {
        map.slices.iter().map(|(r, _)| r.mip_count * r.layer_count).sum()
    }

    fn assert_covers_exactly(map: &ImageSubresourceMap) {
        for i in 0..map.slices.len() {
            for j in (i + 1)..map.slices.len() {
                assert!(!map.slices[i].0.intersects(map.slices[j].0), "slices must not overlap");
            }
        }
        assert_eq!(total_subresources(map), map.mips * map.layers);
    }

    #[test]
    fn new_map_is_single_slice() {
        let map = ImageSubresourceMap::new(4, 6, ResourceState::undefined());
        assert_covers_exactly(&map);
        assert_eq!(map.slices.len(), 1);
    }

    #[test]
    fn set_state_splits_and_still_covers_whole() {
        let mut map = ImageSubresourceMap::new(4, 4, ResourceState::undefined());
        let sub = SubresourceRange { base_mip: 1, mip_count: 1, base_layer: 1, layer_count: 1 };
        map.set_state(sub, state_a());
        assert_covers_exactly(&map);

        let queried = map.query_state(sub);
        assert_eq!(queried.current_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    }

    #[test]
    fn reset_state_collapses_to_one_slice() {
        let mut map = ImageSubresourceMap::new(4, 4, ResourceState::undefined());
        let sub = SubresourceRange { base_mip: 1, mip_count: 1, base_layer: 1, layer_count: 1 };
        map.set_state(sub, state_a());
        map.reset_state(4, 4, ResourceState::undefined());
        assert_eq!(map.slices.len(), 1);
        assert_covers_exactly(&map);
    }

    #[test]
    fn repeated_full_writes_coalesce_back_to_one_slice() {
        let mut map = ImageSubresourceMap::new(2, 2, ResourceState::undefined());
        let whole = SubresourceRange::whole_resource().resolved(2, 2);
        map.set_state(whole, state_a());
        assert_eq!(map.slices.len(), 1);
    }
}
