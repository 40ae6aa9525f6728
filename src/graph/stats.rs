//! Per-phase compile timings and pass/barrier counters (§6 `Graph::stats()`,
//! §4.2 add "Stats struct using a monotonic clock").

use std::time::{Duration, Instant};

/// Microsecond timings for one `compile()` phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct PhaseMicros(pub u64);

impl From<Duration> for PhaseMicros {
    fn from(d: Duration) -> Self {
        PhaseMicros(d.as_micros() as u64)
    }
}

/// Timings and counters for the most recent `compile()` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    /// Subresource resolution (§4.2 phase 1).
    pub resolve: PhaseMicros,
    /// Transient usage accumulation (phase 2).
    pub usage: PhaseMicros,
    /// Structural hashing (phase 3).
    pub hash: PhaseMicros,
    /// Adjacency construction (phase 4); 0 on a cache hit.
    pub adjacency: PhaseMicros,
    /// Topological sort (phase 5); 0 on a cache hit.
    pub sort: PhaseMicros,
    /// Lifetime computation (phase 6); 0 on a cache hit.
    pub lifetime: PhaseMicros,
    /// Transient allocation (phase 7).
    pub alloc: PhaseMicros,
    /// State tracker init (phase 8); 0 on a cache hit.
    pub state_init: PhaseMicros,
    /// Barrier compilation (phase 9); 0 on a cache hit / handle-stable path.
    pub barriers: PhaseMicros,
    /// Render-target resolution (phase 10).
    pub render_targets: PhaseMicros,
    /// Descriptor resolution (phase 11).
    pub descriptors: PhaseMicros,
    /// Total wall time across every phase.
    pub compile_time: PhaseMicros,
    /// Number of declared passes this frame.
    pub pass_count: usize,
    /// Number of image barriers emitted.
    pub image_barrier_count: usize,
    /// Number of buffer barriers emitted.
    pub buffer_barrier_count: usize,
    /// Number of fresh transient allocations made this frame.
    pub transient_allocations: usize,
    /// True if this frame took the structural-hash cache-hit path.
    pub cache_hit: bool,
    /// True if this frame took the handle-stability ultra-fast path.
    pub handle_stable: bool,
}

/// Times a phase closure and records it into `slot`, returning the
/// closure's result. Small helper so `compile()` doesn't repeat
/// `Instant::now()`/subtraction boilerplate at each of the eleven phases.
pub fn timed<T>(slot: &mut PhaseMicros, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let result = f();
    *slot = start.elapsed().into();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_records_a_nonzero_result_is_not_required_but_returns_value() {
        let mut slot = PhaseMicros::default();
        let value = timed(&mut slot, || 1 + 1);
        assert_eq!(value, 2);
    }
}
