//! Resource handles.
//!
//! `ResourceHandle` is a generational index (via `slotmap`) rather than a
//! bare integer, following the same pattern `rust_engine` uses for ECS
//! entity handles elsewhere in the engine. A handle from a prior `reset()`
//! generation fails to resolve instead of silently aliasing a reused slot.

slotmap::new_key_type! {
    /// Opaque handle to a resource declared in a `Graph`. Valid only within
    /// the graph instance that created it, and only until the next `reset()`.
    pub struct ResourceHandle;
}
