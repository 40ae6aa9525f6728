//! Configuration surfaces (§2 ambient stack, §6): plain structs the caller
//! fills in, not a file-backed config system — the spec has no on-disk
//! config surface of its own.

use bitflags::bitflags;

bitflags! {
    /// Opportunistically-used Vulkan capabilities, detected by the caller's
    /// own instance/device feature and extension queries (§6). The crate
    /// never queries a loader itself.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PlatformCapabilities: u32 {
        /// `VK_KHR_unified_image_layouts` (or equivalent): layout
        /// transitions may be suppressed by routing both sides through
        /// `GENERAL` while keeping the execution/memory dependency.
        const UNIFIED_IMAGE_LAYOUTS = 1 << 0;
        /// `VK_EXT_graphics_pipeline_library`.
        const GRAPHICS_PIPELINE_LIBRARY = 1 << 1;
        /// GPL fast-linking (`graphicsPipelineLibraryFastLinking`).
        const GPL_FAST_LINKING = 1 << 2;
        /// Independent interpolation decoration support, required for the
        /// fragment-shader GPL library part to be reusable across pipelines.
        const INDEPENDENT_INTERPOLATION = 1 << 3;
        /// `VK_EXT_pipeline_creation_cache_control`
        /// (`VkPipelineCreateFlags::FAIL_ON_PIPELINE_COMPILE_REQUIRED`).
        const PIPELINE_CREATION_CACHE_CONTROL = 1 << 4;
        /// `VK_KHR_push_descriptor`. Unused by this crate's descriptor
        /// resolution path today; detected for forward compatibility.
        const PUSH_DESCRIPTORS = 1 << 5;
        /// `VK_EXT_memory_budget`.
        const MEMORY_BUDGET = 1 << 6;
        /// `VK_EXT_device_fault`.
        const DEVICE_FAULT = 1 << 7;
        /// `VK_NV_shader_invocation_reorder` / equivalent. No behavioral
        /// effect on this crate; tracked for completeness per §6.
        const SHADER_INVOCATION_REORDER = 1 << 8;
    }
}

impl PlatformCapabilities {
    /// True when the GPL acquisition path in the pipeline compiler is
    /// usable: library extension, fast-linking, and independent
    /// interpolation all present (§4.6 "GPL path" preconditions).
    pub fn supports_gpl_path(self) -> bool {
        self.contains(
            Self::GRAPHICS_PIPELINE_LIBRARY | Self::GPL_FAST_LINKING | Self::INDEPENDENT_INTERPOLATION,
        )
    }
}

/// Acquisition strategy for `PipelineCompiler` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineCompilerPolicy {
    /// Use the GPL path when `PlatformCapabilities::supports_gpl_path()`,
    /// otherwise fall back to the monolithic path.
    #[default]
    Auto,
    /// Always use the monolithic synchronous path, regardless of platform support.
    ForceMonolithic,
    /// Prefer GPL; if unsupported, behaves like `Auto`'s fallback.
    PreferGPL,
}

/// Tunables for a `Graph` instance (§4.1 add, §9 "strict_bind_map" follow-up).
#[derive(Debug, Clone, Copy)]
pub struct GraphConfig {
    /// Pre-sizing hint for the adjacency bit-matrix and pass vector.
    /// Purely a performance hint — never changes compiled semantics.
    pub max_passes_hint: usize,
    /// Pre-sizing hint for the resource table.
    pub max_resources_hint: usize,
    /// Below this many candidate pool entries, the transient allocator's
    /// slow-path descriptor scan (§4.2 phase 7) is a plain linear scan;
    /// above it a caller may opt into a future indexed scan. Currently
    /// advisory only — the implementation always scans linearly, but the
    /// threshold is surfaced so callers can budget frame time.
    pub transient_slow_path_scan_threshold: usize,
    /// Override for the pipeline compiler's worker-thread count. `None`
    /// uses the §4.6 default (`max(1, hardware_threads / 2)` in GPL mode,
    /// `1` in monolithic mode).
    pub worker_thread_override: Option<usize>,
    /// When `true`, `add_pass_pipeline` bind-map entries whose name is
    /// absent from the reflection are a `GraphError` at `compile()` time
    /// rather than silently ignored (§9 open question, resolved: default
    /// is permissive/silent; this flag opts into strictness).
    pub strict_bind_map: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_passes_hint: 32,
            max_resources_hint: 64,
            transient_slow_path_scan_threshold: 256,
            worker_thread_override: None,
            strict_bind_map: false,
        }
    }
}
