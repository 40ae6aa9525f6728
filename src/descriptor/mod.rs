//! Descriptor allocation, reflection merging, and per-pass resolution (§4.7, §4.2 phase 11).

pub mod allocator;
pub mod reflection;
pub mod resolver;

pub use allocator::DescriptorAllocator;
pub use reflection::{ReflectedBinding, ReflectionInfo};
