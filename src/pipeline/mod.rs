//! The pipeline compiler subsystem (§4.6).

pub mod cache;
pub mod compiler;
pub mod gpl;
pub mod handle;
pub mod recipe;
pub mod shader;
pub mod worker_pool;

pub use compiler::PipelineCompiler;
pub use handle::PipelineHandle;
pub use recipe::{PipelineRecipe, ShaderSource};
