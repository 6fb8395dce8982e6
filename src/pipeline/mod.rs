//! The per-cycle orchestration and the loop that drives it.

pub mod cycle;
pub mod scheduler;
pub mod status;

pub use cycle::LagPipeline;
pub use scheduler::Scheduler;
pub use status::PipelineStatus;
