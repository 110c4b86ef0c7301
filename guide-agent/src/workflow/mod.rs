mod elaboration_loop;
mod pipeline;

pub use elaboration_loop::{DEFAULT_MAX_ITERATIONS, ElaborationLoop};
pub use pipeline::Pipeline;
