mod pipeline;
mod pipeline_error;
mod reporter;
mod run_report;
mod task_selector;
mod telemetry;

pub use pipeline::*;
pub use pipeline_error::*;
pub use reporter::*;
pub use run_report::*;
pub use task_selector::*;
pub use telemetry::*;

pub use armada_task_runner::{Parallelism, RunContext, RunnerOptions};
