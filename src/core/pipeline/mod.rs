//! Building a deployment's hooks and running them in order.

mod builder;
mod executor;
mod plan;

pub use builder::PipelineBuilder;
pub use executor::{execute, PipelineRun, RunStatus, RunSummary};
pub use plan::{plan, PipelinePlan, PlannedHook, PlannedOperation};
