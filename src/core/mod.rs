pub mod defaults;
pub mod deployment;
pub mod destination;
pub mod error;
pub mod hook;
pub mod manifest;
pub mod native;
pub mod operation;
pub mod options;
pub mod paths;
pub mod pipeline;
pub mod resolver;
pub mod ssh;
pub mod transport;

// Re-export common types for convenience
pub use deployment::Deployment;
pub use destination::Destination;
pub use error::{Error, ErrorCode, Result};
pub use hook::{Hook, HookReport, HookStatus};
pub use operation::Operation;
pub use options::HookOptions;
pub use pipeline::{PipelineBuilder, PipelineRun};
pub use transport::{CommandOutput, SystemTransport, Transport};
