pub mod api;
pub mod coordinator;
pub mod error;
pub mod fault;
pub mod node;
pub mod snapshot;
pub mod stats;
pub mod task;

pub use api::{ErrorResponse, SubmitRequest, SubmitResponse};
pub use coordinator::{Coordinator, Transition};
pub use error::SubmitError;
pub use fault::{FaultPolicy, FixedFaults, RandomFaults, ScriptedFaults};
pub use node::{NodeName, NodeView};
pub use snapshot::{ClusterSnapshot, Summary};
pub use stats::{analyze, Analysis};
pub use task::{Payload, Task, TaskId, TaskStatus, TaskView, MAX_RETRIES};
