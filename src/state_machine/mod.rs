// Job and step lifecycle state machines
//
// Job, step and partition executions share one status set. Transitions are
// applied to the in-process execution record under its lock; job transitions
// are also published to anyone awaiting termination.

pub mod errors;
pub mod events;
pub mod guards;
pub mod job_state_machine;
pub mod states;
pub mod step_state_machine;

// Re-export main types for convenient access
pub use errors::{GuardError, StateMachineError, StateMachineResult};
pub use events::{JobEvent, StepEvent};
pub use job_state_machine::JobStateMachine;
pub use states::BatchStatus;
pub use step_state_machine::StepStateMachine;

pub use guards::StateGuard;
