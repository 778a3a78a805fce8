use serde::{Deserialize, Serialize};

/// Events that drive job execution transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum JobEvent {
    /// Job graph resolved and first step dispatched
    Start,
    /// Every step on the executed path completed
    Complete,
    /// A step failed with no failure transition configured
    Fail(String),
    /// Operator asked the job to stop
    Stop,
    /// The running step settled after a stop request
    Stopped,
    /// Operator gave up on the execution
    Abandon,
}

impl JobEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Fail(_) => "fail",
            Self::Stop => "stop",
            Self::Stopped => "stopped",
            Self::Abandon => "abandon",
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}

/// Events that drive step and partition execution transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StepEvent {
    Start,
    /// Completed, with an optional exit status
    Complete(Option<String>),
    Fail(String),
    Stop,
    Stopped,
}

impl StepEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete(_) => "complete",
            Self::Fail(_) => "fail",
            Self::Stop => "stop",
            Self::Stopped => "stopped",
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn exit_status(&self) -> Option<&str> {
        match self {
            Self::Complete(exit_status) => exit_status.as_deref(),
            _ => None,
        }
    }

    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }

    pub fn complete_simple() -> Self {
        Self::Complete(None)
    }
}
