use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateMachineError {
    #[error("Invalid transition from {from:?} on {event}")]
    InvalidTransition { from: Option<String>, event: String },

    #[error("Guard check failed: {0}")]
    GuardFailed(#[from] GuardError),

    #[error("Internal state machine error: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("Business rule violation: {rule}")]
    BusinessRuleViolation { rule: String },
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
pub type GuardResult<T> = Result<T, GuardError>;

pub fn business_rule_violation(rule: impl Into<String>) -> GuardError {
    GuardError::BusinessRuleViolation { rule: rule.into() }
}
