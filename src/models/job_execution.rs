use super::step_execution::StepExecution;
use crate::state_machine::BatchStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Start-time parameters, passed through to artifacts verbatim
pub type JobParameters = HashMap<String, String>;

/// Status and timing shared by job, step and partition executions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    pub status: BatchStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub exit_status: Option<String>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            status: BatchStatus::Starting,
            start_time: None,
            end_time: None,
            exit_status: None,
            last_error: None,
            updated_at: Utc::now(),
        }
    }
}

impl Lifecycle {
    /// Record a status change, stamping start and end times as they are reached
    pub fn apply(&mut self, status: BatchStatus) {
        let now = Utc::now();
        if status == BatchStatus::Started && self.start_time.is_none() {
            self.start_time = Some(now);
        }
        if status.is_finished() {
            self.end_time = Some(now);
            if self.exit_status.is_none() {
                self.exit_status = Some(status.to_string());
            }
        }
        self.status = status;
        self.updated_at = now;
    }
}

/// One run of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobExecution {
    pub execution_id: u64,
    pub job_name: String,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub parameters: JobParameters,
    pub step_executions: Vec<StepExecution>,
    /// Execution this one restarted, if any
    pub restart_of: Option<u64>,
    /// Execution that restarted this one, if any
    pub restarted_by: Option<u64>,
}

impl JobExecution {
    pub fn new(execution_id: u64, job_name: impl Into<String>, parameters: JobParameters) -> Self {
        Self {
            execution_id,
            job_name: job_name.into(),
            lifecycle: Lifecycle::default(),
            created_at: Utc::now(),
            parameters,
            step_executions: Vec::new(),
            restart_of: None,
            restarted_by: None,
        }
    }

    pub fn status(&self) -> BatchStatus {
        self.lifecycle.status
    }

    pub fn step_execution(&self, step_name: &str) -> Option<&StepExecution> {
        self.step_executions
            .iter()
            .rev()
            .find(|step| step.step_name == step_name)
    }
}
