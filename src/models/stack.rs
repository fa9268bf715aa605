use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StackStatus {
    Working,
    Skipped,
    Done,
    Failed,
}

impl StackStatus {
    /// Terminal statuses never transition again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, StackStatus::Working)
    }
}

/// One tracked deployment attempt, identified by stack name.
#[derive(Debug, Clone, Serialize)]
pub struct Stack {
    pub id: usize,
    pub name: String,
    pub create: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: StackStatus,
}

impl Stack {
    pub fn new(id: usize, name: String, create: bool) -> Self {
        Self {
            id,
            name,
            create,
            started_at: Utc::now(),
            finished_at: None,
            status: StackStatus::Working,
        }
    }

    /// Advances the state machine from a raw CloudFormation status string.
    /// Returns whether the status changed; a terminal stack never moves,
    /// so duplicate polls after completion are no-ops.
    pub fn apply_backend_status(&mut self, raw: &str) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        self.status = if raw == "CREATE_COMPLETE" || raw == "DELETE_COMPLETE" {
            StackStatus::Done
        } else if raw.contains("FAILED") || raw.contains("ROLLBACK") {
            StackStatus::Failed
        } else {
            return false;
        };
        self.finished_at = Some(Utc::now());
        true
    }

    /// Operator override. Only a working stack can be skipped; anything
    /// already terminal stays put.
    pub fn mark_skipped(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = StackStatus::Skipped;
        true
    }

    /// The status CloudFormation should appear to report once this stack
    /// is skipped.
    pub fn synthetic_status(&self) -> &'static str {
        if self.create {
            "CREATE_COMPLETE"
        } else {
            "UPDATE_COMPLETE"
        }
    }
}
