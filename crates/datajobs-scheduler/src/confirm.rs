use async_trait::async_trait;
use uuid::Uuid;

/// Asks an operator to approve a destructive action.
#[async_trait]
pub trait ConfirmationPrompt: Send + Sync {
    async fn confirm(&self, title: &str, message: &str) -> Decision;
}

/// Operator's answer to a [`ConfirmationPrompt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Decline,
}

impl From<bool> for Decision {
    fn from(approved: bool) -> Self {
        if approved {
            Decision::Approve
        } else {
            Decision::Decline
        }
    }
}

/// A delete awaiting confirmation, issued by
/// [`SchedulingCoordinator::request_delete`](crate::SchedulingCoordinator::request_delete).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelete {
    pub token: Uuid,
    pub job_id: i64,
    pub title: String,
    pub message: String,
}

impl PendingDelete {
    pub(crate) fn new(job_id: i64, job_name: &str) -> Self {
        Self {
            token: Uuid::new_v4(),
            job_id,
            title: "Delete Job".to_string(),
            message: format!("Are you sure you want to delete {job_name}?"),
        }
    }
}
