//! Database models for enhancement jobs.

use crate::types::{AccountId, JobId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Job lifecycle status stored as TEXT in database.
///
/// Transitions only move forward: `pending → processing → {completed | failed}`. A pending
/// job may also fail directly when it never reached the provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }

    /// Statuses a job may be in immediately before entering `next`
    pub fn predecessors(next: JobStatus) -> Vec<JobStatus> {
        [JobStatus::Pending, JobStatus::Processing, JobStatus::Completed, JobStatus::Failed]
            .into_iter()
            .filter(|status| status.can_transition_to(next))
            .collect()
    }
}

/// Database request for creating a job (always created `pending`)
#[derive(Debug, Clone)]
pub struct JobCreateDBRequest {
    pub id: JobId,
    pub account_id: AccountId,
    pub source_image: String,
    pub prompt: String,
    pub preset_used: String,
    pub provider: String,
    pub credits_charged: i64,
}

/// Database response for a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct JobDBResponse {
    pub id: JobId,
    pub account_id: AccountId,
    pub source_image: String,
    pub prompt: String,
    pub preset_used: String,
    pub provider: String,
    pub provider_cost: Decimal,
    pub credits_charged: i64,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_only_move_forward() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Failed));

        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn test_predecessors() {
        assert_eq!(JobStatus::predecessors(JobStatus::Processing), vec![JobStatus::Pending]);
        assert_eq!(JobStatus::predecessors(JobStatus::Completed), vec![JobStatus::Processing]);
        assert_eq!(
            JobStatus::predecessors(JobStatus::Failed),
            vec![JobStatus::Pending, JobStatus::Processing]
        );
        assert!(JobStatus::predecessors(JobStatus::Pending).is_empty());
    }
}
