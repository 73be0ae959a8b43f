use crate::db::{
    errors::{DbError, Result},
    models::{
        jobs::{JobCreateDBRequest, JobDBResponse, JobStatus},
        variations::VariationDBResponse,
    },
};
use crate::types::JobId;
use rust_decimal::Decimal;
use sqlx::{Connection, PgConnection};

const JOB_COLUMNS: &str = "id, account_id, source_image, prompt, preset_used, provider, provider_cost, credits_charged, \
                           status, error_message, created_at, completed_at";

pub(crate) const VARIATION_COLUMNS: &str = "id, job_id, position, url, is_selected, created_at";

/// Enhancement job lifecycle.
///
/// Status updates are guarded by the set of statuses allowed to precede the target, so a job
/// can never move backwards or leave a terminal state.
pub struct Jobs<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Jobs<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn create(&mut self, request: &JobCreateDBRequest) -> Result<JobDBResponse> {
        let job = sqlx::query_as::<_, JobDBResponse>(&format!(
            r#"
            INSERT INTO enhancement_jobs (id, account_id, source_image, prompt, preset_used, provider, credits_charged, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending')
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(request.id)
        .bind(request.account_id)
        .bind(&request.source_image)
        .bind(&request.prompt)
        .bind(&request.preset_used)
        .bind(&request.provider)
        .bind(request.credits_charged)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(job)
    }

    pub async fn get_by_id(&mut self, id: JobId) -> Result<Option<JobDBResponse>> {
        let job = sqlx::query_as::<_, JobDBResponse>(&format!("SELECT {JOB_COLUMNS} FROM enhancement_jobs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(job)
    }

    pub async fn mark_processing(&mut self, id: JobId) -> Result<JobDBResponse> {
        let job = sqlx::query_as::<_, JobDBResponse>(&format!(
            r#"
            UPDATE enhancement_jobs
            SET status = 'processing'
            WHERE id = $1 AND status = ANY($2)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(predecessor_names(JobStatus::Processing))
        .fetch_optional(&mut *self.db)
        .await?;

        match job {
            Some(job) => Ok(job),
            None => Err(Self::transition_error(&mut *self.db, id, JobStatus::Processing).await),
        }
    }

    /// Complete a job and record its variations atomically
    pub async fn complete(&mut self, id: JobId, provider_cost: Decimal, urls: &[String]) -> Result<(JobDBResponse, Vec<VariationDBResponse>)> {
        let mut tx = self.db.begin().await?;

        let job = sqlx::query_as::<_, JobDBResponse>(&format!(
            r#"
            UPDATE enhancement_jobs
            SET status = 'completed', provider_cost = $2, completed_at = NOW()
            WHERE id = $1 AND status = ANY($3)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(provider_cost)
        .bind(predecessor_names(JobStatus::Completed))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(job) = job else {
            return Err(Self::transition_error(&mut *tx, id, JobStatus::Completed).await);
        };

        let mut variations = Vec::with_capacity(urls.len());
        for (position, url) in urls.iter().enumerate() {
            let variation = sqlx::query_as::<_, VariationDBResponse>(&format!(
                r#"
                INSERT INTO variations (id, job_id, position, url)
                VALUES ($1, $2, $3, $4)
                RETURNING {VARIATION_COLUMNS}
                "#
            ))
            .bind(uuid::Uuid::new_v4())
            .bind(id)
            .bind(position as i32)
            .bind(url)
            .fetch_one(&mut *tx)
            .await?;
            variations.push(variation);
        }

        tx.commit().await?;

        Ok((job, variations))
    }

    pub async fn fail(&mut self, id: JobId, error_message: &str) -> Result<JobDBResponse> {
        let job = sqlx::query_as::<_, JobDBResponse>(&format!(
            r#"
            UPDATE enhancement_jobs
            SET status = 'failed', error_message = $2, completed_at = NOW()
            WHERE id = $1 AND status = ANY($3)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(error_message)
        .bind(predecessor_names(JobStatus::Failed))
        .fetch_optional(&mut *self.db)
        .await?;

        match job {
            Some(job) => Ok(job),
            None => Err(Self::transition_error(&mut *self.db, id, JobStatus::Failed).await),
        }
    }

    /// Work out why a guarded status update matched no rows
    async fn transition_error(conn: &mut PgConnection, id: JobId, next: JobStatus) -> DbError {
        let current = sqlx::query_scalar::<_, JobStatus>("SELECT status FROM enhancement_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await;

        match current {
            Ok(Some(current)) => DbError::Conflict {
                entity_type: "Job".to_string(),
                entity_id: id.to_string(),
                reason: format!("cannot move from {} to {}", current.as_str(), next.as_str()),
            },
            Ok(None) => DbError::NotFound,
            Err(e) => e.into(),
        }
    }
}

fn predecessor_names(next: JobStatus) -> Vec<String> {
    JobStatus::predecessors(next).iter().map(|s| s.as_str().to_string()).collect()
}
