use crate::db::{
    errors::{DbError, Result},
    handlers::jobs::VARIATION_COLUMNS,
    models::variations::{ArtifactCreateDBRequest, ArtifactDBResponse, VariationDBResponse},
};
use crate::types::{ArtifactId, JobId, VariationId};
use sqlx::{Connection, PgConnection};

const ARTIFACT_COLUMNS: &str = "id, image_reference, variation_id, upscaled_url, download_count, created_at";

/// Variations of completed jobs, their selection, and the final artifacts made from them
pub struct Variations<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Variations<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn list_for_job(&mut self, job_id: JobId) -> Result<Vec<VariationDBResponse>> {
        let variations = sqlx::query_as::<_, VariationDBResponse>(&format!(
            "SELECT {VARIATION_COLUMNS} FROM variations WHERE job_id = $1 ORDER BY position"
        ))
        .bind(job_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(variations)
    }

    pub async fn get_by_id(&mut self, id: VariationId) -> Result<Option<VariationDBResponse>> {
        let variation = sqlx::query_as::<_, VariationDBResponse>(&format!("SELECT {VARIATION_COLUMNS} FROM variations WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(variation)
    }

    /// Resolve a variation from its output URL (oldest first if a URL was ever reused)
    pub async fn get_by_url(&mut self, url: &str) -> Result<Option<VariationDBResponse>> {
        let variation = sqlx::query_as::<_, VariationDBResponse>(&format!(
            "SELECT {VARIATION_COLUMNS} FROM variations WHERE url = $1 ORDER BY created_at, position LIMIT 1"
        ))
        .bind(url)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(variation)
    }

    /// Mark one variation as the job's selection, clearing any previous selection
    pub async fn select(&mut self, id: VariationId) -> Result<VariationDBResponse> {
        let mut tx = self.db.begin().await?;

        let job_id = sqlx::query_scalar::<_, JobId>("SELECT job_id FROM variations WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;

        // Serialize concurrent selections within the same job
        sqlx::query("SELECT id FROM variations WHERE job_id = $1 FOR UPDATE")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE variations SET is_selected = FALSE WHERE job_id = $1 AND id <> $2 AND is_selected")
            .bind(job_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let variation = sqlx::query_as::<_, VariationDBResponse>(&format!(
            "UPDATE variations SET is_selected = TRUE WHERE id = $1 RETURNING {VARIATION_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(variation)
    }

    pub async fn get_artifact(&mut self, id: ArtifactId) -> Result<Option<ArtifactDBResponse>> {
        let artifact = sqlx::query_as::<_, ArtifactDBResponse>(&format!("SELECT {ARTIFACT_COLUMNS} FROM final_artifacts WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(artifact)
    }

    pub async fn get_artifact_for_variation(&mut self, variation_id: VariationId) -> Result<Option<ArtifactDBResponse>> {
        let artifact = sqlx::query_as::<_, ArtifactDBResponse>(&format!(
            "SELECT {ARTIFACT_COLUMNS} FROM final_artifacts WHERE variation_id = $1"
        ))
        .bind(variation_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(artifact)
    }

    /// Create the final artifact for a selected variation.
    ///
    /// If the variation already has an artifact that one is returned unchanged.
    pub async fn create_artifact(&mut self, request: &ArtifactCreateDBRequest) -> Result<ArtifactDBResponse> {
        let inserted = sqlx::query_as::<_, ArtifactDBResponse>(&format!(
            r#"
            INSERT INTO final_artifacts (id, image_reference, variation_id, upscaled_url)
            SELECT $1, $2, v.id, $4
            FROM variations v
            WHERE v.id = $3 AND v.is_selected
            ON CONFLICT (variation_id) DO NOTHING
            RETURNING {ARTIFACT_COLUMNS}
            "#
        ))
        .bind(request.id)
        .bind(&request.image_reference)
        .bind(request.variation_id)
        .bind(&request.upscaled_url)
        .fetch_optional(&mut *self.db)
        .await?;

        if let Some(artifact) = inserted {
            return Ok(artifact);
        }

        if let Some(existing) = self.get_artifact_for_variation(request.variation_id).await? {
            return Ok(existing);
        }

        match self.get_by_id(request.variation_id).await? {
            Some(_) => Err(DbError::Conflict {
                entity_type: "Variation".to_string(),
                entity_id: request.variation_id.to_string(),
                reason: "variation is not selected".to_string(),
            }),
            None => Err(DbError::NotFound),
        }
    }

    pub async fn record_download(&mut self, id: ArtifactId) -> Result<ArtifactDBResponse> {
        let artifact = sqlx::query_as::<_, ArtifactDBResponse>(&format!(
            r#"
            UPDATE final_artifacts
            SET download_count = download_count + 1
            WHERE id = $1
            RETURNING {ARTIFACT_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        artifact.ok_or(DbError::NotFound)
    }
}
