use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::Row;

use super::{ContributionRepository, RepositoryError};
use crate::records::{ContributionRecord, NewContribution};
use crate::DbPool;

pub struct SqlContributionRepository {
    pool: DbPool,
}

impl SqlContributionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_contribution(row: &sqlx::sqlite::SqliteRow) -> Result<ContributionRecord, RepositoryError> {
    let metadata_text: Option<String> =
        row.try_get("metadata").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let metadata = metadata_text
        .map(|text| serde_json::from_str(&text))
        .transpose()
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let contribution_date: String =
        row.try_get("contribution_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let contribution_date = DateTime::parse_from_rfc3339(&contribution_date)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(ContributionRecord {
        id: row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        contributor_id: row
            .try_get("contributor_id")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        action_type: row
            .try_get("action_type")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        points_earned: row
            .try_get("points_earned")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        multiplier: row.try_get("multiplier").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        final_points: row
            .try_get("final_points")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        metadata,
        contribution_date,
        description: row
            .try_get("description")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        category: row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?,
    })
}

#[async_trait::async_trait]
impl ContributionRepository for SqlContributionRepository {
    async fn insert(&self, contribution: NewContribution) -> Result<i64, RepositoryError> {
        let metadata_text = contribution
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        let result = sqlx::query(
            "INSERT INTO contributions
                 (contributor_id, action_type, points_earned, multiplier, final_points,
                  metadata, contribution_date)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(contribution.contributor_id)
        .bind(&contribution.action_type)
        .bind(contribution.points_earned)
        .bind(contribution.multiplier)
        .bind(contribution.final_points)
        .bind(&metadata_text)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn list_recent(
        &self,
        contributor_id: i64,
        limit: u32,
    ) -> Result<Vec<ContributionRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT c.id, c.contributor_id, c.action_type, c.points_earned, c.multiplier,
                    c.final_points, c.metadata, c.contribution_date,
                    at.description, at.category
             FROM contributions c
             LEFT JOIN action_types at ON c.action_type = at.action_name
             WHERE c.contributor_id = ?
             ORDER BY c.contribution_date DESC
             LIMIT ?",
        )
        .bind(contributor_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_contribution).collect()
    }

    async fn category_points(
        &self,
        contributor_id: i64,
    ) -> Result<HashMap<String, i64>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT at.category, SUM(c.final_points) AS points
             FROM contributions c
             JOIN action_types at ON c.action_type = at.action_name
             WHERE c.contributor_id = ?
             GROUP BY at.category",
        )
        .bind(contributor_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let category: String =
                    row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let points: i64 =
                    row.try_get("points").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                Ok((category, points))
            })
            .collect()
    }

    async fn action_counts(
        &self,
        contributor_id: i64,
    ) -> Result<HashMap<String, i64>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT action_type, COUNT(*) AS count
             FROM contributions
             WHERE contributor_id = ?
             GROUP BY action_type",
        )
        .bind(contributor_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let action: String = row
                    .try_get("action_type")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let count: i64 =
                    row.try_get("count").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                Ok((action, count))
            })
            .collect()
    }
}
