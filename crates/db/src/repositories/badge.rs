use chrono::{DateTime, Utc};
use sqlx::Row;

use attache_core::points::BadgeTier;

use super::{BadgeRepository, RepositoryError};
use crate::records::{Badge, EarnedBadge};
use crate::DbPool;

pub struct SqlBadgeRepository {
    pool: DbPool,
}

impl SqlBadgeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_tier(value: &str) -> BadgeTier {
    match value {
        "silver" => BadgeTier::Silver,
        "gold" => BadgeTier::Gold,
        "platinum" => BadgeTier::Platinum,
        "special" => BadgeTier::Special,
        _ => BadgeTier::Bronze,
    }
}

fn row_to_badge(row: &sqlx::sqlite::SqliteRow) -> Result<Badge, RepositoryError> {
    let tier: String = row.try_get("tier").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let criteria_text: Option<String> =
        row.try_get("criteria").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let criteria = criteria_text
        .map(|text| serde_json::from_str(&text))
        .transpose()
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Badge {
        id: row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        name: row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        description: row
            .try_get("description")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        tier: parse_tier(&tier),
        points_required: row
            .try_get("points_required")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        criteria,
    })
}

#[async_trait::async_trait]
impl BadgeRepository for SqlBadgeRepository {
    async fn list_all(&self) -> Result<Vec<Badge>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, description, tier, points_required, criteria
             FROM badges
             ORDER BY tier, points_required",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_badge).collect()
    }

    async fn earned_by(&self, contributor_id: i64) -> Result<Vec<EarnedBadge>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT b.id, b.name, b.description, b.tier, b.points_required, b.criteria,
                    cb.awarded_date
             FROM contributor_badges cb
             JOIN badges b ON cb.badge_id = b.id
             WHERE cb.contributor_id = ?
             ORDER BY cb.awarded_date DESC",
        )
        .bind(contributor_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let awarded: String = row
                    .try_get("awarded_date")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;
                Ok(EarnedBadge {
                    badge: row_to_badge(row)?,
                    awarded_date: DateTime::parse_from_rfc3339(&awarded)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })
            .collect()
    }

    async fn award(&self, contributor_id: i64, badge_id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO contributor_badges (contributor_id, badge_id, awarded_date)
             VALUES (?, ?, ?)
             ON CONFLICT(contributor_id, badge_id) DO NOTHING",
        )
        .bind(contributor_id)
        .bind(badge_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
