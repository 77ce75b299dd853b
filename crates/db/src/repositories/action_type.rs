use sqlx::Row;

use super::{ActionTypeRepository, RepositoryError};
use crate::records::ActionType;
use crate::DbPool;

pub struct SqlActionTypeRepository {
    pool: DbPool,
}

impl SqlActionTypeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_action_type(row: &sqlx::sqlite::SqliteRow) -> Result<ActionType, RepositoryError> {
    Ok(ActionType {
        id: row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        action_name: row
            .try_get("action_name")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        description: row
            .try_get("description")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        category: row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        base_points: row
            .try_get("base_points")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
    })
}

#[async_trait::async_trait]
impl ActionTypeRepository for SqlActionTypeRepository {
    async fn find(&self, action_name: &str) -> Result<Option<ActionType>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, action_name, description, category, base_points
             FROM action_types WHERE action_name = ?",
        )
        .bind(action_name)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_action_type(r)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<ActionType>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, action_name, description, category, base_points
             FROM action_types
             ORDER BY category, base_points DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_action_type).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::SqlActionTypeRepository;
    use crate::repositories::ActionTypeRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn seeded_actions_resolve_base_points() {
        let repo = SqlActionTypeRepository::new(setup().await);

        let security = repo.find("security_fix").await.expect("find").expect("exists");
        assert_eq!(security.base_points, 15);
        assert_eq!(security.category, "quality");

        let unknown = repo.find("made_coffee").await.expect("find");
        assert!(unknown.is_none());
    }

    #[tokio::test]
    async fn list_returns_every_seeded_action() {
        let repo = SqlActionTypeRepository::new(setup().await);

        let actions = repo.list().await.expect("list");
        assert_eq!(actions.len(), 17);
        assert!(actions.iter().any(|a| a.action_name == "review_performance_suggestion"));
    }
}
