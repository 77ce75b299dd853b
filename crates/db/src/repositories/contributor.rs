use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;

use attache_core::points::next_streak;

use super::{ContributorRepository, RepositoryError};
use crate::records::{Contributor, LeaderboardEntry};
use crate::DbPool;

pub struct SqlContributorRepository {
    pool: DbPool,
}

impl SqlContributorRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_contributor(row: &sqlx::sqlite::SqliteRow) -> Result<Contributor, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let github_username: String =
        row.try_get("github_username").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let total_points: i64 =
        row.try_get("total_points").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let current_streak: i64 =
        row.try_get("current_streak").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let longest_streak: i64 =
        row.try_get("longest_streak").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let is_first_timer: bool =
        row.try_get("is_first_timer").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let first_contribution_date: Option<String> = row
        .try_get("first_contribution_date")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let last_contribution_date: Option<String> = row
        .try_get("last_contribution_date")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Contributor {
        id,
        github_username,
        total_points,
        current_streak: u32::try_from(current_streak).unwrap_or_default(),
        longest_streak: u32::try_from(longest_streak).unwrap_or_default(),
        is_first_timer,
        first_contribution_date: first_contribution_date.as_deref().map(parse_timestamp),
        last_contribution_date: last_contribution_date
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

#[async_trait::async_trait]
impl ContributorRepository for SqlContributorRepository {
    async fn get_or_create(&self, github_username: &str) -> Result<Contributor, RepositoryError> {
        if let Some(existing) = self.find_by_username(github_username).await? {
            return Ok(existing);
        }

        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO contributors (github_username, first_contribution_date)
             VALUES (?, ?)
             ON CONFLICT(github_username) DO NOTHING",
        )
        .bind(github_username)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let created = self.find_by_username(github_username).await?;
        created.ok_or_else(|| {
            RepositoryError::Decode(format!("contributor `{github_username}` vanished after insert"))
        })
    }

    async fn find_by_username(
        &self,
        github_username: &str,
    ) -> Result<Option<Contributor>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, github_username, total_points, current_streak, longest_streak,
                    is_first_timer, first_contribution_date, last_contribution_date,
                    created_at, updated_at
             FROM contributors WHERE github_username = ?",
        )
        .bind(github_username)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_contributor(r)?)),
            None => Ok(None),
        }
    }

    async fn add_points(&self, contributor_id: i64, points: i64) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE contributors
             SET total_points = total_points + ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(points)
        .bind(Utc::now().to_rfc3339())
        .bind(contributor_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_contribution_day(
        &self,
        contributor_id: i64,
        day: NaiveDate,
    ) -> Result<u32, RepositoryError> {
        let row = sqlx::query(
            "SELECT last_contribution_date, current_streak FROM contributors WHERE id = ?",
        )
        .bind(contributor_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(RepositoryError::Decode(format!(
                "contributor id {contributor_id} does not exist"
            )));
        };

        let last: Option<String> = row
            .try_get("last_contribution_date")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let current: i64 =
            row.try_get("current_streak").map_err(|e| RepositoryError::Decode(e.to_string()))?;

        let last_date = last.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok());
        let new_streak = next_streak(last_date, day, u32::try_from(current).unwrap_or_default());

        sqlx::query(
            "UPDATE contributors
             SET current_streak = ?,
                 longest_streak = MAX(longest_streak, ?),
                 last_contribution_date = ?,
                 is_first_timer = 0,
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(i64::from(new_streak))
        .bind(i64::from(new_streak))
        .bind(day.format("%Y-%m-%d").to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(contributor_id)
        .execute(&self.pool)
        .await?;

        Ok(new_streak)
    }

    async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT c.github_username, c.total_points, c.current_streak, c.longest_streak,
                    COUNT(cb.badge_id) AS badge_count
             FROM contributors c
             LEFT JOIN contributor_badges cb ON c.id = cb.contributor_id
             GROUP BY c.id
             ORDER BY c.total_points DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let current_streak: i64 = row
                    .try_get("current_streak")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let longest_streak: i64 = row
                    .try_get("longest_streak")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;
                Ok(LeaderboardEntry {
                    github_username: row
                        .try_get("github_username")
                        .map_err(|e| RepositoryError::Decode(e.to_string()))?,
                    total_points: row
                        .try_get("total_points")
                        .map_err(|e| RepositoryError::Decode(e.to_string()))?,
                    current_streak: u32::try_from(current_streak).unwrap_or_default(),
                    longest_streak: u32::try_from(longest_streak).unwrap_or_default(),
                    badge_count: row
                        .try_get("badge_count")
                        .map_err(|e| RepositoryError::Decode(e.to_string()))?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::SqlContributorRepository;
    use crate::repositories::ContributorRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn day(year: i32, month: u32, dayn: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, dayn).expect("valid date")
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let repo = SqlContributorRepository::new(setup().await);

        let first = repo.get_or_create("octocat").await.expect("create");
        let second = repo.get_or_create("octocat").await.expect("fetch");

        assert_eq!(first.id, second.id);
        assert_eq!(second.total_points, 0);
        assert!(second.is_first_timer);
        assert!(second.first_contribution_date.is_some());
    }

    #[tokio::test]
    async fn add_points_accumulates() {
        let repo = SqlContributorRepository::new(setup().await);
        let contributor = repo.get_or_create("octocat").await.expect("create");

        repo.add_points(contributor.id, 12).await.expect("add 12");
        repo.add_points(contributor.id, 5).await.expect("add 5");

        let updated = repo.find_by_username("octocat").await.expect("find").expect("exists");
        assert_eq!(updated.total_points, 17);
    }

    #[tokio::test]
    async fn streak_extends_holds_and_resets() {
        let repo = SqlContributorRepository::new(setup().await);
        let contributor = repo.get_or_create("octocat").await.expect("create");

        let s1 = repo.record_contribution_day(contributor.id, day(2025, 3, 1)).await.expect("d1");
        assert_eq!(s1, 1);

        let s2 = repo.record_contribution_day(contributor.id, day(2025, 3, 2)).await.expect("d2");
        assert_eq!(s2, 2);

        let same = repo.record_contribution_day(contributor.id, day(2025, 3, 2)).await.expect("d2b");
        assert_eq!(same, 2);

        let reset = repo.record_contribution_day(contributor.id, day(2025, 3, 9)).await.expect("d9");
        assert_eq!(reset, 1);

        let updated = repo.find_by_username("octocat").await.expect("find").expect("exists");
        assert_eq!(updated.longest_streak, 2);
        assert!(!updated.is_first_timer);
    }

    #[tokio::test]
    async fn leaderboard_orders_by_total_points() {
        let repo = SqlContributorRepository::new(setup().await);

        let alice = repo.get_or_create("alice").await.expect("alice");
        let bob = repo.get_or_create("bob").await.expect("bob");
        repo.get_or_create("carol").await.expect("carol");

        repo.add_points(alice.id, 40).await.expect("alice points");
        repo.add_points(bob.id, 90).await.expect("bob points");

        let entries = repo.leaderboard(2).await.expect("leaderboard");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].github_username, "bob");
        assert_eq!(entries[0].total_points, 90);
        assert_eq!(entries[1].github_username, "alice");
        assert_eq!(entries[0].badge_count, 0);
    }
}
