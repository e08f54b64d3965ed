//! SQLite-backed interest directory: the static category/subreddit reference
//! data and each user's subscribed selection.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use std::collections::HashSet;
use std::str::FromStr;
use threadist_core::{
    CategoryInterests, CategorySubreddit, CoreError, DirectoryError, InterestCategory,
    InterestDirectory, UserInterest,
};
use tracing::{debug, info, warn};
use uuid::Uuid;


pub struct Database {
    connection_string: String,
    pool: Option<SqlitePool>,
}

impl Database {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            pool: None,
        }
    }

    /// Opens the pool. A single connection is kept so `sqlite::memory:`
    /// databases survive for the lifetime of the directory.
    pub async fn connect(&mut self) -> Result<(), CoreError> {
        let options = SqliteConnectOptions::from_str(&self.connection_string)
            .map_err(|e| DirectoryError::ConnectionFailed {
                reason: e.to_string(),
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| DirectoryError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        info!("Connected to interest directory at {}", self.connection_string);
        self.pool = Some(pool);
        Ok(())
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        sqlx::migrate!("./migrations")
            .run(self.pool()?)
            .await
            .map_err(|e| DirectoryError::MigrationFailed {
                reason: e.to_string(),
            })?;
        debug!("Interest directory migrations applied");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.pool.is_some()
    }

    fn pool(&self) -> Result<&SqlitePool, CoreError> {
        self.pool
            .as_ref()
            .ok_or_else(|| DirectoryError::NotConnected.into())
    }

    pub async fn upsert_category(&self, category: &InterestCategory) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO interest_categories (category_id, slug, label, emoji, description)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (category_id) DO UPDATE SET
                slug = excluded.slug,
                label = excluded.label,
                emoji = excluded.emoji,
                description = excluded.description",
        )
        .bind(&category.category_id)
        .bind(&category.slug)
        .bind(&category.label)
        .bind(&category.emoji)
        .bind(&category.description)
        .execute(self.pool()?)
        .await?;
        Ok(())
    }

    pub async fn upsert_category_subreddit(
        &self,
        mapping: &CategorySubreddit,
    ) -> Result<(), CoreError> {
        let category_id = mapping.category_id.as_deref().ok_or_else(|| {
            CoreError::InvalidInput {
                message: format!("mapping {} has no category", mapping.csid),
            }
        })?;

        sqlx::query(
            "INSERT INTO category_subreddits (csid, category_id, subreddit)
             VALUES (?, ?, ?)
             ON CONFLICT (csid) DO UPDATE SET
                category_id = excluded.category_id,
                subreddit = excluded.subreddit",
        )
        .bind(&mapping.csid)
        .bind(category_id)
        .bind(&mapping.subreddit)
        .execute(self.pool()?)
        .await?;
        Ok(())
    }

    /// Subscribes the user to every subreddit mapped under `category_ids`,
    /// replacing whatever they had selected before.
    pub async fn replace_user_selection_for_categories(
        &self,
        user_id: &str,
        category_ids: &[String],
    ) -> Result<(), CoreError> {
        let mappings = self.list_subreddits_for_categories(category_ids).await?;
        let csids: Vec<String> = mappings.into_iter().map(|m| m.csid).collect();
        self.replace_user_selection(user_id, &csids).await
    }
}

#[derive(FromRow)]
struct CategoryRecord {
    category_id: String,
    slug: String,
    label: String,
    emoji: Option<String>,
    description: Option<String>,
}

impl CategoryRecord {
    fn to_domain(self) -> InterestCategory {
        InterestCategory {
            category_id: self.category_id,
            slug: self.slug,
            label: self.label,
            emoji: self.emoji,
            description: self.description,
        }
    }
}

#[derive(FromRow)]
struct MappingRecord {
    csid: String,
    category_id: Option<String>,
    subreddit: String,
}

impl MappingRecord {
    fn to_domain(self) -> CategorySubreddit {
        CategorySubreddit {
            csid: self.csid,
            category_id: self.category_id,
            subreddit: self.subreddit,
        }
    }
}

#[derive(FromRow)]
struct SelectionRecord {
    interest_id: String,
    csid: String,
    user_id: String,
    weight: i64,
}

impl SelectionRecord {
    fn to_domain(self) -> UserInterest {
        UserInterest {
            interest_id: self.interest_id,
            csid: self.csid,
            user_id: self.user_id,
            weight: self.weight,
        }
    }
}

// One row per selected mapping, joined back to its category. The category
// columns are NULL when a selection points at a mapping whose category is gone.
#[derive(FromRow)]
struct ResolvedRecord {
    csid: String,
    subreddit: Option<String>,
    category_id: Option<String>,
    slug: Option<String>,
    label: Option<String>,
    emoji: Option<String>,
    description: Option<String>,
}

#[async_trait]
impl InterestDirectory for Database {
    async fn list_categories(&self) -> Result<Vec<InterestCategory>, CoreError> {
        let rows: Vec<CategoryRecord> = sqlx::query_as(
            "SELECT category_id, slug, label, emoji, description
             FROM interest_categories
             ORDER BY label",
        )
        .fetch_all(self.pool()?)
        .await?;
        debug!("Listed {} interest categories", rows.len());
        Ok(rows.into_iter().map(CategoryRecord::to_domain).collect())
    }

    async fn list_subreddits_for_categories(
        &self,
        category_ids: &[String],
    ) -> Result<Vec<CategorySubreddit>, CoreError> {
        if category_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT csid, category_id, subreddit FROM category_subreddits WHERE category_id IN (",
        );
        let mut separated = builder.separated(", ");
        for category_id in category_ids {
            separated.push_bind(category_id);
        }
        separated.push_unseparated(") ORDER BY category_id, subreddit");

        let rows: Vec<MappingRecord> = builder.build_query_as().fetch_all(self.pool()?).await?;
        debug!(
            "Resolved {} subreddits for {} categories",
            rows.len(),
            category_ids.len()
        );
        Ok(rows.into_iter().map(MappingRecord::to_domain).collect())
    }

    async fn replace_user_selection(&self, user_id: &str, csids: &[String]) -> Result<(), CoreError> {
        let mut seen = HashSet::new();
        let unique: Vec<&String> = csids.iter().filter(|csid| seen.insert(*csid)).collect();

        let pool = self.pool()?;
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM user_interests WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for csid in &unique {
            let inserted = sqlx::query(
                "INSERT INTO user_interests (interest_id, csid, user_id, weight) VALUES (?, ?, ?, 1)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(csid.as_str())
            .bind(user_id)
            .execute(&mut *tx)
            .await;

            if let Err(e) = inserted {
                warn!("Selection insert failed for user {}, rolling back: {}", user_id, e);
                tx.rollback().await?;
                return Err(DirectoryError::TransactionFailed {
                    reason: e.to_string(),
                }
                .into());
            }
        }

        tx.commit().await.map_err(|e| DirectoryError::TransactionFailed {
            reason: e.to_string(),
        })?;

        info!(
            "Replaced interest selection for user {} with {} subreddits",
            user_id,
            unique.len()
        );
        Ok(())
    }

    async fn user_selection(&self, user_id: &str) -> Result<Vec<UserInterest>, CoreError> {
        let rows: Vec<SelectionRecord> = sqlx::query_as(
            "SELECT interest_id, csid, user_id, weight
             FROM user_interests
             WHERE user_id = ?
             ORDER BY rowid",
        )
        .bind(user_id)
        .fetch_all(self.pool()?)
        .await?;
        Ok(rows.into_iter().map(SelectionRecord::to_domain).collect())
    }

    async fn has_completed_selection(&self, user_id: &str) -> Result<bool, CoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT interest_id FROM user_interests WHERE user_id = ? LIMIT 1")
                .bind(user_id)
                .fetch_optional(self.pool()?)
                .await?;
        Ok(row.is_some())
    }

    async fn resolve_user_interests_with_categories(
        &self,
        user_id: &str,
    ) -> Result<Vec<CategoryInterests>, CoreError> {
        let rows: Vec<ResolvedRecord> = sqlx::query_as(
            "SELECT ui.csid AS csid, cs.subreddit AS subreddit, c.category_id AS category_id,
                    c.slug AS slug, c.label AS label, c.emoji AS emoji,
                    c.description AS description
             FROM user_interests ui
             LEFT JOIN category_subreddits cs ON cs.csid = ui.csid
             LEFT JOIN interest_categories c ON c.category_id = cs.category_id
             WHERE ui.user_id = ?
             ORDER BY c.label, cs.subreddit",
        )
        .bind(user_id)
        .fetch_all(self.pool()?)
        .await?;

        group_by_category(rows)
    }
}

fn group_by_category(rows: Vec<ResolvedRecord>) -> Result<Vec<CategoryInterests>, CoreError> {
    let mut groups: Vec<CategoryInterests> = Vec::new();

    for row in rows {
        let (Some(subreddit), Some(category_id), Some(slug), Some(label)) =
            (row.subreddit, row.category_id, row.slug, row.label)
        else {
            return Err(DirectoryError::DataInconsistency {
                details: format!("selection {} does not resolve to a category", row.csid),
            }
            .into());
        };

        match groups
            .iter_mut()
            .find(|group| group.category.category_id == category_id)
        {
            Some(group) => group.subreddits.push(subreddit),
            None => groups.push(CategoryInterests {
                category: InterestCategory {
                    category_id,
                    slug,
                    label,
                    emoji: row.emoji,
                    description: row.description,
                },
                subreddits: vec![subreddit],
            }),
        }
    }

    Ok(groups)
}
