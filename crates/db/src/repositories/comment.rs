//! Comment repository.

use std::sync::Arc;

use crate::entities::{Comment, comment, poll, user};
use chrono::Utc;
use enquete_common::{AppError, AppResult};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

/// Comment repository for database operations.
#[derive(Clone)]
pub struct CommentRepository {
    db: Arc<DatabaseConnection>,
}

impl CommentRepository {
    /// Create a new comment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create a new comment.
    pub async fn create(&self, model: comment::ActiveModel) -> AppResult<comment::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a comment by ID, soft-deleted ones included.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<comment::Model>> {
        Comment::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a comment by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<comment::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment {id} not found")))
    }

    /// List a poll's live comments, newest first, with their authors.
    pub async fn find_by_poll(
        &self,
        poll_id: &str,
        page: u64,
        limit: u64,
    ) -> AppResult<Vec<(comment::Model, Option<user::Model>)>> {
        Comment::find()
            .filter(comment::Column::PollId.eq(poll_id))
            .filter(comment::Column::IsActive.eq(true))
            .find_also_related(crate::entities::User)
            .order_by_desc(comment::Column::CreatedAt)
            .offset(page.saturating_sub(1) * limit)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count a poll's live comments.
    pub async fn count_by_poll(&self, poll_id: &str) -> AppResult<u64> {
        Comment::find()
            .filter(comment::Column::PollId.eq(poll_id))
            .filter(comment::Column::IsActive.eq(true))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List a user's live comments, newest first, with the polls they
    /// belong to.
    pub async fn find_by_user(
        &self,
        user_id: &str,
        page: u64,
        limit: u64,
    ) -> AppResult<Vec<(comment::Model, Option<poll::Model>)>> {
        Comment::find()
            .filter(comment::Column::UserId.eq(user_id))
            .filter(comment::Column::IsActive.eq(true))
            .find_also_related(crate::entities::Poll)
            .order_by_desc(comment::Column::CreatedAt)
            .offset(page.saturating_sub(1) * limit)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a comment.
    pub async fn update(&self, model: comment::ActiveModel) -> AppResult<comment::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Soft-delete a comment: flip `is_active` and stamp `edited_at`.
    pub async fn soft_delete(&self, id: &str) -> AppResult<()> {
        Comment::update_many()
            .col_expr(comment::Column::IsActive, Expr::value(false))
            .col_expr(comment::Column::EditedAt, Expr::value(Utc::now()))
            .filter(comment::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn test_comment(id: &str, user_id: &str, poll_id: &str) -> comment::Model {
        comment::Model {
            id: id.to_string(),
            text: "Nice poll".to_string(),
            user_id: user_id.to_string(),
            poll_id: poll_id.to_string(),
            is_active: true,
            created_at: Utc::now().into(),
            edited_at: None,
        }
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<comment::Model>::new()])
                .into_connection(),
        );

        let repo = CommentRepository::new(db);
        let result = repo.get_by_id("missing").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_soft_delete_issues_update() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = CommentRepository::new(db);
        assert!(repo.soft_delete("c1").await.is_ok());
    }

    #[tokio::test]
    async fn test_count_by_poll() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[count_row(2)]])
                .into_connection(),
        );

        let repo = CommentRepository::new(db);
        let count = repo.count_by_poll("poll1").await.unwrap();
        assert_eq!(count, 2);
    }

    // MockDatabase count queries return a row with a num_items column.
    fn count_row(n: i64) -> std::collections::BTreeMap<&'static str, sea_orm::Value> {
        let mut map = std::collections::BTreeMap::new();
        map.insert("num_items", sea_orm::Value::BigInt(Some(n)));
        map
    }
}
