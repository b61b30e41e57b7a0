//! Comment service.

use chrono::Utc;
use enquete_common::{AppError, AppResult, IdGenerator, ensure_id};
use enquete_db::{
    entities::{comment, poll, user, user::UserRole},
    repositories::{CommentRepository, PollRepository},
};
use sea_orm::Set;

use crate::authorization::{can_delete_comment, can_edit_comment};
use crate::services::poll::effectively_active;

/// Maximum comment length in characters.
const MAX_COMMENT_LEN: usize = 1000;

/// Default page size for comment listings.
const DEFAULT_PAGE_SIZE: u64 = 20;

/// Pagination metadata returned with listings.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct Pagination {
    /// Total matching rows.
    pub total: u64,
    /// Requested page (1-based).
    pub page: u64,
    /// Page size.
    pub limit: u64,
    /// Number of pages.
    #[serde(rename = "totalPages")]
    pub total_pages: u64,
}

impl Pagination {
    /// Build pagination metadata from a total count.
    #[must_use]
    pub const fn new(total: u64, page: u64, limit: u64) -> Self {
        let total_pages = total.div_ceil(limit);
        Self {
            total,
            page,
            limit,
            total_pages,
        }
    }
}

/// Normalize page/limit query parameters.
#[must_use]
pub fn normalize_page(page: Option<u64>, limit: Option<u64>) -> (u64, u64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);
    (page, limit)
}

/// Comment service for business logic.
#[derive(Clone)]
pub struct CommentService {
    comment_repo: CommentRepository,
    poll_repo: PollRepository,
    id_gen: IdGenerator,
}

impl CommentService {
    /// Create a new comment service.
    #[must_use]
    pub const fn new(comment_repo: CommentRepository, poll_repo: PollRepository) -> Self {
        Self {
            comment_repo,
            poll_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a comment on an active poll.
    pub async fn create(
        &self,
        user_id: &str,
        poll_id: &str,
        text: &str,
    ) -> AppResult<comment::Model> {
        ensure_id(poll_id)?;
        let text = validate_text(text)?;

        let poll = self.poll_repo.get_fresh(poll_id).await?;
        if !effectively_active(poll.is_active, &poll.ends_at, Utc::now()) {
            return Err(AppError::InvalidState(
                "This poll is no longer active".to_string(),
            ));
        }

        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            text: Set(text),
            user_id: Set(user_id.to_string()),
            poll_id: Set(poll_id.to_string()),
            is_active: Set(true),
            created_at: Set(Utc::now().into()),
            edited_at: Set(None),
        };

        self.comment_repo.create(model).await
    }

    /// List a poll's live comments with pagination metadata.
    pub async fn list_by_poll(
        &self,
        poll_id: &str,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> AppResult<(Vec<(comment::Model, Option<user::Model>)>, Pagination)> {
        ensure_id(poll_id)?;
        self.poll_repo.get_fresh(poll_id).await?;

        let (page, limit) = normalize_page(page, limit);
        let comments = self.comment_repo.find_by_poll(poll_id, page, limit).await?;
        let total = self.comment_repo.count_by_poll(poll_id).await?;

        Ok((comments, Pagination::new(total, page, limit)))
    }

    /// Get one live comment. Soft-deleted comments read as 404.
    pub async fn get(&self, comment_id: &str) -> AppResult<comment::Model> {
        ensure_id(comment_id)?;
        let comment = self.comment_repo.get_by_id(comment_id).await?;

        if !comment.is_active {
            return Err(AppError::NotFound(
                "This comment has been removed".to_string(),
            ));
        }

        Ok(comment)
    }

    /// Edit a comment's text. Author only.
    pub async fn update(
        &self,
        actor_id: &str,
        comment_id: &str,
        text: &str,
    ) -> AppResult<comment::Model> {
        let comment = self.get(comment_id).await?;
        let text = validate_text(text)?;

        if !can_edit_comment(actor_id, &comment.user_id) {
            return Err(AppError::Forbidden(
                "You do not have permission to edit this comment".to_string(),
            ));
        }

        let mut active: comment::ActiveModel = comment.into();
        active.text = Set(text);
        active.edited_at = Set(Some(Utc::now().into()));

        self.comment_repo.update(active).await
    }

    /// Soft-delete a comment. Allowed for the comment author, the poll
    /// author, or an admin.
    pub async fn delete(
        &self,
        actor_id: &str,
        actor_role: UserRole,
        comment_id: &str,
    ) -> AppResult<()> {
        let comment = self.get(comment_id).await?;
        let poll = self.poll_repo.get_by_id(&comment.poll_id).await?;

        if !can_delete_comment(actor_id, actor_role, &comment.user_id, &poll.author_id) {
            return Err(AppError::Forbidden(
                "You do not have permission to delete this comment".to_string(),
            ));
        }

        self.comment_repo.soft_delete(&comment.id).await
    }

    /// List the caller's own live comments with the polls they belong to.
    pub async fn list_by_user(
        &self,
        user_id: &str,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> AppResult<Vec<(comment::Model, Option<poll::Model>)>> {
        let (page, limit) = normalize_page(page, limit);
        self.comment_repo.find_by_user(user_id, page, limit).await
    }
}

fn validate_text(text: &str) -> AppResult<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("Comment text is required"));
    }
    if trimmed.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::validation(format!(
            "Comments can have at most {MAX_COMMENT_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn service_with(db: sea_orm::DatabaseConnection) -> CommentService {
        let db = Arc::new(db);
        CommentService::new(
            CommentRepository::new(Arc::clone(&db)),
            PollRepository::new(db),
        )
    }

    fn test_comment(id: &str, user_id: &str, active: bool) -> comment::Model {
        comment::Model {
            id: id.to_string(),
            text: "Nice".to_string(),
            user_id: user_id.to_string(),
            poll_id: "poll1".to_string(),
            is_active: active,
            created_at: Utc::now().into(),
            edited_at: None,
        }
    }

    #[test]
    fn test_validate_text_limits() {
        assert!(validate_text("   ").is_err());
        assert!(validate_text(&"x".repeat(1001)).is_err());
        assert_eq!(validate_text("  ok  ").unwrap(), "ok");
        assert!(validate_text(&"x".repeat(1000)).is_ok());
    }

    #[test]
    fn test_pagination_math() {
        let p = Pagination::new(41, 2, 20);
        assert_eq!(p.total_pages, 3);

        let p = Pagination::new(0, 1, 20);
        assert_eq!(p.total_pages, 0);
    }

    #[test]
    fn test_normalize_page_clamps() {
        assert_eq!(normalize_page(None, None), (1, 20));
        assert_eq!(normalize_page(Some(0), Some(500)), (1, 100));
        assert_eq!(normalize_page(Some(3), Some(10)), (3, 10));
    }

    #[tokio::test]
    async fn test_get_soft_deleted_is_not_found() {
        let comment = test_comment("01jde9mvk4qs7cfr3sv1bxh1hy", "user1", false);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[comment]])
            .into_connection();

        let service = service_with(db);
        let result = service.get("01jde9mvk4qs7cfr3sv1bxh1hy").await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_by_non_author_is_forbidden() {
        let comment = test_comment("01jde9mvk4qs7cfr3sv1bxh1hy", "author", true);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[comment]])
            .into_connection();

        let service = service_with(db);
        let result = service
            .update("intruder", "01jde9mvk4qs7cfr3sv1bxh1hy", "Edited")
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
