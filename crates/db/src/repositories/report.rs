//! Report repository.

use std::sync::Arc;

use crate::entities::{
    Report, report,
    report::ReportStatus,
    user,
};
use enquete_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};

/// Per-status report count, for the moderation dashboard.
#[derive(Debug, Clone, FromQueryResult)]
pub struct StatusCount {
    /// The status bucket.
    pub status: ReportStatus,
    /// Number of reports in it.
    pub count: i64,
}

/// Report repository for database operations.
#[derive(Clone)]
pub struct ReportRepository {
    db: Arc<DatabaseConnection>,
}

impl ReportRepository {
    /// Create a new report repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create a new report.
    pub async fn create(&self, model: report::ActiveModel) -> AppResult<report::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a report by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<report::Model>> {
        Report::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a report by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<report::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Report {id} not found")))
    }

    /// Find the report a user filed against a poll, if any. Backed by the
    /// (reporter, poll) unique index.
    pub async fn find_by_reporter_and_poll(
        &self,
        reporter_id: &str,
        poll_id: &str,
    ) -> AppResult<Option<report::Model>> {
        Report::find()
            .filter(report::Column::ReporterId.eq(reporter_id))
            .filter(report::Column::PollId.eq(poll_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List reports with an optional status filter, newest first, with the
    /// reporting users.
    pub async fn find_all(
        &self,
        status: Option<ReportStatus>,
        page: u64,
        limit: u64,
    ) -> AppResult<Vec<(report::Model, Option<user::Model>)>> {
        let mut query = Report::find();

        if let Some(status) = status {
            query = query.filter(report::Column::Status.eq(status));
        }

        query
            .find_also_related(crate::entities::User)
            .order_by_desc(report::Column::CreatedAt)
            .offset(page.saturating_sub(1) * limit)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count reports, optionally restricted to a status.
    pub async fn count(&self, status: Option<ReportStatus>) -> AppResult<u64> {
        let mut query = Report::find();

        if let Some(status) = status {
            query = query.filter(report::Column::Status.eq(status));
        }

        query
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a report.
    pub async fn update(&self, model: report::ActiveModel) -> AppResult<report::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count reports per status in one grouped query.
    pub async fn count_by_status(&self) -> AppResult<Vec<StatusCount>> {
        Report::find()
            .select_only()
            .column(report::Column::Status)
            .column_as(report::Column::Id.count(), "count")
            .group_by(report::Column::Status)
            .into_model::<StatusCount>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// The most-reported poll IDs with their report counts, descending.
    pub async fn most_reported_polls(&self, limit: u64) -> AppResult<Vec<(String, i64)>> {
        #[derive(Debug, FromQueryResult)]
        struct PollReportCount {
            poll_id: String,
            count: i64,
        }

        let rows = Report::find()
            .select_only()
            .column(report::Column::PollId)
            .column_as(report::Column::Id.count(), "count")
            .group_by(report::Column::PollId)
            .order_by(report::Column::Id.count(), Order::Desc)
            .limit(limit)
            .into_model::<PollReportCount>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|r| (r.poll_id, r.count)).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn test_report(id: &str, reporter_id: &str, poll_id: &str) -> report::Model {
        report::Model {
            id: id.to_string(),
            reporter_id: reporter_id.to_string(),
            poll_id: poll_id.to_string(),
            reason: Some("Spam".to_string()),
            status: ReportStatus::Pending,
            created_at: Utc::now().into(),
            reviewed_at: None,
        }
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let report = test_report("r1", "user1", "poll1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[report.clone()]])
                .into_connection(),
        );

        let repo = ReportRepository::new(db);
        let result = repo.get_by_id("r1").await.unwrap();

        assert_eq!(result.id, "r1");
        assert_eq!(result.status, ReportStatus::Pending);
    }

    #[tokio::test]
    async fn test_find_by_reporter_and_poll_absent() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<report::Model>::new()])
                .into_connection(),
        );

        let repo = ReportRepository::new(db);
        let result = repo
            .find_by_reporter_and_poll("user1", "poll1")
            .await
            .unwrap();

        assert!(result.is_none());
    }
}
