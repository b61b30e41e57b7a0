//! Moderation service for poll reports.

use chrono::Utc;
use enquete_common::{AppError, AppResult, IdGenerator, ensure_id};
use enquete_db::{
    entities::{poll, report, user},
    repositories::{PollRepository, ReportRepository, StatusCount},
};
use sea_orm::Set;

pub use enquete_db::entities::report::ReportStatus;

use crate::services::comment::{Pagination, normalize_page};

/// Maximum reason length in characters.
const MAX_REASON_LEN: usize = 500;

/// Input for filing a report.
#[derive(Debug)]
pub struct CreateReportInput {
    /// The reported poll.
    pub poll_id: String,
    /// Optional free-text reason.
    pub reason: Option<String>,
}

/// A report joined with its reporter and target poll.
#[derive(Debug, Clone)]
pub struct ReportView {
    /// The report row.
    pub report: report::Model,
    /// The reporting user, if still resolvable.
    pub reporter: Option<user::Model>,
    /// The reported poll, if still resolvable.
    pub poll: Option<poll::Model>,
}

/// Result of a status update.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    /// False when the report already had the requested status.
    pub updated: bool,
    /// Whether the target poll was deactivated as part of this update.
    pub poll_deactivated: bool,
    /// The status now in effect.
    pub status: ReportStatus,
}

/// Dashboard summary for moderators.
#[derive(Debug, Clone)]
pub struct ReportDashboard {
    /// Report counts per status.
    pub summary: Vec<StatusCount>,
    /// Total reports.
    pub total: i64,
    /// The most-reported polls with their report counts, descending.
    pub most_reported: Vec<(poll::Model, i64)>,
}

/// Moderation service for handling reports.
#[derive(Clone)]
pub struct ModerationService {
    report_repo: ReportRepository,
    poll_repo: PollRepository,
    id_gen: IdGenerator,
}

impl ModerationService {
    /// Create a new moderation service.
    #[must_use]
    pub const fn new(report_repo: ReportRepository, poll_repo: PollRepository) -> Self {
        Self {
            report_repo,
            poll_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// File a report against a poll. One report per (reporter, poll);
    /// duplicates are a conflict.
    pub async fn create_report(
        &self,
        reporter_id: &str,
        input: CreateReportInput,
    ) -> AppResult<report::Model> {
        ensure_id(&input.poll_id)?;

        let reason = match input.reason {
            Some(reason) => {
                let trimmed = reason.trim().to_string();
                if trimmed.chars().count() > MAX_REASON_LEN {
                    return Err(AppError::validation(format!(
                        "Reason can have at most {MAX_REASON_LEN} characters"
                    )));
                }
                if trimmed.is_empty() { None } else { Some(trimmed) }
            }
            None => None,
        };

        // Target must exist; the fetch also settles a stale active flag
        self.poll_repo.get_fresh(&input.poll_id).await?;

        // Uniqueness pre-check; the (reporter, poll) unique index backs this
        // up under concurrency
        if self
            .report_repo
            .find_by_reporter_and_poll(reporter_id, &input.poll_id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "You have already reported this poll".to_string(),
            ));
        }

        let model = report::ActiveModel {
            id: Set(self.id_gen.generate()),
            reporter_id: Set(reporter_id.to_string()),
            poll_id: Set(input.poll_id),
            reason: Set(reason),
            status: Set(ReportStatus::Pending),
            created_at: Set(Utc::now().into()),
            reviewed_at: Set(None),
        };

        self.report_repo.create(model).await
    }

    /// List reports with reporter and poll context.
    pub async fn list_reports(
        &self,
        status: Option<ReportStatus>,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> AppResult<(Vec<ReportView>, Pagination)> {
        let (page, limit) = normalize_page(page, limit);

        let rows = self.report_repo.find_all(status, page, limit).await?;
        let total = self.report_repo.count(status).await?;

        let mut views = Vec::with_capacity(rows.len());
        for (report, reporter) in rows {
            let poll = self.poll_repo.find_by_id(&report.poll_id).await?;
            views.push(ReportView {
                report,
                reporter,
                poll,
            });
        }

        Ok((views, Pagination::new(total, page, limit)))
    }

    /// Get one report with context.
    pub async fn get_report(&self, id: &str) -> AppResult<ReportView> {
        ensure_id(id)?;
        let report = self.report_repo.get_by_id(id).await?;
        let poll = self.poll_repo.find_by_id(&report.poll_id).await?;

        Ok(ReportView {
            report,
            reporter: None,
            poll,
        })
    }

    /// Change a report's status.
    ///
    /// Every status is reachable from every other; setting the current
    /// status again is a no-op. Accepting with `deactivate_poll` forces the
    /// target poll inactive — the only deactivation path outside the
    /// expiration machinery.
    pub async fn update_status(
        &self,
        id: &str,
        status: ReportStatus,
        deactivate_poll: bool,
    ) -> AppResult<StatusUpdate> {
        ensure_id(id)?;
        let report = self.report_repo.get_by_id(id).await?;

        if report.status == status {
            return Ok(StatusUpdate {
                updated: false,
                poll_deactivated: false,
                status,
            });
        }

        let poll_id = report.poll_id.clone();
        let mut active: report::ActiveModel = report.into();
        active.status = Set(status);
        active.reviewed_at = Set(Some(Utc::now().into()));
        self.report_repo.update(active).await?;

        let poll_deactivated = if status == ReportStatus::Accepted && deactivate_poll {
            self.poll_repo.set_inactive(&poll_id).await?;
            true
        } else {
            false
        };

        Ok(StatusUpdate {
            updated: true,
            poll_deactivated,
            status,
        })
    }

    /// Build the moderation dashboard.
    pub async fn dashboard(&self, top: u64) -> AppResult<ReportDashboard> {
        let summary = self.report_repo.count_by_status().await?;
        let total = summary.iter().map(|s| s.count).sum();

        let mut most_reported = Vec::new();
        for (poll_id, count) in self.report_repo.most_reported_polls(top).await? {
            if let Some(poll) = self.poll_repo.find_by_id(&poll_id).await? {
                most_reported.push((poll, count));
            }
        }

        Ok(ReportDashboard {
            summary,
            total,
            most_reported,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    const REPORT_ID: &str = "01jde9mvk4qs7cfr3sv1bxh1hy";
    const POLL_ID: &str = "01jde9mvk4qs7cfr3sv1bxh2aa";

    fn service_with(db: sea_orm::DatabaseConnection) -> ModerationService {
        let db = Arc::new(db);
        ModerationService::new(
            ReportRepository::new(Arc::clone(&db)),
            PollRepository::new(db),
        )
    }

    fn test_report(status: ReportStatus) -> report::Model {
        report::Model {
            id: REPORT_ID.to_string(),
            reporter_id: "user1".to_string(),
            poll_id: POLL_ID.to_string(),
            reason: None,
            status,
            created_at: Utc::now().into(),
            reviewed_at: None,
        }
    }

    #[tokio::test]
    async fn test_update_status_same_value_is_noop() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_report(ReportStatus::Pending)]])
            .into_connection();

        let service = service_with(db);
        let result = service
            .update_status(REPORT_ID, ReportStatus::Pending, false)
            .await
            .unwrap();

        assert!(!result.updated);
        assert!(!result.poll_deactivated);
    }

    #[tokio::test]
    async fn test_update_status_accept_with_deactivation() {
        let pending = test_report(ReportStatus::Pending);
        let mut accepted = test_report(ReportStatus::Accepted);
        accepted.reviewed_at = Some(Utc::now().into());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // get_by_id
            .append_query_results([[pending]])
            // update returns the refreshed row
            .append_query_results([[accepted]])
            // report update + poll set_inactive
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ])
            .into_connection();

        let service = service_with(db);
        let result = service
            .update_status(REPORT_ID, ReportStatus::Accepted, true)
            .await
            .unwrap();

        assert!(result.updated);
        assert!(result.poll_deactivated);
        assert_eq!(result.status, ReportStatus::Accepted);
    }

    #[tokio::test]
    async fn test_duplicate_report_is_conflict() {
        let poll = poll::Model {
            id: POLL_ID.to_string(),
            title: "Lunch?".to_string(),
            description: "Where".to_string(),
            ends_at: (Utc::now() + chrono::Duration::days(1)).into(),
            is_active: true,
            author_id: "author".to_string(),
            created_at: Utc::now().into(),
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // poll exists
            .append_query_results([[poll]])
            // duplicate report found
            .append_query_results([[test_report(ReportStatus::Pending)]])
            .into_connection();

        let service = service_with(db);
        let result = service
            .create_report(
                "user1",
                CreateReportInput {
                    poll_id: POLL_ID.to_string(),
                    reason: Some("Spam".to_string()),
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }
}
