//! Report endpoints: filing and moderation.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use enquete_common::{AppError, AppResult};
use enquete_core::{CreateReportInput, Pagination, ReportStatus, ReportView};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::{AdminUser, AuthUser},
    middleware::AppState,
};

/// Report creation request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportRequest {
    #[serde(default)]
    pub enquete_id: String,
    pub motivo: Option<String>,
}

/// Report creation response.
#[derive(Debug, Serialize)]
pub struct CreateReportResponse {
    pub id: String,
    pub message: String,
}

/// File a report against a poll.
async fn create_report(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateReportRequest>,
) -> AppResult<(StatusCode, Json<CreateReportResponse>)> {
    let report = state
        .moderation_service
        .create_report(
            claims.user_id(),
            CreateReportInput {
                poll_id: req.enquete_id,
                reason: req.motivo,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateReportResponse {
            id: report.id,
            message: "Report filed successfully!".to_string(),
        }),
    ))
}

/// Reporter summary nested in a report.
#[derive(Debug, Serialize)]
pub struct ReporterResponse {
    pub id: String,
    pub username: String,
    pub email: String,
}

/// Poll summary nested in a report.
#[derive(Debug, Serialize)]
pub struct ReportPollResponse {
    pub id: String,
    pub titulo: String,
    pub ativa: bool,
}

/// Report representation returned to moderators.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motivo: Option<String>,
    pub status: ReportStatus,
    pub criado_em: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revisado_em: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<ReporterResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enquete: Option<ReportPollResponse>,
}

impl From<ReportView> for ReportResponse {
    fn from(view: ReportView) -> Self {
        Self {
            id: view.report.id,
            motivo: view.report.reason,
            status: view.report.status,
            criado_em: view.report.created_at.to_rfc3339(),
            revisado_em: view.report.reviewed_at.map(|t| t.to_rfc3339()),
            user: view.reporter.map(|u| ReporterResponse {
                id: u.id,
                username: u.username,
                email: u.email,
            }),
            enquete: view.poll.map(|p| ReportPollResponse {
                id: p.id,
                titulo: p.title,
                ativa: p.is_active,
            }),
        }
    }
}

/// Listing query parameters.
#[derive(Debug, Deserialize)]
pub struct ReportListQuery {
    pub status: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Paginated report listing.
#[derive(Debug, Serialize)]
pub struct ReportListResponse {
    pub denuncias: Vec<ReportResponse>,
    pub pagination: Pagination,
}

/// List reports (admin only).
async fn list_reports(
    AdminUser(_claims): AdminUser,
    State(state): State<AppState>,
    Query(query): Query<ReportListQuery>,
) -> AppResult<Json<ReportListResponse>> {
    let status = query.status.as_deref().map(parse_status).transpose()?;

    let (views, pagination) = state
        .moderation_service
        .list_reports(status, query.page, query.limit)
        .await?;

    Ok(Json(ReportListResponse {
        denuncias: views.into_iter().map(Into::into).collect(),
        pagination,
    }))
}

/// Get one report (admin only).
async fn get_report(
    AdminUser(_claims): AdminUser,
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> AppResult<Json<ReportResponse>> {
    let view = state.moderation_service.get_report(&report_id).await?;
    Ok(Json(view.into()))
}

/// Status update request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: String,
    pub desativar_enquete: Option<bool>,
}

/// Status update response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusResponse {
    pub message: String,
    pub updated: bool,
    pub enquete_desativada: bool,
}

/// Change a report's status (admin only). Accepting with
/// `desativarEnquete: true` also deactivates the reported poll.
async fn update_status(
    AdminUser(_claims): AdminUser,
    State(state): State<AppState>,
    Path(report_id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> AppResult<Json<UpdateStatusResponse>> {
    let status = parse_status(&req.status)?;
    let deactivate = req.desativar_enquete.unwrap_or(false);

    let update = state
        .moderation_service
        .update_status(&report_id, status, deactivate)
        .await?;

    let message = if !update.updated {
        format!("The report already has status {}.", status_name(status))
    } else if update.poll_deactivated {
        "Report accepted and poll deactivated successfully.".to_string()
    } else {
        format!("Report status updated to {}.", status_name(status))
    };

    Ok(Json(UpdateStatusResponse {
        message,
        updated: update.updated,
        enquete_desativada: update.poll_deactivated,
    }))
}

/// Dashboard summary per status.
#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub pending: i64,
    pub analyzed: i64,
    pub accepted: i64,
    pub rejected: i64,
    pub total: i64,
}

/// A heavily reported poll.
#[derive(Debug, Serialize)]
pub struct ReportedPollResponse {
    pub id: String,
    pub titulo: String,
    pub ativa: bool,
    pub total: i64,
}

/// Moderation dashboard payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub summary: DashboardSummary,
    pub enquetes_mais_denunciadas: Vec<ReportedPollResponse>,
}

/// Moderation dashboard (admin only).
async fn dashboard(
    AdminUser(_claims): AdminUser,
    State(state): State<AppState>,
) -> AppResult<Json<DashboardResponse>> {
    let data = state.moderation_service.dashboard(5).await?;

    let mut summary = DashboardSummary {
        pending: 0,
        analyzed: 0,
        accepted: 0,
        rejected: 0,
        total: data.total,
    };
    for bucket in data.summary {
        match bucket.status {
            ReportStatus::Pending => summary.pending = bucket.count,
            ReportStatus::Analyzed => summary.analyzed = bucket.count,
            ReportStatus::Accepted => summary.accepted = bucket.count,
            ReportStatus::Rejected => summary.rejected = bucket.count,
        }
    }

    Ok(Json(DashboardResponse {
        summary,
        enquetes_mais_denunciadas: data
            .most_reported
            .into_iter()
            .map(|(poll, count)| ReportedPollResponse {
                id: poll.id,
                titulo: poll.title,
                ativa: poll.is_active,
                total: count,
            })
            .collect(),
    }))
}

fn parse_status(value: &str) -> AppResult<ReportStatus> {
    match value.to_lowercase().as_str() {
        "pending" => Ok(ReportStatus::Pending),
        "analyzed" => Ok(ReportStatus::Analyzed),
        "accepted" => Ok(ReportStatus::Accepted),
        "rejected" => Ok(ReportStatus::Rejected),
        _ => Err(AppError::validation(
            "Invalid status. Valid values: pending, analyzed, accepted, rejected",
        )),
    }
}

const fn status_name(status: ReportStatus) -> &'static str {
    match status {
        ReportStatus::Pending => "pending",
        ReportStatus::Analyzed => "analyzed",
        ReportStatus::Accepted => "accepted",
        ReportStatus::Rejected => "rejected",
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_report).get(list_reports))
        .route("/{id}", get(get_report))
        .route("/{id}/status", put(update_status))
        .route("/dashboard/stats", get(dashboard))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("accepted").unwrap(), ReportStatus::Accepted);
        assert_eq!(parse_status("PENDING").unwrap(), ReportStatus::Pending);
        assert!(parse_status("resolved").is_err());
    }

    #[test]
    fn test_status_name_roundtrip() {
        for status in [
            ReportStatus::Pending,
            ReportStatus::Analyzed,
            ReportStatus::Accepted,
            ReportStatus::Rejected,
        ] {
            assert_eq!(parse_status(status_name(status)).unwrap(), status);
        }
    }
}
