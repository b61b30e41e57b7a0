//! Poll endpoints: listing, creation, deletion and voting.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::DateTime;
use enquete_common::{AppError, AppResult};
use enquete_core::{CreatePollInput, OptionsInput, PollView};
use enquete_db::repositories::VoteAction;
use serde::{Deserialize, Serialize};

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::message,
};

/// Poll author summary.
#[derive(Debug, Serialize)]
pub struct AuthorResponse {
    pub id: String,
    pub username: String,
}

/// A poll option with its derived tally.
#[derive(Debug, Serialize)]
pub struct OptionResponse {
    pub id: String,
    pub texto: String,
    pub votos: i64,
}

/// Poll representation returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub id: String,
    pub titulo: String,
    pub descricao: String,
    pub data_fim: String,
    pub ativa: bool,
    pub criado_em: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autor: Option<AuthorResponse>,
    pub opcoes: Vec<OptionResponse>,
    pub total_votos: i64,
}

impl From<PollView> for PollResponse {
    fn from(view: PollView) -> Self {
        Self {
            id: view.poll.id,
            titulo: view.poll.title,
            descricao: view.poll.description,
            data_fim: view.poll.ends_at.to_rfc3339(),
            ativa: view.poll.is_active,
            criado_em: view.poll.created_at.to_rfc3339(),
            autor: view.author.map(|author| AuthorResponse {
                id: author.id,
                username: author.username,
            }),
            opcoes: view
                .options
                .into_iter()
                .map(|o| OptionResponse {
                    id: o.option.id,
                    texto: o.option.text,
                    votos: o.votes,
                })
                .collect(),
            total_votos: view.total_votes,
        }
    }
}

/// Query parameters for the public listing.
#[derive(Debug, Deserialize)]
pub struct PublicListQuery {
    pub limit: Option<u64>,
}

/// List active polls. Public, no authentication.
async fn list_public(
    State(state): State<AppState>,
    Query(query): Query<PublicListQuery>,
) -> AppResult<Json<Vec<PollResponse>>> {
    let views = state.poll_service.list_public(query.limit).await?;
    Ok(Json(views.into_iter().map(Into::into).collect()))
}

/// List the caller's own polls.
async fn list_mine(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<PollResponse>>> {
    let views = state.poll_service.list_by_author(claims.user_id()).await?;
    Ok(Json(views.into_iter().map(Into::into).collect()))
}

/// Poll creation request. `opcoes` accepts a JSON array or one
/// newline-delimited text block.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollRequest {
    #[serde(default)]
    pub titulo: String,
    #[serde(default)]
    pub descricao: String,
    #[serde(default)]
    pub data_fim: String,
    #[serde(default = "empty_options")]
    pub opcoes: OptionsInput,
}

fn empty_options() -> OptionsInput {
    OptionsInput::List(Vec::new())
}

/// Create a poll.
async fn create_poll(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreatePollRequest>,
) -> AppResult<(StatusCode, Json<PollResponse>)> {
    let ends_at = DateTime::parse_from_rfc3339(&req.data_fim)
        .map_err(|_| AppError::validation("End date must be a valid date"))?;

    let (poll, options) = state
        .poll_service
        .create(
            claims.user_id(),
            CreatePollInput {
                title: req.titulo,
                description: req.descricao,
                ends_at,
                options: req.opcoes,
            },
        )
        .await?;

    let response = PollResponse {
        id: poll.id,
        titulo: poll.title,
        descricao: poll.description,
        data_fim: poll.ends_at.to_rfc3339(),
        ativa: poll.is_active,
        criado_em: poll.created_at.to_rfc3339(),
        autor: Some(AuthorResponse {
            id: claims.sub.clone(),
            username: claims.username.clone(),
        }),
        opcoes: options
            .into_iter()
            .map(|o| OptionResponse {
                id: o.id,
                texto: o.text,
                votos: 0,
            })
            .collect(),
        total_votos: 0,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// Get one poll with tallies. Public.
async fn get_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<Json<PollResponse>> {
    let view = state.poll_service.get(&poll_id).await?;
    Ok(Json(view.into()))
}

/// Delete a poll (author or admin).
async fn delete_poll(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<impl axum::response::IntoResponse> {
    state
        .poll_service
        .delete(claims.user_id(), claims.role, &poll_id)
        .await?;

    Ok(message("Poll deleted successfully"))
}

/// The caller's current vote on a poll.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyVoteResponse {
    pub opcao_id: Option<String>,
}

/// Get the caller's vote on a poll, if any.
async fn my_vote(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<Json<MyVoteResponse>> {
    let vote = state
        .poll_service
        .my_vote(claims.user_id(), &poll_id)
        .await?;

    Ok(Json(MyVoteResponse {
        opcao_id: vote.map(|v| v.option_id),
    }))
}

/// Vote outcome.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub message: String,
    pub action: VoteAction,
    pub opcao_id: String,
}

/// Vote on an option: cast, switch, or toggle off.
async fn vote(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
    Path(option_id): Path<String>,
) -> AppResult<Json<VoteResponse>> {
    let transition = state
        .poll_service
        .vote(claims.user_id(), &option_id)
        .await?;

    let text = match transition.action {
        VoteAction::Created => "Vote registered successfully!",
        VoteAction::Removed => "Vote removed.",
    };

    Ok(Json(VoteResponse {
        message: text.to_string(),
        action: transition.action,
        opcao_id: transition.option_id,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/public", get(list_public))
        .route("/", get(list_mine).post(create_poll))
        .route("/{id}", get(get_poll).delete(delete_poll))
        .route("/{id}/meu-voto", get(my_vote))
        .route("/opcoes/{id}/votar", post(vote))
}
