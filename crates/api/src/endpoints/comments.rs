//! Comment endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use enquete_common::AppResult;
use enquete_core::Pagination;
use enquete_db::entities::{comment, poll, user};
use serde::{Deserialize, Serialize};

use crate::{
    endpoints::AuthorResponse,
    extractors::AuthUser,
    middleware::AppState,
    response::message,
};

/// Comment representation returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: String,
    pub texto: String,
    pub enquete_id: String,
    pub criado_em: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editado_em: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<AuthorResponse>,
}

impl CommentResponse {
    fn from_model(comment: comment::Model, author: Option<AuthorResponse>) -> Self {
        Self {
            id: comment.id,
            texto: comment.text,
            enquete_id: comment.poll_id,
            criado_em: comment.created_at.to_rfc3339(),
            editado_em: comment.edited_at.map(|t| t.to_rfc3339()),
            user: author,
        }
    }
}

fn author_of(user: user::Model) -> AuthorResponse {
    AuthorResponse {
        id: user.id,
        username: user.username,
    }
}

/// Comment creation request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    #[serde(default)]
    pub enquete_id: String,
    #[serde(default)]
    pub texto: String,
}

/// Comment on an active poll.
async fn create_comment(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<CommentResponse>)> {
    let comment = state
        .comment_service
        .create(claims.user_id(), &req.enquete_id, &req.texto)
        .await?;

    // The author summary comes straight from the verified claims; no extra
    // user lookup needed.
    let author = Some(AuthorResponse {
        id: claims.sub,
        username: claims.username,
    });
    Ok((
        StatusCode::CREATED,
        Json(CommentResponse::from_model(comment, author)),
    ))
}

/// Pagination query parameters.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Paginated comment listing.
#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub comentarios: Vec<CommentResponse>,
    pub pagination: Pagination,
}

/// List a poll's comments. Public.
async fn list_by_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<CommentListResponse>> {
    let (comments, pagination) = state
        .comment_service
        .list_by_poll(&poll_id, query.page, query.limit)
        .await?;

    Ok(Json(CommentListResponse {
        comentarios: comments
            .into_iter()
            .map(|(comment, author)| CommentResponse::from_model(comment, author.map(author_of)))
            .collect(),
        pagination,
    }))
}

/// Get one comment.
async fn get_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
) -> AppResult<Json<CommentResponse>> {
    let comment = state.comment_service.get(&comment_id).await?;
    Ok(Json(CommentResponse::from_model(comment, None)))
}

/// Comment update request.
#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    #[serde(default)]
    pub texto: String,
}

/// Edit a comment (author only).
async fn update_comment(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
    Json(req): Json<UpdateCommentRequest>,
) -> AppResult<Json<CommentResponse>> {
    let comment = state
        .comment_service
        .update(claims.user_id(), &comment_id, &req.texto)
        .await?;

    Ok(Json(CommentResponse::from_model(comment, None)))
}

/// Soft-delete a comment (author, poll author, or admin).
async fn delete_comment(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
) -> AppResult<impl axum::response::IntoResponse> {
    state
        .comment_service
        .delete(claims.user_id(), claims.role, &comment_id)
        .await?;

    Ok(message("Comment deleted successfully."))
}

/// One of the caller's comments, with its poll.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyCommentResponse {
    pub id: String,
    pub texto: String,
    pub criado_em: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editado_em: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enquete: Option<CommentPollResponse>,
}

/// Poll summary nested in a comment listing.
#[derive(Debug, Serialize)]
pub struct CommentPollResponse {
    pub id: String,
    pub titulo: String,
}

/// Listing wrapper for the caller's comments.
#[derive(Debug, Serialize)]
pub struct MyCommentsResponse {
    pub comentarios: Vec<MyCommentResponse>,
}

/// List the caller's comments.
async fn my_comments(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<MyCommentsResponse>> {
    let comments = state
        .comment_service
        .list_by_user(claims.user_id(), query.page, query.limit)
        .await?;

    Ok(Json(MyCommentsResponse {
        comentarios: comments
            .into_iter()
            .map(|(comment, poll)| MyCommentResponse {
                id: comment.id,
                texto: comment.text,
                criado_em: comment.created_at.to_rfc3339(),
                editado_em: comment.edited_at.map(|t| t.to_rfc3339()),
                enquete: poll.map(|p: poll::Model| CommentPollResponse {
                    id: p.id,
                    titulo: p.title,
                }),
            })
            .collect(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_comment))
        .route("/enquete/{enqueteId}", get(list_by_poll))
        .route(
            "/{id}",
            get(get_comment).put(update_comment).delete(delete_comment),
        )
        .route("/usuario/meus", get(my_comments))
}
