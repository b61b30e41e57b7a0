//! API middleware.

#![allow(missing_docs)]

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use enquete_core::{AuthService, CommentService, ModerationService, PollService, UserService};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub poll_service: PollService,
    pub comment_service: CommentService,
    pub moderation_service: ModerationService,
}

/// Authentication middleware.
///
/// Verifies a bearer token when one is supplied and stores its claims in the
/// request extensions for the extractors. A bad token is rejected here so
/// the expired/invalid distinction (401 vs 403) is preserved; requests
/// without a token pass through and fail later only if a handler demands
/// authentication.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        match state.auth_service.verify(token) {
            Ok(claims) => {
                req.extensions_mut().insert(claims);
            }
            Err(e) => return e.into_response(),
        }
    }

    next.run(req).await
}
