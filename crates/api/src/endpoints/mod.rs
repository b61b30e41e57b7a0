//! API endpoints.

mod comments;
mod polls;
mod reports;
mod users;

use axum::Router;

use crate::middleware::AppState;

pub(crate) use polls::AuthorResponse;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/users", users::router())
        .nest("/enquetes", polls::router())
        .nest("/comentarios", comments::router())
        .nest("/denuncias", reports::router())
}
