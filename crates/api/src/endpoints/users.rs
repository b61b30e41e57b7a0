//! User endpoints: registration, login, profile and admin management.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use enquete_common::{AppError, AppResult};
use enquete_core::{RegisterUserInput, UpdateProfileInput};
use enquete_db::entities::user::{self, UserRole};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::{AdminUser, AuthUser},
    middleware::AppState,
    response::message,
};

/// User representation returned to clients. Never carries the password hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub ativo: bool,
    pub criado_em: String,
}

impl From<user::Model> for UserResponse {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            ativo: user.is_active,
            criado_em: user.created_at.to_rfc3339(),
        }
    }
}

/// Registration request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Registration response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: String,
    pub role: UserRole,
}

/// Register a new account.
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let user = state
        .user_service
        .register(RegisterUserInput {
            username: req.username,
            email: req.email,
            password: req.password,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            role: user.role,
        }),
    ))
}

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Login response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user: LoginUser,
}

/// The authenticated user summary returned at login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub is_admin: bool,
}

/// Authenticate and issue a bearer token.
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let user = state
        .user_service
        .authenticate(&req.email, &req.password)
        .await?;

    let token = state.auth_service.issue(&user)?;
    let is_admin = user.role.is_admin();

    Ok(Json(LoginResponse {
        token,
        user: LoginUser {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            is_admin,
        },
    }))
}

/// Get the caller's profile.
async fn get_profile(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<UserResponse>> {
    let user = state.user_service.get(claims.user_id()).await?;
    Ok(Json(user.into()))
}

/// Profile update request.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Update the caller's profile.
async fn update_profile(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<Json<UserResponse>> {
    let user = state
        .user_service
        .update_profile(
            claims.user_id(),
            UpdateProfileInput {
                username: req.username,
                password: req.password,
            },
        )
        .await?;

    Ok(Json(user.into()))
}

/// List all users (admin only).
async fn list_users(
    AdminUser(_claims): AdminUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<UserResponse>>> {
    let users = state.user_service.list().await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

/// Role update request.
#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    #[serde(default)]
    pub role: String,
}

/// Role update response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleResponse {
    pub message: String,
    pub user_id: String,
    pub new_role: UserRole,
}

/// Change a user's role (admin only).
async fn update_role(
    AdminUser(_claims): AdminUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<UpdateRoleRequest>,
) -> AppResult<Json<UpdateRoleResponse>> {
    let role = parse_role(&req.role)?;
    let update = state.user_service.update_role(&user_id, role).await?;

    let message = if update.updated {
        "User role updated successfully!".to_string()
    } else {
        "User already has this role.".to_string()
    };

    Ok(Json(UpdateRoleResponse {
        message,
        user_id,
        new_role: update.role,
    }))
}

/// Activation request.
#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub ativo: bool,
}

/// Activate or deactivate an account (admin only). Deactivation is the
/// system's only form of user removal.
async fn set_active(
    AdminUser(_claims): AdminUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<SetActiveRequest>,
) -> AppResult<impl axum::response::IntoResponse> {
    state.user_service.set_active(&user_id, req.ativo).await?;

    let text = if req.ativo {
        "User activated successfully."
    } else {
        "User deactivated successfully."
    };
    Ok(message(text))
}

fn parse_role(value: &str) -> AppResult<UserRole> {
    match value.to_lowercase().as_str() {
        "client" => Ok(UserRole::Client),
        "admin" => Ok(UserRole::Admin),
        _ => Err(AppError::validation(
            "Invalid user role. Valid types: client, admin",
        )),
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/", get(list_users))
        .route("/{id}/role", put(update_role))
        .route("/{id}/active", put(set_active))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role() {
        assert_eq!(parse_role("admin").unwrap(), UserRole::Admin);
        assert_eq!(parse_role("Client").unwrap(), UserRole::Client);
        assert!(parse_role("superuser").is_err());
        assert!(parse_role("").is_err());
    }
}
