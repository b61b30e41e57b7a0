//! User service.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use enquete_common::{AppError, AppResult, IdGenerator, ensure_id};
use enquete_db::{
    entities::user::{self, UserRole},
    repositories::UserRepository,
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

/// Input for registering a new user.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterUserInput {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username must have between 3 and 50 characters"
    ))]
    pub username: String,

    #[validate(email(message = "Invalid email"))]
    pub email: String,

    #[validate(length(
        min = 6,
        max = 100,
        message = "Password must have between 6 and 100 characters"
    ))]
    pub password: String,
}

/// Input for updating the caller's own profile.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileInput {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username must have between 3 and 50 characters"
    ))]
    pub username: Option<String>,

    #[validate(length(
        min = 6,
        max = 100,
        message = "Password must have between 6 and 100 characters"
    ))]
    pub password: Option<String>,
}

/// Result of an admin role update.
#[derive(Debug, Clone)]
pub struct RoleUpdate {
    /// False when the user already had the requested role.
    pub updated: bool,
    /// The role now in effect.
    pub role: UserRole,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self {
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a new user. New accounts always start as clients.
    pub async fn register(&self, input: RegisterUserInput) -> AppResult<user::Model> {
        input.validate()?;

        if self
            .user_repo
            .find_by_email_or_username(&input.email, &input.username)
            .await?
            .is_some()
        {
            return Err(AppError::BadRequest(
                "Username or email already in use".to_string(),
            ));
        }

        let password_hash = hash_password(&input.password)?;

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username: Set(input.username),
            email: Set(input.email.to_lowercase()),
            password_hash: Set(password_hash),
            role: Set(UserRole::Client),
            is_active: Set(true),
            created_at: Set(chrono::Utc::now().into()),
            updated_at: Set(None),
        };

        self.user_repo.create(model).await
    }

    /// Authenticate by email and password.
    ///
    /// Unknown email is a 404, a deactivated account a 403 and a wrong
    /// password a 401, mirroring the distinct client flows for each case.
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<user::Model> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::Validation(vec![
                "Email and password are required".to_string(),
            ]));
        }

        let user = self
            .user_repo
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if !user.is_active {
            return Err(AppError::Forbidden(
                "Account deactivated, contact an administrator".to_string(),
            ));
        }

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }

        Ok(user)
    }

    /// Get a user by ID.
    pub async fn get(&self, id: &str) -> AppResult<user::Model> {
        ensure_id(id)?;
        self.user_repo.get_by_id(id).await
    }

    /// List all users, newest first.
    pub async fn list(&self) -> AppResult<Vec<user::Model>> {
        self.user_repo.find_all().await
    }

    /// Update the caller's own profile (username and/or password).
    pub async fn update_profile(
        &self,
        user_id: &str,
        input: UpdateProfileInput,
    ) -> AppResult<user::Model> {
        input.validate()?;

        let user = self.user_repo.get_by_id(user_id).await?;

        if let Some(ref username) = input.username
            && username != &user.username
            && let Some(existing) = self.user_repo.find_by_username(username).await?
            && existing.id != user.id
        {
            return Err(AppError::BadRequest(
                "Username already in use".to_string(),
            ));
        }

        let mut active: user::ActiveModel = user.into();
        if let Some(username) = input.username {
            active.username = Set(username);
        }
        if let Some(password) = input.password {
            active.password_hash = Set(hash_password(&password)?);
        }
        active.updated_at = Set(Some(chrono::Utc::now().into()));

        self.user_repo.update(active).await
    }

    /// Change a user's role. No-op when the role is unchanged.
    pub async fn update_role(&self, user_id: &str, role: UserRole) -> AppResult<RoleUpdate> {
        ensure_id(user_id)?;
        let user = self.user_repo.get_by_id(user_id).await?;

        if user.role == role {
            return Ok(RoleUpdate {
                updated: false,
                role,
            });
        }

        let mut active: user::ActiveModel = user.into();
        active.role = Set(role);
        active.updated_at = Set(Some(chrono::Utc::now().into()));
        self.user_repo.update(active).await?;

        Ok(RoleUpdate {
            updated: true,
            role,
        })
    }

    /// Activate or deactivate an account. Accounts are never hard-deleted;
    /// deactivation locks out login while keeping the user's polls, votes
    /// and comments intact.
    pub async fn set_active(&self, user_id: &str, active: bool) -> AppResult<user::Model> {
        ensure_id(user_id)?;
        let user = self.user_repo.get_by_id(user_id).await?;

        let mut model: user::ActiveModel = user.into();
        model.is_active = Set(active);
        model.updated_at = Set(Some(chrono::Utc::now().into()));
        self.user_repo.update(model).await
    }
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against an Argon2 hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
