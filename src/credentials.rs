//! User accounts and password verification.

use tokio::task;

use crate::crypto::{self, HashParams};
use crate::db::{DbPool, queries};
use crate::error::{AppError, Result};
use crate::models::{RegisterUser, User, UserRole, UserStatus};

#[derive(Clone)]
pub struct CredentialStore {
    db: DbPool,
    params: HashParams,
    require_approval: bool,
}

impl CredentialStore {
    pub fn new(db: DbPool, params: HashParams, require_approval: bool) -> Self {
        Self {
            db,
            params,
            require_approval,
        }
    }

    pub async fn register(&self, input: &RegisterUser) -> Result<User> {
        input.validate()?;

        if queries::get_user_by_email(&*self.db.get()?, &input.email)?.is_some() {
            return Err(AppError::BadRequest("Email already registered".into()));
        }

        // Argon2 is CPU-bound; keep it off the async workers.
        let password = input.password.clone();
        let params = self.params;
        let password_hash = task::spawn_blocking(move || crypto::hash_password(&password, &params))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))??;

        let status = if self.require_approval {
            UserStatus::Pending
        } else {
            UserStatus::Approved
        };

        let conn = self.db.get()?;
        let created = queries::create_user(
            &conn,
            &queries::NewUser {
                email: &input.email,
                name: input.name.trim(),
                password_hash: &password_hash,
                role: UserRole::User,
                status,
            },
        );

        match created {
            Ok(user) => {
                tracing::info!(user_id = %user.id, status = user.status.as_ref(), "User registered");
                Ok(user)
            }
            // Lost a race with a concurrent registration for the same email
            Err(e) if queries::is_unique_violation(&e) => {
                Err(AppError::BadRequest("Email already registered".into()))
            }
            Err(e) => Err(e),
        }
    }

    /// Returns the user when the email exists and the password matches.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = queries::get_user_by_email(&*self.db.get()?, email)? else {
            return Ok(None);
        };

        let password = password.to_string();
        let password_hash = user.password_hash.clone();
        let valid = task::spawn_blocking(move || crypto::verify_password(&password, &password_hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))??;

        Ok(valid.then_some(user))
    }

    /// Grant the admin role and approve the account.
    pub fn promote_admin(&self, email: &str) -> Result<User> {
        let conn = self.db.get()?;
        let user = queries::get_user_by_email(&conn, email)?
            .ok_or_else(|| AppError::NotFound(format!("No user with email {}", email)))?;

        queries::update_user_role(&conn, &user.id, UserRole::Admin)?;
        queries::update_user_status(&conn, &user.id, UserStatus::Approved)?;

        queries::get_user_by_id(&conn, &user.id)?
            .ok_or_else(|| AppError::Internal("User vanished during promotion".into()))
    }
}
