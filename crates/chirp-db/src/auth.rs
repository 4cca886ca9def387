use std::sync::{Arc, RwLock};

use anyhow::anyhow;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::Database;
use crate::error::StoreError;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("email already registered: {0}")]
    EmailTaken(String),

    #[error("password must be at least 6 characters")]
    WeakPassword,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The hosted authentication service.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Uid of the signed-in account, if any.
    fn current_user_id(&self) -> Option<String>;

    /// Returns the uid and makes it the current account.
    async fn sign_in(&self, email: &str, password: &str) -> Result<String, AuthError>;

    /// Creates an account, signs it in and returns its uid.
    async fn sign_up(&self, email: &str, password: &str) -> Result<String, AuthError>;

    fn sign_out(&self);
}

/// Email/password accounts stored next to the documents, hashed with Argon2id.
pub struct LocalAuth {
    db: Arc<Database>,
    current: RwLock<Option<String>>,
}

impl LocalAuth {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            current: RwLock::new(None),
        }
    }

    fn set_current(&self, uid: Option<String>) {
        match self.current.write() {
            Ok(mut current) => *current = uid,
            Err(poisoned) => *poisoned.into_inner() = uid,
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl AuthProvider for LocalAuth {
    fn current_user_id(&self) -> Option<String> {
        match self.current.read() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let email = normalize_email(email);
        let password = password.to_string();
        let db = self.db.clone();

        let uid = tokio::task::spawn_blocking(move || -> Result<String, AuthError> {
            let account = db
                .get_account_by_email(&email)
                .map_err(StoreError::Backend)?
                .ok_or(AuthError::InvalidCredentials)?;

            let parsed_hash = PasswordHash::new(&account.password)
                .map_err(|e| StoreError::Backend(anyhow!("corrupt password hash for {}: {}", account.uid, e)))?;

            Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .map_err(|_| AuthError::InvalidCredentials)?;

            Ok(account.uid)
        })
        .await
        .map_err(StoreError::from)??;

        self.set_current(Some(uid.clone()));
        info!("Signed in {}", uid);
        Ok(uid)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<String, AuthError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        let email = normalize_email(email);
        let password = password.to_string();
        let db = self.db.clone();

        let uid = tokio::task::spawn_blocking(move || -> Result<String, AuthError> {
            if db.get_account_by_email(&email).map_err(StoreError::Backend)?.is_some() {
                return Err(AuthError::EmailTaken(email));
            }

            // Hash password with Argon2id
            let salt = SaltString::generate(&mut OsRng);
            let password_hash = Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map_err(|e| StoreError::Backend(anyhow!("password hashing failed: {}", e)))?
                .to_string();

            let uid = Uuid::new_v4().to_string();
            db.insert_account(&uid, &email, &password_hash)
                .map_err(StoreError::Backend)?;
            Ok(uid)
        })
        .await
        .map_err(StoreError::from)??;

        self.set_current(Some(uid.clone()));
        info!("Created account {}", uid);
        Ok(uid)
    }

    fn sign_out(&self) {
        if self.current_user_id().is_none() {
            warn!("Sign out requested with no active session");
        }
        self.set_current(None);
    }
}
