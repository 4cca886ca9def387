use tracing::{info, warn};

use chirp_db::{Batch, StoreError};
use chirp_types::api::AuthCredentials;
use chirp_types::fields::{encode_record, single_field};
use chirp_types::models::UserRecord;

use crate::backend::Backend;
use crate::error::ServiceError;
use crate::paths;
use crate::session::Session;
use crate::users::{normalize_username, require_fullname};

fn validate_email(raw: &str) -> Result<String, ServiceError> {
    let email = raw.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email.to_string()),
        _ => Err(ServiceError::Invalid("email address is malformed".into())),
    }
}

/// Registration and sign-in on top of the auth provider.
#[derive(Clone)]
pub struct AuthService {
    backend: Backend,
}

impl AuthService {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Create the account, upload the avatar, then write the profile and
    /// claim the username in one batch.
    pub async fn register_user(&self, credentials: AuthCredentials) -> Result<Session, ServiceError> {
        let email = validate_email(&credentials.email)?;
        let fullname = require_fullname(&credentials.fullname)?;
        let username = normalize_username(&credentials.username)?;
        if credentials.profile_image.is_empty() {
            return Err(ServiceError::Invalid("profile image is required".into()));
        }

        // Cheap early check; the batch below is what actually guards the name
        if self.backend.store.exists(&paths::username(&username)).await? {
            return Err(ServiceError::UsernameTaken(username));
        }

        let profile_image_url = self.backend.blobs.upload(credentials.profile_image).await?;
        let uid = self.backend.auth.sign_up(&email, &credentials.password).await?;

        let record = UserRecord {
            email,
            username: username.clone(),
            fullname,
            profile_image_url,
            bio: None,
        };
        let batch = Batch::new()
            .require_absent(paths::username(&username))
            .put(paths::user(&uid), encode_record(&record))
            .put(paths::username(&username), single_field("uid", uid.as_str()));

        match self.backend.store.commit(batch).await {
            Ok(_) => {}
            Err(StoreError::PreconditionFailed(_)) => {
                warn!("Account {} created but username {} was claimed first", uid, username);
                return Err(ServiceError::UsernameTaken(username));
            }
            Err(source) => {
                return Err(ServiceError::Partial {
                    operation: "register_user",
                    record: uid,
                    source,
                });
            }
        }

        info!("Registered {} as @{}", uid, username);
        Ok(Session::new(uid))
    }

    pub async fn log_user_in(&self, email: &str, password: &str) -> Result<Session, ServiceError> {
        let uid = self.backend.auth.sign_in(email, password).await?;
        info!("Signed in {}", uid);
        Ok(Session::new(uid))
    }

    pub fn sign_out(&self) {
        self.backend.auth.sign_out();
    }

    pub fn current_session(&self) -> Result<Session, ServiceError> {
        self.backend
            .auth
            .current_user_id()
            .map(Session::new)
            .ok_or(ServiceError::NoSession)
    }
}
