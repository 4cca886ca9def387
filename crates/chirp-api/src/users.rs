use serde_json::Value;
use tracing::{debug, info, warn};

use chirp_db::{Batch, StoreError};
use chirp_types::api::ProfileUpdate;
use chirp_types::fields::{encode_record, single_field};
use chirp_types::{User, UserRelationStats};

use crate::backend::Backend;
use crate::error::ServiceError;
use crate::paths;
use crate::session::Session;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 32;

/// Usernames are stored lowercased so the index lookup is case-insensitive.
pub fn normalize_username(raw: &str) -> Result<String, ServiceError> {
    let username = raw.trim().to_ascii_lowercase();
    if username.len() < MIN_USERNAME_LEN || username.len() > MAX_USERNAME_LEN {
        return Err(ServiceError::Invalid(format!(
            "username must be {}-{} characters",
            MIN_USERNAME_LEN, MAX_USERNAME_LEN
        )));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ServiceError::Invalid(
            "username may only contain letters, digits and underscores".into(),
        ));
    }
    Ok(username)
}

pub fn require_fullname(raw: &str) -> Result<String, ServiceError> {
    let fullname = raw.trim();
    if fullname.is_empty() {
        return Err(ServiceError::Invalid("full name is required".into()));
    }
    Ok(fullname.to_string())
}

#[derive(Clone)]
pub struct UserService {
    backend: Backend,
}

impl UserService {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub async fn fetch_user(&self, uid: &str) -> Result<User, ServiceError> {
        let fields = self
            .backend
            .store
            .get(&paths::user(uid))
            .await?
            .ok_or_else(|| ServiceError::not_found("user", uid))?;
        Ok(User::decode(uid, &fields)?)
    }

    /// Every user with a decodable record, in registration order.
    pub async fn fetch_users(&self) -> Result<Vec<User>, ServiceError> {
        let children = self.backend.store.children(paths::USERS).await?;
        let users = children
            .iter()
            .filter_map(|child| match User::decode(&child.key, &child.fields) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!("Skipping user {}: {}", child.key, e);
                    None
                }
            })
            .collect();
        Ok(users)
    }

    /// Resolve a username through the index. Unknown or malformed names are
    /// `None`, not an error.
    pub async fn fetch_user_by_username(&self, username: &str) -> Result<Option<User>, ServiceError> {
        let Ok(username) = normalize_username(username) else {
            return Ok(None);
        };
        let Some(index) = self.backend.store.get(&paths::username(&username)).await? else {
            return Ok(None);
        };
        let Some(uid) = index.get("uid").and_then(Value::as_str) else {
            warn!("Username index entry for {} has no uid", username);
            return Ok(None);
        };

        match self.fetch_user(uid).await {
            Ok(user) => Ok(Some(user)),
            Err(ServiceError::NotFound { .. }) => {
                warn!("Username {} points at missing user {}", username, uid);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Follower and following counts, read from the edge lists.
    pub async fn fetch_user_stats(&self, uid: &str) -> Result<UserRelationStats, ServiceError> {
        let followers_path = paths::user_followers(uid);
        let following_path = paths::user_following(uid);
        let (followers, following) = tokio::try_join!(
            self.backend.store.children(&followers_path),
            self.backend.store.children(&following_path),
        )?;
        Ok(UserRelationStats {
            followers: followers.len(),
            following: following.len(),
        })
    }

    /// Edit the signed-in user's profile. A username change moves the index
    /// entry in the same batch, failing if the new name is already claimed.
    pub async fn update_user_data(
        &self,
        session: &Session,
        update: ProfileUpdate,
    ) -> Result<User, ServiceError> {
        let fullname = require_fullname(&update.fullname)?;
        let username = normalize_username(&update.username)?;
        let bio = update
            .bio
            .map(|bio| bio.trim().to_string())
            .filter(|bio| !bio.is_empty());

        let current = self.fetch_user(session.uid()).await?;
        let updated = User {
            fullname,
            username,
            bio,
            ..current.clone()
        };

        let mut fields = encode_record(&updated.record());
        if updated.bio.is_none() {
            fields.insert("bio".into(), Value::Null);
        }
        let mut batch = Batch::new().put(paths::user(session.uid()), fields);

        if updated.username != current.username {
            batch = batch
                .require_absent(paths::username(&updated.username))
                .delete(paths::username(&current.username))
                .put(
                    paths::username(&updated.username),
                    single_field("uid", session.uid()),
                );
        }

        match self.backend.store.commit(batch).await {
            Ok(_) => {}
            Err(StoreError::PreconditionFailed(_)) => {
                debug!("Username {} already claimed", updated.username);
                return Err(ServiceError::UsernameTaken(updated.username));
            }
            Err(e) => return Err(e.into()),
        }

        info!("Profile updated for {}", session.uid());
        Ok(updated)
    }
}
