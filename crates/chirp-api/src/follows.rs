use chirp_db::{Batch, StoreError};
use chirp_types::{Fields, NotificationType};
use tracing::{debug, info};

use crate::backend::Backend;
use crate::error::ServiceError;
use crate::notifications::{NotificationService, after_commit};
use crate::paths;
use crate::session::Session;

/// Follow edges. Both directions are written in one batch.
#[derive(Clone)]
pub struct RelationshipService {
    backend: Backend,
    notifications: NotificationService,
}

impl RelationshipService {
    pub fn new(backend: Backend) -> Self {
        let notifications = NotificationService::new(backend.clone());
        Self {
            backend,
            notifications,
        }
    }

    /// Returns `false` if the signed-in user already followed `target_uid`;
    /// only a new follow notifies.
    pub async fn follow_user(&self, session: &Session, target_uid: &str) -> Result<bool, ServiceError> {
        if session.is(target_uid) {
            return Err(ServiceError::Invalid("cannot follow yourself".into()));
        }

        let batch = Batch::new()
            .require_absent(paths::following_edge(session.uid(), target_uid))
            .put(paths::following_edge(session.uid(), target_uid), Fields::new())
            .put(paths::follower_edge(target_uid, session.uid()), Fields::new());

        match self.backend.store.commit(batch).await {
            Ok(_) => {}
            Err(StoreError::PreconditionFailed(_)) => {
                debug!("{} already follows {}", session.uid(), target_uid);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }

        info!("{} followed {}", session.uid(), target_uid);
        let sent = self
            .notifications
            .upload_notification(session, target_uid, NotificationType::Follow, None)
            .await;
        after_commit(&format!("follow of {}", target_uid), sent);
        Ok(true)
    }

    /// Idempotent: deletes both edges whether or not they exist.
    pub async fn unfollow_user(&self, session: &Session, target_uid: &str) -> Result<(), ServiceError> {
        let batch = Batch::new()
            .delete(paths::following_edge(session.uid(), target_uid))
            .delete(paths::follower_edge(target_uid, session.uid()));
        self.backend.store.commit(batch).await?;
        info!("{} unfollowed {}", session.uid(), target_uid);
        Ok(())
    }

    pub async fn check_if_user_is_followed(
        &self,
        viewer_uid: &str,
        target_uid: &str,
    ) -> Result<bool, ServiceError> {
        Ok(self
            .backend
            .store
            .exists(&paths::following_edge(viewer_uid, target_uid))
            .await?)
    }
}
