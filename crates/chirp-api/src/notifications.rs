use chrono::Utc;
use futures_util::future::try_join_all;
use tracing::{debug, warn};

use chirp_types::events::Child;
use chirp_types::fields::{decode_record, encode_record};
use chirp_types::models::NotificationRecord;
use chirp_types::{Notification, NotificationType};

use crate::backend::Backend;
use crate::error::ServiceError;
use crate::gather::{gather, skip_unresolvable};
use crate::mentions::parse_mentions;
use crate::paths;
use crate::session::Session;
use crate::users::UserService;

/// Notifications trail the write they describe. A failed one is logged and
/// dropped; the caller still reports the committed write.
pub(crate) fn after_commit<T>(context: &str, result: Result<T, ServiceError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Notification for {} not sent: {}", context, e);
            None
        }
    }
}

#[derive(Clone)]
pub struct NotificationService {
    backend: Backend,
    users: UserService,
}

impl NotificationService {
    pub fn new(backend: Backend) -> Self {
        let users = UserService::new(backend.clone());
        Self { backend, users }
    }

    /// Record that the signed-in user acted on something of `recipient_uid`'s.
    /// Acting on your own content notifies nobody and returns `None`.
    pub async fn upload_notification(
        &self,
        session: &Session,
        recipient_uid: &str,
        kind: NotificationType,
        tweet_id: Option<&str>,
    ) -> Result<Option<String>, ServiceError> {
        if session.is(recipient_uid) {
            debug!("Not notifying {} about their own {:?}", recipient_uid, kind);
            return Ok(None);
        }

        let record = NotificationRecord {
            uid: session.uid().to_string(),
            kind,
            timestamp: Utc::now().timestamp(),
            tweet_id: tweet_id.map(str::to_string),
        };
        let id = self
            .backend
            .store
            .push(&paths::notifications(recipient_uid), encode_record(&record))
            .await?;
        debug!("Notification {} ({:?}) -> {}", id, kind, recipient_uid);
        Ok(Some(id))
    }

    /// One mention notification per distinct username in the caption that
    /// resolves to a user. Returns the notified uids.
    pub async fn notify_mentions(
        &self,
        session: &Session,
        caption: &str,
        tweet_id: &str,
    ) -> Result<Vec<String>, ServiceError> {
        let usernames = parse_mentions(caption);
        if usernames.is_empty() {
            return Ok(Vec::new());
        }

        let resolved = try_join_all(
            usernames
                .iter()
                .map(|username| self.users.fetch_user_by_username(username)),
        )
        .await?;

        let mut notified = Vec::new();
        for user in resolved.into_iter().flatten() {
            if notified.contains(&user.uid) {
                continue;
            }
            let sent = self
                .upload_notification(session, &user.uid, NotificationType::Mention, Some(tweet_id))
                .await?;
            if sent.is_some() {
                notified.push(user.uid);
            }
        }
        Ok(notified)
    }

    /// The signed-in user's notifications with their actors resolved, in
    /// store order. Entries whose actor is gone are skipped.
    pub async fn fetch_notifications(
        &self,
        session: &Session,
    ) -> Result<Vec<Notification>, ServiceError> {
        let children = self
            .backend
            .store
            .children(&paths::notifications(session.uid()))
            .await?;

        gather(children.into_iter().map(|child| async move {
            let context = format!("notification {}", child.key);
            skip_unresolvable(&context, self.resolve(child).await)
        }))
        .await
    }

    async fn resolve(&self, child: Child) -> Result<Notification, ServiceError> {
        let record: NotificationRecord = decode_record("notification", &child.key, &child.fields)?;
        let user = self.users.fetch_user(&record.uid).await?;
        Ok(Notification::from_record(child.key, record, user)?)
    }
}
