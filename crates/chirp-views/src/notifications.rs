use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures_util::future::try_join_all;

use chirp_api::{ServiceError, Session};
use chirp_types::{Notification, NotificationType};

use crate::Services;
use crate::format;
use crate::optimistic::{begin_follow, settle_follow};
use crate::ordering::sort_newest_first;

/// The viewer's notification inbox, newest first.
pub struct NotificationsView {
    services: Services,
    session: Session,
    notifications: Vec<Notification>,
}

impl NotificationsView {
    pub async fn load(services: Services, session: Session) -> Result<Self, ServiceError> {
        let mut notifications = services.notifications.fetch_notifications(&session).await?;
        sort_newest_first(&mut notifications);
        Ok(Self {
            services,
            session,
            notifications,
        })
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn texts(&self, now: DateTime<Utc>) -> Vec<String> {
        self.notifications
            .iter()
            .map(|n| format::notification_text(n, now))
            .collect()
    }

    /// Patch the follow button state of follow rows from the viewer's
    /// follow edges, one lookup per distinct actor.
    pub async fn reconcile_follows(&mut self) -> Result<(), ServiceError> {
        let mut actors: Vec<String> = self
            .notifications
            .iter()
            .filter(|n| n.kind == NotificationType::Follow)
            .map(|n| n.user.uid.clone())
            .collect();
        actors.sort();
        actors.dedup();

        let viewer = self.session.uid();
        let follows = &self.services.follows;
        let flags = try_join_all(
            actors
                .iter()
                .map(|uid| follows.check_if_user_is_followed(viewer, uid)),
        )
        .await?;
        let followed: HashMap<&str, bool> = actors.iter().map(String::as_str).zip(flags).collect();

        for n in &mut self.notifications {
            if let Some(&is_followed) = followed.get(n.user.uid.as_str()) {
                n.user.is_followed = is_followed;
            }
        }
        Ok(())
    }

    /// Follow back (or unfollow) the actor of a notification row. Every row
    /// from the same actor shows the settled state.
    pub async fn toggle_follow(&mut self, notification_id: &str) -> Result<(), ServiceError> {
        let row = self
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
            .ok_or_else(|| ServiceError::not_found("notification", notification_id))?;

        let pending = begin_follow(&mut row.user);
        let result = pending.send(&self.services.follows, &self.session).await;

        for n in &mut self.notifications {
            if n.user.uid == pending.uid() {
                if n.id != notification_id {
                    n.user.is_followed = !pending.was_followed();
                }
                settle_follow(&mut n.user, &pending, &result);
            }
        }
        result
    }
}
