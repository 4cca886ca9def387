//! Optimistic likes and follows. `begin_*` flips local state right away and
//! returns what is needed to issue the write and to undo the flip; `settle_*`
//! applies the store's answer, or rolls back if the write failed.

use tracing::warn;

use chirp_api::{RelationshipService, ServiceError, Session, TweetService};
use chirp_types::api::LikeOutcome;
use chirp_types::{Tweet, User, UserRelationStats};

#[derive(Debug, Clone)]
pub struct PendingLike {
    snapshot: Tweet,
}

impl PendingLike {
    pub fn tweet_id(&self) -> &str {
        &self.snapshot.tweet_id
    }

    pub async fn send(&self, tweets: &TweetService, session: &Session) -> Result<LikeOutcome, ServiceError> {
        tweets.like_tweet(session, &self.snapshot).await
    }
}

pub fn begin_like(tweet: &mut Tweet) -> PendingLike {
    let snapshot = tweet.clone();
    tweet.is_liked = !snapshot.is_liked;
    tweet.likes_count = if tweet.is_liked {
        snapshot.likes_count.saturating_add(1)
    } else {
        snapshot.likes_count.saturating_sub(1)
    };
    PendingLike { snapshot }
}

/// On success the store's counter replaces the local guess.
pub fn settle_like(tweet: &mut Tweet, pending: &PendingLike, result: &Result<LikeOutcome, ServiceError>) {
    match result {
        Ok(outcome) => {
            tweet.is_liked = outcome.liked;
            tweet.likes_count = outcome.likes_count;
        }
        Err(e) => {
            warn!("Like on {} failed, rolling back: {}", pending.tweet_id(), e);
            tweet.is_liked = pending.snapshot.is_liked;
            tweet.likes_count = pending.snapshot.likes_count;
        }
    }
}

#[derive(Debug, Clone)]
pub struct PendingFollow {
    uid: String,
    was_followed: bool,
    stats: Option<UserRelationStats>,
}

impl PendingFollow {
    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn was_followed(&self) -> bool {
        self.was_followed
    }

    pub async fn send(&self, follows: &RelationshipService, session: &Session) -> Result<(), ServiceError> {
        if self.was_followed {
            follows.unfollow_user(session, &self.uid).await
        } else {
            follows.follow_user(session, &self.uid).await.map(|_| ())
        }
    }
}

pub fn begin_follow(user: &mut User) -> PendingFollow {
    let pending = PendingFollow {
        uid: user.uid.clone(),
        was_followed: user.is_followed,
        stats: user.stats,
    };
    user.is_followed = !pending.was_followed;
    if let Some(stats) = user.stats.as_mut() {
        stats.followers = if user.is_followed {
            stats.followers + 1
        } else {
            stats.followers.saturating_sub(1)
        };
    }
    pending
}

pub fn settle_follow(user: &mut User, pending: &PendingFollow, result: &Result<(), ServiceError>) {
    if let Err(e) = result {
        warn!("Follow toggle on {} failed, rolling back: {}", pending.uid, e);
        user.is_followed = pending.was_followed;
        user.stats = pending.stats;
    }
}
