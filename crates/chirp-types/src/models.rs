use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fields::{DecodeError, Fields, decode_record};

// -- Users --

/// Follower/following counts, populated on demand from the follow edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRelationStats {
    pub followers: usize,
    pub following: usize,
}

/// Stored shape of `users/{uid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub email: String,
    pub username: String,
    pub fullname: String,
    #[serde(default)]
    pub profile_image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub fullname: String,
    pub username: String,
    pub email: String,
    pub profile_image_url: String,
    pub bio: Option<String>,
    /// Viewer-relative. Recomputed per view, never stored on the user record.
    pub is_followed: bool,
    pub stats: Option<UserRelationStats>,
}

impl User {
    pub fn from_record(uid: impl Into<String>, record: UserRecord) -> Self {
        Self {
            uid: uid.into(),
            fullname: record.fullname,
            username: record.username,
            email: record.email,
            profile_image_url: record.profile_image_url,
            bio: record.bio,
            is_followed: false,
            stats: None,
        }
    }

    pub fn decode(uid: &str, fields: &Fields) -> Result<Self, DecodeError> {
        let record: UserRecord = decode_record("user", uid, fields)?;
        Ok(Self::from_record(uid, record))
    }

    pub fn record(&self) -> UserRecord {
        UserRecord {
            email: self.email.clone(),
            username: self.username.clone(),
            fullname: self.fullname.clone(),
            profile_image_url: self.profile_image_url.clone(),
            bio: self.bio.clone(),
        }
    }

    pub fn is_current_user(&self, viewer_uid: &str) -> bool {
        self.uid == viewer_uid
    }
}

// -- Tweets --

/// Stored shape of `tweets/{id}` and `tweet-replies/{parent}/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetRecord {
    pub caption: String,
    pub uid: String,
    /// Unix seconds.
    pub timestamp: i64,
    #[serde(default)]
    pub likes_count: u32,
    #[serde(default)]
    pub retweets_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replying_to: Option<String>,
}

/// A tweet joined with a snapshot of its author.
///
/// `user` is resolved at read time and is not kept in sync with the user
/// record afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    pub tweet_id: String,
    pub caption: String,
    pub uid: String,
    pub user: User,
    pub likes_count: u32,
    pub retweets_count: u32,
    pub timestamp: DateTime<Utc>,
    /// Viewer-relative, patched by the reconciliation pass.
    pub is_liked: bool,
    pub replying_to: Option<String>,
}

impl Tweet {
    pub fn from_record(
        tweet_id: impl Into<String>,
        record: TweetRecord,
        user: User,
    ) -> Result<Self, DecodeError> {
        let tweet_id = tweet_id.into();
        let timestamp = DateTime::from_timestamp(record.timestamp, 0).ok_or_else(|| {
            DecodeError::Timestamp {
                entity: "tweet",
                id: tweet_id.clone(),
                value: record.timestamp,
            }
        })?;

        Ok(Self {
            tweet_id,
            caption: record.caption,
            uid: record.uid,
            user,
            likes_count: record.likes_count,
            retweets_count: record.retweets_count,
            timestamp,
            is_liked: false,
            replying_to: record.replying_to,
        })
    }

    pub fn is_reply(&self) -> bool {
        self.replying_to.is_some()
    }
}

// -- Notifications --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum NotificationType {
    Follow,
    Like,
    Reply,
    Retweet,
    Mention,
}

impl From<NotificationType> for u8 {
    fn from(kind: NotificationType) -> u8 {
        match kind {
            NotificationType::Follow => 0,
            NotificationType::Like => 1,
            NotificationType::Reply => 2,
            NotificationType::Retweet => 3,
            NotificationType::Mention => 4,
        }
    }
}

impl TryFrom<u8> for NotificationType {
    type Error = String;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::Follow),
            1 => Ok(Self::Like),
            2 => Ok(Self::Reply),
            3 => Ok(Self::Retweet),
            4 => Ok(Self::Mention),
            other => Err(format!("unknown notification type {}", other)),
        }
    }
}

/// Stored shape of `notifications/{recipient}/{id}`. `uid` is the actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub uid: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub timestamp: i64,
    #[serde(rename = "tweetID", default, skip_serializing_if = "Option::is_none")]
    pub tweet_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationType,
    pub timestamp: DateTime<Utc>,
    /// Actor snapshot, resolved at read time.
    pub user: User,
    pub tweet_id: Option<String>,
}

impl Notification {
    pub fn from_record(
        id: impl Into<String>,
        record: NotificationRecord,
        user: User,
    ) -> Result<Self, DecodeError> {
        let id = id.into();
        let timestamp = DateTime::from_timestamp(record.timestamp, 0).ok_or_else(|| {
            DecodeError::Timestamp {
                entity: "notification",
                id: id.clone(),
                value: record.timestamp,
            }
        })?;

        Ok(Self {
            id,
            kind: record.kind,
            timestamp,
            user,
            tweet_id: record.tweet_id,
        })
    }
}
