//! Display strings derived from entities. Everything here is pure: the
//! current time is passed in where it matters.

use chrono::{DateTime, Utc};

use chirp_types::api::UploadTweetConfiguration;
use chirp_types::{Notification, NotificationType, Tweet, User};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;

/// Age in its largest whole unit, abbreviated: `42s`, `5m`, `3h`, `2d`, `6w`.
/// Timestamps in the future read as `0s`.
pub fn relative_timestamp(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds().max(0);
    match secs {
        s if s >= WEEK => format!("{}w", s / WEEK),
        s if s >= DAY => format!("{}d", s / DAY),
        s if s >= HOUR => format!("{}h", s / HOUR),
        s if s >= MINUTE => format!("{}m", s / MINUTE),
        s => format!("{}s", s),
    }
}

/// Full timestamp for the tweet detail header, e.g. `4:05 PM ・ 09/03/2024`.
pub fn header_timestamp(at: DateTime<Utc>) -> String {
    at.format("%-I:%M %p ・ %d/%m/%Y").to_string()
}

pub fn count_text(value: impl std::fmt::Display, unit: &str) -> String {
    format!("{} {}", value, unit)
}

pub fn likes_text(tweet: &Tweet) -> String {
    count_text(tweet.likes_count, "Likes")
}

pub fn retweets_text(tweet: &Tweet) -> String {
    count_text(tweet.retweets_count, "Retweets")
}

pub fn username_text(user: &User) -> String {
    format!("@{}", user.username)
}

/// `Full Name @handle ・5m`
pub fn user_info_text(tweet: &Tweet, now: DateTime<Utc>) -> String {
    format!(
        "{} @{} ・{}",
        tweet.user.fullname,
        tweet.user.username,
        relative_timestamp(tweet.timestamp, now)
    )
}

// -- Like button --

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tint {
    Red,
    LightGray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeButton {
    pub tint: Tint,
    pub image: &'static str,
}

pub fn like_button(tweet: &Tweet) -> LikeButton {
    if tweet.is_liked {
        LikeButton {
            tint: Tint::Red,
            image: "like_filled",
        }
    } else {
        LikeButton {
            tint: Tint::LightGray,
            image: "like",
        }
    }
}

// -- Notifications --

pub fn notification_message(kind: NotificationType) -> &'static str {
    match kind {
        NotificationType::Follow => " started following you",
        NotificationType::Like => " liked one of your tweets",
        NotificationType::Reply => " replied to your tweet",
        NotificationType::Retweet => " retweeted your tweet",
        NotificationType::Mention => " mentioned you in a tweet",
    }
}

/// `alice liked one of your tweets 3m`
pub fn notification_text(notification: &Notification, now: DateTime<Utc>) -> String {
    format!(
        "{}{} {}",
        notification.user.username,
        notification_message(notification.kind),
        relative_timestamp(notification.timestamp, now)
    )
}

/// Title of the follow button on a follow notification row.
pub fn follow_button_title(user: &User) -> &'static str {
    if user.is_followed { "Following" } else { "Follow" }
}

// -- Profile --

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ProfileFilter {
    #[default]
    Tweets,
    Replies,
    Likes,
}

impl ProfileFilter {
    pub const ALL: [ProfileFilter; 3] = [Self::Tweets, Self::Replies, Self::Likes];

    pub fn title(self) -> &'static str {
        match self {
            Self::Tweets => "Tweets",
            Self::Replies => "Tweets & Replies",
            Self::Likes => "Likes",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileHeader {
    pub fullname: String,
    pub username_text: String,
    pub bio: Option<String>,
    pub followers_text: String,
    pub following_text: String,
    pub action_button_title: &'static str,
}

impl ProfileHeader {
    pub fn new(user: &User, viewer_uid: &str) -> Self {
        let stats = user.stats.unwrap_or_default();
        let action_button_title = if user.is_current_user(viewer_uid) {
            "Edit Profile"
        } else {
            follow_button_title(user)
        };

        Self {
            fullname: user.fullname.clone(),
            username_text: username_text(user),
            bio: user.bio.clone(),
            followers_text: count_text(stats.followers, "followers"),
            following_text: count_text(stats.following, "following"),
            action_button_title,
        }
    }
}

// -- Action sheet --

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionSheetOption {
    Follow(String),
    Unfollow(String),
    Report,
    Delete,
}

impl ActionSheetOption {
    pub fn description(&self) -> String {
        match self {
            Self::Follow(username) => format!("Follow @{}", username),
            Self::Unfollow(username) => format!("Unfollow @{}", username),
            Self::Report => "Report Tweet".to_string(),
            Self::Delete => "Delete Tweet".to_string(),
        }
    }
}

/// Options offered for a tweet by `author`; `author.is_followed` must
/// already reflect the viewer's follow edge.
pub fn action_sheet_options(author: &User, viewer_uid: &str) -> Vec<ActionSheetOption> {
    let first = if author.is_current_user(viewer_uid) {
        ActionSheetOption::Delete
    } else if author.is_followed {
        ActionSheetOption::Unfollow(author.username.clone())
    } else {
        ActionSheetOption::Follow(author.username.clone())
    };
    vec![first, ActionSheetOption::Report]
}

// -- Compose screen --

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLabels {
    pub action_button_title: &'static str,
    pub placeholder: &'static str,
    pub replying_to: Option<String>,
}

impl UploadLabels {
    pub fn new(config: &UploadTweetConfiguration) -> Self {
        match config {
            UploadTweetConfiguration::Tweet => Self {
                action_button_title: "Tweet",
                placeholder: "What's happening?",
                replying_to: None,
            },
            UploadTweetConfiguration::Reply(parent) => Self {
                action_button_title: "Reply",
                placeholder: "Tweet your reply",
                replying_to: Some(format!("Replying to @{}", parent.user.username)),
            },
        }
    }
}
