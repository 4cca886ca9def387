//! Store layout. Every document the social layer touches is addressed
//! through these builders so the two sides of an edge can never disagree
//! about where the other lives.

pub const USERS: &str = "users";
pub const USER_USERNAMES: &str = "user-usernames";
pub const TWEETS: &str = "tweets";
pub const USER_TWEETS: &str = "user-tweets";
pub const TWEET_REPLIES: &str = "tweet-replies";
pub const USER_REPLIES: &str = "user-replies";
pub const USER_LIKES: &str = "user-likes";
pub const TWEET_LIKES: &str = "tweet-likes";
pub const USER_FOLLOWING: &str = "user-following";
pub const USER_FOLLOWERS: &str = "user-followers";
pub const NOTIFICATIONS: &str = "notifications";

pub fn user(uid: &str) -> String {
    format!("{}/{}", USERS, uid)
}

pub fn username(username: &str) -> String {
    format!("{}/{}", USER_USERNAMES, username)
}

pub fn tweet(tweet_id: &str) -> String {
    format!("{}/{}", TWEETS, tweet_id)
}

pub fn user_tweets(uid: &str) -> String {
    format!("{}/{}", USER_TWEETS, uid)
}

pub fn user_tweet(uid: &str, tweet_id: &str) -> String {
    format!("{}/{}/{}", USER_TWEETS, uid, tweet_id)
}

pub fn tweet_replies(tweet_id: &str) -> String {
    format!("{}/{}", TWEET_REPLIES, tweet_id)
}

pub fn tweet_reply(parent_id: &str, reply_id: &str) -> String {
    format!("{}/{}/{}", TWEET_REPLIES, parent_id, reply_id)
}

pub fn user_replies(uid: &str) -> String {
    format!("{}/{}", USER_REPLIES, uid)
}

pub fn user_reply(uid: &str, parent_id: &str) -> String {
    format!("{}/{}/{}", USER_REPLIES, uid, parent_id)
}

pub fn user_likes(uid: &str) -> String {
    format!("{}/{}", USER_LIKES, uid)
}

pub fn user_like(uid: &str, tweet_id: &str) -> String {
    format!("{}/{}/{}", USER_LIKES, uid, tweet_id)
}

pub fn tweet_likes(tweet_id: &str) -> String {
    format!("{}/{}", TWEET_LIKES, tweet_id)
}

pub fn tweet_like(tweet_id: &str, uid: &str) -> String {
    format!("{}/{}/{}", TWEET_LIKES, tweet_id, uid)
}

pub fn user_following(uid: &str) -> String {
    format!("{}/{}", USER_FOLLOWING, uid)
}

pub fn following_edge(uid: &str, target_uid: &str) -> String {
    format!("{}/{}/{}", USER_FOLLOWING, uid, target_uid)
}

pub fn user_followers(uid: &str) -> String {
    format!("{}/{}", USER_FOLLOWERS, uid)
}

pub fn follower_edge(target_uid: &str, uid: &str) -> String {
    format!("{}/{}/{}", USER_FOLLOWERS, target_uid, uid)
}

pub fn notifications(recipient_uid: &str) -> String {
    format!("{}/{}", NOTIFICATIONS, recipient_uid)
}

/// Where a tweet's record lives: top-level tweets under `tweets/`, replies
/// under their parent.
pub fn tweet_record(tweet_id: &str, replying_to: Option<&str>) -> String {
    match replying_to {
        Some(parent_id) => tweet_reply(parent_id, tweet_id),
        None => tweet(tweet_id),
    }
}

/// Split a two-level edge path (`root/a/b`) into its segments.
pub fn edge_segments<'a>(path: &'a str, root: &str) -> Option<(&'a str, &'a str)> {
    let rest = path.strip_prefix(root)?.strip_prefix('/')?;
    let (first, second) = rest.split_once('/')?;
    if first.is_empty() || second.is_empty() || second.contains('/') {
        return None;
    }
    Some((first, second))
}
