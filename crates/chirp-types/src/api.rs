use serde::{Deserialize, Serialize};

use crate::models::Tweet;

// -- Auth --

/// Everything registration needs. `profile_image` holds the encoded image
/// bytes that go to the blob store.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthCredentials {
    pub email: String,
    pub password: String,
    pub fullname: String,
    pub username: String,
    pub profile_image: Vec<u8>,
}

// -- Users --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdate {
    pub fullname: String,
    pub username: String,
    pub bio: Option<String>,
}

// -- Tweets --

/// What the compose screen is posting.
#[derive(Debug, Clone)]
pub enum UploadTweetConfiguration {
    Tweet,
    Reply(Box<Tweet>),
}

/// State of a like edge after a toggle, as acknowledged by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeOutcome {
    pub liked: bool,
    pub likes_count: u32,
}
