pub mod api;
pub mod events;
pub mod fields;
pub mod models;

pub use fields::{DecodeError, Fields};
pub use models::{Notification, NotificationType, Tweet, User, UserRelationStats};
