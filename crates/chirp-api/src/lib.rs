/// Chirp social data layer
///
/// Typed services over the hosted backend: tweets, replies, likes, follows,
/// notification fan-out and the edge-repair sweep. Every mutating call takes
/// an explicit [`Session`]; nothing reads the signed-in user ambiently.

pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod follows;
pub mod gather;
pub mod mentions;
pub mod notifications;
pub mod paths;
pub mod repair;
pub mod session;
pub mod tweets;
pub mod users;

pub use auth::AuthService;
pub use backend::Backend;
pub use config::Config;
pub use error::ServiceError;
pub use follows::RelationshipService;
pub use notifications::NotificationService;
pub use repair::{EdgeRepair, RepairReport};
pub use session::Session;
pub use tweets::TweetService;
pub use users::UserService;
