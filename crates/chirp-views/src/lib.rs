/// Chirp view state
///
/// Per-screen list state over the chirp services: the live feed, profile
/// tabs, tweet threads, the notification inbox and explore. Views own their
/// lists, keep them newest first, reconcile viewer-relative flags after the
/// first render and apply likes and follows optimistically.

pub mod explore;
pub mod feed;
pub mod format;
pub mod notifications;
pub mod optimistic;
pub mod ordering;
pub mod profile;
pub mod thread;
pub mod timeline;

use chirp_api::{Backend, NotificationService, RelationshipService, TweetService, UserService};

pub use explore::ExploreView;
pub use feed::FeedView;
pub use format::ProfileFilter;
pub use notifications::NotificationsView;
pub use profile::ProfileView;
pub use thread::ThreadView;
pub use timeline::TweetList;

/// The services a screen talks to, built once per backend.
#[derive(Clone)]
pub struct Services {
    pub users: UserService,
    pub tweets: TweetService,
    pub follows: RelationshipService,
    pub notifications: NotificationService,
}

impl Services {
    pub fn new(backend: Backend) -> Self {
        Self {
            users: UserService::new(backend.clone()),
            tweets: TweetService::new(backend.clone()),
            follows: RelationshipService::new(backend.clone()),
            notifications: NotificationService::new(backend),
        }
    }
}
