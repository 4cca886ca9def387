use chrono::{DateTime, Utc};

use chirp_types::{Notification, Tweet};

/// Anything a list shows in time order.
pub trait Chronological {
    fn timestamp(&self) -> DateTime<Utc>;
    fn id(&self) -> &str;
}

impl Chronological for Tweet {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn id(&self) -> &str {
        &self.tweet_id
    }
}

impl Chronological for Notification {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn id(&self) -> &str {
        &self.id
    }
}

/// Newest first. Equal timestamps fall back to the id so the order does not
/// depend on which lookup resolved first.
pub fn sort_newest_first<T: Chronological>(items: &mut [T]) {
    items.sort_by(|a, b| {
        b.timestamp()
            .cmp(&a.timestamp())
            .then_with(|| b.id().cmp(a.id()))
    });
}
