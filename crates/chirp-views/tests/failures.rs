/// Integration tests: optimistic screen state when the store misbehaves.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;

use chirp_api::{AuthService, Backend, ServiceError, Session, paths};
use chirp_db::{
    Batch, Database, DiskBlobStore, DocumentStore, LocalAuth, SqliteStore, StoreError, Subscription,
};
use chirp_types::api::{AuthCredentials, UploadTweetConfiguration};
use chirp_types::events::Child;
use chirp_types::{Fields, Tweet};
use chirp_views::{ProfileView, Services, TweetList};

/// Fails notification pushes and/or every batch commit while switched on.
struct FlakyStore {
    inner: SqliteStore,
    fail_notifications: AtomicBool,
    fail_commits: AtomicBool,
}

fn injected() -> StoreError {
    StoreError::Io(io::Error::other("injected failure"))
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, path: &str) -> Result<Option<Fields>, StoreError> {
        self.inner.get(path).await
    }

    async fn put(&self, path: &str, fields: Fields) -> Result<(), StoreError> {
        self.inner.put(path, fields).await
    }

    async fn push(&self, parent: &str, fields: Fields) -> Result<String, StoreError> {
        if self.fail_notifications.load(Ordering::SeqCst) && parent.starts_with(paths::NOTIFICATIONS) {
            return Err(injected());
        }
        self.inner.push(parent, fields).await
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.inner.delete(path).await
    }

    async fn children(&self, parent: &str) -> Result<Vec<Child>, StoreError> {
        self.inner.children(parent).await
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<(String, Fields)>, StoreError> {
        self.inner.scan(prefix).await
    }

    async fn subscribe(&self, parent: &str) -> Result<Subscription, StoreError> {
        self.inner.subscribe(parent).await
    }

    async fn commit(&self, batch: Batch) -> Result<Vec<i64>, StoreError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.commit(batch).await
    }
}

struct Harness {
    _blobs: TempDir,
    store: Arc<FlakyStore>,
    auth: AuthService,
    services: Services,
}

impl Harness {
    async fn new() -> Self {
        let blobs = TempDir::new().unwrap();
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = Arc::new(FlakyStore {
            inner: SqliteStore::new(db.clone()),
            fail_notifications: AtomicBool::new(false),
            fail_commits: AtomicBool::new(false),
        });
        let disk = DiskBlobStore::new(blobs.path().to_path_buf(), "file://blobs")
            .await
            .unwrap();
        let backend = Backend::new(store.clone(), Arc::new(LocalAuth::new(db)), Arc::new(disk));
        Self {
            _blobs: blobs,
            store,
            auth: AuthService::new(backend.clone()),
            services: Services::new(backend),
        }
    }

    async fn register(&self, username: &str) -> Session {
        self.auth
            .register_user(AuthCredentials {
                email: format!("{}@example.com", username),
                password: "hunter22".into(),
                fullname: format!("{} Example", username),
                username: username.into(),
                profile_image: vec![1, 2, 3],
            })
            .await
            .unwrap()
    }

    async fn post(&self, session: &Session, caption: &str) -> Tweet {
        let id = self
            .services
            .tweets
            .upload_tweet(session, caption, &UploadTweetConfiguration::Tweet)
            .await
            .unwrap();
        self.services.tweets.fetch_tweet(&id).await.unwrap()
    }

    /// What the store says about `viewer`'s like on the tweet.
    async fn remote_like(&self, viewer: &Session, tweet_id: &str) -> (bool, u32) {
        let liked = self
            .services
            .tweets
            .check_if_user_liked_tweet(viewer.uid(), tweet_id)
            .await
            .unwrap();
        let count = self.services.tweets.fetch_tweet(tweet_id).await.unwrap().likes_count;
        (liked, count)
    }
}

#[tokio::test]
async fn failed_notification_keeps_the_optimistic_like() {
    let h = Harness::new().await;
    let alice = h.register("alice").await;
    let bob = h.register("bob").await;
    let tweet = h.post(&alice, "hi").await;
    let mut list = TweetList::new(vec![tweet.clone()]);
    h.store.fail_notifications.store(true, Ordering::SeqCst);

    let outcome = list
        .toggle_like(&h.services.tweets, &bob, &tweet.tweet_id)
        .await
        .unwrap();
    assert!(outcome.liked);

    let local = list.get(&tweet.tweet_id).unwrap();
    assert_eq!((local.is_liked, local.likes_count), (true, 1));
    assert_eq!(h.remote_like(&bob, &tweet.tweet_id).await, (true, 1));
}

#[tokio::test]
async fn rejected_write_rolls_back_to_the_stored_state() {
    let h = Harness::new().await;
    let alice = h.register("alice").await;
    let bob = h.register("bob").await;
    let tweet = h.post(&alice, "hi").await;
    let mut list = TweetList::new(vec![tweet.clone()]);
    h.store.fail_commits.store(true, Ordering::SeqCst);

    let pending = list.begin_like(&tweet.tweet_id).unwrap();
    let flipped = list.get(&tweet.tweet_id).unwrap();
    assert_eq!((flipped.is_liked, flipped.likes_count), (true, 1));

    let result = pending.send(&h.services.tweets, &bob).await;
    assert!(matches!(result, Err(ServiceError::Store(_))));
    list.settle_like(&pending, &result);

    let local = list.get(&tweet.tweet_id).unwrap();
    assert_eq!((local.is_liked, local.likes_count), (false, 0));
    assert_eq!(h.remote_like(&bob, &tweet.tweet_id).await, (false, 0));
}

#[tokio::test]
async fn rejected_follow_rolls_back_the_profile_header() {
    let h = Harness::new().await;
    let alice = h.register("alice").await;
    let bob = h.register("bob").await;

    let mut profile = ProfileView::load(h.services.clone(), bob.clone(), alice.uid())
        .await
        .unwrap();
    h.store.fail_commits.store(true, Ordering::SeqCst);

    assert!(profile.toggle_follow().await.is_err());
    assert_eq!(profile.header().action_button_title, "Follow");
    assert_eq!(profile.header().followers_text, "0 followers");
    assert!(
        !h.services
            .follows
            .check_if_user_is_followed(bob.uid(), alice.uid())
            .await
            .unwrap()
    );
}
