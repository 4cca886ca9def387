/// Integration tests: drive the services end to end against an in-memory
/// store, the local auth provider and a temp-dir blob store.

use std::time::Duration;

use futures_util::StreamExt;
use serde_json::json;
use tempfile::TempDir;

use chirp_api::{
    AuthService, Backend, EdgeRepair, NotificationService, RelationshipService, ServiceError,
    Session, TweetService, UserService, paths,
};
use chirp_types::api::{AuthCredentials, ProfileUpdate, UploadTweetConfiguration};
use chirp_types::fields::{encode_record, single_field};
use chirp_types::models::TweetRecord;
use chirp_types::{Fields, NotificationType, Tweet};

struct Harness {
    _blobs: TempDir,
    backend: Backend,
    auth: AuthService,
    users: UserService,
    tweets: TweetService,
    follows: RelationshipService,
    notifications: NotificationService,
}

impl Harness {
    async fn new() -> Self {
        let blobs = TempDir::new().unwrap();
        let backend = Backend::open_in_memory(blobs.path().to_path_buf()).await.unwrap();
        Self {
            _blobs: blobs,
            auth: AuthService::new(backend.clone()),
            users: UserService::new(backend.clone()),
            tweets: TweetService::new(backend.clone()),
            follows: RelationshipService::new(backend.clone()),
            notifications: NotificationService::new(backend.clone()),
            backend,
        }
    }

    async fn register(&self, username: &str) -> Session {
        self.auth
            .register_user(credentials(username))
            .await
            .unwrap()
    }

    async fn post(&self, session: &Session, caption: &str) -> Tweet {
        let id = self
            .tweets
            .upload_tweet(session, caption, &UploadTweetConfiguration::Tweet)
            .await
            .unwrap();
        self.tweets.fetch_tweet(&id).await.unwrap()
    }

    async fn reply(&self, session: &Session, parent: &Tweet, caption: &str) -> Tweet {
        let id = self
            .tweets
            .upload_tweet(
                session,
                caption,
                &UploadTweetConfiguration::Reply(Box::new(parent.clone())),
            )
            .await
            .unwrap();
        self.tweets
            .fetch_replies(&parent.tweet_id)
            .await
            .unwrap()
            .into_iter()
            .find(|reply| reply.tweet_id == id)
            .unwrap()
    }

    async fn notification_kinds(&self, session: &Session) -> Vec<NotificationType> {
        self.notifications
            .fetch_notifications(session)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.kind)
            .collect()
    }
}

fn credentials(username: &str) -> AuthCredentials {
    AuthCredentials {
        email: format!("{}@example.com", username),
        password: "hunter22".into(),
        fullname: format!("{} Example", username),
        username: username.into(),
        profile_image: vec![0x89, b'P', b'N', b'G'],
    }
}

// -- Accounts --

#[tokio::test]
async fn register_sign_in_and_out() {
    let h = Harness::new().await;
    let alice = h.register("Alice").await;

    let user = h.users.fetch_user(alice.uid()).await.unwrap();
    assert_eq!(user.username, "alice");
    assert!(user.profile_image_url.starts_with("file://"));
    assert_eq!(h.auth.current_session().unwrap(), alice);

    h.auth.sign_out();
    assert!(matches!(h.auth.current_session(), Err(ServiceError::NoSession)));

    let again = h.auth.log_user_in("alice@example.com", "hunter22").await.unwrap();
    assert_eq!(again, alice);
    assert!(matches!(
        h.auth.log_user_in("alice@example.com", "wrong-password").await,
        Err(ServiceError::Auth(_))
    ));
}

#[tokio::test]
async fn usernames_are_unique_ignoring_case() {
    let h = Harness::new().await;
    h.register("alice").await;

    let mut dup = credentials("ALICE");
    dup.email = "other@example.com".into();
    assert!(matches!(
        h.auth.register_user(dup).await,
        Err(ServiceError::UsernameTaken(name)) if name == "alice"
    ));

    let found = h.users.fetch_user_by_username("Alice").await.unwrap().unwrap();
    assert_eq!(found.username, "alice");
    assert!(h.users.fetch_user_by_username("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn registration_validates_input() {
    let h = Harness::new().await;

    let mut no_image = credentials("alice");
    no_image.profile_image.clear();
    assert!(matches!(h.auth.register_user(no_image).await, Err(ServiceError::Invalid(_))));

    let mut bad_email = credentials("alice");
    bad_email.email = "alice".into();
    assert!(matches!(h.auth.register_user(bad_email).await, Err(ServiceError::Invalid(_))));

    assert!(h.users.fetch_users().await.unwrap().is_empty());
}

#[tokio::test]
async fn profile_edit_moves_username_index() {
    let h = Harness::new().await;
    let alice = h.register("alice").await;
    h.register("bob").await;

    let updated = h
        .users
        .update_user_data(
            &alice,
            ProfileUpdate {
                fullname: "Alice Liddell".into(),
                username: "wonder".into(),
                bio: Some("curiouser".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.username, "wonder");
    assert_eq!(updated.bio.as_deref(), Some("curiouser"));

    assert!(h.users.fetch_user_by_username("alice").await.unwrap().is_none());
    let found = h.users.fetch_user_by_username("wonder").await.unwrap().unwrap();
    assert_eq!(found.uid, alice.uid());

    let taken = h
        .users
        .update_user_data(
            &alice,
            ProfileUpdate {
                fullname: "Alice".into(),
                username: "bob".into(),
                bio: None,
            },
        )
        .await;
    assert!(matches!(taken, Err(ServiceError::UsernameTaken(_))));
    assert_eq!(h.users.fetch_user(alice.uid()).await.unwrap().username, "wonder");
}

// -- Tweets and replies --

#[tokio::test]
async fn tweet_is_listed_and_mentions_fan_out_once() {
    let h = Harness::new().await;
    let alice = h.register("alice").await;
    let bob = h.register("bob").await;

    let tweet = h.post(&alice, "hi @bob @Bob @alice @ghost").await;
    assert_eq!(tweet.user.username, "alice");
    assert_eq!(tweet.likes_count, 0);

    let listed = h.tweets.fetch_tweets_for_user(alice.uid()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].tweet_id, tweet.tweet_id);

    let bob_inbox = h.notifications.fetch_notifications(&bob).await.unwrap();
    assert_eq!(bob_inbox.len(), 1);
    assert_eq!(bob_inbox[0].kind, NotificationType::Mention);
    assert_eq!(bob_inbox[0].tweet_id.as_deref(), Some(tweet.tweet_id.as_str()));
    assert_eq!(bob_inbox[0].user.uid, alice.uid());

    // No self-mention
    assert!(h.notification_kinds(&alice).await.is_empty());
}

#[tokio::test]
async fn invalid_captions_are_rejected() {
    let h = Harness::new().await;
    let alice = h.register("alice").await;

    for caption in ["   ".to_string(), "x".repeat(281)] {
        let result = h
            .tweets
            .upload_tweet(&alice, &caption, &UploadTweetConfiguration::Tweet)
            .await;
        assert!(matches!(result, Err(ServiceError::Invalid(_))));
    }
    assert!(h.tweets.fetch_tweets_for_user(alice.uid()).await.unwrap().is_empty());
}

#[tokio::test]
async fn replies_are_threaded_and_indexed_per_parent() {
    let h = Harness::new().await;
    let alice = h.register("alice").await;
    let bob = h.register("bob").await;

    let tweet = h.post(&alice, "thoughts?").await;
    let first = h.reply(&bob, &tweet, "first").await;
    assert_eq!(first.replying_to.as_deref(), Some(tweet.tweet_id.as_str()));

    let second = h.reply(&bob, &tweet, "second").await;
    assert_eq!(h.tweets.fetch_replies(&tweet.tweet_id).await.unwrap().len(), 2);

    // One index entry per parent, pointing at the latest reply
    let mine = h.tweets.fetch_replies_for_user(bob.uid()).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].tweet_id, second.tweet_id);

    assert_eq!(
        h.notification_kinds(&alice).await,
        vec![NotificationType::Reply, NotificationType::Reply]
    );
    // Replying to yourself notifies nobody
    h.reply(&alice, &tweet, "self").await;
    assert_eq!(h.notification_kinds(&alice).await.len(), 2);
}

#[tokio::test]
async fn dangling_index_entries_are_skipped() {
    let h = Harness::new().await;
    let alice = h.register("alice").await;
    let tweet = h.post(&alice, "real").await;

    h.backend
        .store
        .put(&paths::user_tweet(alice.uid(), "ghost"), Fields::new())
        .await
        .unwrap();

    let listed = h.tweets.fetch_tweets_for_user(alice.uid()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].tweet_id, tweet.tweet_id);
    assert!(matches!(
        h.tweets.fetch_tweet("ghost").await,
        Err(ServiceError::NotFound { .. })
    ));
}

#[tokio::test]
async fn tweet_stream_replays_then_follows() {
    let h = Harness::new().await;
    let alice = h.register("alice").await;
    let first = h.post(&alice, "one").await;

    let stream = h.tweets.fetch_tweets();
    futures_util::pin_mut!(stream);
    assert_eq!(stream.next().await.unwrap().unwrap().tweet_id, first.tweet_id);

    let second = h.post(&alice, "two").await;
    let next = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(next.tweet_id, second.tweet_id);
    assert_eq!(next.caption, "two");
}

// -- Likes --

#[tokio::test]
async fn like_toggle_keeps_counter_and_edges_in_step() {
    let h = Harness::new().await;
    let alice = h.register("alice").await;
    let bob = h.register("bob").await;
    let tweet = h.post(&alice, "like me").await;

    let liked = h.tweets.like_tweet(&bob, &tweet).await.unwrap();
    assert!(liked.liked);
    assert_eq!(liked.likes_count, 1);
    assert!(h.tweets.check_if_user_liked_tweet(bob.uid(), &tweet.tweet_id).await.unwrap());
    assert!(h.backend.store.exists(&paths::tweet_like(&tweet.tweet_id, bob.uid())).await.unwrap());
    assert_eq!(h.tweets.fetch_likes(bob.uid()).await.unwrap().len(), 1);
    assert_eq!(h.notification_kinds(&alice).await, vec![NotificationType::Like]);

    let unliked = h.tweets.like_tweet(&bob, &tweet).await.unwrap();
    assert!(!unliked.liked);
    assert_eq!(unliked.likes_count, 0);
    assert!(!h.tweets.check_if_user_liked_tweet(bob.uid(), &tweet.tweet_id).await.unwrap());
    assert!(h.tweets.fetch_likes(bob.uid()).await.unwrap().is_empty());
    assert_eq!(h.tweets.fetch_tweet(&tweet.tweet_id).await.unwrap().likes_count, 0);

    // Unlike notifies nobody and liking your own tweet neither
    h.tweets.like_tweet(&alice, &tweet).await.unwrap();
    assert_eq!(h.notification_kinds(&alice).await.len(), 1);
}

#[tokio::test]
async fn like_counter_never_goes_negative() {
    let h = Harness::new().await;
    let alice = h.register("alice").await;
    let tweet = h.post(&alice, "drift").await;

    h.tweets.like_tweet(&alice, &tweet).await.unwrap();
    h.backend
        .store
        .put(&paths::tweet(&tweet.tweet_id), single_field("likesCount", 0))
        .await
        .unwrap();

    let outcome = h.tweets.like_tweet(&alice, &tweet).await.unwrap();
    assert!(!outcome.liked);
    assert_eq!(outcome.likes_count, 0);
}

#[tokio::test]
async fn concurrent_toggles_stay_consistent() {
    let h = Harness::new().await;
    let alice = h.register("alice").await;
    let bob = h.register("bob").await;
    let tweet = h.post(&alice, "race").await;

    let (a, b) = tokio::join!(
        h.tweets.like_tweet(&bob, &tweet),
        h.tweets.like_tweet(&bob, &tweet)
    );
    assert!(a.is_ok() || b.is_ok());

    let edges = h.backend.store.children(&paths::tweet_likes(&tweet.tweet_id)).await.unwrap();
    let counter = h.tweets.fetch_tweet(&tweet.tweet_id).await.unwrap().likes_count;
    assert_eq!(counter as usize, edges.len());
    assert_eq!(
        h.tweets.check_if_user_liked_tweet(bob.uid(), &tweet.tweet_id).await.unwrap(),
        edges.len() == 1
    );
}

#[tokio::test]
async fn liking_a_reply_finds_it_again() {
    let h = Harness::new().await;
    let alice = h.register("alice").await;
    let bob = h.register("bob").await;
    let tweet = h.post(&alice, "parent").await;
    let reply = h.reply(&alice, &tweet, "child").await;

    let outcome = h.tweets.like_tweet(&bob, &reply).await.unwrap();
    assert_eq!(outcome.likes_count, 1);

    let likes = h.tweets.fetch_likes(bob.uid()).await.unwrap();
    assert_eq!(likes.len(), 1);
    assert_eq!(likes[0].tweet_id, reply.tweet_id);
    assert!(likes[0].is_reply());
}

// -- Follows --

#[tokio::test]
async fn follow_is_idempotent_and_notifies_once() {
    let h = Harness::new().await;
    let alice = h.register("alice").await;
    let bob = h.register("bob").await;

    assert!(h.follows.follow_user(&alice, bob.uid()).await.unwrap());
    assert!(!h.follows.follow_user(&alice, bob.uid()).await.unwrap());
    assert!(h.follows.check_if_user_is_followed(alice.uid(), bob.uid()).await.unwrap());
    assert_eq!(h.notification_kinds(&bob).await, vec![NotificationType::Follow]);

    let stats = h.users.fetch_user_stats(bob.uid()).await.unwrap();
    assert_eq!((stats.followers, stats.following), (1, 0));

    h.follows.unfollow_user(&alice, bob.uid()).await.unwrap();
    h.follows.unfollow_user(&alice, bob.uid()).await.unwrap();
    assert!(!h.follows.check_if_user_is_followed(alice.uid(), bob.uid()).await.unwrap());
    assert_eq!(h.users.fetch_user_stats(bob.uid()).await.unwrap().followers, 0);

    assert!(matches!(
        h.follows.follow_user(&alice, alice.uid()).await,
        Err(ServiceError::Invalid(_))
    ));
}

// -- Repair --

#[tokio::test]
async fn repair_sweep_restores_indexes() {
    let h = Harness::new().await;
    let alice = h.register("alice").await;
    let bob = h.register("bob").await;
    let store = &h.backend.store;

    // A tweet whose author listing never landed
    let record = TweetRecord {
        caption: "orphan".into(),
        uid: alice.uid().into(),
        timestamp: 1_700_000_000,
        likes_count: 5,
        retweets_count: 0,
        replying_to: None,
    };
    let orphan = store.push(paths::TWEETS, encode_record(&record)).await.unwrap();

    // Half a like pair, half a follow pair, and a like on a deleted tweet
    store.put(&paths::user_like(bob.uid(), &orphan), Fields::new()).await.unwrap();
    store.put(&paths::follower_edge(alice.uid(), bob.uid()), Fields::new()).await.unwrap();
    store.put(&paths::tweet_like("gone", bob.uid()), Fields::new()).await.unwrap();

    let report = EdgeRepair::new(h.backend.clone()).sweep().await.unwrap();
    assert_eq!(report.tweets_relisted, 1);
    assert_eq!(report.like_edges_restored, 1);
    assert_eq!(report.like_edges_dropped, 1);
    assert_eq!(report.follow_edges_restored, 1);
    assert_eq!(report.counters_corrected, 1);

    assert_eq!(h.tweets.fetch_tweets_for_user(alice.uid()).await.unwrap().len(), 1);
    assert!(h.follows.check_if_user_is_followed(bob.uid(), alice.uid()).await.unwrap());
    let fixed = h.tweets.fetch_tweet(&orphan).await.unwrap();
    assert_eq!(fixed.likes_count, 1);
    assert!(!store.exists(&paths::tweet_like("gone", bob.uid())).await.unwrap());

    let second = EdgeRepair::new(h.backend.clone()).sweep().await.unwrap();
    assert_eq!(second.total(), 0);
    assert_eq!(store.get(&paths::tweet(&orphan)).await.unwrap().unwrap().get("likesCount"), Some(&json!(1)));
}
