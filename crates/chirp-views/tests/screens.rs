/// Integration tests: screens driven against a real in-memory backend.

use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;

use chirp_api::{AuthService, Backend, ServiceError, Session};
use chirp_types::NotificationType;
use chirp_types::api::{AuthCredentials, UploadTweetConfiguration};
use chirp_views::format::ActionSheetOption;
use chirp_views::{
    ExploreView, FeedView, NotificationsView, ProfileFilter, ProfileView, Services, ThreadView,
};

struct Harness {
    _blobs: TempDir,
    auth: AuthService,
    services: Services,
}

impl Harness {
    async fn new() -> Self {
        let blobs = TempDir::new().unwrap();
        let backend = Backend::open_in_memory(blobs.path().to_path_buf()).await.unwrap();
        Self {
            _blobs: blobs,
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

    async fn post(&self, session: &Session, caption: &str) -> String {
        self.services
            .tweets
            .upload_tweet(session, caption, &UploadTweetConfiguration::Tweet)
            .await
            .unwrap()
    }
}

async fn next_update(feed: &mut FeedView) -> String {
    tokio::time::timeout(Duration::from_secs(2), feed.next_update())
        .await
        .unwrap()
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn tweet_liked_from_the_feed() {
    let h = Harness::new().await;
    let author = h.register("author").await;
    let viewer = h.register("viewer").await;
    let tweet_id = h.post(&author, "hi").await;

    let mut feed = FeedView::open(h.services.clone(), viewer.clone());
    assert_eq!(next_update(&mut feed).await, tweet_id);
    assert_eq!(feed.tweets().len(), 1);
    assert_eq!(feed.tweets()[0].likes_count, 0);
    assert!(!feed.tweets()[0].is_liked);

    let outcome = feed.toggle_like(&tweet_id).await.unwrap();
    assert!(outcome.liked);
    let entry = feed.get(&tweet_id).unwrap();
    assert!(entry.is_liked);
    assert_eq!(entry.likes_count, 1);

    let inbox = h.services.notifications.fetch_notifications(&author).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationType::Like);
    assert_eq!(inbox[0].tweet_id.as_deref(), Some(tweet_id.as_str()));
}

#[tokio::test]
async fn feed_picks_up_new_tweets_with_viewer_flags() {
    let h = Harness::new().await;
    let alice = h.register("alice").await;
    let first = h.post(&alice, "first").await;

    let mut feed = FeedView::open(h.services.clone(), alice.clone());
    assert_eq!(next_update(&mut feed).await, first);

    let second = h.post(&alice, "second").await;
    let tweet = h.services.tweets.fetch_tweet(&second).await.unwrap();
    h.services.tweets.like_tweet(&alice, &tweet).await.unwrap();

    assert_eq!(next_update(&mut feed).await, second);
    assert_eq!(feed.tweets().len(), 2);
    assert!(feed.get(&second).unwrap().is_liked);
    assert!(!feed.get(&first).unwrap().is_liked);
}

#[tokio::test]
async fn profile_tabs_and_follow_button() {
    let h = Harness::new().await;
    let alice = h.register("alice").await;
    let bob = h.register("bob").await;

    let t1 = h.post(&alice, "one").await;
    h.post(&alice, "two").await;
    let parent = h.services.tweets.fetch_tweet(&t1).await.unwrap();
    h.services
        .tweets
        .upload_tweet(&bob, "nice", &UploadTweetConfiguration::Reply(Box::new(parent.clone())))
        .await
        .unwrap();
    h.services.tweets.like_tweet(&bob, &parent).await.unwrap();

    let mut alice_profile = ProfileView::load(h.services.clone(), bob.clone(), alice.uid())
        .await
        .unwrap();
    assert_eq!(alice_profile.current().len(), 2);
    assert_eq!(alice_profile.header().action_button_title, "Follow");
    assert_eq!(alice_profile.header().followers_text, "0 followers");

    alice_profile.toggle_follow().await.unwrap();
    assert_eq!(alice_profile.header().action_button_title, "Following");
    assert_eq!(alice_profile.header().followers_text, "1 followers");
    assert!(h.services.follows.check_if_user_is_followed(bob.uid(), alice.uid()).await.unwrap());

    let mut bob_profile = ProfileView::load(h.services.clone(), bob.clone(), bob.uid())
        .await
        .unwrap();
    assert_eq!(bob_profile.header().action_button_title, "Edit Profile");
    assert_eq!(bob_profile.header().following_text, "1 following");
    assert!(matches!(bob_profile.toggle_follow().await, Err(ServiceError::Invalid(_))));

    bob_profile.select(ProfileFilter::Replies);
    assert_eq!(bob_profile.current().len(), 1);
    assert!(bob_profile.current()[0].is_reply());

    bob_profile.select(ProfileFilter::Likes);
    bob_profile.reconcile_likes().await.unwrap();
    assert_eq!(bob_profile.current().len(), 1);
    assert!(bob_profile.current()[0].is_liked);

    let outcome = bob_profile.toggle_like(&t1).await.unwrap();
    assert!(!outcome.liked);
    assert!(!bob_profile.current()[0].is_liked);
    assert_eq!(bob_profile.current()[0].likes_count, 0);
}

#[tokio::test]
async fn thread_replies_and_action_sheet() {
    let h = Harness::new().await;
    let alice = h.register("alice").await;
    let bob = h.register("bob").await;
    let tweet_id = h.post(&alice, "thread").await;
    let tweet = h.services.tweets.fetch_tweet(&tweet_id).await.unwrap();

    let mut thread = ThreadView::load(h.services.clone(), bob.clone(), tweet).await.unwrap();
    assert!(thread.replies().is_empty());
    assert!(thread.header_timestamp().contains(" ・ "));

    let reply_id = thread.reply("agreed").await.unwrap();
    assert_eq!(thread.replies().len(), 1);
    assert_eq!(thread.replies()[0].tweet_id, reply_id);

    thread.toggle_like(&reply_id).await.unwrap();
    thread.toggle_like(&tweet_id).await.unwrap();
    thread.reconcile_likes().await.unwrap();
    assert!(thread.tweet().is_liked);
    assert!(thread.replies()[0].is_liked);
    assert_eq!(thread.tweet().likes_count, 1);

    let options = thread.action_sheet().await.unwrap();
    assert_eq!(options, vec![ActionSheetOption::Follow("alice".into()), ActionSheetOption::Report]);
    thread.select_action(&options[0]).await.unwrap();

    let options = thread.action_sheet().await.unwrap();
    assert_eq!(options[0].description(), "Unfollow @alice");
}

#[tokio::test]
async fn notifications_reconcile_and_follow_back() {
    let h = Harness::new().await;
    let alice = h.register("alice").await;
    let bob = h.register("bob").await;
    let tweet_id = h.post(&alice, "hello").await;
    let tweet = h.services.tweets.fetch_tweet(&tweet_id).await.unwrap();

    h.services.follows.follow_user(&bob, alice.uid()).await.unwrap();
    h.services.tweets.like_tweet(&bob, &tweet).await.unwrap();

    let mut inbox = NotificationsView::load(h.services.clone(), alice.clone()).await.unwrap();
    assert_eq!(inbox.notifications().len(), 2);
    let mut texts = inbox.texts(Utc::now());
    texts.sort();
    assert!(texts[0].starts_with("bob liked one of your tweets "));
    assert!(texts[1].starts_with("bob started following you "));

    inbox.reconcile_follows().await.unwrap();
    let follow_row = inbox
        .notifications()
        .iter()
        .find(|n| n.kind == NotificationType::Follow)
        .unwrap()
        .clone();
    assert!(!follow_row.user.is_followed);

    inbox.toggle_follow(&follow_row.id).await.unwrap();
    assert!(inbox.notifications().iter().all(|n| n.user.is_followed));
    assert!(h.services.follows.check_if_user_is_followed(alice.uid(), bob.uid()).await.unwrap());
}

#[tokio::test]
async fn explore_search_ignores_case() {
    let h = Harness::new().await;
    h.register("alice").await;
    h.register("bob").await;

    let explore = ExploreView::load(&h.services).await.unwrap();
    assert_eq!(explore.users().len(), 2);
    let found: Vec<_> = explore.search("ALI").iter().map(|u| u.username.clone()).collect();
    assert_eq!(found, ["alice"]);
    assert_eq!(explore.search("example").len(), 2);
    assert_eq!(explore.search("  ").len(), 2);
}
