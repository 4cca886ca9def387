use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use tracing::debug;

use chirp_api::{ServiceError, Session};
use chirp_types::Tweet;
use chirp_types::api::LikeOutcome;

use crate::Services;
use crate::optimistic::PendingLike;
use crate::timeline::TweetList;

type TweetStream = Pin<Box<dyn Stream<Item = Result<Tweet, ServiceError>> + Send>>;

/// The home timeline: every tweet, live, newest first. Dropping the view
/// drops the store subscription with it.
pub struct FeedView {
    services: Services,
    session: Session,
    tweets: TweetList,
    updates: TweetStream,
}

impl FeedView {
    pub fn open(services: Services, session: Session) -> Self {
        let updates = Box::pin(services.tweets.fetch_tweets());
        Self {
            services,
            session,
            tweets: TweetList::default(),
            updates,
        }
    }

    pub fn tweets(&self) -> &[Tweet] {
        self.tweets.tweets()
    }

    pub fn get(&self, tweet_id: &str) -> Option<&Tweet> {
        self.tweets.get(tweet_id)
    }

    /// Wait for the next tweet from the subscription and merge it. The
    /// viewer's like flag is looked up after the tweet is already listed.
    /// Returns the tweet id, or `None` once the feed has ended.
    pub async fn next_update(&mut self) -> Option<Result<String, ServiceError>> {
        let tweet = match self.updates.next().await? {
            Ok(tweet) => tweet,
            Err(e) => return Some(Err(e)),
        };
        let tweet_id = tweet.tweet_id.clone();
        if !self.tweets.upsert(tweet) {
            debug!("Feed already had {}", tweet_id);
        }

        let liked = self
            .services
            .tweets
            .check_if_user_liked_tweet(self.session.uid(), &tweet_id)
            .await;
        match liked {
            Ok(liked) => {
                self.tweets.set_liked(&tweet_id, liked);
                Some(Ok(tweet_id))
            }
            Err(e) => Some(Err(e)),
        }
    }

    pub async fn reconcile_likes(&mut self) -> Result<(), ServiceError> {
        self.tweets
            .reconcile_likes(&self.services.tweets, self.session.uid())
            .await
    }

    pub fn begin_like(&mut self, tweet_id: &str) -> Option<PendingLike> {
        self.tweets.begin_like(tweet_id)
    }

    pub fn settle_like(&mut self, pending: &PendingLike, result: &Result<LikeOutcome, ServiceError>) {
        self.tweets.settle_like(pending, result);
    }

    pub async fn toggle_like(&mut self, tweet_id: &str) -> Result<LikeOutcome, ServiceError> {
        self.tweets
            .toggle_like(&self.services.tweets, &self.session, tweet_id)
            .await
    }
}
