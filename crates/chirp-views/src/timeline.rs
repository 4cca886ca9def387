use futures_util::future::try_join_all;

use chirp_api::{ServiceError, Session, TweetService};
use chirp_types::Tweet;
use chirp_types::api::LikeOutcome;

use crate::optimistic::{self, PendingLike};
use crate::ordering::sort_newest_first;

/// A list of tweets kept newest first and addressed by tweet id.
#[derive(Debug, Clone, Default)]
pub struct TweetList {
    tweets: Vec<Tweet>,
}

impl TweetList {
    pub fn new(tweets: Vec<Tweet>) -> Self {
        let mut list = Self { tweets };
        sort_newest_first(&mut list.tweets);
        list
    }

    pub fn tweets(&self) -> &[Tweet] {
        &self.tweets
    }

    pub fn len(&self) -> usize {
        self.tweets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tweets.is_empty()
    }

    pub fn get(&self, tweet_id: &str) -> Option<&Tweet> {
        self.tweets.iter().find(|t| t.tweet_id == tweet_id)
    }

    fn get_mut(&mut self, tweet_id: &str) -> Option<&mut Tweet> {
        self.tweets.iter_mut().find(|t| t.tweet_id == tweet_id)
    }

    /// Insert a tweet, or replace the entry with the same id. A refetched
    /// tweet keeps the like flag already reconciled for it. Returns whether
    /// the tweet was new.
    pub fn upsert(&mut self, mut tweet: Tweet) -> bool {
        let inserted = match self.get_mut(&tweet.tweet_id) {
            Some(existing) => {
                tweet.is_liked = existing.is_liked;
                *existing = tweet;
                false
            }
            None => {
                self.tweets.push(tweet);
                true
            }
        };
        sort_newest_first(&mut self.tweets);
        inserted
    }

    /// Swap in a fresh fetch, keeping reconciled like flags by identity.
    pub fn replace(&mut self, tweets: Vec<Tweet>) {
        let previous = std::mem::take(&mut self.tweets);
        self.tweets = tweets;
        for tweet in &mut self.tweets {
            if let Some(old) = previous.iter().find(|old| old.tweet_id == tweet.tweet_id) {
                tweet.is_liked = old.is_liked;
            }
        }
        sort_newest_first(&mut self.tweets);
    }

    pub fn set_liked(&mut self, tweet_id: &str, liked: bool) -> bool {
        match self.get_mut(tweet_id) {
            Some(tweet) => {
                tweet.is_liked = liked;
                true
            }
            None => false,
        }
    }

    /// Mirror a like settled elsewhere onto this list's copy.
    pub fn apply_outcome(&mut self, tweet_id: &str, outcome: LikeOutcome) {
        if let Some(tweet) = self.get_mut(tweet_id) {
            tweet.is_liked = outcome.liked;
            tweet.likes_count = outcome.likes_count;
        }
    }

    /// Check every listed tweet against the viewer's like index and patch
    /// the flags by id. Tweets that left the list meanwhile are ignored.
    pub async fn reconcile_likes(&mut self, tweets: &TweetService, viewer_uid: &str) -> Result<(), ServiceError> {
        let ids: Vec<String> = self.tweets.iter().map(|t| t.tweet_id.clone()).collect();
        let flags = try_join_all(
            ids.iter()
                .map(|id| tweets.check_if_user_liked_tweet(viewer_uid, id)),
        )
        .await?;

        for (id, liked) in ids.iter().zip(flags) {
            self.set_liked(id, liked);
        }
        Ok(())
    }

    pub fn begin_like(&mut self, tweet_id: &str) -> Option<PendingLike> {
        self.get_mut(tweet_id).map(optimistic::begin_like)
    }

    pub fn settle_like(&mut self, pending: &PendingLike, result: &Result<LikeOutcome, ServiceError>) {
        if let Some(tweet) = self.get_mut(pending.tweet_id()) {
            optimistic::settle_like(tweet, pending, result);
        }
    }

    pub async fn toggle_like(
        &mut self,
        tweets: &TweetService,
        session: &Session,
        tweet_id: &str,
    ) -> Result<LikeOutcome, ServiceError> {
        let pending = self
            .begin_like(tweet_id)
            .ok_or_else(|| ServiceError::not_found("tweet", tweet_id))?;
        let result = pending.send(tweets, session).await;
        self.settle_like(&pending, &result);
        result
    }
}
