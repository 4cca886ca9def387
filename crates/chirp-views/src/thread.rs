use chirp_api::{ServiceError, Session};
use chirp_types::Tweet;
use chirp_types::api::{LikeOutcome, UploadTweetConfiguration};

use crate::Services;
use crate::format::{self, ActionSheetOption};
use crate::optimistic::{begin_follow, begin_like, settle_follow, settle_like};
use crate::timeline::TweetList;

/// A tweet with its replies underneath.
pub struct ThreadView {
    services: Services,
    session: Session,
    tweet: Tweet,
    replies: TweetList,
}

impl ThreadView {
    pub async fn load(services: Services, session: Session, tweet: Tweet) -> Result<Self, ServiceError> {
        let replies = services.tweets.fetch_replies(&tweet.tweet_id).await?;
        Ok(Self {
            services,
            session,
            tweet,
            replies: TweetList::new(replies),
        })
    }

    pub fn tweet(&self) -> &Tweet {
        &self.tweet
    }

    pub fn replies(&self) -> &[Tweet] {
        self.replies.tweets()
    }

    pub fn header_timestamp(&self) -> String {
        format::header_timestamp(self.tweet.timestamp)
    }

    pub async fn reconcile_likes(&mut self) -> Result<(), ServiceError> {
        let viewer = self.session.uid();
        self.tweet.is_liked = self
            .services
            .tweets
            .check_if_user_liked_tweet(viewer, &self.tweet.tweet_id)
            .await?;
        self.replies
            .reconcile_likes(&self.services.tweets, viewer)
            .await
    }

    /// Like or unlike the thread's tweet or one of its replies.
    pub async fn toggle_like(&mut self, tweet_id: &str) -> Result<LikeOutcome, ServiceError> {
        if tweet_id != self.tweet.tweet_id {
            return self
                .replies
                .toggle_like(&self.services.tweets, &self.session, tweet_id)
                .await;
        }

        let pending = begin_like(&mut self.tweet);
        let result = pending.send(&self.services.tweets, &self.session).await;
        settle_like(&mut self.tweet, &pending, &result);
        result
    }

    /// Post a reply as the viewer and refresh the replies.
    pub async fn reply(&mut self, caption: &str) -> Result<String, ServiceError> {
        let config = UploadTweetConfiguration::Reply(Box::new(self.tweet.clone()));
        let reply_id = self
            .services
            .tweets
            .upload_tweet(&self.session, caption, &config)
            .await?;
        let replies = self.services.tweets.fetch_replies(&self.tweet.tweet_id).await?;
        self.replies.replace(replies);
        Ok(reply_id)
    }

    /// Options for the tweet's action sheet, after checking whether the
    /// viewer follows the author.
    pub async fn action_sheet(&mut self) -> Result<Vec<ActionSheetOption>, ServiceError> {
        let viewer = self.session.uid();
        if !self.tweet.user.is_current_user(viewer) {
            self.tweet.user.is_followed = self
                .services
                .follows
                .check_if_user_is_followed(viewer, &self.tweet.uid)
                .await?;
        }
        Ok(format::action_sheet_options(&self.tweet.user, viewer))
    }

    /// Run the follow or unfollow behind an action-sheet option. Other
    /// options have nothing to write.
    pub async fn select_action(&mut self, option: &ActionSheetOption) -> Result<(), ServiceError> {
        match option {
            ActionSheetOption::Follow(_) | ActionSheetOption::Unfollow(_) => {
                let pending = begin_follow(&mut self.tweet.user);
                let result = pending.send(&self.services.follows, &self.session).await;
                settle_follow(&mut self.tweet.user, &pending, &result);
                result
            }
            ActionSheetOption::Report | ActionSheetOption::Delete => Ok(()),
        }
    }
}
