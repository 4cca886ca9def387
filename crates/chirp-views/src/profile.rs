use chirp_api::{ServiceError, Session};
use chirp_types::api::LikeOutcome;
use chirp_types::{Tweet, User};

use crate::Services;
use crate::format::{ProfileFilter, ProfileHeader};
use crate::optimistic::{begin_follow, settle_follow};
use crate::timeline::TweetList;

/// A user's profile: header plus one tweet list per filter tab.
pub struct ProfileView {
    services: Services,
    session: Session,
    user: User,
    selected: ProfileFilter,
    tweets: TweetList,
    replies: TweetList,
    likes: TweetList,
}

impl ProfileView {
    /// Fetch the user, their follow stats and all three tabs concurrently.
    /// Like flags start unset; call [`ProfileView::reconcile_likes`].
    pub async fn load(services: Services, session: Session, uid: &str) -> Result<Self, ServiceError> {
        let (mut user, stats, is_followed, tweets, replies, likes) = tokio::try_join!(
            services.users.fetch_user(uid),
            services.users.fetch_user_stats(uid),
            services.follows.check_if_user_is_followed(session.uid(), uid),
            services.tweets.fetch_tweets_for_user(uid),
            services.tweets.fetch_replies_for_user(uid),
            services.tweets.fetch_likes(uid),
        )?;
        user.stats = Some(stats);
        user.is_followed = is_followed;

        Ok(Self {
            services,
            session,
            user,
            selected: ProfileFilter::default(),
            tweets: TweetList::new(tweets),
            replies: TweetList::new(replies),
            likes: TweetList::new(likes),
        })
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn header(&self) -> ProfileHeader {
        ProfileHeader::new(&self.user, self.session.uid())
    }

    pub fn selected(&self) -> ProfileFilter {
        self.selected
    }

    pub fn select(&mut self, filter: ProfileFilter) {
        self.selected = filter;
    }

    fn list(&self, filter: ProfileFilter) -> &TweetList {
        match filter {
            ProfileFilter::Tweets => &self.tweets,
            ProfileFilter::Replies => &self.replies,
            ProfileFilter::Likes => &self.likes,
        }
    }

    fn list_mut(&mut self, filter: ProfileFilter) -> &mut TweetList {
        match filter {
            ProfileFilter::Tweets => &mut self.tweets,
            ProfileFilter::Replies => &mut self.replies,
            ProfileFilter::Likes => &mut self.likes,
        }
    }

    /// Tweets of the selected tab, newest first.
    pub fn current(&self) -> &[Tweet] {
        self.list(self.selected).tweets()
    }

    pub async fn reconcile_likes(&mut self) -> Result<(), ServiceError> {
        let viewer = self.session.uid().to_string();
        for filter in ProfileFilter::ALL {
            let tweets = self.services.tweets.clone();
            self.list_mut(filter).reconcile_likes(&tweets, &viewer).await?;
        }
        Ok(())
    }

    /// Toggle a like in the selected tab and mirror the result into the
    /// other tabs that show the same tweet.
    pub async fn toggle_like(&mut self, tweet_id: &str) -> Result<LikeOutcome, ServiceError> {
        let selected = self.selected;
        let tweets = self.services.tweets.clone();
        let session = self.session.clone();
        let outcome = self
            .list_mut(selected)
            .toggle_like(&tweets, &session, tweet_id)
            .await?;

        for filter in ProfileFilter::ALL {
            if filter != selected {
                self.list_mut(filter).apply_outcome(tweet_id, outcome);
            }
        }
        Ok(outcome)
    }

    /// Follow or unfollow the profile's user, optimistically.
    pub async fn toggle_follow(&mut self) -> Result<(), ServiceError> {
        if self.user.is_current_user(self.session.uid()) {
            return Err(ServiceError::Invalid("cannot follow yourself".into()));
        }

        let pending = begin_follow(&mut self.user);
        let result = pending.send(&self.services.follows, &self.session).await;
        settle_follow(&mut self.user, &pending, &result);
        result
    }
}
