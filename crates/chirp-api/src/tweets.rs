use chrono::Utc;
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use chirp_db::{Batch, StoreError};
use chirp_types::api::{LikeOutcome, UploadTweetConfiguration};
use chirp_types::fields::{decode_record, encode_record, single_field};
use chirp_types::events::Child;
use chirp_types::models::TweetRecord;
use chirp_types::{Fields, NotificationType, Tweet};

use crate::backend::Backend;
use crate::error::ServiceError;
use crate::gather::{gather, skip_unresolvable};
use crate::notifications::{NotificationService, after_commit};
use crate::paths;
use crate::session::Session;
use crate::users::UserService;

pub const MAX_CAPTION_LEN: usize = 280;

/// Attempts at a like toggle before giving up on a contended edge.
const LIKE_ATTEMPTS: usize = 3;

pub fn validate_caption(raw: &str) -> Result<String, ServiceError> {
    let caption = raw.trim();
    if caption.is_empty() {
        return Err(ServiceError::Invalid("caption is empty".into()));
    }
    if caption.chars().count() > MAX_CAPTION_LEN {
        return Err(ServiceError::Invalid(format!(
            "caption exceeds {} characters",
            MAX_CAPTION_LEN
        )));
    }
    Ok(caption.to_string())
}

#[derive(Clone)]
pub struct TweetService {
    backend: Backend,
    users: UserService,
    notifications: NotificationService,
}

impl TweetService {
    pub fn new(backend: Backend) -> Self {
        Self {
            users: UserService::new(backend.clone()),
            notifications: NotificationService::new(backend.clone()),
            backend,
        }
    }

    // -- Writes --

    /// Post a tweet or a reply for the signed-in user, then fan out the
    /// reply and mention notifications. Returns the new id.
    pub async fn upload_tweet(
        &self,
        session: &Session,
        caption: &str,
        config: &UploadTweetConfiguration,
    ) -> Result<String, ServiceError> {
        let caption = validate_caption(caption)?;

        let (tweet_id, conversation_id) = match config {
            UploadTweetConfiguration::Tweet => {
                let id = self.create_tweet(session, &caption).await?;
                (id.clone(), id)
            }
            UploadTweetConfiguration::Reply(parent) => {
                let id = self.create_reply(session, &caption, parent).await?;
                let sent = self
                    .notifications
                    .upload_notification(
                        session,
                        &parent.uid,
                        NotificationType::Reply,
                        Some(&parent.tweet_id),
                    )
                    .await;
                after_commit(&format!("reply {}", id), sent);
                (id, parent.tweet_id.clone())
            }
        };

        // Mentions point at something fetchable: the tweet, or for a reply
        // the tweet it answers
        let sent = self
            .notifications
            .notify_mentions(session, &caption, &conversation_id)
            .await;
        after_commit(&format!("mentions in {}", tweet_id), sent);
        Ok(tweet_id)
    }

    /// Write the record, then list it under the author. A failure on the
    /// second write surfaces as [`ServiceError::Partial`]; the repair sweep
    /// re-lists the tweet.
    pub async fn create_tweet(&self, session: &Session, caption: &str) -> Result<String, ServiceError> {
        let record = self.new_record(session, caption, None)?;
        let tweet_id = self
            .backend
            .store
            .push(paths::TWEETS, encode_record(&record))
            .await?;

        self.backend
            .store
            .put(&paths::user_tweet(session.uid(), &tweet_id), Fields::new())
            .await
            .map_err(|source| {
                error!("Tweet {} written but not indexed for {}: {}", tweet_id, session.uid(), source);
                ServiceError::Partial {
                    operation: "create_tweet",
                    record: tweet_id.clone(),
                    source,
                }
            })?;

        info!("Tweet {} posted by {}", tweet_id, session.uid());
        Ok(tweet_id)
    }

    /// Write the reply under its parent, then record it in the author's reply
    /// index. The index holds one entry per parent, pointing at the latest
    /// reply.
    pub async fn create_reply(
        &self,
        session: &Session,
        caption: &str,
        parent: &Tweet,
    ) -> Result<String, ServiceError> {
        let record = self.new_record(session, caption, Some(parent.tweet_id.clone()))?;
        let reply_id = self
            .backend
            .store
            .push(&paths::tweet_replies(&parent.tweet_id), encode_record(&record))
            .await?;

        self.backend
            .store
            .put(
                &paths::user_reply(session.uid(), &parent.tweet_id),
                single_field("replyID", reply_id.as_str()),
            )
            .await
            .map_err(|source| {
                error!("Reply {} written but not indexed for {}: {}", reply_id, session.uid(), source);
                ServiceError::Partial {
                    operation: "create_reply",
                    record: reply_id.clone(),
                    source,
                }
            })?;

        info!("Reply {} to {} posted by {}", reply_id, parent.tweet_id, session.uid());
        Ok(reply_id)
    }

    fn new_record(
        &self,
        session: &Session,
        caption: &str,
        replying_to: Option<String>,
    ) -> Result<TweetRecord, ServiceError> {
        Ok(TweetRecord {
            caption: validate_caption(caption)?,
            uid: session.uid().to_string(),
            timestamp: Utc::now().timestamp(),
            likes_count: 0,
            retweets_count: 0,
            replying_to,
        })
    }

    /// Flip the signed-in user's like on `tweet`.
    ///
    /// The counter and both edges move in one batch guarded by the current
    /// edge state, so a double tap can never count twice. If another writer
    /// flips the edge between our read and our commit, the batch is rejected
    /// and we re-read and retry.
    pub async fn like_tweet(&self, session: &Session, tweet: &Tweet) -> Result<LikeOutcome, ServiceError> {
        let uid = session.uid();
        let owner = paths::user_like(uid, &tweet.tweet_id);
        let reverse = paths::tweet_like(&tweet.tweet_id, uid);
        let record = paths::tweet_record(&tweet.tweet_id, tweet.replying_to.as_deref());
        let edge_fields = match &tweet.replying_to {
            Some(parent_id) => single_field("replyingTo", parent_id.as_str()),
            None => Fields::new(),
        };

        for attempt in 1..=LIKE_ATTEMPTS {
            let liked = self.backend.store.exists(&owner).await?;
            let batch = if liked {
                Batch::new()
                    .require_present(&record)
                    .require_present(&owner)
                    .increment(&record, "likesCount", -1)
                    .delete(&owner)
                    .delete(&reverse)
            } else {
                Batch::new()
                    .require_present(&record)
                    .require_absent(&owner)
                    .increment(&record, "likesCount", 1)
                    .put(&owner, edge_fields.clone())
                    .put(&reverse, edge_fields.clone())
            };

            match self.backend.store.commit(batch).await {
                Ok(counters) => {
                    let likes_count = counters
                        .first()
                        .map(|count| u32::try_from(*count).unwrap_or(0))
                        .unwrap_or(0);
                    let outcome = LikeOutcome {
                        liked: !liked,
                        likes_count,
                    };
                    debug!("{} like on {} -> {:?}", uid, tweet.tweet_id, outcome);

                    if outcome.liked {
                        let sent = self
                            .notifications
                            .upload_notification(
                                session,
                                &tweet.uid,
                                NotificationType::Like,
                                Some(&tweet.tweet_id),
                            )
                            .await;
                        after_commit(&format!("like on {}", tweet.tweet_id), sent);
                    }
                    return Ok(outcome);
                }
                Err(StoreError::PreconditionFailed(path)) if path == record => {
                    return Err(ServiceError::not_found("tweet", &tweet.tweet_id));
                }
                Err(StoreError::PreconditionFailed(_)) => {
                    debug!(
                        "Like edge {} changed underneath (attempt {}/{})",
                        owner, attempt, LIKE_ATTEMPTS
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!("Giving up on like toggle for {}", owner);
        Err(ServiceError::Conflict(owner))
    }

    pub async fn check_if_user_liked_tweet(
        &self,
        viewer_uid: &str,
        tweet_id: &str,
    ) -> Result<bool, ServiceError> {
        Ok(self
            .backend
            .store
            .exists(&paths::user_like(viewer_uid, tweet_id))
            .await?)
    }

    // -- Reads --

    /// Every top-level tweet, existing ones first, then new ones as they are
    /// posted. Authors are looked up concurrently and each tweet is yielded
    /// as soon as its own author resolves, so arrival order can differ from
    /// posting order. Undecodable tweets and tweets whose author is gone are
    /// skipped. Dropping the stream ends the subscription.
    pub fn fetch_tweets(&self) -> impl Stream<Item = Result<Tweet, ServiceError>> + Send + 'static {
        let service = self.clone();
        async_stream::stream! {
            let mut subscription = match service.backend.store.subscribe(paths::TWEETS).await {
                Ok(subscription) => subscription,
                Err(e) => {
                    yield Err(ServiceError::from(e));
                    return;
                }
            };

            let mut pending: FuturesUnordered<Resolving> = FuturesUnordered::new();
            let mut open = true;
            loop {
                let (key, result) = tokio::select! {
                    child = subscription.next(), if open => {
                        match child {
                            Some(child) => pending.push(resolve_child(service.clone(), child).boxed()),
                            None => open = false,
                        }
                        continue;
                    }
                    Some(resolved) = pending.next(), if !pending.is_empty() => resolved,
                    else => break,
                };

                match skip_unresolvable(&format!("tweet {}", key), result) {
                    Ok(Some(tweet)) => yield Ok(tweet),
                    Ok(None) => {}
                    Err(e) => yield Err(e),
                }
            }
            debug!("Tweet subscription closed");
        }
    }

    pub async fn fetch_tweet(&self, tweet_id: &str) -> Result<Tweet, ServiceError> {
        self.fetch_at(&paths::tweet(tweet_id), tweet_id).await
    }

    /// Tweets listed under the user, in index order.
    pub async fn fetch_tweets_for_user(&self, uid: &str) -> Result<Vec<Tweet>, ServiceError> {
        let index = self.backend.store.children(&paths::user_tweets(uid)).await?;
        gather(index.into_iter().map(|entry| async move {
            let context = format!("tweet {} listed for {}", entry.key, uid);
            skip_unresolvable(&context, self.fetch_tweet(&entry.key).await)
        }))
        .await
    }

    /// The latest reply the user left under each tweet they replied to.
    pub async fn fetch_replies_for_user(&self, uid: &str) -> Result<Vec<Tweet>, ServiceError> {
        let index = self.backend.store.children(&paths::user_replies(uid)).await?;
        gather(index.into_iter().map(|entry| async move {
            let Some(reply_id) = entry.fields.get("replyID").and_then(Value::as_str) else {
                warn!("Reply index {}/{} has no replyID", uid, entry.key);
                return Ok(None);
            };
            let context = format!("reply {} listed for {}", reply_id, uid);
            let path = paths::tweet_reply(&entry.key, reply_id);
            skip_unresolvable(&context, self.fetch_at(&path, reply_id).await)
        }))
        .await
    }

    pub async fn fetch_replies(&self, tweet_id: &str) -> Result<Vec<Tweet>, ServiceError> {
        let children = self.backend.store.children(&paths::tweet_replies(tweet_id)).await?;
        gather(children.into_iter().map(|child| async move {
            let context = format!("reply {} to {}", child.key, tweet_id);
            skip_unresolvable(&context, self.resolve(&child.key, &child.fields).await)
        }))
        .await
    }

    /// Tweets and replies the user has liked. Like edges on replies carry
    /// the parent id so the record can be found.
    pub async fn fetch_likes(&self, uid: &str) -> Result<Vec<Tweet>, ServiceError> {
        let index = self.backend.store.children(&paths::user_likes(uid)).await?;
        gather(index.into_iter().map(|entry| async move {
            let replying_to = entry.fields.get("replyingTo").and_then(Value::as_str);
            let context = format!("tweet {} liked by {}", entry.key, uid);
            let path = paths::tweet_record(&entry.key, replying_to);
            skip_unresolvable(&context, self.fetch_at(&path, &entry.key).await)
        }))
        .await
    }

    async fn fetch_at(&self, path: &str, tweet_id: &str) -> Result<Tweet, ServiceError> {
        let fields = self
            .backend
            .store
            .get(path)
            .await?
            .ok_or_else(|| ServiceError::not_found("tweet", tweet_id))?;
        self.resolve(tweet_id, &fields).await
    }

    /// Decode a stored tweet and join its author.
    async fn resolve(&self, tweet_id: &str, fields: &Fields) -> Result<Tweet, ServiceError> {
        let record: TweetRecord = decode_record("tweet", tweet_id, fields)?;
        let user = self.users.fetch_user(&record.uid).await?;
        Ok(Tweet::from_record(tweet_id, record, user)?)
    }
}

type Resolving = BoxFuture<'static, (String, Result<Tweet, ServiceError>)>;

async fn resolve_child(service: TweetService, child: Child) -> (String, Result<Tweet, ServiceError>) {
    let result = service.resolve(&child.key, &child.fields).await;
    (child.key, result)
}
