use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use chirp_db::{Batch, StoreError};
use chirp_types::Fields;
use chirp_types::fields::{decode_record, single_field};
use chirp_types::models::TweetRecord;

use crate::backend::Backend;
use crate::error::ServiceError;
use crate::paths;

/// What one sweep changed. `skipped` counts repairs abandoned because the
/// data moved while the sweep was looking at it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub like_edges_restored: usize,
    pub like_edges_dropped: usize,
    pub follow_edges_restored: usize,
    pub follow_edges_dropped: usize,
    pub tweets_relisted: usize,
    pub counters_corrected: usize,
    pub skipped: usize,
}

impl RepairReport {
    /// Number of changes written; skips are not counted.
    pub fn total(&self) -> usize {
        self.like_edges_restored
            + self.like_edges_dropped
            + self.follow_edges_restored
            + self.follow_edges_dropped
            + self.tweets_relisted
            + self.counters_corrected
    }
}

/// Edge pairs keyed by `(actor, subject)`, with the payload of each half.
type EdgeHalves = HashMap<(String, String), Fields>;

fn collect_edges(docs: Vec<(String, Fields)>, root: &str, actor_first: bool) -> EdgeHalves {
    docs.into_iter()
        .filter_map(|(path, fields)| {
            let (first, second) = paths::edge_segments(&path, root)?;
            let key = if actor_first {
                (first.to_string(), second.to_string())
            } else {
                (second.to_string(), first.to_string())
            };
            Some((key, fields))
        })
        .collect()
}

fn union_keys(a: &EdgeHalves, b: &EdgeHalves) -> Vec<(String, String)> {
    let keys: HashSet<&(String, String)> = a.keys().chain(b.keys()).collect();
    let mut keys: Vec<(String, String)> = keys.into_iter().cloned().collect();
    keys.sort();
    keys
}

/// Brings the denormalized indexes back in line with the records they
/// describe: half-written edge pairs, tweets missing from their author's
/// list, and like counters that drifted from the like edges.
#[derive(Clone)]
pub struct EdgeRepair {
    backend: Backend,
}

impl EdgeRepair {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub async fn sweep(&self) -> Result<RepairReport, ServiceError> {
        let mut report = RepairReport::default();
        self.repair_likes(&mut report).await?;
        self.repair_follows(&mut report).await?;
        self.relist_tweets(&mut report).await?;
        self.correct_like_counters(&mut report).await?;
        debug!("Repair sweep finished: {:?}", report);
        Ok(report)
    }

    /// Commit one repair. Every repair batch is guarded by the state the
    /// sweep observed, so a concurrent writer wins and the repair is skipped.
    async fn apply(&self, batch: Batch, report: &mut RepairReport) -> Result<bool, ServiceError> {
        match self.backend.store.commit(batch).await {
            Ok(_) => Ok(true),
            Err(StoreError::PreconditionFailed(path)) => {
                debug!("{} changed during the sweep, leaving it", path);
                report.skipped += 1;
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Complete like pairs missing a half; drop pairs whose tweet is gone.
    async fn repair_likes(&self, report: &mut RepairReport) -> Result<(), ServiceError> {
        let store = &self.backend.store;
        let owners = collect_edges(store.scan(paths::USER_LIKES).await?, paths::USER_LIKES, true);
        let reverses = collect_edges(store.scan(paths::TWEET_LIKES).await?, paths::TWEET_LIKES, false);

        for key in union_keys(&owners, &reverses) {
            let (uid, tweet_id) = (&key.0, &key.1);
            let owner_path = paths::user_like(uid, tweet_id);
            let reverse_path = paths::tweet_like(tweet_id, uid);
            let owner = owners.get(&key);
            let reverse = reverses.get(&key);
            let fields = owner.or(reverse).cloned().unwrap_or_default();
            let replying_to = fields.get("replyingTo").and_then(Value::as_str);

            let record = paths::tweet_record(tweet_id, replying_to);
            if !store.exists(&record).await? {
                let batch = Batch::new()
                    .require_absent(&record)
                    .delete(&owner_path)
                    .delete(&reverse_path);
                if self.apply(batch, report).await? {
                    debug!("Dropped like edges {} -> missing tweet {}", uid, tweet_id);
                    report.like_edges_dropped += 1;
                }
                continue;
            }

            let (seen, missing) = match (owner, reverse) {
                (Some(_), None) => (owner_path, reverse_path),
                (None, Some(_)) => (reverse_path, owner_path),
                _ => continue,
            };
            let batch = Batch::new()
                .require_present(&seen)
                .require_absent(&missing)
                .put(&missing, fields.clone());
            if self.apply(batch, report).await? {
                debug!("Restored like edge {}", missing);
                report.like_edges_restored += 1;
            }
        }
        Ok(())
    }

    /// Complete follow pairs missing a half; drop pairs naming a missing user.
    async fn repair_follows(&self, report: &mut RepairReport) -> Result<(), ServiceError> {
        let store = &self.backend.store;
        let following = collect_edges(store.scan(paths::USER_FOLLOWING).await?, paths::USER_FOLLOWING, true);
        let followers = collect_edges(store.scan(paths::USER_FOLLOWERS).await?, paths::USER_FOLLOWERS, false);

        for key in union_keys(&following, &followers) {
            let (uid, target_uid) = (&key.0, &key.1);
            let following_path = paths::following_edge(uid, target_uid);
            let follower_path = paths::follower_edge(target_uid, uid);
            let follower_user = paths::user(uid);
            let target_user = paths::user(target_uid);
            let (follower_exists, target_exists) = tokio::try_join!(
                store.exists(&follower_user),
                store.exists(&target_user),
            )?;

            if !follower_exists || !target_exists {
                let batch = Batch::new().delete(&following_path).delete(&follower_path);
                if self.apply(batch, report).await? {
                    debug!("Dropped follow edges {} -> {}", uid, target_uid);
                    report.follow_edges_dropped += 1;
                }
                continue;
            }

            let (seen, missing) = match (following.contains_key(&key), followers.contains_key(&key)) {
                (true, false) => (following_path, follower_path),
                (false, true) => (follower_path, following_path),
                _ => continue,
            };
            let batch = Batch::new()
                .require_present(&seen)
                .require_absent(&missing)
                .put(&missing, Fields::new());
            if self.apply(batch, report).await? {
                debug!("Restored follow edge {}", missing);
                report.follow_edges_restored += 1;
            }
        }
        Ok(())
    }

    /// List tweets whose author index entry never got written.
    async fn relist_tweets(&self, report: &mut RepairReport) -> Result<(), ServiceError> {
        let store = &self.backend.store;
        for child in store.children(paths::TWEETS).await? {
            let record: TweetRecord = match decode_record("tweet", &child.key, &child.fields) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Repair skipping {}", e);
                    continue;
                }
            };

            let listing = paths::user_tweet(&record.uid, &child.key);
            if store.exists(&listing).await? {
                continue;
            }
            let batch = Batch::new()
                .require_present(paths::tweet(&child.key))
                .require_absent(&listing)
                .put(&listing, Fields::new());
            if self.apply(batch, report).await? {
                debug!("Re-listed tweet {} for {}", child.key, record.uid);
                report.tweets_relisted += 1;
            }
        }
        Ok(())
    }

    /// Reset `likesCount` on every tweet and reply to its like-edge count.
    /// The counter is read before the edges are counted and the reset is
    /// guarded on it: every toggle moves the counter, so a toggle landing
    /// in between rejects the reset.
    async fn correct_like_counters(&self, report: &mut RepairReport) -> Result<(), ServiceError> {
        let store = &self.backend.store;
        let (tweets, replies) = tokio::try_join!(
            store.children(paths::TWEETS),
            store.scan(paths::TWEET_REPLIES),
        )?;

        let mut records: Vec<(String, String)> = tweets
            .into_iter()
            .map(|child| (paths::tweet(&child.key), child.key))
            .collect();
        records.extend(replies.into_iter().filter_map(|(path, _)| {
            let (_, reply_id) = paths::edge_segments(&path, paths::TWEET_REPLIES)?;
            let reply_id = reply_id.to_string();
            Some((path, reply_id))
        }));

        for (path, tweet_id) in records {
            let Some(fields) = store.get(&path).await? else {
                continue;
            };
            let seen = fields.get("likesCount").cloned().unwrap_or(Value::Null);
            let stored = seen.as_i64().unwrap_or(0);
            let actual = store.children(&paths::tweet_likes(&tweet_id)).await?.len() as i64;
            if stored == actual {
                continue;
            }

            let batch = Batch::new()
                .require_field(&path, "likesCount", seen)
                .put(&path, single_field("likesCount", actual));
            if self.apply(batch, report).await? {
                debug!("Like counter on {} corrected {} -> {}", tweet_id, stored, actual);
                report.counters_corrected += 1;
            }
        }
        Ok(())
    }
}

/// Background task that sweeps on an interval until the process exits.
pub async fn run_repair_loop(repair: EdgeRepair, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    loop {
        interval.tick().await;

        match repair.sweep().await {
            Ok(report) => {
                if report.total() > 0 {
                    info!("Repair: {:?}", report);
                }
            }
            Err(e) => {
                warn!("Repair error: {}", e);
            }
        }
    }
}
