use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use chirp_types::Fields;
use chirp_types::events::{Child, StoreEvent};

use crate::Database;
use crate::error::StoreError;
use crate::path;
use crate::queries::BatchOutcome;

/// The hosted document store, reduced to the operations the social layer uses.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<Fields>, StoreError>;

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        Ok(self.get(path).await?.is_some())
    }

    /// Merge fields into a document, creating it if absent. `null` values
    /// remove keys.
    async fn put(&self, path: &str, fields: Fields) -> Result<(), StoreError>;

    /// Create a child with a store-generated key and return that key.
    async fn push(&self, parent: &str, fields: Fields) -> Result<String, StoreError>;

    /// Remove a document and all of its descendants.
    async fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// Direct children of `parent`, in insertion order.
    async fn children(&self, parent: &str) -> Result<Vec<Child>, StoreError>;

    /// Every document at or below `prefix` as `(path, fields)`.
    async fn scan(&self, prefix: &str) -> Result<Vec<(String, Fields)>, StoreError>;

    /// Replays existing children of `parent`, then yields new ones as they
    /// are created. Dropping the subscription cancels it.
    async fn subscribe(&self, parent: &str) -> Result<Subscription, StoreError>;

    /// Apply a batch atomically. Returns the value after each increment, in
    /// batch order. A failed precondition rejects the whole batch with
    /// [`StoreError::PreconditionFailed`].
    async fn commit(&self, batch: Batch) -> Result<Vec<i64>, StoreError>;
}

// -- Batches --

#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
    Present(String),
    Absent(String),
    /// The document exists and `field` holds `value`; `Value::Null` stands
    /// for a missing field.
    FieldEquals { path: String, field: String, value: Value },
}

impl Precondition {
    pub fn path(&self) -> &str {
        match self {
            Self::Present(path) | Self::Absent(path) | Self::FieldEquals { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Put { path: String, fields: Fields },
    Delete { path: String },
    /// Add `delta` to an integer field, flooring the result at zero.
    Increment { path: String, field: String, delta: i64 },
}

impl WriteOp {
    pub fn path(&self) -> &str {
        match self {
            Self::Put { path, .. } | Self::Delete { path } | Self::Increment { path, .. } => path,
        }
    }
}

/// Writes applied as one unit, in order, guarded by existence checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    preconditions: Vec<Precondition>,
    ops: Vec<WriteOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require_present(mut self, path: impl Into<String>) -> Self {
        self.preconditions.push(Precondition::Present(path.into()));
        self
    }

    pub fn require_absent(mut self, path: impl Into<String>) -> Self {
        self.preconditions.push(Precondition::Absent(path.into()));
        self
    }

    pub fn require_field(mut self, path: impl Into<String>, field: impl Into<String>, value: Value) -> Self {
        self.preconditions.push(Precondition::FieldEquals {
            path: path.into(),
            field: field.into(),
            value,
        });
        self
    }

    pub fn put(mut self, path: impl Into<String>, fields: Fields) -> Self {
        self.ops.push(WriteOp::Put {
            path: path.into(),
            fields,
        });
        self
    }

    pub fn delete(mut self, path: impl Into<String>) -> Self {
        self.ops.push(WriteOp::Delete { path: path.into() });
        self
    }

    pub fn increment(mut self, path: impl Into<String>, field: impl Into<String>, delta: i64) -> Self {
        self.ops.push(WriteOp::Increment {
            path: path.into(),
            field: field.into(),
            delta,
        });
        self
    }

    pub fn preconditions(&self) -> &[Precondition] {
        &self.preconditions
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn validate(&self) -> Result<(), StoreError> {
        self.preconditions
            .iter()
            .map(Precondition::path)
            .chain(self.ops.iter().map(WriteOp::path))
            .try_for_each(path::validate)
    }
}

// -- Subscriptions --

/// Child-added feed for one parent path.
pub struct Subscription {
    parent: String,
    backlog: VecDeque<Child>,
    seen: HashSet<String>,
    rx: broadcast::Receiver<StoreEvent>,
    db: Arc<Database>,
    lagged: bool,
}

impl Subscription {
    fn new(
        parent: String,
        existing: Vec<Child>,
        rx: broadcast::Receiver<StoreEvent>,
        db: Arc<Database>,
    ) -> Self {
        let seen = existing.iter().map(|child| child.key.clone()).collect();
        Self {
            parent,
            backlog: existing.into(),
            seen,
            rx,
            db,
            lagged: false,
        }
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// Next child under the parent, each key at most once. Returns `None`
    /// once the store is gone. Cancel-safe.
    pub async fn next(&mut self) -> Option<Child> {
        loop {
            if let Some(child) = self.backlog.pop_front() {
                return Some(child);
            }

            if self.lagged {
                if let Err(e) = self.resync().await {
                    warn!("Resync of {} failed, children may be missing: {}", self.parent, e);
                }
                self.lagged = false;
                continue;
            }

            match self.rx.recv().await {
                Ok(StoreEvent::ChildAdded { parent, child }) if parent == self.parent => {
                    if self.seen.insert(child.key.clone()) {
                        return Some(child);
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Subscription on {} lagged by {} events, re-reading children", self.parent, skipped);
                    self.lagged = true;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Queue every child the channel dropped, in insertion order.
    async fn resync(&mut self) -> Result<(), StoreError> {
        let db = self.db.clone();
        let parent = self.parent.clone();
        let children = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<Child>> {
            db.list_children(&parent)?
                .into_iter()
                .map(|row| row.into_child())
                .collect()
        })
        .await??;

        for child in children {
            if self.seen.insert(child.key.clone()) {
                self.backlog.push_back(child);
            }
        }
        debug!("Resynced {} ({} recovered)", self.parent, self.backlog.len());
        Ok(())
    }
}

// -- SQLite implementation --

const EVENT_CAPACITY: usize = 1024;

/// Document store over the local SQLite database. Change events fan out to
/// subscribers over a broadcast channel.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
    events: broadcast::Sender<StoreEvent>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_capacity(db, EVENT_CAPACITY)
    }

    /// `capacity` bounds the events a slow subscriber can fall behind by
    /// before it has to re-read its parent.
    pub fn with_capacity(db: Arc<Database>, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self { db, events }
    }

    /// Run a query off the async runtime.
    async fn blocking<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        let result = tokio::task::spawn_blocking(move || f(&db)).await?;
        Ok(result?)
    }

    fn publish(&self, events: impl IntoIterator<Item = StoreEvent>) {
        for event in events {
            // No receivers is fine
            let _ = self.events.send(event);
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, path: &str) -> Result<Option<Fields>, StoreError> {
        path::validate(path)?;
        let path = path.to_string();
        self.blocking(move |db| db.get_document(&path)?.map(|row| row.decode_fields()).transpose())
            .await
    }

    async fn put(&self, path: &str, fields: Fields) -> Result<(), StoreError> {
        path::validate(path)?;
        let path = path.to_string();
        let event = self.blocking(move |db| db.merge_document(&path, &fields)).await?;
        self.publish(event);
        Ok(())
    }

    async fn push(&self, parent: &str, fields: Fields) -> Result<String, StoreError> {
        path::validate(parent)?;
        let parent = parent.to_string();
        let (key, event) = self.blocking(move |db| db.insert_child(&parent, &fields)).await?;
        self.publish([event]);
        Ok(key)
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        path::validate(path)?;
        let path = path.to_string();
        let events = self.blocking(move |db| db.delete_tree(&path)).await?;
        self.publish(events);
        Ok(())
    }

    async fn children(&self, parent: &str) -> Result<Vec<Child>, StoreError> {
        path::validate(parent)?;
        let parent = parent.to_string();
        self.blocking(move |db| {
            db.list_children(&parent)?
                .into_iter()
                .map(|row| row.into_child())
                .collect()
        })
        .await
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<(String, Fields)>, StoreError> {
        path::validate(prefix)?;
        let prefix = prefix.to_string();
        self.blocking(move |db| {
            db.scan_prefix(&prefix)?
                .into_iter()
                .map(|row| {
                    let fields = row.decode_fields()?;
                    Ok((row.path, fields))
                })
                .collect()
        })
        .await
    }

    async fn subscribe(&self, parent: &str) -> Result<Subscription, StoreError> {
        // Listen before reading so nothing created in between is missed
        let rx = self.events.subscribe();
        let existing = self.children(parent).await?;
        debug!("Subscribed to {} ({} existing children)", parent, existing.len());
        Ok(Subscription::new(parent.to_string(), existing, rx, self.db.clone()))
    }

    async fn commit(&self, batch: Batch) -> Result<Vec<i64>, StoreError> {
        batch.validate()?;
        match self.blocking(move |db| db.apply_batch(&batch)).await? {
            BatchOutcome::Committed { events, counters } => {
                self.publish(events);
                Ok(counters)
            }
            BatchOutcome::Rejected(path) => Err(StoreError::PreconditionFailed(path)),
        }
    }
}
