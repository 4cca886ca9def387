use crate::models::{AccountRow, DocumentRow};
use crate::path;
use crate::store::{Batch, Precondition, WriteOp};
use crate::Database;
use anyhow::{Result, anyhow};
use chirp_types::Fields;
use chirp_types::events::{Child, StoreEvent};
use rusqlite::Connection;
use serde_json::Value;
use uuid::Uuid;

/// Result of applying a [`Batch`].
pub enum BatchOutcome {
    /// Everything was written. `counters` holds the value after each
    /// increment, in batch order.
    Committed {
        events: Vec<StoreEvent>,
        counters: Vec<i64>,
    },
    /// A precondition did not hold; nothing was written.
    Rejected(String),
}

impl Database {
    // -- Documents --

    pub fn get_document(&self, path: &str) -> Result<Option<DocumentRow>> {
        self.with_conn(|conn| query_document(conn, path))
    }

    /// Merge `fields` into the document at `path`, creating it if needed.
    /// Returns the creation event when the document did not exist before.
    pub fn merge_document(&self, path: &str, fields: &Fields) -> Result<Option<StoreEvent>> {
        self.with_conn_mut(|conn| merge_in(conn, path, fields))
    }

    /// Create a child under `parent` with a generated key.
    pub fn insert_child(&self, parent: &str, fields: &Fields) -> Result<(String, StoreEvent)> {
        let key = Uuid::new_v4().simple().to_string();
        let child_path = path::join(parent, &key);

        self.with_conn_mut(|conn| {
            let event = merge_in(conn, &child_path, fields)?
                .ok_or_else(|| anyhow!("generated key collided: {}", child_path))?;
            Ok((key, event))
        })
    }

    /// Delete a document and everything below it.
    pub fn delete_tree(&self, path: &str) -> Result<Vec<StoreEvent>> {
        self.with_conn_mut(|conn| delete_in(conn, path))
    }

    pub fn list_children(&self, parent: &str) -> Result<Vec<DocumentRow>> {
        self.with_conn(|conn| query_children(conn, parent))
    }

    /// Every document at or below `prefix`, in insertion order.
    pub fn scan_prefix(&self, prefix: &str) -> Result<Vec<DocumentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, path, parent, key, fields, updated_at FROM documents
                 WHERE path = ?1 OR substr(path, 1, length(?1) + 1) = ?1 || '/'
                 ORDER BY seq",
            )?;

            let rows = stmt
                .query_map([prefix], map_document)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Apply a batch in one transaction. Preconditions are checked first;
    /// any failure rolls the whole batch back.
    pub fn apply_batch(&self, batch: &Batch) -> Result<BatchOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            for precondition in batch.preconditions() {
                let existing = query_document(&tx, precondition.path())?;
                let holds = match precondition {
                    Precondition::Present(_) => existing.is_some(),
                    Precondition::Absent(_) => existing.is_none(),
                    Precondition::FieldEquals { field, value, .. } => match existing {
                        Some(row) => row.decode_fields()?.get(field).unwrap_or(&Value::Null) == value,
                        None => false,
                    },
                };
                if !holds {
                    return Ok(BatchOutcome::Rejected(precondition.path().to_string()));
                }
            }

            let mut events = Vec::new();
            let mut counters = Vec::new();
            for op in batch.ops() {
                match op {
                    WriteOp::Put { path, fields } => events.extend(merge_in(&tx, path, fields)?),
                    WriteOp::Delete { path } => events.extend(delete_in(&tx, path)?),
                    WriteOp::Increment { path, field, delta } => {
                        counters.push(increment_in(&tx, path, field, *delta)?)
                    }
                }
            }

            tx.commit()?;
            Ok(BatchOutcome::Committed { events, counters })
        })
    }

    // -- Accounts --

    pub fn insert_account(&self, uid: &str, email: &str, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO accounts (uid, email, password) VALUES (?1, ?2, ?3)",
                (uid, email, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_account_by_email(&self, email: &str) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT uid, email, password, created_at FROM accounts WHERE email = ?1",
            )?;

            let row = stmt
                .query_row([email], |row| {
                    Ok(AccountRow {
                        uid: row.get(0)?,
                        email: row.get(1)?,
                        password: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })
                .optional()?;

            Ok(row)
        })
    }
}

fn map_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        seq: row.get(0)?,
        path: row.get(1)?,
        parent: row.get(2)?,
        key: row.get(3)?,
        fields: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn query_document(conn: &Connection, path: &str) -> Result<Option<DocumentRow>> {
    let mut stmt = conn.prepare(
        "SELECT seq, path, parent, key, fields, updated_at FROM documents WHERE path = ?1",
    )?;

    let row = stmt.query_row([path], map_document).optional()?;

    Ok(row)
}

fn query_children(conn: &Connection, parent: &str) -> Result<Vec<DocumentRow>> {
    let mut stmt = conn.prepare(
        "SELECT seq, path, parent, key, fields, updated_at FROM documents
         WHERE parent = ?1
         ORDER BY seq",
    )?;

    let rows = stmt
        .query_map([parent], map_document)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Merge semantics: incoming keys overwrite, `null` removes a key.
fn merge_in(conn: &Connection, path: &str, fields: &Fields) -> Result<Option<StoreEvent>> {
    let (parent, key) = path::split(path)?;

    let existing = query_document(conn, path)?;
    let created = existing.is_none();
    let mut merged = match existing {
        Some(row) => row.decode_fields()?,
        None => Fields::new(),
    };
    for (name, value) in fields {
        if value.is_null() {
            merged.remove(name);
        } else {
            merged.insert(name.clone(), value.clone());
        }
    }

    conn.execute(
        "INSERT INTO documents (path, parent, key, fields) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(path) DO UPDATE SET fields = excluded.fields, updated_at = datetime('now')",
        rusqlite::params![path, parent, key, serde_json::to_string(&merged)?],
    )?;

    Ok(created.then(|| StoreEvent::ChildAdded {
        parent: parent.to_string(),
        child: Child {
            key: key.to_string(),
            fields: merged,
        },
    }))
}

fn delete_in(conn: &Connection, path: &str) -> Result<Vec<StoreEvent>> {
    path::validate(path)?;

    let mut stmt = conn.prepare(
        "SELECT parent, key FROM documents
         WHERE path = ?1 OR substr(path, 1, length(?1) + 1) = ?1 || '/'
         ORDER BY seq",
    )?;
    let removed = stmt
        .query_map([path], |row| {
            Ok(StoreEvent::ChildRemoved {
                parent: row.get(0)?,
                key: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    conn.execute(
        "DELETE FROM documents WHERE path = ?1 OR substr(path, 1, length(?1) + 1) = ?1 || '/'",
        [path],
    )?;

    Ok(removed)
}

/// Counters never go below zero.
fn increment_in(conn: &Connection, path: &str, field: &str, delta: i64) -> Result<i64> {
    let row = query_document(conn, path)?
        .ok_or_else(|| anyhow!("cannot increment '{}' on missing document {}", field, path))?;

    let mut fields = row.decode_fields()?;
    let current = fields.get(field).and_then(Value::as_i64).unwrap_or(0);
    let next = (current + delta).max(0);
    fields.insert(field.to_string(), Value::from(next));

    conn.execute(
        "UPDATE documents SET fields = ?2, updated_at = datetime('now') WHERE path = ?1",
        rusqlite::params![path, serde_json::to_string(&fields)?],
    )?;

    Ok(next)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
