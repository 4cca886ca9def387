//! Database row types. These map directly to SQLite rows.
//! Typed entities live in chirp-types; the store only sees JSON payloads.

use anyhow::Result;
use chirp_types::Fields;
use chirp_types::events::Child;

pub struct DocumentRow {
    pub seq: i64,
    pub path: String,
    pub parent: String,
    pub key: String,
    pub fields: String,
    pub updated_at: String,
}

impl DocumentRow {
    pub fn decode_fields(&self) -> Result<Fields> {
        Ok(serde_json::from_str(&self.fields)?)
    }

    pub fn into_child(self) -> Result<Child> {
        let fields = self.decode_fields()?;
        Ok(Child {
            key: self.key,
            fields,
        })
    }
}

pub struct AccountRow {
    pub uid: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}
