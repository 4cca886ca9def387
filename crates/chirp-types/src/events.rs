use serde::{Deserialize, Serialize};

use crate::fields::Fields;

/// One child document: its key under the parent and its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Child {
    pub key: String,
    pub fields: Fields,
}

/// Change notifications emitted by the document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StoreEvent {
    /// A document was created under `parent`
    ChildAdded { parent: String, child: Child },

    /// A document under `parent` was deleted
    ChildRemoved { parent: String, key: String },
}

impl StoreEvent {
    pub fn parent(&self) -> &str {
        match self {
            Self::ChildAdded { parent, .. } => parent,
            Self::ChildRemoved { parent, .. } => parent,
        }
    }
}
