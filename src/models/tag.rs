//! Tag model

use serde::{Deserialize, Serialize};

/// Named label attachable to pages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}
