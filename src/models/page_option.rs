//! Page option models

use serde::{Deserialize, Serialize};

/// Page-level key-value option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageOption {
    pub id: i64,
    pub page_id: i64,
    pub key: String,
    pub value: String,
}

impl PageOption {
    pub fn new(page_id: i64, key: String, value: String) -> Self {
        Self {
            id: 0,
            page_id,
            key,
            value,
        }
    }
}

/// Submitted option value
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OptionValueInput {
    pub key: String,
    pub value: String,
}
