//! Redirect model

use serde::{Deserialize, Serialize};

/// Permanent redirect from an old page URL to its current one.
/// Rows are append-only; a save creates at most one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub id: i64,
    pub page_url: String,
    pub redirect_url: String,
}

impl Redirect {
    pub fn new(page_url: String, redirect_url: String) -> Self {
        Self {
            id: 0,
            page_url,
            redirect_url,
        }
    }
}
