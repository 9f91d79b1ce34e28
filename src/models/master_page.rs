//! Master page lineage model

use serde::{Deserialize, Serialize};

/// A single link in a page's master page lineage.
///
/// A page using master page M gets one row per ancestor in M's chain: its
/// master, its master's master, and so on. The full set of rows for a page
/// is its flattened ancestor chain, which keeps descendant queries free of
/// recursive traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterPage {
    pub id: i64,
    /// The page inheriting layout and regions
    pub page_id: i64,
    /// One ancestor in that page's master chain
    pub master_id: i64,
}

impl MasterPage {
    pub fn new(page_id: i64, master_id: i64) -> Self {
        Self {
            id: 0,
            page_id,
            master_id,
        }
    }
}
