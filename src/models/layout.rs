//! Layout model for reusable page templates

use serde::{Deserialize, Serialize};

/// Layout template a page can be rendered with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layout {
    pub id: i64,
    pub name: String,
    pub layout_path: String,
}

impl Layout {
    pub fn new(name: String, layout_path: String) -> Self {
        Self {
            id: 0,
            name,
            layout_path,
        }
    }
}

/// Default option value declared by a layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutOption {
    pub id: i64,
    pub layout_id: i64,
    pub key: String,
    pub default_value: String,
}
