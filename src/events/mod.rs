//! Domain event notifications
//!
//! The save workflow reports its lifecycle through an injected
//! [`PageEventSink`] rather than a global dispatcher, so hosts can wire
//! their own listeners and tests can use doubles.
//!
//! One notification is cancellable: `on_page_properties_changing` fires
//! before anything is written and may veto the whole save. The remaining
//! notifications fire after commit and are fire-and-forget: a failing
//! listener is logged by the caller, never turned into a save failure.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::debug;

use crate::models::{Page, Redirect, SitemapNode, Tag};

/// Outcome of the cancellable pre-save notification
#[derive(Debug, Clone, Default)]
pub struct ChangeDecision {
    pub cancel: bool,
    pub messages: Vec<String>,
}

impl ChangeDecision {
    /// Let the save proceed
    pub fn proceed() -> Self {
        Self::default()
    }

    /// Veto the save with a user-facing message
    pub fn cancel(message: impl Into<String>) -> Self {
        Self {
            cancel: true,
            messages: vec![message.into()],
        }
    }
}

/// Receiver for page lifecycle notifications
pub trait PageEventSink: Send + Sync {
    /// Fired before any write; returning a cancelling decision aborts the
    /// save with the accumulated messages.
    fn on_page_properties_changing(&self, before: &Page, after: &Page) -> ChangeDecision {
        let _ = (before, after);
        ChangeDecision::proceed()
    }

    fn on_page_properties_changed(&self, page: &Page) -> anyhow::Result<()> {
        let _ = page;
        Ok(())
    }

    fn on_redirect_created(&self, redirect: &Redirect) -> anyhow::Result<()> {
        let _ = redirect;
        Ok(())
    }

    fn on_page_seo_status_changed(&self, page: &Page) -> anyhow::Result<()> {
        let _ = page;
        Ok(())
    }

    fn on_tags_created(&self, tags: &[Tag]) -> anyhow::Result<()> {
        let _ = tags;
        Ok(())
    }

    fn on_sitemap_node_updated(&self, node: &SitemapNode) -> anyhow::Result<()> {
        let _ = node;
        Ok(())
    }

    fn on_sitemap_updated(&self, sitemap_id: i64) -> anyhow::Result<()> {
        let _ = sitemap_id;
        Ok(())
    }
}

/// Sink that ignores every notification
pub struct NullEventSink;

impl PageEventSink for NullEventSink {}

/// Event names used by [`HookEventSink`]
pub mod event_names {
    pub const PAGE_PROPERTIES_CHANGED: &str = "page_properties_changed";
    pub const REDIRECT_CREATED: &str = "redirect_created";
    pub const PAGE_SEO_STATUS_CHANGED: &str = "page_seo_status_changed";
    pub const TAGS_CREATED: &str = "tags_created";
    pub const SITEMAP_NODE_UPDATED: &str = "sitemap_node_updated";
    pub const SITEMAP_UPDATED: &str = "sitemap_updated";
}

/// Hook priority (lower = earlier)
pub const PRIORITY_EARLY: i32 = -100;
pub const PRIORITY_DEFAULT: i32 = 0;
pub const PRIORITY_LATE: i32 = 100;

/// Hook callback receiving the event payload
pub type HookCallback = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

/// Veto callback receiving before/after page snapshots; returning a message
/// cancels the save.
pub type VetoCallback = Arc<dyn Fn(&Value, &Value) -> Option<String> + Send + Sync>;

struct HookHandler {
    callback: HookCallback,
    priority: i32,
}

struct VetoHandler {
    callback: VetoCallback,
    priority: i32,
}

/// Sink that forwards typed events to named hooks carrying JSON payloads.
///
/// Handlers run in priority order; every registered veto handler is
/// consulted so cancellation messages accumulate.
#[derive(Default)]
pub struct HookEventSink {
    hooks: RwLock<HashMap<String, Vec<HookHandler>>>,
    vetoes: RwLock<Vec<VetoHandler>>,
}

impl HookEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a named event
    pub fn register<F>(&self, name: &str, callback: F, priority: i32)
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut hooks = self.hooks.write().unwrap();
        let handlers = hooks.entry(name.to_string()).or_default();
        handlers.push(HookHandler {
            callback: Arc::new(callback),
            priority,
        });
        handlers.sort_by_key(|h| h.priority);
        debug!("Registered hook handler for '{}' with priority {}", name, priority);
    }

    /// Register a veto handler for the pre-save notification
    pub fn register_veto<F>(&self, callback: F, priority: i32)
    where
        F: Fn(&Value, &Value) -> Option<String> + Send + Sync + 'static,
    {
        let mut vetoes = self.vetoes.write().unwrap();
        vetoes.push(VetoHandler {
            callback: Arc::new(callback),
            priority,
        });
        vetoes.sort_by_key(|h| h.priority);
    }

    fn trigger(&self, name: &str, payload: Value) -> anyhow::Result<()> {
        let hooks = self.hooks.read().unwrap();
        if let Some(handlers) = hooks.get(name) {
            for handler in handlers {
                (handler.callback)(&payload)?;
            }
        }
        Ok(())
    }
}

impl PageEventSink for HookEventSink {
    fn on_page_properties_changing(&self, before: &Page, after: &Page) -> ChangeDecision {
        let before = serde_json::to_value(before).unwrap_or(Value::Null);
        let after = serde_json::to_value(after).unwrap_or(Value::Null);

        let mut decision = ChangeDecision::proceed();
        let vetoes = self.vetoes.read().unwrap();
        for handler in vetoes.iter() {
            if let Some(message) = (handler.callback)(&before, &after) {
                decision.cancel = true;
                decision.messages.push(message);
            }
        }
        decision
    }

    fn on_page_properties_changed(&self, page: &Page) -> anyhow::Result<()> {
        self.trigger(
            event_names::PAGE_PROPERTIES_CHANGED,
            serde_json::to_value(page)?,
        )
    }

    fn on_redirect_created(&self, redirect: &Redirect) -> anyhow::Result<()> {
        self.trigger(event_names::REDIRECT_CREATED, serde_json::to_value(redirect)?)
    }

    fn on_page_seo_status_changed(&self, page: &Page) -> anyhow::Result<()> {
        self.trigger(
            event_names::PAGE_SEO_STATUS_CHANGED,
            serde_json::to_value(page)?,
        )
    }

    fn on_tags_created(&self, tags: &[Tag]) -> anyhow::Result<()> {
        self.trigger(event_names::TAGS_CREATED, serde_json::to_value(tags)?)
    }

    fn on_sitemap_node_updated(&self, node: &SitemapNode) -> anyhow::Result<()> {
        self.trigger(event_names::SITEMAP_NODE_UPDATED, serde_json::to_value(node)?)
    }

    fn on_sitemap_updated(&self, sitemap_id: i64) -> anyhow::Result<()> {
        self.trigger(
            event_names::SITEMAP_UPDATED,
            serde_json::json!({ "sitemap_id": sitemap_id }),
        )
    }
}

/// Test double recording every notification it receives.
#[cfg(test)]
pub struct RecordingEventSink {
    pub decision: std::sync::Mutex<ChangeDecision>,
    pub changing: std::sync::Mutex<Vec<(Page, Page)>>,
    pub changed: std::sync::Mutex<Vec<Page>>,
    pub redirects: std::sync::Mutex<Vec<Redirect>>,
    pub seo_changes: std::sync::Mutex<Vec<Page>>,
    pub created_tags: std::sync::Mutex<Vec<Vec<Tag>>>,
    pub updated_nodes: std::sync::Mutex<Vec<SitemapNode>>,
    pub updated_sitemaps: std::sync::Mutex<Vec<i64>>,
}

#[cfg(test)]
impl RecordingEventSink {
    pub fn new() -> Self {
        Self {
            decision: std::sync::Mutex::new(ChangeDecision::proceed()),
            changing: std::sync::Mutex::new(Vec::new()),
            changed: std::sync::Mutex::new(Vec::new()),
            redirects: std::sync::Mutex::new(Vec::new()),
            seo_changes: std::sync::Mutex::new(Vec::new()),
            created_tags: std::sync::Mutex::new(Vec::new()),
            updated_nodes: std::sync::Mutex::new(Vec::new()),
            updated_sitemaps: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn vetoing(message: &str) -> Self {
        let sink = Self::new();
        *sink.decision.lock().unwrap() = ChangeDecision::cancel(message);
        sink
    }
}

#[cfg(test)]
impl PageEventSink for RecordingEventSink {
    fn on_page_properties_changing(&self, before: &Page, after: &Page) -> ChangeDecision {
        self.changing
            .lock()
            .unwrap()
            .push((before.clone(), after.clone()));
        self.decision.lock().unwrap().clone()
    }

    fn on_page_properties_changed(&self, page: &Page) -> anyhow::Result<()> {
        self.changed.lock().unwrap().push(page.clone());
        Ok(())
    }

    fn on_redirect_created(&self, redirect: &Redirect) -> anyhow::Result<()> {
        self.redirects.lock().unwrap().push(redirect.clone());
        Ok(())
    }

    fn on_page_seo_status_changed(&self, page: &Page) -> anyhow::Result<()> {
        self.seo_changes.lock().unwrap().push(page.clone());
        Ok(())
    }

    fn on_tags_created(&self, tags: &[Tag]) -> anyhow::Result<()> {
        self.created_tags.lock().unwrap().push(tags.to_vec());
        Ok(())
    }

    fn on_sitemap_node_updated(&self, node: &SitemapNode) -> anyhow::Result<()> {
        self.updated_nodes.lock().unwrap().push(node.clone());
        Ok(())
    }

    fn on_sitemap_updated(&self, sitemap_id: i64) -> anyhow::Result<()> {
        self.updated_sitemaps.lock().unwrap().push(sitemap_id);
        Ok(())
    }
}
