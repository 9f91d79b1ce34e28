//! Page properties save workflow
//!
//! The one operation that touches the whole page graph: identity fields,
//! layout or master page assignment (with lineage propagation to every
//! descendant), URL changes with redirect creation and sitemap rewriting,
//! publication state, SEO settings, option values, access rules and tags.
//!
//! The workflow runs in three phases:
//! 1. validate, load and authorize; compute every change as data
//!    (lineage delta, sitemap nodes, tag plan, option diff) — reads only;
//! 2. ask listeners for a veto, then apply all writes inside a single
//!    transaction guarded by the optimistic version token;
//! 3. after commit, emit the change notifications.
//!
//! A veto or any error before commit leaves the database untouched.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::SecurityConfig;
use crate::db::repositories::{
    AccessRuleRepository, LayoutRepository, PageRepository, SqlxAccessRuleRepository,
    SqlxContentRepository, SqlxLayoutRepository, SqlxMasterPageRepository, SqlxPageOptionRepository,
    SqlxPageRepository, SqlxRedirectRepository, SqlxSitemapRepository, SqlxTagRepository,
};
use crate::db::DbPool;
use crate::events::PageEventSink;
use crate::models::{
    AccessLevel, EditPagePropertiesInput, Page, PageStatus, Principal, Role,
};
use crate::services::access_control::AccessControlError;
use crate::services::page::PageServiceError;
use crate::services::page_option::OptionDiff;
use crate::services::tag::TagPlan;
use crate::services::{
    AccessControlService, ContentService, MasterPageService, OptionService, PageService,
    RedirectService, SitemapService, TagService, UrlService,
};

/// Validation failures of the save workflow, each a distinct rule
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Page {0}: either a layout or a master page must be selected")]
    NoLayoutOrMaster(i64),

    #[error("Page {0}: layout and master page cannot both be selected")]
    BothLayoutAndMaster(i64),

    #[error("Page {0}: a page cannot be its own master")]
    MasterIsSelf(i64),

    #[error("Page {page_id}: master page {master_page_id} is a descendant of this page")]
    MasterIsDescendant { page_id: i64, master_page_id: i64 },

    #[error("Page {page_id}: master page {master_page_id} does not exist")]
    UnknownMasterPage { page_id: i64, master_page_id: i64 },

    #[error("Page {page_id}: layout {layout_id} does not exist")]
    UnknownLayout { page_id: i64, layout_id: i64 },

    #[error("Invalid page URL: {0}")]
    InvalidUrl(String),

    #[error("Page URL already in use: {0}")]
    DuplicateUrl(String),
}

/// Error type of the save workflow
#[derive(Debug, thiserror::Error)]
pub enum PagePropertiesError {
    #[error("Page {0} not found")]
    PageNotFound(i64),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The submitted version token was stale; the caller should reload
    /// and retry.
    #[error("Page {0} was modified concurrently")]
    ConcurrencyConflict(i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<AccessControlError> for PagePropertiesError {
    fn from(err: AccessControlError) -> Self {
        Self::AccessDenied(err.to_string())
    }
}

impl From<PageServiceError> for PagePropertiesError {
    fn from(err: PageServiceError) -> Self {
        match err {
            PageServiceError::InvalidUrl(url) => ValidationError::InvalidUrl(url).into(),
            PageServiceError::DuplicateUrl(url) => ValidationError::DuplicateUrl(url).into(),
            PageServiceError::InternalError(err) => Self::InternalError(err),
        }
    }
}

/// Result of a save: either the persisted page or a veto from a listener
#[derive(Debug)]
pub enum SaveOutcome {
    Saved(Page),
    Cancelled { messages: Vec<String> },
}

impl SaveOutcome {
    pub fn page(&self) -> Option<&Page> {
        match self {
            Self::Saved(page) => Some(page),
            Self::Cancelled { .. } => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

pub struct PagePropertiesService {
    pool: DbPool,
    security: SecurityConfig,
    pages: Arc<dyn PageRepository>,
    layouts: Arc<dyn LayoutRepository>,
    access_rules: Arc<dyn AccessRuleRepository>,
    page_service: PageService,
    url_service: UrlService,
    redirect_service: RedirectService,
    sitemap_service: SitemapService,
    master_page_service: MasterPageService,
    option_service: OptionService,
    tag_service: TagService,
    content_service: ContentService,
    access_control: AccessControlService,
    events: Arc<dyn PageEventSink>,
}

impl PagePropertiesService {
    pub fn new(pool: DbPool, security: SecurityConfig, events: Arc<dyn PageEventSink>) -> Self {
        let pages = SqlxPageRepository::boxed(pool.clone());
        Self {
            page_service: PageService::new(pages.clone()),
            pages,
            layouts: SqlxLayoutRepository::boxed(pool.clone()),
            access_rules: SqlxAccessRuleRepository::boxed(pool.clone()),
            url_service: UrlService::new(),
            redirect_service: RedirectService::new(SqlxRedirectRepository::boxed(pool.clone())),
            sitemap_service: SitemapService::new(SqlxSitemapRepository::boxed(pool.clone())),
            master_page_service: MasterPageService::new(SqlxMasterPageRepository::boxed(
                pool.clone(),
            )),
            option_service: OptionService::new(SqlxPageOptionRepository::boxed(pool.clone())),
            tag_service: TagService::new(SqlxTagRepository::boxed(pool.clone())),
            content_service: ContentService::new(SqlxContentRepository::boxed(pool.clone())),
            access_control: AccessControlService::new(),
            security,
            pool,
            events,
        }
    }

    /// Save the submitted page properties on behalf of the principal.
    pub async fn save(
        &self,
        input: EditPagePropertiesInput,
        principal: &Principal,
    ) -> Result<SaveOutcome, PagePropertiesError> {
        self.validate_layout_selection(&input).await?;

        // Load the page with its graph; everything below works on this
        // snapshot until the transactional write-out.
        let include_rules = self.security.access_control_enabled;
        let graph = self
            .pages
            .load_graph(input.id, include_rules)
            .await
            .context("Failed to load page graph")?
            .ok_or(PagePropertiesError::PageNotFound(input.id))?;

        let mut page = graph.page;
        let is_master_page = graph.is_master_page;
        let before_change = page.clone();

        let roles = self.access_control.required_roles(is_master_page);
        if self.security.access_control_enabled {
            self.access_control.demand_entity_access(
                principal,
                &graph.access_rules,
                AccessLevel::ReadWrite,
                &roles,
            )?;
        } else {
            self.access_control.demand_role_access(principal, &roles)?;
        }

        let lineage_change = self
            .master_page_service
            .plan_lineage_change(
                page.id,
                page.master_page_id,
                &graph.master_lineage,
                input.master_page_id,
            )
            .await?;

        let can_edit = self.access_control.can_edit(principal, is_master_page);

        // URL change: validate uniqueness up front, collect the redirect
        // and the sitemap nodes to rewrite. Nothing is written yet.
        let old_url = page.page_url.clone();
        let new_url = self.url_service.fix_url(&input.page_url);
        let url_changing = can_edit && !self.url_service.urls_equal(&old_url, &new_url);

        if url_changing {
            self.page_service.validate_page_url(&new_url, page.id).await?;
        }

        let redirect = if url_changing && input.redirect_from_old_url {
            self.redirect_service.create_redirect_entity(&old_url, &new_url)
        } else {
            None
        };

        let sitemap_nodes = if url_changing && input.update_sitemap {
            self.sitemap_service.nodes_matching(&old_url).await?
        } else {
            Vec::new()
        };

        let tag_plan = if can_edit {
            self.tag_service.plan_page_tags(page.id, &input.tags).await?
        } else {
            TagPlan::default()
        };

        let option_diff = if can_edit {
            self.option_service
                .reconcile(page.id, &input.option_values, &graph.options)
        } else {
            OptionDiff::default()
        };

        let new_rules = if can_edit && self.security.access_control_enabled {
            let deduped = self.access_control.dedupe_rules(&graph.access_rules);
            let target = self
                .access_control
                .reconcile_rules(page.id, &input.user_access_list);
            let dirty = deduped.len() != graph.access_rules.len()
                || !self.access_control.rules_equal(&deduped, &target);
            dirty.then_some(target)
        } else {
            None
        };

        // In-memory mutations; the edit tier gates everything except
        // publication, which has its own authorization axis.
        let initial_seo = page.has_seo();

        if url_changing {
            page.page_url = new_url.clone();
        }

        if can_edit {
            page.page_url_hash = self.url_service.url_hash(&page.page_url);
            page.category_id = input.category_id;
            page.title = input.title.clone();
            page.custom_css = input.custom_css.clone();
            page.custom_js = input.custom_js.clone();

            if let Some(master_page_id) = input.master_page_id {
                page.master_page_id = Some(master_page_id);
                page.layout_id = None;
            } else {
                page.layout_id = input.layout_id;
                page.master_page_id = None;
            }
        }

        let mut publish_draft = false;
        if input.update_publish_state && !is_master_page {
            self.access_control
                .demand_role_access(principal, &[Role::PublishContent])?;

            if input.is_published {
                if page.status != PageStatus::Published {
                    page.status = PageStatus::Published;
                    page.published_on = Some(Utc::now());
                    publish_draft = true;
                }
            } else {
                page.status = PageStatus::Unpublished;
            }
        }

        if can_edit {
            if !is_master_page {
                page.meta_title = input.meta_title.clone();
                page.meta_keywords = input.meta_keywords.clone();
                page.meta_description = input.meta_description.clone();
                page.use_no_follow = input.use_no_follow;
                page.use_no_index = input.use_no_index;
                page.is_archived = input.is_archived;
            }

            page.use_canonical_url = input.use_canonical_url;
            page.image_id = input.image_id;
            page.secondary_image_id = input.secondary_image_id;
            page.featured_image_id = input.featured_image_id;
        }

        // Listeners may veto; at this point nothing has been written, so
        // cancelling is free of side effects.
        let decision = self.events.on_page_properties_changing(&before_change, &page);
        if decision.cancel {
            info!(
                "Save of page {} cancelled by listener: {}",
                page.id,
                decision.messages.join("; ")
            );
            return Ok(SaveOutcome::Cancelled {
                messages: decision.messages,
            });
        }

        // Write-out. Dropping the transaction on any error rolls back.
        page.version = input.version + 1;
        page.updated_at = Utc::now();

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let affected = self.pages.update_in(&mut tx, &page, input.version).await?;
        if affected == 0 {
            debug!(
                "Version conflict on page {}: submitted {}",
                page.id, input.version
            );
            return Err(PagePropertiesError::ConcurrencyConflict(page.id));
        }

        let redirect_created = match &redirect {
            Some(entity) => Some(self.redirect_service.save_in(&mut tx, entity).await?),
            None => None,
        };

        let updated_nodes = if sitemap_nodes.is_empty() {
            Vec::new()
        } else {
            self.sitemap_service
                .rewrite_nodes(&mut tx, &sitemap_nodes, &new_url)
                .await?
        };

        if can_edit {
            if let Some(change) = &lineage_change {
                self.master_page_service
                    .apply_lineage_change(&mut tx, change)
                    .await?;
            }
        }

        let new_tags = if can_edit && !tag_plan.is_empty() {
            self.tag_service
                .apply_page_tags(&mut tx, page.id, &tag_plan)
                .await?
        } else {
            Vec::new()
        };

        if !option_diff.is_empty() {
            self.option_service.apply_in(&mut tx, &option_diff).await?;
        }

        if let Some(rules) = &new_rules {
            self.access_rules.replace_in(&mut tx, page.id, rules).await?;
        }

        if publish_draft {
            self.content_service
                .publish_draft_content(&mut tx, page.id)
                .await?;
        }

        tx.commit().await.context("Failed to commit save")?;

        info!("Saved properties of page {} ({})", page.id, page.page_url);

        // Post-commit notifications: each independent, failures logged but
        // never turned into a save failure.
        self.notify(
            self.events.on_page_properties_changed(&page),
            "page_properties_changed",
        );

        if let Some(redirect) = &redirect_created {
            self.notify(self.events.on_redirect_created(redirect), "redirect_created");
        }

        if initial_seo != page.has_seo() {
            self.notify(
                self.events.on_page_seo_status_changed(&page),
                "page_seo_status_changed",
            );
        }

        if !new_tags.is_empty() {
            self.notify(self.events.on_tags_created(&new_tags), "tags_created");
        }

        for node in &updated_nodes {
            self.notify(
                self.events.on_sitemap_node_updated(node),
                "sitemap_node_updated",
            );
        }
        for sitemap_id in SitemapService::distinct_sitemap_ids(&updated_nodes) {
            self.notify(
                self.events.on_sitemap_updated(sitemap_id),
                "sitemap_updated",
            );
        }

        Ok(SaveOutcome::Saved(page))
    }

    /// Exactly one of master page and layout must be selected, the master
    /// must exist, and assigning it must not close a cycle.
    async fn validate_layout_selection(
        &self,
        input: &EditPagePropertiesInput,
    ) -> Result<(), PagePropertiesError> {
        match (input.master_page_id, input.layout_id) {
            (None, None) => {
                return Err(ValidationError::NoLayoutOrMaster(input.id).into());
            }
            (Some(_), Some(_)) => {
                return Err(ValidationError::BothLayoutAndMaster(input.id).into());
            }
            (Some(master_page_id), None) => {
                if master_page_id == input.id {
                    return Err(ValidationError::MasterIsSelf(input.id).into());
                }
                if self
                    .master_page_service
                    .is_descendant(input.id, master_page_id)
                    .await?
                {
                    return Err(ValidationError::MasterIsDescendant {
                        page_id: input.id,
                        master_page_id,
                    }
                    .into());
                }
                if self
                    .pages
                    .get_by_id(master_page_id)
                    .await
                    .context("Failed to check master page")?
                    .is_none()
                {
                    return Err(ValidationError::UnknownMasterPage {
                        page_id: input.id,
                        master_page_id,
                    }
                    .into());
                }
            }
            (None, Some(layout_id)) => {
                if self
                    .layouts
                    .get_by_id(layout_id)
                    .await
                    .context("Failed to check layout")?
                    .is_none()
                {
                    return Err(ValidationError::UnknownLayout {
                        page_id: input.id,
                        layout_id,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    fn notify(&self, result: anyhow::Result<()>, event: &str) {
        if let Err(err) = result {
            warn!("Post-save notification '{}' failed: {:#}", event, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SitemapRepository;
    use crate::db::{create_test_pool, migrations, DbPool};
    use crate::events::RecordingEventSink;
    use crate::models::{
        AccessRuleInput, ContentStatus, OptionValueInput, PageContent, Sitemap, SitemapNode,
    };

    struct TestEnv {
        pool: DbPool,
        sink: Arc<RecordingEventSink>,
        service: PagePropertiesService,
        layout_id: i64,
    }

    async fn setup(access_control_enabled: bool) -> TestEnv {
        let pool = create_test_pool().await.expect("Failed to create pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Migrations failed");

        let layout_id =
            sqlx::query("INSERT INTO layouts (name, layout_path) VALUES ('Default', '/layouts/default')")
                .execute(&pool)
                .await
                .expect("Failed to create layout")
                .last_insert_rowid();

        let sink = Arc::new(RecordingEventSink::new());
        let service = PagePropertiesService::new(
            pool.clone(),
            SecurityConfig {
                access_control_enabled,
            },
            sink.clone(),
        );

        TestEnv {
            pool,
            sink,
            service,
            layout_id,
        }
    }

    async fn create_page(env: &TestEnv, url: &str, title: &str) -> Page {
        let mut page = Page::new(url.to_string(), title.to_string());
        page.layout_id = Some(env.layout_id);
        env.service
            .pages
            .create(&page)
            .await
            .expect("Failed to create page")
    }

    async fn create_master_page(env: &TestEnv, url: &str) -> Page {
        create_page(env, url, "Master").await
    }

    async fn link_lineage(env: &TestEnv, page_id: i64, master_id: i64) {
        sqlx::query("INSERT INTO master_pages (page_id, master_id) VALUES (?, ?)")
            .bind(page_id)
            .bind(master_id)
            .execute(&env.pool)
            .await
            .expect("Failed to link lineage");
    }

    async fn reload(env: &TestEnv, id: i64) -> Page {
        env.service
            .pages
            .get_by_id(id)
            .await
            .expect("Failed to reload page")
            .expect("Page missing")
    }

    async fn lineage_of(env: &TestEnv, page_id: i64) -> Vec<i64> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT master_id FROM master_pages WHERE page_id = ? ORDER BY master_id")
                .bind(page_id)
                .fetch_all(&env.pool)
                .await
                .expect("Failed to read lineage");
        rows.into_iter().map(|(id,)| id).collect()
    }

    fn editor() -> Principal {
        Principal::new("editor", [Role::EditContent, Role::PublishContent])
    }

    fn admin() -> Principal {
        Principal::new(
            "admin",
            [Role::EditContent, Role::PublishContent, Role::Administration],
        )
    }

    fn base_input(page: &Page) -> EditPagePropertiesInput {
        EditPagePropertiesInput {
            id: page.id,
            version: page.version,
            title: page.title.clone(),
            page_url: page.page_url.clone(),
            redirect_from_old_url: false,
            update_sitemap: false,
            master_page_id: page.master_page_id,
            layout_id: page.layout_id,
            category_id: page.category_id,
            update_publish_state: false,
            is_published: false,
            meta_title: page.meta_title.clone(),
            meta_keywords: page.meta_keywords.clone(),
            meta_description: page.meta_description.clone(),
            use_canonical_url: page.use_canonical_url,
            use_no_follow: page.use_no_follow,
            use_no_index: page.use_no_index,
            is_archived: page.is_archived,
            custom_css: page.custom_css.clone(),
            custom_js: page.custom_js.clone(),
            image_id: page.image_id,
            secondary_image_id: page.secondary_image_id,
            featured_image_id: page.featured_image_id,
            option_values: Vec::new(),
            user_access_list: Vec::new(),
            tags: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Layout / master exclusivity and cycle validation
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_neither_layout_nor_master_fails() {
        let env = setup(false).await;
        let page = create_page(&env, "/page/", "Page").await;

        let mut input = base_input(&page);
        input.layout_id = None;
        input.master_page_id = None;

        let result = env.service.save(input, &editor()).await;
        assert!(matches!(
            result,
            Err(PagePropertiesError::Validation(ValidationError::NoLayoutOrMaster(_)))
        ));

        let unchanged = reload(&env, page.id).await;
        assert_eq!(unchanged.version, page.version, "No write may have happened");
    }

    #[tokio::test]
    async fn test_both_layout_and_master_fails() {
        let env = setup(false).await;
        let master = create_master_page(&env, "/master/").await;
        let page = create_page(&env, "/page/", "Page").await;

        let mut input = base_input(&page);
        input.master_page_id = Some(master.id);

        let result = env.service.save(input, &editor()).await;
        assert!(matches!(
            result,
            Err(PagePropertiesError::Validation(ValidationError::BothLayoutAndMaster(_)))
        ));
    }

    #[tokio::test]
    async fn test_master_is_self_fails() {
        let env = setup(false).await;
        let page = create_page(&env, "/page/", "Page").await;

        let mut input = base_input(&page);
        input.layout_id = None;
        input.master_page_id = Some(page.id);

        let result = env.service.save(input, &editor()).await;
        assert!(matches!(
            result,
            Err(PagePropertiesError::Validation(ValidationError::MasterIsSelf(_)))
        ));
    }

    #[tokio::test]
    async fn test_master_is_descendant_fails_at_any_depth() {
        let env = setup(false).await;
        let root = create_master_page(&env, "/root/").await;
        let mid = create_master_page(&env, "/mid/").await;
        let leaf = create_master_page(&env, "/leaf/").await;
        // leaf -> mid -> root, lineage rows flattened
        link_lineage(&env, mid.id, root.id).await;
        link_lineage(&env, leaf.id, mid.id).await;
        link_lineage(&env, leaf.id, root.id).await;

        // Assigning the grandchild as root's master closes a cycle
        let mut input = base_input(&root);
        input.layout_id = None;
        input.master_page_id = Some(leaf.id);

        let result = env.service.save(input, &admin()).await;
        assert!(matches!(
            result,
            Err(PagePropertiesError::Validation(ValidationError::MasterIsDescendant { .. }))
        ));
    }

    #[tokio::test]
    async fn test_unknown_master_and_layout_fail() {
        let env = setup(false).await;
        let page = create_page(&env, "/page/", "Page").await;

        let mut input = base_input(&page);
        input.layout_id = None;
        input.master_page_id = Some(9999);
        let result = env.service.save(input, &editor()).await;
        assert!(matches!(
            result,
            Err(PagePropertiesError::Validation(ValidationError::UnknownMasterPage { .. }))
        ));

        let mut input = base_input(&page);
        input.layout_id = Some(9999);
        let result = env.service.save(input, &editor()).await;
        assert!(matches!(
            result,
            Err(PagePropertiesError::Validation(ValidationError::UnknownLayout { .. }))
        ));
    }

    #[tokio::test]
    async fn test_missing_page_fails() {
        let env = setup(false).await;
        let mut input = base_input(&Page::new("/ghost/".to_string(), "Ghost".to_string()));
        input.id = 4242;
        input.layout_id = Some(env.layout_id);

        let result = env.service.save(input, &editor()).await;
        assert!(matches!(result, Err(PagePropertiesError::PageNotFound(4242))));
    }

    // ------------------------------------------------------------------
    // URL change: redirects and sitemap propagation
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_url_change_with_redirect() {
        let env = setup(false).await;
        let page = create_page(&env, "/old/", "Page").await;

        let mut input = base_input(&page);
        input.page_url = "/new/".to_string();
        input.redirect_from_old_url = true;

        let outcome = env.service.save(input, &editor()).await.expect("Save failed");
        let saved = outcome.page().expect("Saved page expected");
        assert_eq!(saved.page_url, "/new/");
        assert_ne!(saved.page_url_hash, page.page_url_hash);

        let redirects: Vec<(String, String)> =
            sqlx::query_as("SELECT page_url, redirect_url FROM redirects")
                .fetch_all(&env.pool)
                .await
                .unwrap();
        assert_eq!(redirects, vec![("/old/".to_string(), "/new/".to_string())]);

        let events = env.sink.redirects.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].page_url, "/old/");
        assert_eq!(events[0].redirect_url, "/new/");
    }

    #[tokio::test]
    async fn test_url_change_without_redirect_flag_creates_none() {
        let env = setup(false).await;
        let page = create_page(&env, "/old/", "Page").await;

        let mut input = base_input(&page);
        input.page_url = "/new/".to_string();

        env.service.save(input, &editor()).await.expect("Save failed");

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM redirects")
            .fetch_one(&env.pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
        assert!(env.sink.redirects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_url_fails_before_any_write() {
        let env = setup(false).await;
        create_page(&env, "/taken/", "Other").await;
        let page = create_page(&env, "/mine/", "Page").await;

        let mut input = base_input(&page);
        input.page_url = "/taken/".to_string();
        input.redirect_from_old_url = true;

        let result = env.service.save(input, &editor()).await;
        assert!(matches!(
            result,
            Err(PagePropertiesError::Validation(ValidationError::DuplicateUrl(_)))
        ));

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM redirects")
            .fetch_one(&env.pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
        assert_eq!(reload(&env, page.id).await.page_url, "/mine/");
    }

    #[tokio::test]
    async fn test_url_change_rewrites_sitemaps_and_notifies_each_once() {
        let env = setup(false).await;
        let page = create_page(&env, "/about/", "About").await;

        let sitemap_repo = SqlxSitemapRepository::new(env.pool.clone());
        let main = sitemap_repo.create(&Sitemap::new("Main".to_string())).await.unwrap();
        let footer = sitemap_repo
            .create(&Sitemap::new("Footer".to_string()))
            .await
            .unwrap();
        // Two matching nodes in the main sitemap, one in the footer, one
        // unrelated node
        sitemap_repo
            .create_node(&SitemapNode::new(main.id, "About".to_string(), "/about/".to_string()))
            .await
            .unwrap();
        sitemap_repo
            .create_node(&SitemapNode::new(main.id, "Company".to_string(), "/about/".to_string()))
            .await
            .unwrap();
        sitemap_repo
            .create_node(&SitemapNode::new(footer.id, "About".to_string(), "/about/".to_string()))
            .await
            .unwrap();
        sitemap_repo
            .create_node(&SitemapNode::new(main.id, "Home".to_string(), "/".to_string()))
            .await
            .unwrap();

        let mut input = base_input(&page);
        input.page_url = "/about-us/".to_string();
        input.update_sitemap = true;

        env.service.save(input, &editor()).await.expect("Save failed");

        let stale: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sitemap_nodes WHERE url = '/about/'")
            .fetch_one(&env.pool)
            .await
            .unwrap();
        assert_eq!(stale.0, 0);
        let rewritten: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sitemap_nodes WHERE url = '/about-us/'")
                .fetch_one(&env.pool)
                .await
                .unwrap();
        assert_eq!(rewritten.0, 3);

        assert_eq!(env.sink.updated_nodes.lock().unwrap().len(), 3);
        let mut sitemap_events = env.sink.updated_sitemaps.lock().unwrap().clone();
        sitemap_events.sort_unstable();
        assert_eq!(sitemap_events, vec![main.id, footer.id]);
    }

    // ------------------------------------------------------------------
    // Master page lineage propagation
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_master_reassignment_updates_descendants() {
        let env = setup(false).await;
        let shared_root = create_master_page(&env, "/shared/").await;
        let m1 = create_master_page(&env, "/m1/").await;
        let m2 = create_master_page(&env, "/m2/").await;
        // m1 and m2 both inherit from the shared root
        link_lineage(&env, m1.id, shared_root.id).await;
        link_lineage(&env, m2.id, shared_root.id).await;

        // page uses m1; child uses page
        let mut page = Page::new("/page/".to_string(), "Page".to_string());
        page.master_page_id = Some(m1.id);
        let page = env.service.pages.create(&page).await.unwrap();
        link_lineage(&env, page.id, m1.id).await;
        link_lineage(&env, page.id, shared_root.id).await;

        let mut child = Page::new("/child/".to_string(), "Child".to_string());
        child.master_page_id = Some(page.id);
        let child = env.service.pages.create(&child).await.unwrap();
        link_lineage(&env, child.id, page.id).await;
        link_lineage(&env, child.id, m1.id).await;
        link_lineage(&env, child.id, shared_root.id).await;

        // Reassign page from m1 to m2; page is itself a master, so
        // administration rights are required
        let mut input = base_input(&page);
        input.layout_id = None;
        input.master_page_id = Some(m2.id);

        let outcome = env.service.save(input, &admin()).await.expect("Save failed");
        let saved = outcome.page().unwrap();
        assert_eq!(saved.master_page_id, Some(m2.id));
        assert_eq!(saved.layout_id, None);

        let mut expected_page = vec![m2.id, shared_root.id];
        expected_page.sort_unstable();
        assert_eq!(lineage_of(&env, page.id).await, expected_page);

        let mut expected_child = vec![page.id, m2.id, shared_root.id];
        expected_child.sort_unstable();
        assert_eq!(lineage_of(&env, child.id).await, expected_child);
    }

    #[tokio::test]
    async fn test_switching_master_to_layout_clears_lineage() {
        let env = setup(false).await;
        let master = create_master_page(&env, "/master/").await;

        let mut page = Page::new("/page/".to_string(), "Page".to_string());
        page.master_page_id = Some(master.id);
        let page = env.service.pages.create(&page).await.unwrap();
        link_lineage(&env, page.id, master.id).await;

        let mut input = base_input(&page);
        input.master_page_id = None;
        input.layout_id = Some(env.layout_id);

        let outcome = env.service.save(input, &editor()).await.expect("Save failed");
        let saved = outcome.page().unwrap();
        assert_eq!(saved.layout_id, Some(env.layout_id));
        assert_eq!(saved.master_page_id, None);
        assert!(lineage_of(&env, page.id).await.is_empty());
    }

    // ------------------------------------------------------------------
    // Publication
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_publish_without_publish_role_fails_and_status_unchanged() {
        let env = setup(false).await;
        let page = create_page(&env, "/page/", "Page").await;
        sqlx::query("UPDATE pages SET status = 'unpublished' WHERE id = ?")
            .bind(page.id)
            .execute(&env.pool)
            .await
            .unwrap();

        let editor_only = Principal::new("writer", [Role::EditContent]);
        let mut input = base_input(&page);
        input.update_publish_state = true;
        input.is_published = true;

        let result = env.service.save(input, &editor_only).await;
        assert!(matches!(result, Err(PagePropertiesError::AccessDenied(_))));

        let unchanged = reload(&env, page.id).await;
        assert_eq!(unchanged.status, PageStatus::Unpublished);
        assert_eq!(unchanged.version, page.version);
    }

    #[tokio::test]
    async fn test_publish_transition_stamps_date_and_publishes_drafts() {
        let env = setup(false).await;
        let page = create_page(&env, "/page/", "Page").await;
        sqlx::query("UPDATE pages SET status = 'unpublished' WHERE id = ?")
            .bind(page.id)
            .execute(&env.pool)
            .await
            .unwrap();
        env.service
            .content_service
            .add_draft(&PageContent::new(page.id, "main".to_string(), "body".to_string()))
            .await
            .unwrap();

        let mut input = base_input(&page);
        input.update_publish_state = true;
        input.is_published = true;

        let outcome = env.service.save(input, &editor()).await.expect("Save failed");
        let saved = outcome.page().unwrap();
        assert_eq!(saved.status, PageStatus::Published);
        assert!(saved.published_on.is_some());

        let contents = env
            .service
            .content_service
            .get_page_contents(page.id)
            .await
            .unwrap();
        assert_eq!(contents[0].status, ContentStatus::Published);
    }

    #[tokio::test]
    async fn test_republish_does_not_restamp_or_republish_drafts() {
        let env = setup(false).await;
        let page = create_page(&env, "/page/", "Page").await;

        let mut input = base_input(&page);
        input.update_publish_state = true;
        input.is_published = true;
        let outcome = env.service.save(input, &editor()).await.expect("Save failed");
        let first = outcome.page().unwrap().clone();
        let first_published_on = first.published_on;

        // Add a draft after publishing; a second save that stays published
        // must not promote it
        env.service
            .content_service
            .add_draft(&PageContent::new(page.id, "main".to_string(), "later".to_string()))
            .await
            .unwrap();

        let mut input = base_input(&first);
        input.update_publish_state = true;
        input.is_published = true;
        let outcome = env.service.save(input, &editor()).await.expect("Save failed");
        let second = outcome.page().unwrap();

        assert_eq!(second.published_on, first_published_on);
        let contents = env
            .service
            .content_service
            .get_page_contents(page.id)
            .await
            .unwrap();
        assert_eq!(contents[0].status, ContentStatus::Draft);
    }

    #[tokio::test]
    async fn test_unpublish_transition() {
        let env = setup(false).await;
        let page = create_page(&env, "/page/", "Page").await;
        sqlx::query("UPDATE pages SET status = 'published' WHERE id = ?")
            .bind(page.id)
            .execute(&env.pool)
            .await
            .unwrap();

        let mut input = base_input(&page);
        input.update_publish_state = true;
        input.is_published = false;

        let outcome = env.service.save(input, &editor()).await.expect("Save failed");
        assert_eq!(outcome.page().unwrap().status, PageStatus::Unpublished);
    }

    // ------------------------------------------------------------------
    // Edit tier gating
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_publisher_without_edit_role_cannot_change_fields() {
        let env = setup(false).await;
        let page = create_page(&env, "/page/", "Original title").await;
        sqlx::query("UPDATE pages SET status = 'unpublished' WHERE id = ?")
            .bind(page.id)
            .execute(&env.pool)
            .await
            .unwrap();

        let publisher = Principal::new("publisher", [Role::PublishContent]);
        let mut input = base_input(&page);
        input.title = "Hijacked".to_string();
        input.page_url = "/elsewhere/".to_string();
        input.redirect_from_old_url = true;
        input.update_publish_state = true;
        input.is_published = true;

        let outcome = env.service.save(input, &publisher).await.expect("Save failed");
        let saved = outcome.page().unwrap();

        // Publication applied, everything else ignored
        assert_eq!(saved.status, PageStatus::Published);
        assert_eq!(saved.title, "Original title");
        assert_eq!(saved.page_url, "/page/");

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM redirects")
            .fetch_one(&env.pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn test_master_page_edit_requires_administration() {
        let env = setup(false).await;
        let master = create_master_page(&env, "/master/").await;
        let mut child = Page::new("/child/".to_string(), "Child".to_string());
        child.master_page_id = Some(master.id);
        env.service.pages.create(&child).await.unwrap();
        link_lineage(
            &env,
            env.service.pages.get_by_url("/child/").await.unwrap().unwrap().id,
            master.id,
        )
        .await;

        // An editor without administration cannot edit a master page's
        // fields, though the save itself is permitted
        let mut input = base_input(&master);
        input.title = "Renamed".to_string();

        let outcome = env.service.save(input, &editor()).await.expect("Save failed");
        assert_eq!(outcome.page().unwrap().title, "Master");

        let mut input = base_input(&master);
        input.version = reload(&env, master.id).await.version;
        input.title = "Renamed".to_string();
        let outcome = env.service.save(input, &admin()).await.expect("Save failed");
        assert_eq!(outcome.page().unwrap().title, "Renamed");
    }

    #[tokio::test]
    async fn test_master_page_keeps_seo_flags() {
        let env = setup(false).await;
        let master = create_master_page(&env, "/master/").await;
        let mut child = Page::new("/child/".to_string(), "Child".to_string());
        child.master_page_id = Some(master.id);
        let child = env.service.pages.create(&child).await.unwrap();
        link_lineage(&env, child.id, master.id).await;

        let mut input = base_input(&master);
        input.use_no_follow = true;
        input.use_no_index = true;
        input.is_archived = true;
        input.use_canonical_url = true;
        input.meta_title = "Master meta".to_string();

        let outcome = env.service.save(input, &admin()).await.expect("Save failed");
        let saved = outcome.page().unwrap();

        // Indexing flags and meta fields do not apply to master pages;
        // the canonical-URL flag does
        assert!(!saved.use_no_follow);
        assert!(!saved.use_no_index);
        assert!(!saved.is_archived);
        assert_eq!(saved.meta_title, "");
        assert!(saved.use_canonical_url);
    }

    // ------------------------------------------------------------------
    // Options, tags, access rules
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_options_reconciled_against_submitted_set() {
        let env = setup(false).await;
        let page = create_page(&env, "/page/", "Page").await;
        sqlx::query("INSERT INTO page_options (page_id, key, value) VALUES (?, 'theme', 'dark'), (?, 'width', 'narrow')")
            .bind(page.id)
            .bind(page.id)
            .execute(&env.pool)
            .await
            .unwrap();

        let mut input = base_input(&page);
        input.option_values = vec![
            OptionValueInput {
                key: "theme".to_string(),
                value: "light".to_string(),
            },
            OptionValueInput {
                key: "sidebar".to_string(),
                value: "on".to_string(),
            },
        ];

        env.service.save(input, &editor()).await.expect("Save failed");

        let options: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM page_options WHERE page_id = ? ORDER BY key")
                .bind(page.id)
                .fetch_all(&env.pool)
                .await
                .unwrap();
        assert_eq!(
            options,
            vec![
                ("sidebar".to_string(), "on".to_string()),
                ("theme".to_string(), "light".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_tags_replaced_and_new_tags_notified() {
        let env = setup(false).await;
        let page = create_page(&env, "/page/", "Page").await;

        let mut input = base_input(&page);
        input.tags = vec!["rust".to_string(), "cms".to_string()];
        let outcome = env.service.save(input, &editor()).await.expect("Save failed");
        let saved = outcome.page().unwrap().clone();

        {
            let created = env.sink.created_tags.lock().unwrap();
            assert_eq!(created.len(), 1);
            let mut names: Vec<_> = created[0].iter().map(|t| t.name.clone()).collect();
            names.sort();
            assert_eq!(names, vec!["cms".to_string(), "rust".to_string()]);
        }

        // Replace one tag; only the new one is reported
        let mut input = base_input(&saved);
        input.tags = vec!["rust".to_string(), "web".to_string()];
        env.service.save(input, &editor()).await.expect("Save failed");

        let tag_names: Vec<(String,)> = sqlx::query_as(
            "SELECT t.name FROM tags t INNER JOIN page_tags pt ON pt.tag_id = t.id \
             WHERE pt.page_id = ? ORDER BY t.name",
        )
        .bind(page.id)
        .fetch_all(&env.pool)
        .await
        .unwrap();
        let tag_names: Vec<_> = tag_names.into_iter().map(|(n,)| n).collect();
        assert_eq!(tag_names, vec!["rust".to_string(), "web".to_string()]);

        let created = env.sink.created_tags.lock().unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(created[1].len(), 1);
        assert_eq!(created[1][0].name, "web");
    }

    #[tokio::test]
    async fn test_unchanged_tags_emit_no_tag_event() {
        let env = setup(false).await;
        let page = create_page(&env, "/page/", "Page").await;

        let mut input = base_input(&page);
        input.tags = vec!["rust".to_string()];
        let outcome = env.service.save(input, &editor()).await.expect("Save failed");
        let saved = outcome.page().unwrap().clone();

        let mut input = base_input(&saved);
        input.tags = vec!["rust".to_string()];
        env.service.save(input, &editor()).await.expect("Save failed");

        assert_eq!(env.sink.created_tags.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_access_rules_replaced_when_enabled() {
        let env = setup(true).await;
        let page = create_page(&env, "/page/", "Page").await;

        let mut input = base_input(&page);
        input.user_access_list = vec![
            AccessRuleInput {
                identity: "alice".to_string(),
                is_for_role: false,
                access_level: AccessLevel::ReadWrite,
            },
            // Duplicate entry is dropped before diffing
            AccessRuleInput {
                identity: "alice".to_string(),
                is_for_role: false,
                access_level: AccessLevel::Read,
            },
        ];

        env.service.save(input, &editor()).await.expect("Save failed");

        let rules: Vec<(String, String)> =
            sqlx::query_as("SELECT identity, access_level FROM access_rules WHERE page_id = ?")
                .bind(page.id)
                .fetch_all(&env.pool)
                .await
                .unwrap();
        assert_eq!(rules, vec![("alice".to_string(), "readwrite".to_string())]);
    }

    #[tokio::test]
    async fn test_entity_deny_rule_blocks_save_when_enabled() {
        let env = setup(true).await;
        let page = create_page(&env, "/page/", "Page").await;
        sqlx::query(
            "INSERT INTO access_rules (page_id, identity, is_for_role, access_level) \
             VALUES (?, 'editor', 0, 'read')",
        )
        .bind(page.id)
        .execute(&env.pool)
        .await
        .unwrap();

        let result = env.service.save(base_input(&page), &editor()).await;
        assert!(matches!(result, Err(PagePropertiesError::AccessDenied(_))));
        assert_eq!(reload(&env, page.id).await.version, page.version);
    }

    // ------------------------------------------------------------------
    // Concurrency and idempotence
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_stale_version_conflicts_and_rolls_back() {
        let env = setup(false).await;
        let page = create_page(&env, "/page/", "Page").await;

        let mut input = base_input(&page);
        input.title = "First writer".to_string();
        env.service.save(input, &editor()).await.expect("Save failed");

        // Second writer still holds the original version token
        let mut input = base_input(&page);
        input.title = "Second writer".to_string();
        input.page_url = "/renamed/".to_string();
        input.redirect_from_old_url = true;

        let result = env.service.save(input, &editor()).await;
        assert!(matches!(
            result,
            Err(PagePropertiesError::ConcurrencyConflict(_))
        ));

        let current = reload(&env, page.id).await;
        assert_eq!(current.title, "First writer");
        assert_eq!(current.page_url, "/page/");
        // The conflicting attempt must not have left a redirect behind
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM redirects")
            .fetch_one(&env.pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn test_repeat_save_with_fresh_token_changes_nothing() {
        let env = setup(false).await;
        let master = create_master_page(&env, "/master/").await;
        let mut page = Page::new("/old/".to_string(), "Page".to_string());
        page.master_page_id = Some(master.id);
        let page = env.service.pages.create(&page).await.unwrap();
        link_lineage(&env, page.id, master.id).await;

        let sitemap_repo = SqlxSitemapRepository::new(env.pool.clone());
        let sitemap = sitemap_repo.create(&Sitemap::new("Main".to_string())).await.unwrap();
        sitemap_repo
            .create_node(&SitemapNode::new(sitemap.id, "Old".to_string(), "/old/".to_string()))
            .await
            .unwrap();

        let mut input = base_input(&page);
        input.page_url = "/new/".to_string();
        input.redirect_from_old_url = true;
        input.update_sitemap = true;
        input.tags = vec!["kept".to_string()];

        let outcome = env.service.save(input.clone(), &editor()).await.expect("Save failed");
        let saved = outcome.page().unwrap().clone();
        assert_eq!(env.sink.redirects.lock().unwrap().len(), 1);
        assert_eq!(env.sink.updated_sitemaps.lock().unwrap().len(), 1);
        let lineage_before = lineage_of(&env, page.id).await;

        // Same submitted state with the refreshed token
        input.version = saved.version;
        let outcome = env.service.save(input, &editor()).await.expect("Save failed");
        assert!(!outcome.is_cancelled());

        let redirect_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM redirects")
            .fetch_one(&env.pool)
            .await
            .unwrap();
        assert_eq!(redirect_count.0, 1);
        assert_eq!(env.sink.redirects.lock().unwrap().len(), 1);
        assert_eq!(env.sink.updated_sitemaps.lock().unwrap().len(), 1);
        assert_eq!(env.sink.updated_nodes.lock().unwrap().len(), 1);
        assert_eq!(env.sink.created_tags.lock().unwrap().len(), 1);
        assert_eq!(lineage_of(&env, page.id).await, lineage_before);
    }

    // ------------------------------------------------------------------
    // Veto and notifications
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_veto_cancels_before_any_write() {
        let env = setup(false).await;
        let page = create_page(&env, "/old/", "Page").await;
        let sitemap_repo = SqlxSitemapRepository::new(env.pool.clone());
        let sitemap = sitemap_repo.create(&Sitemap::new("Main".to_string())).await.unwrap();
        sitemap_repo
            .create_node(&SitemapNode::new(sitemap.id, "Old".to_string(), "/old/".to_string()))
            .await
            .unwrap();

        let sink = Arc::new(RecordingEventSink::vetoing("content frozen"));
        let service = PagePropertiesService::new(
            env.pool.clone(),
            SecurityConfig {
                access_control_enabled: false,
            },
            sink.clone(),
        );

        let mut input = base_input(&page);
        input.title = "Changed".to_string();
        input.page_url = "/new/".to_string();
        input.redirect_from_old_url = true;
        input.update_sitemap = true;
        input.tags = vec!["tag".to_string()];

        let outcome = service.save(input, &editor()).await.expect("Save failed");
        match outcome {
            SaveOutcome::Cancelled { messages } => {
                assert_eq!(messages, vec!["content frozen".to_string()]);
            }
            SaveOutcome::Saved(_) => panic!("Save should have been cancelled"),
        }

        // Nothing was persisted: page, redirects, sitemap nodes and tags
        // are all untouched
        let current = reload(&env, page.id).await;
        assert_eq!(current.title, "Page");
        assert_eq!(current.page_url, "/old/");
        assert_eq!(current.version, page.version);

        let redirect_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM redirects")
            .fetch_one(&env.pool)
            .await
            .unwrap();
        assert_eq!(redirect_count.0, 0);

        let stale_nodes: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sitemap_nodes WHERE url = '/old/'")
                .fetch_one(&env.pool)
                .await
                .unwrap();
        assert_eq!(stale_nodes.0, 1);

        let tag_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tags")
            .fetch_one(&env.pool)
            .await
            .unwrap();
        assert_eq!(tag_count.0, 0);

        // No post-save notifications either
        assert!(sink.changed.lock().unwrap().is_empty());
        assert_eq!(sink.changing.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_veto_passes_before_and_after_snapshots() {
        let env = setup(false).await;
        let page = create_page(&env, "/old/", "Page").await;

        let mut input = base_input(&page);
        input.title = "New title".to_string();
        env.service.save(input, &editor()).await.expect("Save failed");

        let changing = env.sink.changing.lock().unwrap();
        assert_eq!(changing.len(), 1);
        let (before, after) = &changing[0];
        assert_eq!(before.title, "Page");
        assert_eq!(after.title, "New title");
    }

    #[tokio::test]
    async fn test_seo_status_change_notified() {
        let env = setup(false).await;
        let page = create_page(&env, "/page/", "Page").await;
        sqlx::query("UPDATE pages SET node_count_in_sitemap = 1 WHERE id = ?")
            .bind(page.id)
            .execute(&env.pool)
            .await
            .unwrap();
        let page = reload(&env, page.id).await;
        assert!(!page.has_seo());

        let mut input = base_input(&page);
        input.meta_title = "Title".to_string();
        input.meta_keywords = "key, words".to_string();
        input.meta_description = "Description".to_string();

        let outcome = env.service.save(input, &editor()).await.expect("Save failed");
        let saved = outcome.page().unwrap().clone();
        assert!(saved.has_seo());
        assert_eq!(env.sink.seo_changes.lock().unwrap().len(), 1);

        // Saving again without an SEO flip stays quiet
        let input = base_input(&saved);
        env.service.save(input, &editor()).await.expect("Save failed");
        assert_eq!(env.sink.seo_changes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_properties_changed_fires_on_every_successful_save() {
        let env = setup(false).await;
        let page = create_page(&env, "/page/", "Page").await;

        let outcome = env
            .service
            .save(base_input(&page), &editor())
            .await
            .expect("Save failed");
        let saved = outcome.page().unwrap().clone();
        env.service
            .save(base_input(&saved), &editor())
            .await
            .expect("Save failed");

        assert_eq!(env.sink.changed.lock().unwrap().len(), 2);
    }
}
