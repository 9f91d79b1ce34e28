//! Redirect service

use crate::db::repositories::RedirectRepository;
use crate::models::Redirect;
use crate::services::UrlService;
use anyhow::Result;
use sqlx::SqliteConnection;
use std::sync::Arc;

pub struct RedirectService {
    repo: Arc<dyn RedirectRepository>,
    url_service: UrlService,
}

impl RedirectService {
    pub fn new(repo: Arc<dyn RedirectRepository>) -> Self {
        Self {
            repo,
            url_service: UrlService::new(),
        }
    }

    /// Build a redirect entity for a URL change.
    ///
    /// Returns `None` when the normalized URLs are identical and no
    /// redirect is needed.
    pub fn create_redirect_entity(&self, from_url: &str, to_url: &str) -> Option<Redirect> {
        let from = self.url_service.fix_url(from_url);
        let to = self.url_service.fix_url(to_url);

        if self.url_service.urls_equal(&from, &to) {
            return None;
        }

        Some(Redirect::new(from, to))
    }

    /// Persist a redirect inside the caller's transaction.
    pub async fn save_in(&self, conn: &mut SqliteConnection, redirect: &Redirect) -> Result<Redirect> {
        self.repo.create_in(conn, redirect).await
    }
}
