//! Page service

use crate::db::repositories::PageRepository;
use crate::models::Page;
use crate::services::UrlService;
use anyhow::Context;
use std::sync::Arc;

/// Error types for page service operations
#[derive(Debug, thiserror::Error)]
pub enum PageServiceError {
    /// The URL is not a valid internal page URL
    #[error("Invalid page URL: {0}")]
    InvalidUrl(String),

    /// Another page already owns the URL
    #[error("Page URL already in use: {0}")]
    DuplicateUrl(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct PageService {
    repo: Arc<dyn PageRepository>,
    url_service: UrlService,
}

impl PageService {
    pub fn new(repo: Arc<dyn PageRepository>) -> Self {
        Self {
            repo,
            url_service: UrlService::new(),
        }
    }

    pub async fn get_by_url(&self, url: &str) -> Result<Option<Page>, PageServiceError> {
        let url = self.url_service.fix_url(url);
        self.repo
            .get_by_url(&url)
            .await
            .context("Failed to get page by url")
            .map_err(Into::into)
    }

    /// Validate that a normalized URL is well-formed and not owned by
    /// another page.
    pub async fn validate_page_url(
        &self,
        url: &str,
        excluding_page_id: i64,
    ) -> Result<(), PageServiceError> {
        if !self.url_service.is_valid_url(url) {
            return Err(PageServiceError::InvalidUrl(url.to_string()));
        }

        let taken = self
            .repo
            .url_taken(url, excluding_page_id)
            .await
            .context("Failed to check url uniqueness")?;
        if taken {
            return Err(PageServiceError::DuplicateUrl(url.to_string()));
        }

        Ok(())
    }
}
