//! Services layer - Business logic
//!
//! This module contains all business logic services for the Corten CMS
//! core. Services are responsible for:
//! - Implementing business rules
//! - Coordinating between repositories
//! - Handling validation and error cases
//!
//! `page_properties` hosts the save workflow that orchestrates the rest.

pub mod access_control;
pub mod content;
pub mod master_page;
pub mod page;
pub mod page_option;
pub mod page_properties;
pub mod redirect;
pub mod sitemap;
pub mod tag;
pub mod url;

pub use access_control::{AccessControlError, AccessControlService};
pub use content::ContentService;
pub use master_page::{LineageChange, MasterPageService};
pub use page::{PageService, PageServiceError};
pub use page_option::{OptionDiff, OptionService};
pub use page_properties::{
    PagePropertiesError, PagePropertiesService, SaveOutcome, ValidationError,
};
pub use redirect::RedirectService;
pub use sitemap::SitemapService;
pub use tag::{TagPlan, TagService};
pub use url::UrlService;
