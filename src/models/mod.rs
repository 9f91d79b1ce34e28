//! Data models
//!
//! This module contains all data structures used throughout the Corten CMS
//! core. Models represent:
//! - Database entities (Page, Layout, MasterPage, Redirect, Sitemap, Tag, ...)
//! - Save workflow input types
//! - The caller principal and its roles

mod access;
mod content;
mod layout;
mod master_page;
mod page;
mod page_option;
mod principal;
mod redirect;
mod sitemap;
mod tag;

pub use access::{AccessLevel, AccessRule, AccessRuleInput};
pub use content::{ContentStatus, PageContent};
pub use layout::{Layout, LayoutOption};
pub use master_page::MasterPage;
pub use page::{EditPagePropertiesInput, Page, PageStatus};
pub use page_option::{OptionValueInput, PageOption};
pub use principal::{Principal, Role};
pub use redirect::Redirect;
pub use sitemap::{Sitemap, SitemapNode};
pub use tag::Tag;
