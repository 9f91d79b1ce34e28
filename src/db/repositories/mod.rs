//! Data access repositories
//!
//! Each repository is a trait with a `Sqlx*` implementation over the shared
//! pool. Methods ending in `_in` take a `&mut SqliteConnection` so callers
//! can group writes into one transaction.

mod access_rule;
mod content;
mod layout;
mod master_page;
mod page;
mod page_option;
mod redirect;
mod sitemap;
mod tag;

pub use access_rule::{AccessRuleRepository, SqlxAccessRuleRepository};
pub use content::{ContentRepository, SqlxContentRepository};
pub use layout::{LayoutRepository, SqlxLayoutRepository};
pub use master_page::{MasterPageRepository, SqlxMasterPageRepository};
pub use page::{PageGraph, PageRepository, SqlxPageRepository};
pub use page_option::{PageOptionRepository, SqlxPageOptionRepository};
pub use redirect::{RedirectRepository, SqlxRedirectRepository};
pub use sitemap::{SitemapRepository, SqlxSitemapRepository};
pub use tag::{SqlxTagRepository, TagRepository};
