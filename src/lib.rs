//! Corten - a page-centric CMS core
//!
//! This library provides the domain layer of the Corten content-management
//! system: pages and their object graph (layouts, master page hierarchy,
//! redirects, sitemaps, tags, options, access rules) plus the transactional
//! page-properties save workflow. An HTTP surface is expected to sit on top.

pub mod config;
pub mod db;
pub mod events;
pub mod models;
pub mod services;
