//! Shared test utilities for the htaccess manager workspace.
//!
//! A dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`site`]: [`TestSite`], a temporary site directory holding a managed
//!   file, its backup and a config file

pub mod site;

pub use site::{TestSite, WORDPRESS_BLOCK};
