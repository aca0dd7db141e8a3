//! HTML parsing and querying for documentation pages.
//!
//! Wraps the `scraper` crate with the handful of queries a documentation crawler
//! needs: page title, link discovery and chrome stripping into a standalone page.

pub mod document;
pub mod extract;
pub mod template;
pub mod text;

pub use crate::document::{parse_selectors, Document, Link};
pub use crate::extract::{ExtractConfig, Extractor};
pub use crate::template::{cover_page, CoverEntry};
pub use crate::text::plain_text;

pub use scraper::Selector;
