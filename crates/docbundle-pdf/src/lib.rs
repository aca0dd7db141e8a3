//! PDF side of the bundler: rendering HTML pages to PDF and assembling the
//! rendered documents into bundles.

mod assemble;
mod config;
mod plain;
mod render;

pub use assemble::{extract_pages, merge, page_count, split_by_size};
pub use config::{Engine, PageSize, RenderConfig};
pub use plain::PlainRenderer;
pub use render::{open_renderer, ChromeRenderer, CommandRenderer, Renderer};
