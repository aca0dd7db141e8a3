mod batch;
mod bundler;
mod config;
mod local;
mod output;
mod section;
mod sidecar;

pub use batch::batch_by_size;
pub use bundler::{render_page, Page, PdfBundler};
pub use config::{BundlerConfig, Section, SectionRule, SeedConfig};
pub use local::bundle_local;
pub use output::{sanitize_filename, write_bundles, OutputFile};
pub use section::Sectioner;
pub use sidecar::write_metadata;

pub use anyhow;
