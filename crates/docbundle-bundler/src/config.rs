use std::path::PathBuf;

use docbundle_html::ExtractConfig;
use docbundle_pdf::RenderConfig;
use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundlerConfig {
    #[serde(default)]
    pub seed: SeedConfig,

    /// URL prefix a discovered link must start with, the directory of the first seed by default
    #[serde(default)]
    pub scope: Option<String>,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Heading of the cover pages
    #[serde(default = "default_title")]
    pub title: String,

    /// Ceiling in bytes of the cumulated page sizes of an output file
    #[serde(default = "default_max_bundle_size")]
    pub max_bundle_size: u64,

    /// Merged files larger than this are split again by page count
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    #[serde(default = "default_cover_page")]
    pub cover_page: bool,

    /// Name of the JSON sidecar written in `output_dir`, none when null
    #[serde(default = "default_metadata_file")]
    pub metadata_file: Option<String>,

    /// Substring rules mapping page URLs to sections, the first match wins
    #[serde(default)]
    pub section_rules: Vec<SectionRule>,

    /// Root of the local HTML tree, sections of local pages are their directory under it
    #[serde(default)]
    pub local_root: Option<PathBuf>,

    #[serde(default)]
    pub extract: ExtractConfig,

    #[serde(default)]
    pub render: RenderConfig,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            seed: SeedConfig::default(),
            scope: None,
            output_dir: default_output_dir(),
            file_prefix: default_file_prefix(),
            title: default_title(),
            max_bundle_size: default_max_bundle_size(),
            max_file_size: default_max_file_size(),
            cover_page: default_cover_page(),
            metadata_file: default_metadata_file(),
            section_rules: vec![],
            local_root: None,
            extract: ExtractConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("pdf_output")
}

fn default_file_prefix() -> String {
    String::from("docs")
}

fn default_title() -> String {
    String::from("Documentation")
}

fn default_max_bundle_size() -> u64 {
    14 * MIB
}

fn default_max_file_size() -> u64 {
    15 * MIB
}

fn default_cover_page() -> bool {
    true
}

fn default_metadata_file() -> Option<String> {
    Some(String::from("metadata.json"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SeedConfig {
    Pages(Vec<String>),
    Sitemaps(Vec<String>),
    RobotsTxt(String),
    /// Curated sections, crawled in order without following links
    Sections(Vec<Section>),
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self::Pages(vec![])
    }
}

impl SeedConfig {
    pub fn first_url(&self) -> Option<&str> {
        match self {
            Self::Pages(urls) | Self::Sitemaps(urls) => urls.first().map(String::as_str),
            Self::RobotsTxt(url) => Some(url),
            Self::Sections(sections) => sections
                .iter()
                .flat_map(|section| section.urls.first())
                .next()
                .map(String::as_str),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionRule {
    pub pattern: String,
    pub label: String,
}
