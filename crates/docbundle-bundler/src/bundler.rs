use std::path::Path;

use anyhow::{anyhow, Context, Result};
use docbundle_crawler::{
    CrawlingContext, PageLocation, Scrapable, ScrapingContext, Seed, Sitemap, UrlSource,
};
use docbundle_html::{Document, Extractor};
use docbundle_pdf::{open_renderer, Renderer};
use serde::Serialize;
use url::Url;

use crate::config::{BundlerConfig, SeedConfig};
use crate::output::{write_bundles, OutputFile};
use crate::section::Sectioner;
use crate::sidecar::write_metadata;

/// Extensions of links that never lead to a documentation page.
const ASSET_EXTENSIONS: [&str; 26] = [
    "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "bmp", "pdf", "zip", "gz", "tgz",
    "tar", "bz2", "xz", "7z", "css", "js", "woff", "woff2", "ttf", "otf", "eot", "mp3",
    "mp4", "webm",
];

/// A rendered documentation page.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub url: String,
    pub title: String,
    pub section: String,
    /// Size in bytes of the rendered PDF
    pub size: u64,
    #[serde(skip)]
    pub pdf: Vec<u8>,
}

/// Renders every scraped page and writes them as size-bounded bundles once the crawl ends.
pub struct PdfBundler {
    config: BundlerConfig,
    seed: Seed,
    curated: bool,
    scope: Option<Url>,
    extractor: Extractor,
    renderer: Box<dyn Renderer>,
    sectioner: Sectioner,
    pages: Vec<Page>,
}

impl Scrapable for PdfBundler {
    type Config = BundlerConfig;

    fn new(config: &Self::Config) -> Result<Self> {
        let scope = match (&config.scope, config.seed.first_url()) {
            (Some(scope), _) => Some(as_directory(
                Url::parse(scope).with_context(|| format!("Invalid scope {scope:?}"))?,
            )),
            (None, Some(first)) => Url::parse(first)
                .and_then(|url| url.join("./"))
                .ok(),
            (None, None) => None,
        };
        if let Some(scope) = &scope {
            log::debug!("Following links within {scope}");
        }

        let (seed, curated) = match &config.seed {
            SeedConfig::Pages(urls) => (Seed::Pages(urls.clone()), false),
            SeedConfig::Sitemaps(urls) => (Seed::Sitemaps(urls.clone()), false),
            SeedConfig::RobotsTxt(url) => (Seed::RobotsTxt(url.clone()), false),
            SeedConfig::Sections(sections) => {
                let urls = sections
                    .iter()
                    .flat_map(|section| section.urls.iter().cloned())
                    .collect();
                (Seed::Pages(urls), true)
            }
        };

        Ok(Self {
            seed,
            curated,
            extractor: Extractor::new(&config.extract)?,
            renderer: open_renderer(&config.render)?,
            sectioner: Sectioner::new(
                &config.seed,
                &config.section_rules,
                scope.clone(),
                config.local_root.clone(),
            ),
            scope,
            config: config.clone(),
            pages: vec![],
        })
    }

    fn seed(&self) -> Seed {
        self.seed.clone()
    }

    fn accept(&self, url: &Url, crawling_ctx: CrawlingContext) -> bool {
        match crawling_ctx.source {
            UrlSource::Sitemap(Sitemap::Index) => true,
            UrlSource::Link { .. } if self.curated => false,
            _ => !is_asset(url) && self.in_scope(url),
        }
    }

    fn scrap(&mut self, page: String, scraping_ctx: ScrapingContext) -> Result<()> {
        let page = self.render(&page, &scraping_ctx)?;
        log::info!(
            "Rendered {} ({}, {} bytes)",
            page.url,
            page.section,
            page.size
        );
        self.pages.push(page);
        Ok(())
    }

    fn finalizer(&mut self) -> Result<()> {
        self.finish().map(|_| ())
    }
}

impl PdfBundler {
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    fn in_scope(&self, url: &Url) -> bool {
        match &self.scope {
            Some(scope) => url.as_str().starts_with(scope.as_str()),
            None => true,
        }
    }

    /// Cleans and renders one page, without recording it.
    pub fn render(&self, page: &str, scraping_ctx: &ScrapingContext) -> Result<Page> {
        let (url, section, fallback) = match &scraping_ctx.location {
            PageLocation::Url(url) => (url.clone(), self.sectioner.label_url(url), last_segment(url)),
            PageLocation::Path(path) => {
                let absolute = fs_err::canonicalize(path)?;
                let url = Url::from_file_path(&absolute)
                    .map_err(|_| anyhow!("Invalid file path {}", absolute.display()))?;
                (url, self.sectioner.label_path(path), file_stem(path))
            }
        };

        let doc = Document::parse(page);
        let title = doc
            .title()
            .or_else(|| scraping_ctx.link_text.clone())
            .unwrap_or(fallback);
        let html = self.extractor.clean(&doc, &url, &title);

        let pdf = self
            .renderer
            .render(&html, Some(&url))
            .with_context(|| format!("Couldn't render {url}"))?;

        Ok(Page {
            url: url.to_string(),
            title,
            section,
            size: pdf.len() as u64,
            pdf,
        })
    }

    /// Writes the bundles of every page rendered so far, then the metadata sidecar.
    pub fn finish(&mut self) -> Result<Vec<OutputFile>> {
        if self.pages.is_empty() {
            log::warn!("No page rendered, nothing to bundle");
            return Ok(vec![]);
        }

        let outputs = write_bundles(&self.config, self.renderer.as_ref(), &self.pages)?;
        if let Some(metadata_file) = &self.config.metadata_file {
            let path = self.config.output_dir.join(metadata_file);
            write_metadata(&path, &self.pages, &outputs)?;
            log::info!("Metadata saved to {}", path.display());
        }
        Ok(outputs)
    }
}

/// Renders a single page outside of any crawl.
pub fn render_page(config: &BundlerConfig, page: &str, location: PageLocation) -> Result<Page> {
    let bundler = PdfBundler::new(config)?;
    bundler.render(page, &ScrapingContext::with_location(location))
}

fn is_asset(url: &Url) -> bool {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    match last.rsplit_once('.') {
        Some((_, ext)) => ASSET_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

/// `https://x.com/docs` becomes `https://x.com/docs/`, so that `/docs-old/` is out of scope.
fn as_directory(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn last_segment(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(String::from)
        .or_else(|| url.host_str().map(String::from))
        .unwrap_or_else(|| url.to_string())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbundle_pdf::{Engine, RenderConfig};

    fn config(seed: SeedConfig) -> BundlerConfig {
        BundlerConfig {
            seed,
            render: RenderConfig {
                engine: Engine::Plain,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn link() -> CrawlingContext {
        CrawlingContext {
            depth: 1,
            source: UrlSource::Link {
                from: url("https://example.com/docs/"),
                text: "Loops".into(),
            },
        }
    }

    #[test]
    fn scope_defaults_to_seed_directory() {
        let bundler = PdfBundler::new(&config(SeedConfig::Pages(vec![
            "https://example.com/docs/welcome.html".into(),
        ])))
        .unwrap();
        assert!(bundler.accept(&url("https://example.com/docs/language/Loops/"), link()));
        assert!(!bundler.accept(&url("https://example.com/blog/"), link()));
        assert!(!bundler.accept(&url("https://other.com/docs/"), link()));
    }

    #[test]
    fn assets_are_rejected() {
        let bundler = PdfBundler::new(&config(SeedConfig::Pages(vec![
            "https://example.com/docs/".into(),
        ])))
        .unwrap();
        assert!(!bundler.accept(&url("https://example.com/docs/img/logo.PNG"), link()));
        assert!(!bundler.accept(&url("https://example.com/docs/manual.pdf"), link()));
        assert!(!bundler.accept(&url("https://example.com/docs/assets/app.js"), link()));
        assert!(bundler.accept(&url("https://example.com/docs/v5.0/page.html"), link()));
    }

    #[test]
    fn sitemap_index_entries_are_followed() {
        let bundler = PdfBundler::new(&config(SeedConfig::Sitemaps(vec![
            "https://example.com/sitemap.xml".into(),
        ])))
        .unwrap();
        let ctx = |kind| CrawlingContext {
            depth: 0,
            source: UrlSource::Sitemap(kind),
        };
        let child = url("https://example.com/sitemaps/docs.xml");
        assert!(bundler.accept(&child, ctx(Sitemap::Index)));
        assert!(bundler.accept(&url("https://example.com/docs/a/"), ctx(Sitemap::Urlset)));
    }

    #[test]
    fn curated_sections_follow_no_links() {
        let bundler = PdfBundler::new(&config(SeedConfig::Sections(vec![crate::Section {
            name: "Language".into(),
            urls: vec!["https://example.com/docs/language/".into()],
        }])))
        .unwrap();
        assert!(matches!(bundler.seed(), Seed::Pages(urls) if urls.len() == 1));
        assert!(!bundler.accept(&url("https://example.com/docs/language/Loops/"), link()));
    }

    #[test]
    fn title_fallbacks() {
        let bundler = PdfBundler::new(&config(SeedConfig::Pages(vec![
            "https://example.com/docs/".into(),
        ])))
        .unwrap();
        let location = PageLocation::Url(url("https://example.com/docs/language/Loops/"));

        let page = bundler
            .render(
                "<html><head><title> Loops | Docs </title></head><body><p>x</p></body></html>",
                &ScrapingContext::with_location(location.clone()),
            )
            .unwrap();
        assert_eq!(page.title, "Loops | Docs");
        assert_eq!(page.section, "language");
        assert_eq!(page.size, page.pdf.len() as u64);

        let mut ctx = ScrapingContext::with_location(location.clone());
        ctx.link_text = Some("Loops link".into());
        let page = bundler.render("<p>x</p>", &ctx).unwrap();
        assert_eq!(page.title, "Loops link");

        let page = bundler
            .render("<p>x</p>", &ScrapingContext::with_location(location))
            .unwrap();
        assert_eq!(page.title, "Loops");
    }

    #[test]
    fn scope_is_a_directory() {
        let mut config = config(SeedConfig::Pages(vec!["https://example.com/".into()]));
        config.scope = Some("https://example.com/docs".into());
        let bundler = PdfBundler::new(&config).unwrap();
        assert!(bundler.accept(&url("https://example.com/docs/language/"), link()));
        assert!(!bundler.accept(&url("https://example.com/docs-old/language/"), link()));
        assert!(!bundler.accept(&url("https://example.com/docsify.html"), link()));
    }

    #[test]
    fn invalid_scope_is_a_setup_error() {
        let mut config = config(SeedConfig::default());
        config.scope = Some("not a url".into());
        assert!(PdfBundler::new(&config).is_err());
    }
}
