use std::path::PathBuf;

use anyhow::anyhow;
use sxd_document::dom;
use url::Url;

pub trait Scrapable {
    type Config: Clone;

    fn new(config: &Self::Config) -> anyhow::Result<Self>
    where
        Self: Sized;

    fn seed(&self) -> Seed;

    fn accept(&self, url: &Url, crawling_ctx: CrawlingContext) -> bool;

    fn scrap(&mut self, page: String, scraping_ctx: ScrapingContext) -> anyhow::Result<()>;

    fn finalizer(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum Seed {
    Pages(Vec<String>),
    Sitemaps(Vec<String>),
    RobotsTxt(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sitemap {
    Index,
    Urlset,
}

impl<'a> TryFrom<dom::Root<'a>> for Sitemap {
    type Error = anyhow::Error;

    fn try_from(root: dom::Root<'a>) -> Result<Self, Self::Error> {
        let element = root
            .children()
            .into_iter()
            .find_map(|child| child.element())
            .ok_or_else(|| anyhow!("Sitemap has no root element"))?;

        match element.name().local_part() {
            "sitemapindex" => Ok(Self::Index),
            "urlset" => Ok(Self::Urlset),
            kind => Err(anyhow!("Unknown root node kind: {kind}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageLocation {
    Url(Url),
    Path(PathBuf),
}

/// How a URL reached the crawler.
#[derive(Debug, Clone)]
pub enum UrlSource {
    Seed,
    Sitemap(Sitemap),
    Link { from: Url, text: String },
}

#[derive(Debug, Clone)]
pub struct CrawlingContext {
    pub depth: usize,
    pub source: UrlSource,
}

impl CrawlingContext {
    pub fn seed() -> Self {
        Self {
            depth: 0,
            source: UrlSource::Seed,
        }
    }

    pub fn link_text(&self) -> Option<&str> {
        match &self.source {
            UrlSource::Link { text, .. } if !text.is_empty() => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrapingContext {
    pub location: PageLocation,
    pub depth: usize,
    pub link_text: Option<String>,
}

impl ScrapingContext {
    pub fn with_location(location: PageLocation) -> Self {
        Self {
            location,
            depth: 0,
            link_text: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(xml: &str) -> anyhow::Result<Sitemap> {
        let package = sxd_document::parser::parse(xml).map_err(|e| anyhow!("{e}"))?;
        let document = package.as_document();
        let kind = Sitemap::try_from(document.root());
        kind
    }

    #[test]
    fn sitemap_kind() {
        let index = r#"<?xml version="1.0"?>
            <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"/>"#;
        assert_eq!(kind(index).unwrap(), Sitemap::Index);
        let urlset = r#"<!-- generated --><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"/>"#;
        assert_eq!(kind(urlset).unwrap(), Sitemap::Urlset);
        assert!(kind("<rss/>").is_err());
    }

    #[test]
    fn link_text_only_for_links() {
        assert_eq!(CrawlingContext::seed().link_text(), None);
        let ctx = CrawlingContext {
            depth: 1,
            source: UrlSource::Link {
                from: Url::parse("https://example.com/").unwrap(),
                text: "Loops".into(),
            },
        };
        assert_eq!(ctx.link_text(), Some("Loops"));
    }
}
