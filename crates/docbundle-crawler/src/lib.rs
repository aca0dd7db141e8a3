mod config;
mod crawler;
mod fetch;
mod scrapable;
mod throttle;

pub use config::{BrowserConfig, CrawlerConfig, OnError, Throttle};
pub use crawler::{crawl_site, CrawlStats};
pub use fetch::Fetcher;
pub use scrapable::{
    CrawlingContext, PageLocation, Scrapable, ScrapingContext, Seed, Sitemap, UrlSource,
};
pub use throttle::Pacer;

pub use anyhow;
pub use url::Url;
