use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use docbundle_html::{parse_selectors, Document, Link, Selector};
use lazy_static::lazy_static;
use sxd_document::parser;
use texting_robots::Robot;
use url::Url;

use crate::config::{seconds, CrawlerConfig, OnError, MAX_WAIT};
use crate::fetch::{blocking, Fetcher};
use crate::scrapable::{
    CrawlingContext, PageLocation, Scrapable, ScrapingContext, Seed, Sitemap, UrlSource,
};
use crate::throttle::Pacer;

/// Deepest chain of nested sitemap indexes that is expanded.
const MAX_SITEMAP_DEPTH: usize = 8;

lazy_static! {
    static ref XP_FACTORY: sxd_xpath::Factory = sxd_xpath::Factory::new();
}

/// Outcome of a crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Pages downloaded
    pub fetched: usize,
    /// Pages successfully handed to the scraper
    pub scraped: usize,
    /// Pages that failed to download or to scrap
    pub skipped: usize,
    /// Whether the crawl was stopped by Ctrl-C
    pub interrupted: bool,
}

/// FIFO of URLs to visit, each URL being queued at most once.
#[derive(Debug, Default)]
struct Frontier {
    queue: VecDeque<(Url, CrawlingContext)>,
    seen: HashSet<String>,
}

impl Frontier {
    fn push(&mut self, url: Url, ctx: CrawlingContext) -> bool {
        if self.seen.insert(url.as_str().to_string()) {
            self.queue.push_back((url, ctx));
            true
        } else {
            false
        }
    }

    fn contains(&self, url: &Url) -> bool {
        self.seen.contains(url.as_str())
    }

    fn pop(&mut self) -> Option<(Url, CrawlingContext)> {
        self.queue.pop_front()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

struct Crawler<'a> {
    conf: &'a CrawlerConfig,
    fetcher: Fetcher,
    pacer: Pacer,
    robot: Option<Robot>,
    link_selectors: Vec<Selector>,
    frontier: Frontier,
    sitemaps: HashSet<String>,
    stats: CrawlStats,
    interrupted: Arc<AtomicBool>,
}

impl<'a> Crawler<'a> {
    async fn run<T>(&mut self, scraper: &mut T, seed: Seed) -> Result<()>
    where
        T: Scrapable,
    {
        match seed {
            Seed::Pages(urls) => {
                for page_url in urls {
                    let mut url = Url::parse(&page_url)
                        .with_context(|| format!("Invalid seed URL {page_url:?}"))?;
                    url.set_fragment(None);
                    self.frontier.push(url, CrawlingContext::seed());
                }
            }
            Seed::Sitemaps(urls) => {
                for sm_url in urls {
                    self.gather_urls(&*scraper, &sm_url, 0).await?;
                }
            }
            Seed::RobotsTxt(robots_url) => {
                let sitemaps = self
                    .robot
                    .as_ref()
                    .map(|robot| robot.sitemaps.clone())
                    .unwrap_or_default();
                if sitemaps.is_empty() {
                    log::warn!("No sitemap listed in {robots_url}");
                }
                for sm_url in sitemaps {
                    self.gather_urls(&*scraper, &sm_url, 0).await?;
                }
            }
        }

        while let Some((url, ctx)) = self.frontier.pop() {
            if self.interrupted.load(Ordering::SeqCst) {
                log::warn!("Interrupted, {} queued pages left", self.frontier.len() + 1);
                self.stats.interrupted = true;
                break;
            }
            if let Some(max_pages) = self.conf.max_pages {
                if self.stats.fetched >= max_pages {
                    log::info!("Reached the maximum of {max_pages} pages");
                    break;
                }
            }

            self.pacer.wait().await;
            let page = match self.fetcher.fetch(&url).await {
                Ok(page) => page,
                Err(e) => match self.conf.on_dl_error {
                    OnError::SkipAndLog => {
                        log::warn!("Skipping URL: {url} got: {e:#}");
                        self.stats.skipped += 1;
                        continue;
                    }
                    OnError::Fail => return Err(e),
                },
            };
            self.stats.fetched += 1;
            log::info!(
                "[{}] {url} (depth {}, {} queued)",
                self.stats.fetched,
                ctx.depth,
                self.frontier.len()
            );

            let follow = self.conf.follow_links
                && self.conf.max_depth.map_or(true, |max| ctx.depth < max);
            if follow {
                self.discover(&*scraper, &url, &page, ctx.depth);
            }

            let scraping_ctx = ScrapingContext {
                link_text: ctx.link_text().map(String::from),
                location: PageLocation::Url(url.clone()),
                depth: ctx.depth,
            };
            match blocking(|| scraper.scrap(page, scraping_ctx)) {
                Ok(()) => self.stats.scraped += 1,
                Err(e) => match self.conf.on_scrap_error {
                    OnError::SkipAndLog => {
                        log::error!("Skipping scrap for page {url} got: {e:#}");
                        self.stats.skipped += 1;
                    }
                    OnError::Fail => return Err(e.context(format!("Couldn't scrap {url}"))),
                },
            }
        }

        Ok(())
    }

    fn discover<T>(&mut self, scraper: &T, from: &Url, page: &str, depth: usize)
    where
        T: Scrapable,
    {
        let links = Document::parse(page).links(from, &self.link_selectors);
        for Link { url, text } in links {
            if self.frontier.contains(&url) || !self.allowed(&url) {
                continue;
            }
            let ctx = CrawlingContext {
                depth: depth + 1,
                source: UrlSource::Link {
                    from: from.clone(),
                    text,
                },
            };
            if scraper.accept(&url, ctx.clone()) {
                self.frontier.push(url, ctx);
            }
        }
    }

    fn allowed(&self, url: &Url) -> bool {
        match &self.robot {
            Some(robot) => {
                let allowed = robot.allowed(url.as_str());
                if !allowed {
                    log::debug!("Disallowed by robots.txt: {url}");
                }
                allowed
            }
            None => true,
        }
    }

    fn gather_urls<'b, T>(
        &'b mut self,
        scraper: &'b T,
        sitemap_url: &'b str,
        nesting: usize,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + 'b>>
    where
        T: Scrapable,
    {
        Box::pin(async move {
            if nesting > MAX_SITEMAP_DEPTH {
                log::warn!("Skipping sitemap: {sitemap_url} nested too deep");
                return Ok(());
            }
            if !self.sitemaps.insert(sitemap_url.to_string()) {
                log::warn!("Skipping sitemap: {sitemap_url} already expanded");
                return Ok(());
            }

            let sitemap_xml = match self.download(sitemap_url).await {
                Ok(xml) => xml,
                Err(e) => match self.conf.on_dl_error {
                    OnError::SkipAndLog => {
                        log::warn!("Skipping sitemap: {sitemap_url} got: {e:#}");
                        return Ok(());
                    }
                    OnError::Fail => return Err(e),
                },
            };

            let (sm_kind, locs) = match read_sitemap(&sitemap_xml) {
                Ok(sitemap) => sitemap,
                Err(e) => match self.conf.on_xml_error {
                    OnError::SkipAndLog => {
                        log::warn!("Skipping XML: {sitemap_url} got: {e}");
                        return Ok(());
                    }
                    OnError::Fail => {
                        return Err(anyhow!("Couldn't parse {sitemap_url} got: {e}"))
                    }
                },
            };

            let ctx = CrawlingContext {
                depth: 0,
                source: UrlSource::Sitemap(sm_kind),
            };
            for loc in locs {
                let mut url = match Url::parse(&loc) {
                    Ok(url) => url,
                    Err(e) => {
                        log::warn!("Skipping invalid URL {loc:?} in {sitemap_url}: {e}");
                        continue;
                    }
                };
                url.set_fragment(None);
                if !scraper.accept(&url, ctx.clone()) {
                    continue;
                }
                match sm_kind {
                    Sitemap::Index => {
                        self.gather_urls(scraper, url.as_str(), nesting + 1).await?
                    }
                    Sitemap::Urlset => {
                        if self.allowed(&url) {
                            self.frontier.push(url, ctx.clone());
                        }
                    }
                }
            }

            Ok(())
        })
    }

    async fn download(&mut self, url: &str) -> Result<String> {
        let url = Url::parse(url).with_context(|| format!("Invalid URL {url:?}"))?;
        self.pacer.wait().await;
        self.fetcher.download(&url).await
    }
}

/// Returns the kind of a sitemap and the content of its `<loc>` elements.
fn read_sitemap(xml: &str) -> Result<(Sitemap, Vec<String>)> {
    let package = parser::parse(xml).map_err(|e| anyhow!("{e}"))?;
    let document = package.as_document();

    let sm_kind = Sitemap::try_from(document.root())?;

    let mut context = sxd_xpath::Context::new();
    context.set_namespace("sm", "http://www.sitemaps.org/schemas/sitemap/0.9");
    let xpath = XP_FACTORY
        .build("//sm:loc")?
        .ok_or_else(|| anyhow!("Missing XPath"))?;
    let value = xpath
        .evaluate(&context, document.root())
        .map_err(|e| anyhow!("Couldn't evaluate {xpath:?} got: {e}"))?;

    let locs = match value {
        sxd_xpath::Value::Nodeset(nodes) => nodes
            .document_order()
            .iter()
            .map(|node| node.string_value().trim().to_string())
            .filter(|loc| !loc.is_empty())
            .collect(),
        _ => vec![],
    };

    Ok((sm_kind, locs))
}

async fn load_robot(fetcher: &Fetcher, conf: &CrawlerConfig, robots_url: &str) -> Result<Robot> {
    let url = Url::parse(robots_url).with_context(|| format!("Invalid URL {robots_url:?}"))?;
    let txt = fetcher.download(&url).await?;
    Robot::new(&conf.user_agent, txt.as_bytes())
        .map_err(|e| anyhow!("Couldn't parse {robots_url} got: {e}"))
}

fn listen_sigint(interrupted: Arc<AtomicBool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Ctrl-C received, stopping after the current page");
            interrupted.store(true, Ordering::SeqCst);
        }
    })
}

/// Crawls the site seeded by `T`, handing every fetched page to a `T` scraper.
///
/// The scraper's finalizer is always called once the crawl ends, including when it
/// failed or was interrupted, before the crawl error (if any) is returned.
pub async fn crawl_site<T>(
    crawler_conf: &CrawlerConfig,
    scraper_conf: &T::Config,
) -> anyhow::Result<CrawlStats>
where
    T: Scrapable,
{
    let mut scraper = <T as Scrapable>::new(scraper_conf)?;
    let seed = scraper.seed();

    let robots_url = match (&seed, &crawler_conf.robot) {
        (Seed::RobotsTxt(_), Some(_)) => panic!(
            "Invalid seed config, cannot use Seed::RobotsTxt when `crawler_conf.robot` is defined"
        ),
        (Seed::RobotsTxt(url), None) => Some(url.clone()),
        (_, robot) => robot.clone(),
    };

    let fetcher = Fetcher::new(crawler_conf)?;
    let link_selectors = parse_selectors(&crawler_conf.link_selectors)?;
    let mut pacer = Pacer::new(crawler_conf.throttle);

    let robot = match robots_url {
        Some(robots_url) => match load_robot(&fetcher, crawler_conf, &robots_url).await {
            Ok(robot) => Some(robot),
            Err(e) => match crawler_conf.on_dl_error {
                OnError::SkipAndLog => {
                    log::warn!("Ignoring robots.txt: {e:#}");
                    None
                }
                OnError::Fail => return Err(e),
            },
        },
        None => None,
    };
    if let Some(delay) = robot.as_ref().and_then(|robot| robot.delay) {
        match seconds(delay) {
            Some(interval) => {
                log::info!("Using robots.txt crawl delay of {delay}s");
                pacer.raise(interval);
            }
            None => log::warn!("Ignoring robots.txt crawl delay of {delay}s, over {MAX_WAIT:?}"),
        }
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    let sigint = crawler_conf
        .handle_sigint
        .then(|| listen_sigint(interrupted.clone()));

    let mut crawler = Crawler {
        conf: crawler_conf,
        fetcher,
        pacer,
        robot,
        link_selectors,
        frontier: Frontier::default(),
        sitemaps: HashSet::new(),
        stats: CrawlStats::default(),
        interrupted,
    };
    let res = crawler.run(&mut scraper, seed).await;

    if let Some(sigint) = sigint {
        sigint.abort();
    }
    let fin = blocking(|| scraper.finalizer());
    if let (Err(_), Err(e)) = (&res, &fin) {
        log::error!("Finalizer failed after crawl error: {e:#}");
    }
    res?;
    fin?;

    log::info!(
        "Crawl done: {} fetched, {} scraped, {} skipped",
        crawler.stats.fetched,
        crawler.stats.scraped,
        crawler.stats.skipped
    );
    Ok(crawler.stats)
}
