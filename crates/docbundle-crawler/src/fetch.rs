use std::io::prelude::*;
use std::time::Duration;

use anyhow::{anyhow, Result};
use flate2::read::GzDecoder;
use headless_chrome::{Browser, LaunchOptions, Tab};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tokio::runtime::{Handle, RuntimeFlavor};
use url::Url;

use crate::config::{seconds, BrowserConfig, CrawlerConfig, MAX_WAIT};

/// Downloads pages, with a headless browser when configured and plain HTTP otherwise.
pub struct Fetcher {
    client: reqwest::Client,
    retries: usize,
    backoff: f32,
    browser: Option<BrowserFetcher>,
}

impl Fetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .gzip(true)
            .deflate(true)
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout))
            .build()?;

        let browser = config.browser.as_ref().and_then(|browser_conf| {
            match BrowserFetcher::launch(browser_conf, &config.user_agent) {
                Ok(browser) => Some(browser),
                Err(e) => {
                    log::warn!("Couldn't start headless browser, using plain HTTP only: {e}");
                    None
                }
            }
        });

        Ok(Self {
            client,
            retries: config.retries,
            backoff: config.backoff,
            browser,
        })
    }

    pub fn has_browser(&self) -> bool {
        self.browser.is_some()
    }

    /// Fetches the markup of `url`.
    ///
    /// Pages are rendered by the headless browser when one is running, so that
    /// client-side content is present. A browser failure falls back to [`Self::download`].
    pub async fn fetch(&self, url: &Url) -> Result<String> {
        if let Some(browser) = &self.browser {
            match blocking(|| browser.fetch(url)) {
                Ok(page) => return Ok(page),
                Err(e) => log::warn!("Browser fetch failed for {url}, falling back to HTTP: {e}"),
            }
        }
        self.download(url).await
    }

    /// Plain HTTP GET, retried with exponential backoff on transient failures.
    pub async fn download(&self, url: &Url) -> Result<String> {
        let attempts = self.retries.max(1);
        let mut attempt = 0;
        loop {
            match self.try_download(url).await {
                Ok(page) => return Ok(page),
                Err(e) if attempt + 1 < attempts && is_transient(&e) => {
                    let backoff = self.backoff * 2f32.powi(attempt as i32);
                    let wait = seconds(backoff).unwrap_or(MAX_WAIT);
                    log::debug!(
                        "Attempt {} for {url} failed, retrying in {wait:?}: {e}",
                        attempt + 1
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e.context(format!(
                        "Couldn't download {url} ({} attempts)",
                        attempt + 1
                    )))
                }
            }
        }
    }

    async fn try_download(&self, url: &Url) -> Result<String> {
        let resp = self.client.get(url.clone()).send().await?.error_for_status()?;

        let page = match resp.headers().get(CONTENT_TYPE) {
            Some(c) if c == "application/x-gzip" || c == "application/gzip" => {
                let compressed = resp.bytes().await?;
                let mut gz = GzDecoder::new(&compressed[..]);
                let mut page = String::new();
                gz.read_to_string(&mut page)?;
                page
            }
            _ => resp.text().await?,
        };

        Ok(page)
    }
}

/// Runs blocking work from async code, letting the other tasks of a multi-thread
/// runtime move to another worker meanwhile.
pub(crate) fn blocking<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(f),
        _ => f(),
    }
}

fn is_transient(e: &anyhow::Error) -> bool {
    match e.downcast_ref::<reqwest::Error>() {
        Some(e) => match e.status() {
            Some(status) => status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
            None => true,
        },
        None => false,
    }
}

struct BrowserFetcher {
    browser: Browser,
    config: BrowserConfig,
    user_agent: String,
}

impl BrowserFetcher {
    fn launch(config: &BrowserConfig, user_agent: &str) -> Result<Self> {
        let options = LaunchOptions {
            headless: true,
            window_size: config.window_size,
            path: config.chrome_path.clone(),
            idle_browser_timeout: Duration::from_secs(600),
            ..Default::default()
        };
        let browser = Browser::new(options)?;
        log::info!("Headless browser started");
        Ok(Self {
            browser,
            config: config.clone(),
            user_agent: user_agent.to_string(),
        })
    }

    fn fetch(&self, url: &Url) -> Result<String> {
        let tab = self.browser.new_tab()?;
        let content = self.read_tab(&tab, url);
        if let Err(e) = tab.close(true) {
            log::debug!("Couldn't close tab for {url}: {e}");
        }
        content
    }

    fn read_tab(&self, tab: &Tab, url: &Url) -> Result<String> {
        tab.set_user_agent(&self.user_agent, None, None)?;
        tab.navigate_to(url.as_str())?.wait_until_navigated()?;

        let timeout = Duration::from_secs(self.config.wait_timeout);
        if let Err(e) = tab.wait_for_element_with_custom_timeout(&self.config.wait_for, timeout) {
            log::debug!("No `{}` in {url}: {e}", self.config.wait_for);
        }
        std::thread::sleep(seconds(self.config.settle).unwrap_or(MAX_WAIT));

        tab.get_content()
            .map_err(|e| anyhow!("Couldn't read page source of {url}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocking_outside_a_runtime() {
        assert_eq!(blocking(|| 1 + 1), 2);
    }

    #[tokio::test]
    async fn blocking_on_current_thread() {
        assert_eq!(blocking(|| 1 + 1), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn blocking_on_multi_thread() {
        let mut calls = 0;
        blocking(|| calls += 1);
        assert_eq!(calls, 1);
    }
}
