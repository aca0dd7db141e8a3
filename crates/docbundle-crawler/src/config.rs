use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_throttle")]
    pub throttle: Option<Throttle>,

    /// Per request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Number of attempts for a single download
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// Attempt `n` waits `backoff * 2^n` seconds before the next one
    #[serde(default = "default_backoff")]
    pub backoff: f32,

    #[serde(default)]
    pub max_pages: Option<usize>,

    #[serde(default)]
    pub max_depth: Option<usize>,

    #[serde(default = "default_follow_links")]
    pub follow_links: bool,

    /// CSS selectors of the elements whose anchors are followed, every anchor when empty
    #[serde(default)]
    pub link_selectors: Vec<String>,

    /// URL of a robots.txt used to filter out disallowed pages
    #[serde(default)]
    pub robot: Option<String>,

    /// Fetch pages with a headless browser first, plain HTTP being the fallback
    #[serde(default)]
    pub browser: Option<BrowserConfig>,

    #[serde(default = "default_on_dl_error")]
    pub on_dl_error: OnError,

    #[serde(default = "default_on_xml_error")]
    pub on_xml_error: OnError,

    #[serde(default = "default_on_scrap_error")]
    pub on_scrap_error: OnError,

    #[serde(default = "default_handle_sigint")]
    pub handle_sigint: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            throttle: default_throttle(),
            timeout: default_timeout(),
            retries: default_retries(),
            backoff: default_backoff(),
            max_pages: None,
            max_depth: None,
            follow_links: default_follow_links(),
            link_selectors: vec![],
            robot: None,
            browser: None,
            on_dl_error: default_on_dl_error(),
            on_xml_error: default_on_xml_error(),
            on_scrap_error: default_on_scrap_error(),
            handle_sigint: default_handle_sigint(),
        }
    }
}

fn default_user_agent() -> String {
    String::from(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    )
}

fn default_throttle() -> Option<Throttle> {
    Some(Throttle::Delay(0.5))
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> usize {
    3
}

fn default_backoff() -> f32 {
    1.0
}

fn default_follow_links() -> bool {
    true
}

fn default_on_dl_error() -> OnError {
    OnError::SkipAndLog
}

fn default_on_xml_error() -> OnError {
    OnError::SkipAndLog
}

fn default_on_scrap_error() -> OnError {
    OnError::SkipAndLog
}

fn default_handle_sigint() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ArgEnum))]
pub enum OnError {
    Fail,
    SkipAndLog,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Throttle {
    /// The number of requests per second
    PerSecond(NonZeroUsize),
    /// The delay in seconds between requests
    Delay(f32),
}

impl Throttle {
    /// Minimum interval between the start of two consecutive requests.
    pub fn interval(&self) -> Duration {
        match *self {
            Self::PerSecond(n) => {
                Duration::from_secs(1) / u32::try_from(n.get()).unwrap_or(u32::MAX)
            }
            Self::Delay(secs) => seconds(secs).unwrap_or(MAX_WAIT),
        }
    }
}

/// Longest single wait the crawler accepts, whether configured or asked by a robots.txt.
pub const MAX_WAIT: Duration = Duration::from_secs(3600);

/// Converts a number of seconds to a [`Duration`].
///
/// Negative and NaN values count as zero. `None` when longer than [`MAX_WAIT`].
pub(crate) fn seconds(secs: f32) -> Option<Duration> {
    if secs.is_nan() || secs <= 0.0 {
        return Some(Duration::ZERO);
    }
    Duration::try_from_secs_f32(secs)
        .ok()
        .filter(|wait| *wait <= MAX_WAIT)
}

impl Default for Throttle {
    fn default() -> Self {
        Self::Delay(0.5)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserConfig {
    /// CSS selector awaited once the page is loaded
    #[serde(default = "default_wait_for")]
    pub wait_for: String,

    /// Seconds to wait for `wait_for` before reading the page anyway
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout: u64,

    /// Extra seconds given to scripts still filling the page
    #[serde(default = "default_settle")]
    pub settle: f32,

    #[serde(default)]
    pub window_size: Option<(u32, u32)>,

    /// Chrome executable, looked up on the system when unset
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            wait_for: default_wait_for(),
            wait_timeout: default_wait_timeout(),
            settle: default_settle(),
            window_size: None,
            chrome_path: None,
        }
    }
}

fn default_wait_for() -> String {
    String::from("article")
}

fn default_wait_timeout() -> u64 {
    10
}

fn default_settle() -> f32 {
    2.0
}
