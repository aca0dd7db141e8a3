use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use docbundle_bundler::{bundle_local, render_page, BundlerConfig, PdfBundler, SeedConfig};
use docbundle_crawler::{
    crawl_site, BrowserConfig, CrawlerConfig, Fetcher, OnError, PageLocation, Throttle, Url,
};
use docbundle_pdf::{split_by_size, Engine};
use env_logger::Env;
use fs_err::{self as fs, File};
use tokio::runtime;

const DEFAULT_LOG_FILTER: &str = "docbundle=info,headless_chrome=warn";

const MIB: f64 = 1024.0 * 1024.0;

/// Documentation sites to size-bounded PDF bundles
#[derive(Debug, Parser)]
#[clap(version)]
pub struct Args {
    /// When quiet no logs are outputted
    #[clap(long, short, global = true)]
    pub quiet: bool,
    #[clap(subcommand)]
    pub cmd: SubCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum SubCommand {
    #[clap(name = "crawl")]
    Crawl(CrawlArgs),
    #[clap(name = "render")]
    Render(RenderArgs),
    #[clap(name = "local")]
    Local(LocalArgs),
    #[clap(name = "split")]
    Split(SplitArgs),
    #[clap(hide = true)]
    Completion,
}

/// Options shared by every command producing bundles
#[derive(Debug, clap::Args)]
pub struct BundleArgs {
    /// Optional bundler yaml configuration file
    #[clap(env = "DOCBUNDLE_BUNDLE_CONFIG", parse(from_os_str), long)]
    pub bundle_config: Option<PathBuf>,
    /// Override the output directory
    #[clap(parse(from_os_str), long, short)]
    pub output_dir: Option<PathBuf>,
    /// Override the prefix of the output file names
    #[clap(long)]
    pub file_prefix: Option<String>,
    /// Override the heading of cover pages
    #[clap(long)]
    pub title: Option<String>,
    /// Override the maximum size of the pages of one output file, in MiB
    #[clap(long)]
    pub max_bundle_mb: Option<f64>,
    /// Override the size in MiB above which a merged file is split again
    #[clap(long)]
    pub max_file_mb: Option<f64>,
    /// Override the rendering engine
    #[clap(arg_enum, long)]
    pub engine: Option<Engine>,
    /// Override the path of the engine's program
    #[clap(parse(from_os_str), long)]
    pub program: Option<PathBuf>,
    /// No cover page in front of output files
    #[clap(long)]
    pub no_cover: bool,
    /// No JSON metadata file
    #[clap(long)]
    pub no_metadata: bool,
}

impl TryFrom<&BundleArgs> for BundlerConfig {
    type Error = anyhow::Error;

    fn try_from(args: &BundleArgs) -> Result<Self, Self::Error> {
        let mut conf = if let Some(file) = args.bundle_config.as_ref().map(File::open) {
            serde_yaml::from_reader(file?)?
        } else {
            BundlerConfig::default()
        };
        if let Some(output_dir) = &args.output_dir {
            conf.output_dir = output_dir.clone();
        }
        if let Some(file_prefix) = &args.file_prefix {
            conf.file_prefix = file_prefix.to_string();
        }
        if let Some(title) = &args.title {
            conf.title = title.to_string();
        }
        if let Some(max_bundle_mb) = args.max_bundle_mb {
            conf.max_bundle_size = mib_to_bytes(max_bundle_mb)?;
        }
        if let Some(max_file_mb) = args.max_file_mb {
            conf.max_file_size = mib_to_bytes(max_file_mb)?;
        }
        if let Some(engine) = args.engine {
            conf.render.engine = engine;
        }
        if let Some(program) = &args.program {
            conf.render.program = Some(program.clone());
        }
        if args.no_cover {
            conf.cover_page = false;
        }
        if args.no_metadata {
            conf.metadata_file = None;
        }
        Ok(conf)
    }
}

fn mib_to_bytes(mib: f64) -> anyhow::Result<u64> {
    if !mib.is_finite() || mib <= 0.0 {
        bail!("Invalid size {mib} MiB");
    }
    Ok((mib * MIB) as u64)
}

/// Crawl a documentation site and bundle its pages as PDF files
#[derive(Debug, clap::Args)]
pub struct CrawlArgs {
    /// Pages to start crawling from
    #[clap(conflicts_with_all = &["sitemap", "robots-txt"])]
    pub urls: Vec<String>,
    /// Seed the crawl with the pages listed in a sitemap
    #[clap(long, multiple_occurrences = true, conflicts_with = "robots-txt")]
    pub sitemap: Vec<String>,
    /// Seed the crawl with the sitemaps listed in a robots.txt
    #[clap(long)]
    pub robots_txt: Option<String>,
    /// Optional default crawler yaml configuration file
    #[clap(env = "DOCBUNDLE_CRAWLER_CONFIG", parse(from_os_str), long)]
    pub crawler_config: Option<PathBuf>,
    /// Override crawler's user agent
    #[clap(long)]
    pub user_agent: Option<String>,
    /// Override crawler's delay in seconds between two requests
    #[clap(long)]
    pub delay: Option<f32>,
    /// Override crawler's per request timeout in seconds
    #[clap(long)]
    pub timeout: Option<u64>,
    /// Override crawler's number of attempts per download
    #[clap(long)]
    pub retries: Option<usize>,
    /// Override crawler's maximum number of fetched pages
    #[clap(long)]
    pub max_pages: Option<usize>,
    /// Override crawler's maximum link depth
    #[clap(long)]
    pub max_depth: Option<usize>,
    /// Only fetch the seed pages, don't follow their links
    #[clap(long)]
    pub no_follow: bool,
    /// Fetch pages with a headless browser first
    #[clap(long)]
    pub browser: bool,
    /// Only follow links within this URL prefix
    #[clap(long)]
    pub scope: Option<String>,
    /// No SIGINT handling, pages rendered so far won't be bundled
    #[clap(long)]
    pub no_sigint: bool,
    /// Override crawler's download error handling strategy
    #[clap(arg_enum, long)]
    pub on_dl_error: Option<OnError>,
    /// Override crawler's xml error handling strategy
    #[clap(arg_enum, long)]
    pub on_xml_error: Option<OnError>,
    /// Override crawler's scrap error handling strategy
    #[clap(arg_enum, long)]
    pub on_scrap_error: Option<OnError>,
    #[clap(flatten)]
    pub bundle: BundleArgs,
}

impl TryFrom<&CrawlArgs> for CrawlerConfig {
    type Error = anyhow::Error;

    fn try_from(args: &CrawlArgs) -> Result<Self, Self::Error> {
        let mut conf = if let Some(file) = args.crawler_config.as_ref().map(File::open) {
            serde_yaml::from_reader(file?)?
        } else {
            CrawlerConfig::default()
        };
        if let Some(user_agent) = &args.user_agent {
            conf.user_agent = user_agent.to_string();
        }
        if let Some(delay) = args.delay {
            conf.throttle = (delay > 0.0).then(|| Throttle::Delay(delay));
        }
        if let Some(timeout) = args.timeout {
            conf.timeout = timeout;
        }
        if let Some(retries) = args.retries {
            conf.retries = retries;
        }
        if let Some(max_pages) = args.max_pages {
            conf.max_pages = Some(max_pages);
        }
        if let Some(max_depth) = args.max_depth {
            conf.max_depth = Some(max_depth);
        }
        if args.no_follow {
            conf.follow_links = false;
        }
        if args.browser && conf.browser.is_none() {
            conf.browser = Some(BrowserConfig::default());
        }
        if let Some(on_dl_error) = args.on_dl_error {
            conf.on_dl_error = on_dl_error;
        }
        if let Some(on_xml_error) = args.on_xml_error {
            conf.on_xml_error = on_xml_error;
        }
        if let Some(on_scrap_error) = args.on_scrap_error {
            conf.on_scrap_error = on_scrap_error;
        }
        if args.no_sigint {
            conf.handle_sigint = false;
        }
        Ok(conf)
    }
}

impl TryFrom<&CrawlArgs> for BundlerConfig {
    type Error = anyhow::Error;

    fn try_from(args: &CrawlArgs) -> Result<Self, Self::Error> {
        let mut conf = BundlerConfig::try_from(&args.bundle)?;
        if !args.urls.is_empty() {
            conf.seed = SeedConfig::Pages(args.urls.clone());
        } else if !args.sitemap.is_empty() {
            conf.seed = SeedConfig::Sitemaps(args.sitemap.clone());
        } else if let Some(robots_txt) = &args.robots_txt {
            conf.seed = SeedConfig::RobotsTxt(robots_txt.clone());
        }
        if let Some(scope) = &args.scope {
            conf.scope = Some(scope.clone());
        }
        Ok(conf)
    }
}

pub fn crawl(args: CrawlArgs) -> anyhow::Result<()> {
    let crawler_conf: CrawlerConfig = (&args).try_into()?;
    let bundler_conf: BundlerConfig = (&args).try_into()?;
    if bundler_conf.seed.first_url().is_none() {
        bail!("Nothing to crawl, give seed URLs, --sitemap or --robots-txt");
    }
    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
    let stats = rt.block_on(crawl_site::<PdfBundler>(&crawler_conf, &bundler_conf))?;
    if stats.interrupted {
        log::warn!("Crawl interrupted, bundles only hold the pages rendered before");
    }
    Ok(())
}

/// Render a single page as a PDF file
#[derive(Debug, clap::Args)]
#[clap(group = clap::ArgGroup::new("page").required(true))]
pub struct RenderArgs {
    /// A local html page to render
    #[clap(group = "page", parse(from_os_str), long)]
    pub file: Option<PathBuf>,
    /// A distant html page to render
    #[clap(group = "page", long)]
    pub url: Option<String>,
    /// Custom user agent to download the page
    #[clap(long, conflicts_with = "file")]
    pub ua: Option<String>,
    /// Path of the PDF file to write
    #[clap(parse(from_os_str), long = "output", short = 'O')]
    pub output: PathBuf,
    #[clap(flatten)]
    pub bundle: BundleArgs,
}

pub fn render(args: RenderArgs) -> anyhow::Result<()> {
    let conf = BundlerConfig::try_from(&args.bundle)?;
    let (page, location) = if let Some(url) = args.url {
        let url = Url::parse(&url).with_context(|| format!("Invalid URL {url:?}"))?;
        let mut crawler_conf = CrawlerConfig::default();
        if let Some(ua) = args.ua {
            crawler_conf.user_agent = ua;
        }
        let fetcher = Fetcher::new(&crawler_conf)?;
        let rt = runtime::Builder::new_multi_thread().enable_all().build()?;
        let page = rt.block_on(fetcher.fetch(&url))?;
        (page, PageLocation::Url(url))
    } else if let Some(path) = args.file {
        let page = fs::read_to_string(&path)?;
        (page, PageLocation::Path(path))
    } else {
        bail!("Missing `url` or `file`");
    };

    let page = render_page(&conf, &page, location)?;
    fs::write(&args.output, &page.pdf)?;
    log::info!(
        "Rendered {:?} to {} ({} bytes)",
        page.title,
        args.output.display(),
        page.size
    );
    Ok(())
}

/// Bundle a tree of local html files
#[derive(Debug, clap::Args)]
pub struct LocalArgs {
    /// Glob pattern of the html files, such as `site/**/*.html`
    pub pattern: String,
    /// Directory the sections are computed from, the pattern's base directory by default
    #[clap(parse(from_os_str), long)]
    pub local_root: Option<PathBuf>,
    #[clap(flatten)]
    pub bundle: BundleArgs,
}

pub fn local(args: LocalArgs) -> anyhow::Result<()> {
    let mut conf = BundlerConfig::try_from(&args.bundle)?;
    if let Some(local_root) = args.local_root {
        conf.local_root = Some(local_root);
    }
    let outputs = bundle_local(&conf, &args.pattern)?;
    if outputs.is_empty() {
        bail!("No bundle created from {:?}", args.pattern);
    }
    Ok(())
}

/// Split an existing PDF file in parts of bounded size
#[derive(Debug, clap::Args)]
pub struct SplitArgs {
    /// The PDF file to split
    #[clap(parse(from_os_str))]
    pub file: PathBuf,
    /// Target size of a part, in MiB
    #[clap(long, default_value = "14")]
    pub max_mb: f64,
    /// Directory of the parts, the file's directory by default
    #[clap(parse(from_os_str), long, short)]
    pub output_dir: Option<PathBuf>,
}

pub fn split(args: SplitArgs) -> anyhow::Result<()> {
    let pdf = fs::read(&args.file)?;
    let parts = split_by_size(&pdf, mib_to_bytes(args.max_mb)?)?;
    if parts.len() == 1 {
        log::info!("{} is small enough, nothing to split", args.file.display());
        return Ok(());
    }

    let output_dir = match &args.output_dir {
        Some(dir) => dir.clone(),
        None => args
            .file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    fs::create_dir_all(&output_dir)?;
    let stem = args
        .file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("split"));
    for (i, part) in parts.iter().enumerate() {
        let path = output_dir.join(format!("{stem}_part{}.pdf", i + 1));
        fs::write(&path, part)?;
        log::info!("Created {} ({} bytes)", path.display(), part.len());
    }
    Ok(())
}

fn init_logger(quiet: bool) {
    if !quiet {
        env_logger::Builder::from_env(Env::default().default_filter_or(DEFAULT_LOG_FILTER)).init();
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logger(args.quiet);

    match args.cmd {
        SubCommand::Crawl(args) => crawl(args),
        SubCommand::Render(args) => render(args),
        SubCommand::Local(args) => local(args),
        SubCommand::Split(args) => split(args),
        SubCommand::Completion => {
            generate(Shell::Bash, &mut Args::command(), "docbundle", &mut io::stdout());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn crawl_args(args: &[&str]) -> CrawlArgs {
        let args = Args::try_parse_from(["docbundle", "crawl"].iter().chain(args)).unwrap();
        match args.cmd {
            SubCommand::Crawl(args) => args,
            cmd => panic!("Unexpected command {cmd:?}"),
        }
    }

    #[test]
    fn command_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn crawler_overrides() {
        let args = crawl_args(&[
            "https://example.com/docs/",
            "--delay",
            "0",
            "--max-pages",
            "10",
            "--no-follow",
            "--browser",
            "--on-dl-error",
            "fail",
            "--no-sigint",
        ]);
        let conf = CrawlerConfig::try_from(&args).unwrap();
        assert!(conf.throttle.is_none());
        assert_eq!(conf.max_pages, Some(10));
        assert!(!conf.follow_links);
        assert!(conf.browser.is_some());
        assert_eq!(conf.on_dl_error, OnError::Fail);
        assert_eq!(conf.on_scrap_error, OnError::SkipAndLog);
        assert!(!conf.handle_sigint);
    }

    #[test]
    fn bundle_overrides() {
        let args = crawl_args(&[
            "--sitemap",
            "https://example.com/sitemap.xml",
            "--output-dir",
            "out",
            "--max-bundle-mb",
            "2",
            "--engine",
            "plain",
            "--no-cover",
            "--no-metadata",
        ]);
        let conf = BundlerConfig::try_from(&args).unwrap();
        assert!(matches!(conf.seed, SeedConfig::Sitemaps(ref urls) if urls.len() == 1));
        assert_eq!(conf.output_dir, PathBuf::from("out"));
        assert_eq!(conf.max_bundle_size, 2 * 1024 * 1024);
        assert_eq!(conf.render.engine, Engine::Plain);
        assert!(!conf.cover_page);
        assert_eq!(conf.metadata_file, None);
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "seed:\n  pages:\n    - https://example.com/docs/\nfilePrefix: PineScript\ntitle: Manual"
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let conf = BundlerConfig::try_from(&crawl_args(&["--bundle-config", path])).unwrap();
        assert_eq!(conf.seed.first_url(), Some("https://example.com/docs/"));
        assert_eq!(conf.file_prefix, "PineScript");

        let conf = BundlerConfig::try_from(&crawl_args(&[
            "https://example.com/other/",
            "--bundle-config",
            path,
            "--title",
            "Other",
        ]))
        .unwrap();
        assert_eq!(conf.seed.first_url(), Some("https://example.com/other/"));
        assert_eq!(conf.file_prefix, "PineScript");
        assert_eq!(conf.title, "Other");
    }

    #[test]
    fn seed_kinds_conflict() {
        assert!(Args::try_parse_from([
            "docbundle",
            "crawl",
            "https://example.com/",
            "--sitemap",
            "https://example.com/sitemap.xml",
        ])
        .is_err());
    }

    #[test]
    fn invalid_sizes() {
        assert!(mib_to_bytes(0.0).is_err());
        assert!(mib_to_bytes(-1.0).is_err());
        assert_eq!(mib_to_bytes(0.5).unwrap(), 512 * 1024);
    }
}
