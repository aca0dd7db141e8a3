use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions, Tab};
use url::Url;

use crate::config::{Engine, PageSize, RenderConfig};
use crate::plain::PlainRenderer;

/// Turns a standalone HTML page into a PDF document.
pub trait Renderer {
    fn name(&self) -> &'static str;

    /// Renders `html`, relative references being resolved against `base_url` when
    /// the markup carries no `<base>` element.
    fn render(&self, html: &str, base_url: Option<&Url>) -> Result<Vec<u8>>;
}

/// Opens the renderer selected by `config`, checking that it can actually run.
pub fn open_renderer(config: &RenderConfig) -> Result<Box<dyn Renderer>> {
    let renderer: Box<dyn Renderer> = match config.engine {
        Engine::Chrome => Box::new(ChromeRenderer::launch(config)?),
        Engine::Wkhtmltopdf | Engine::Weasyprint => Box::new(CommandRenderer::new(config)?),
        Engine::Plain => Box::new(PlainRenderer::new(config)),
    };
    log::info!("Rendering pages with {}", renderer.name());
    Ok(renderer)
}

pub struct ChromeRenderer {
    browser: Browser,
    page_size: PageSize,
    margin: f64,
    javascript_delay: Duration,
    print_background: bool,
}

impl ChromeRenderer {
    pub fn launch(config: &RenderConfig) -> Result<Self> {
        let options = LaunchOptions {
            headless: true,
            path: config.program.clone(),
            idle_browser_timeout: Duration::from_secs(600),
            ..Default::default()
        };
        let browser = Browser::new(options)
            .map_err(|e| anyhow!("Couldn't launch headless Chrome: {e}"))?;
        Ok(Self {
            browser,
            page_size: config.page_size,
            margin: config.margin as f64,
            javascript_delay: Duration::from_millis(config.javascript_delay),
            print_background: config.print_background,
        })
    }

    fn print_options(&self) -> PrintToPdfOptions {
        let (width, height) = self.page_size.inches();
        PrintToPdfOptions {
            landscape: Some(false),
            display_header_footer: Some(false),
            print_background: Some(self.print_background),
            paper_width: Some(width as f64),
            paper_height: Some(height as f64),
            margin_top: Some(self.margin),
            margin_bottom: Some(self.margin),
            margin_left: Some(self.margin),
            margin_right: Some(self.margin),
            prefer_css_page_size: Some(false),
            ..Default::default()
        }
    }
}

impl Renderer for ChromeRenderer {
    fn name(&self) -> &'static str {
        "chrome"
    }

    fn render(&self, html: &str, _base_url: Option<&Url>) -> Result<Vec<u8>> {
        let mut page = tempfile::Builder::new()
            .prefix("docbundle-")
            .suffix(".html")
            .tempfile()?;
        page.write_all(html.as_bytes())?;
        page.flush()?;
        let page_url = Url::from_file_path(page.path())
            .map_err(|_| anyhow!("Invalid temporary path {:?}", page.path()))?;

        let tab = self.browser.new_tab()?;
        let pdf = self.print(&tab, &page_url);
        if let Err(e) = tab.close(true) {
            log::debug!("Couldn't close tab: {e}");
        }
        pdf
    }
}

impl ChromeRenderer {
    fn print(&self, tab: &Tab, page_url: &Url) -> Result<Vec<u8>> {
        tab.navigate_to(page_url.as_str())?.wait_until_navigated()?;
        thread::sleep(self.javascript_delay);
        tab.print_to_pdf(Some(self.print_options()))
            .map_err(|e| anyhow!("Chrome couldn't print page: {e}"))
    }
}

/// Renders with an external converter reading HTML on stdin and writing PDF on stdout.
pub struct CommandRenderer {
    engine: Engine,
    program: PathBuf,
    page_size: PageSize,
    margin: f32,
    javascript_delay: u64,
    print_background: bool,
}

impl CommandRenderer {
    pub fn new(config: &RenderConfig) -> Result<Self> {
        let program = match (&config.program, config.engine) {
            (Some(program), _) => program.clone(),
            (None, Engine::Wkhtmltopdf) => PathBuf::from("wkhtmltopdf"),
            (None, Engine::Weasyprint) => PathBuf::from("weasyprint"),
            (None, engine) => bail!("{engine:?} is not an external command"),
        };

        let version = Command::new(&program)
            .arg("--version")
            .output()
            .with_context(|| format!("Couldn't run {program:?}, is it installed?"))?;
        if !version.status.success() {
            bail!("{program:?} --version failed with {}", version.status);
        }
        log::debug!(
            "Using {}",
            String::from_utf8_lossy(&version.stdout).trim()
        );

        Ok(Self {
            engine: config.engine,
            program,
            page_size: config.page_size,
            margin: config.margin,
            javascript_delay: config.javascript_delay,
            print_background: config.print_background,
        })
    }

    /// `@page` rule giving WeasyPrint the configured paper size and margins.
    fn page_css(&self) -> String {
        format!(
            "@page {{ size: {}; margin: {}in; }}\n",
            self.page_size.name(),
            self.margin
        )
    }

    fn args(&self, base_url: Option<&Url>, stylesheet: Option<&Path>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![];
        match self.engine {
            Engine::Weasyprint => {
                args.push("--quiet".into());
                if let Some(stylesheet) = stylesheet {
                    args.push("--stylesheet".into());
                    args.push(stylesheet.into());
                }
                if let Some(base_url) = base_url {
                    args.push("--base-url".into());
                    args.push(base_url.as_str().into());
                }
            }
            _ => {
                let margin = format!("{}in", self.margin);
                args.push("--quiet".into());
                args.push("--page-size".into());
                args.push(self.page_size.name().into());
                for side in ["top", "right", "bottom", "left"] {
                    args.push(format!("--margin-{side}").into());
                    args.push(margin.clone().into());
                }
                args.extend(
                    [
                        "--encoding",
                        "UTF-8",
                        "--no-outline",
                        "--enable-local-file-access",
                        "--no-stop-slow-scripts",
                        "--load-error-handling",
                        "ignore",
                        "--load-media-error-handling",
                        "ignore",
                        "--javascript-delay",
                    ]
                    .into_iter()
                    .map(OsString::from),
                );
                args.push(self.javascript_delay.to_string().into());
                if !self.print_background {
                    args.push("--no-background".into());
                }
            }
        }
        args.push("-".into());
        args.push("-".into());
        args
    }
}

impl Renderer for CommandRenderer {
    fn name(&self) -> &'static str {
        match self.engine {
            Engine::Weasyprint => "weasyprint",
            _ => "wkhtmltopdf",
        }
    }

    fn render(&self, html: &str, base_url: Option<&Url>) -> Result<Vec<u8>> {
        let stylesheet = match self.engine {
            Engine::Weasyprint => {
                let mut css = tempfile::Builder::new()
                    .prefix("docbundle-")
                    .suffix(".css")
                    .tempfile()?;
                css.write_all(self.page_css().as_bytes())?;
                css.flush()?;
                Some(css)
            }
            _ => None,
        };
        let stylesheet_path = stylesheet.as_ref().map(|css| css.path());

        let mut child = Command::new(&self.program)
            .args(self.args(base_url, stylesheet_path))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Couldn't start {:?}", self.program))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("No stdin for {:?}", self.program))?;
        let html = html.to_string();
        let writer = thread::spawn(move || stdin.write_all(html.as_bytes()));

        let output = child.wait_with_output()?;
        if let Ok(Err(e)) = writer.join() {
            log::debug!("Couldn't write whole page to {:?}: {e}", self.program);
        }

        let is_pdf = output.stdout.starts_with(b"%PDF");
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !is_pdf {
                bail!("{} failed with {}: {}", self.name(), output.status, stderr.trim());
            }
            log::warn!("{} exited with {}: {}", self.name(), output.status, stderr.trim());
        } else if !is_pdf {
            bail!("{} produced no PDF", self.name());
        }
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer(engine: Engine) -> CommandRenderer {
        CommandRenderer {
            engine,
            program: PathBuf::from("converter"),
            page_size: PageSize::Letter,
            margin: 0.5,
            javascript_delay: 1000,
            print_background: false,
        }
    }

    #[test]
    fn wkhtmltopdf_args() {
        let args = renderer(Engine::Wkhtmltopdf).args(None, Some(Path::new("/tmp/page.css")));
        let args: Vec<&str> = args.iter().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(&args[..3], &["--quiet", "--page-size", "Letter"]);
        assert!(args.windows(2).any(|w| w == ["--margin-left", "0.5in"]));
        assert!(args.windows(2).any(|w| w == ["--javascript-delay", "1000"]));
        assert!(args.contains(&"--no-background"));
        assert!(!args.contains(&"--stylesheet"));
        assert_eq!(&args[args.len() - 2..], &["-", "-"]);
    }

    #[test]
    fn weasyprint_args() {
        let base = Url::parse("https://example.com/docs/").unwrap();
        let css = Path::new("/tmp/page.css");
        let args = renderer(Engine::Weasyprint).args(Some(&base), Some(css));
        let args: Vec<&str> = args.iter().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(
            args,
            vec![
                "--quiet",
                "--stylesheet",
                "/tmp/page.css",
                "--base-url",
                "https://example.com/docs/",
                "-",
                "-"
            ]
        );
    }

    #[test]
    fn weasyprint_page_rule() {
        assert_eq!(
            renderer(Engine::Weasyprint).page_css(),
            "@page { size: Letter; margin: 0.5in; }\n"
        );
        let a4 = CommandRenderer {
            page_size: PageSize::A4,
            margin: 0.75,
            ..renderer(Engine::Weasyprint)
        };
        assert_eq!(a4.page_css(), "@page { size: A4; margin: 0.75in; }\n");
    }

    #[test]
    fn missing_program_is_a_setup_error() {
        let config = RenderConfig {
            engine: Engine::Wkhtmltopdf,
            program: Some(PathBuf::from("/nonexistent/docbundle-converter")),
            ..Default::default()
        };
        assert!(open_renderer(&config).is_err());
    }

    #[test]
    fn plain_engine_needs_no_program() {
        let config = RenderConfig {
            engine: Engine::Plain,
            ..Default::default()
        };
        assert_eq!(open_renderer(&config).unwrap().name(), "plain");
    }
}
