//! Chrome stripping: turns a full site page into a standalone printable page.

use lazy_static::lazy_static;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::document::{parse_selectors, Document};
use crate::template;

lazy_static! {
    static ref BODY: Selector = Selector::parse("body").unwrap();
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractConfig {
    /// Candidates for the main content element, the first match wins
    #[serde(default = "default_content_selectors")]
    pub content_selectors: Vec<String>,

    /// Elements removed from the page before the content is selected
    #[serde(default = "default_remove_selectors")]
    pub remove_selectors: Vec<String>,

    /// Print stylesheet embedded in every page
    #[serde(default = "default_stylesheet")]
    pub stylesheet: String,

    /// Whether a "Source: <url>" line is added under the page title
    #[serde(default = "default_source_line")]
    pub source_line: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            content_selectors: default_content_selectors(),
            remove_selectors: default_remove_selectors(),
            stylesheet: default_stylesheet(),
            source_line: default_source_line(),
        }
    }
}

fn default_content_selectors() -> Vec<String> {
    ["main", "article", ".content", "#content", ".docs-content", "[role=\"main\"]"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_remove_selectors() -> Vec<String> {
    [
        "script",
        "style",
        "noscript",
        "iframe",
        "nav",
        "header",
        "footer",
        "aside",
        "[role=\"navigation\"]",
        ".navigation",
        ".sidebar",
        ".menu",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_stylesheet() -> String {
    template::DEFAULT_STYLESHEET.to_string()
}

fn default_source_line() -> bool {
    true
}

/// Compiled form of an [`ExtractConfig`].
#[derive(Debug, Clone)]
pub struct Extractor {
    content: Vec<Selector>,
    remove: Vec<Selector>,
    stylesheet: String,
    source_line: bool,
}

impl Extractor {
    pub fn new(config: &ExtractConfig) -> anyhow::Result<Self> {
        Ok(Self {
            content: parse_selectors(&config.content_selectors)?,
            remove: parse_selectors(&config.remove_selectors)?,
            stylesheet: config.stylesheet.clone(),
            source_line: config.source_line,
        })
    }

    /// Returns the main content of `doc`, chrome removed, as an HTML fragment.
    pub fn main_content(&self, doc: &Document) -> String {
        let mut html = doc.html.clone();
        strip(&mut html, &self.remove);

        let content = self
            .content
            .iter()
            .find_map(|selector| html.select(selector).next())
            .map(|element| element.html());

        match content {
            Some(content) => content,
            None => {
                log::debug!("No content selector matched, falling back to <body>");
                html.select(&BODY)
                    .next()
                    .map(|body| body.inner_html())
                    .unwrap_or_else(|| html.root_element().inner_html())
            }
        }
    }

    /// Builds the standalone page handed to the renderer.
    ///
    /// The page carries a `<base>` element pointing at `url` so relative images and
    /// stylesheets still resolve once the markup is detached from the site.
    pub fn clean(&self, doc: &Document, url: &Url, title: &str) -> String {
        let content = self.main_content(doc);
        template::page(
            &self.stylesheet,
            url,
            title,
            self.source_line,
            &content,
        )
    }
}

fn strip(html: &mut Html, selectors: &[Selector]) {
    for selector in selectors {
        let ids: Vec<_> = html.select(selector).map(|element| element.id()).collect();
        for id in ids {
            if let Some(mut node) = html.tree.get_mut(id) {
                node.detach();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html>
          <head>
            <title>Loops</title>
            <script>window.track()</script>
          </head>
          <body>
            <header>Site header</header>
            <div class="sidebar"><a href="/x">Sidebar link</a></div>
            <main>
              <h2>for</h2>
              <p>Loop <code>body</code>.</p>
              <script>console.log("inline")</script>
              <nav class="pager">Next page</nav>
            </main>
            <footer>Copyright</footer>
          </body>
        </html>
    "#;

    fn url() -> Url {
        Url::parse("https://example.com/docs/language/Loops/").unwrap()
    }

    #[test]
    fn main_content_drops_chrome() {
        let extractor = Extractor::new(&ExtractConfig::default()).unwrap();
        let content = extractor.main_content(&Document::parse(PAGE));
        assert!(content.starts_with("<main>"));
        assert!(content.contains("<h2>for</h2>"));
        assert!(!content.contains("console.log"));
        assert!(!content.contains("Next page"));
        assert!(!content.contains("Sidebar link"));
        assert!(!content.contains("Copyright"));
    }

    #[test]
    fn falls_back_to_body() {
        let extractor = Extractor::new(&ExtractConfig::default()).unwrap();
        let doc = Document::parse("<html><body><p>Just text</p><footer>f</footer></body></html>");
        let content = extractor.main_content(&doc);
        assert_eq!(content.trim(), "<p>Just text</p>");
    }

    #[test]
    fn clean_page_is_standalone() {
        let extractor = Extractor::new(&ExtractConfig::default()).unwrap();
        let page = extractor.clean(&Document::parse(PAGE), &url(), "Loops & <friends>");
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains(r#"<base href="https://example.com/docs/language/Loops/">"#));
        assert!(page.contains("<h1>Loops &amp; &lt;friends&gt;</h1>"));
        assert!(page.contains("Source: https://example.com/docs/language/Loops/"));
        assert!(page.contains("<h2>for</h2>"));
        assert!(!page.contains("window.track"));
    }

    #[test]
    fn source_line_can_be_disabled() {
        let config = ExtractConfig {
            source_line: false,
            ..Default::default()
        };
        let extractor = Extractor::new(&config).unwrap();
        let page = extractor.clean(&Document::parse(PAGE), &url(), "Loops");
        assert!(!page.contains("Source:"));
    }

    #[test]
    fn custom_selectors() {
        let config = ExtractConfig {
            content_selectors: vec![".pager".to_string()],
            remove_selectors: vec!["script".to_string()],
            ..Default::default()
        };
        let extractor = Extractor::new(&config).unwrap();
        let content = extractor.main_content(&Document::parse(PAGE));
        assert!(content.contains("Next page"));
        assert!(!content.contains("<h2>"));
    }
}
