//! Parsed HTML documents.

use std::collections::HashSet;

use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use url::Url;

lazy_static! {
    static ref TITLE: Selector = Selector::parse("title").unwrap();
    static ref ANCHOR: Selector = Selector::parse("a[href]").unwrap();
}

/// Compiles a list of CSS selectors, failing on the first invalid one.
pub fn parse_selectors(selectors: &[String]) -> anyhow::Result<Vec<Selector>> {
    selectors
        .iter()
        .map(|s| {
            Selector::parse(s).map_err(|e| anyhow::anyhow!("Invalid CSS selector {s:?}: {e:?}"))
        })
        .collect()
}

/// A hyperlink found in a page, already resolved to an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: Url,
    pub text: String,
}

/// An HTML page.
///
/// Parsing never fails: malformed markup yields a best-effort tree.
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) html: Html,
}

impl Document {
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
        }
    }

    /// Returns the trimmed text of the `<title>` element, if it has any.
    pub fn title(&self) -> Option<String> {
        self.html
            .select(&TITLE)
            .next()
            .map(|title| collapse_whitespace(&title.text().collect::<String>()))
            .filter(|title| !title.is_empty())
    }

    /// Returns the http(s) links of the page in document order.
    ///
    /// Links are resolved against `base` and stripped of their fragment, so that
    /// `page#a` and `page#b` yield a single `page` link. When `containers` is not
    /// empty only anchors nested in one of the matching elements are considered.
    pub fn links(&self, base: &Url, containers: &[Selector]) -> Vec<Link> {
        let anchors: Vec<ElementRef> = if containers.is_empty() {
            self.html.select(&ANCHOR).collect()
        } else {
            containers
                .iter()
                .flat_map(|container| self.html.select(container))
                .flat_map(|container| container.select(&ANCHOR))
                .collect()
        };

        let mut seen = HashSet::new();
        anchors
            .into_iter()
            .filter_map(|anchor| {
                let href = anchor.value().attr("href")?.trim();
                if href.is_empty() || href.starts_with('#') {
                    return None;
                }
                let mut url = base.join(href).ok()?;
                if url.scheme() != "http" && url.scheme() != "https" {
                    return None;
                }
                url.set_fragment(None);
                let text = collapse_whitespace(&anchor.text().collect::<String>());
                Some(Link { url, text })
            })
            .filter(|link| seen.insert(link.url.to_string()))
            .collect()
    }
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"
        <html>
          <head><title>
            Execution model
          </title></head>
          <body>
            <nav>
              <a href="/docs/language/">Language</a>
              <a href="Time_series/">Time   series</a>
            </nav>
            <main>
              <a href="#anchor">Skip me</a>
              <a href="../concepts/Alerts/#alert-functions">Alerts</a>
              <a href="../concepts/Alerts/#other">Alerts again</a>
              <a href="mailto:docs@example.com">Mail</a>
              <a href="javascript:void(0)">Script</a>
              <a href="https://other.example.com/page">External</a>
            </main>
          </body>
        </html>
    "##;

    fn base() -> Url {
        Url::parse("https://example.com/docs/language/Execution_model/").unwrap()
    }

    #[test]
    fn title_is_trimmed() {
        let doc = Document::parse(PAGE);
        assert_eq!(doc.title().as_deref(), Some("Execution model"));
    }

    #[test]
    fn empty_title_is_none() {
        let doc = Document::parse("<html><head><title>  </title></head></html>");
        assert_eq!(doc.title(), None);
        let doc = Document::parse("<p>no head</p>");
        assert_eq!(doc.title(), None);
    }

    #[test]
    fn links_are_resolved_and_deduplicated() {
        let doc = Document::parse(PAGE);
        let links = doc.links(&base(), &[]);
        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/docs/language/",
                "https://example.com/docs/language/Execution_model/Time_series/",
                "https://example.com/docs/language/concepts/Alerts/",
                "https://other.example.com/page",
            ]
        );
        assert_eq!(links[1].text, "Time series");
        assert_eq!(links[2].text, "Alerts");
    }

    #[test]
    fn links_restricted_to_containers() {
        let doc = Document::parse(PAGE);
        let containers = parse_selectors(&["nav".to_string()]).unwrap();
        let links = doc.links(&base(), &containers);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].text, "Language");
    }

    #[test]
    fn invalid_selector_is_an_error() {
        assert!(parse_selectors(&["<nope>".to_string()]).is_err());
    }
}
