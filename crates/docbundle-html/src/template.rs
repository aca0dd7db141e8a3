//! Markup of the pages handed to the PDF renderer.

use html_escape::{encode_double_quoted_attribute, encode_text};
use url::Url;

pub const DEFAULT_STYLESHEET: &str = r#"
body { font-family: -apple-system, "Segoe UI", Roboto, Arial, sans-serif; line-height: 1.6; color: #333; font-size: 11pt; }
h1, h2, h3, h4, h5, h6 { color: #2c3e50; margin-top: 24px; margin-bottom: 12px; page-break-after: avoid; }
h1 { font-size: 2em; border-bottom: 2px solid #eee; padding-bottom: 10px; }
h2 { font-size: 1.5em; }
h3 { font-size: 1.25em; }
code { background-color: #f4f4f4; padding: 2px 4px; border-radius: 3px; font-family: Consolas, Monaco, "Courier New", monospace; font-size: 0.9em; }
pre { background-color: #f8f8f8; border: 1px solid #ddd; border-radius: 4px; padding: 12px; white-space: pre-wrap; word-wrap: break-word; page-break-inside: avoid; }
pre code { background-color: transparent; padding: 0; }
blockquote { border-left: 4px solid #ddd; margin: 0; padding-left: 16px; color: #666; }
table { border-collapse: collapse; width: 100%; margin: 16px 0; page-break-inside: avoid; }
th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
th { background-color: #f4f4f4; }
img { max-width: 100%; height: auto; page-break-inside: avoid; }
a { color: #2196f3; text-decoration: none; }
.page-header { margin-bottom: 32px; }
.page-header .source { font-size: 9pt; color: #666; }
"#;

const COVER_STYLESHEET: &str = r#"
body { font-family: Arial, sans-serif; text-align: center; padding-top: 160px; }
h1 { font-size: 32pt; margin-bottom: 16px; }
h2 { font-size: 20pt; color: #666; margin-bottom: 40px; }
.toc { text-align: left; margin: 0 auto; max-width: 600px; }
.toc li { margin: 8px 0; font-size: 12pt; }
"#;

pub(crate) fn page(
    stylesheet: &str,
    url: &Url,
    title: &str,
    source_line: bool,
    content: &str,
) -> String {
    let title = encode_text(title);
    let source = if source_line {
        format!(
            "<p class=\"source\">Source: {}</p>\n",
            encode_text(url.as_str())
        )
    } else {
        String::new()
    };
    format!(
        "<!DOCTYPE html>
<html>
<head>
<meta charset=\"utf-8\">
<base href=\"{base}\">
<title>{title}</title>
<style>{stylesheet}</style>
</head>
<body>
<div class=\"page-header\">
<h1>{title}</h1>
{source}</div>
{content}
</body>
</html>
",
        base = encode_double_quoted_attribute(url.as_str()),
    )
}

/// A line of a cover page's table of contents.
#[derive(Debug, Clone)]
pub struct CoverEntry {
    pub title: String,
    pub url: String,
}

/// Builds a cover page listing `entries` as a table of contents.
pub fn cover_page(heading: &str, subtitle: &str, entries: &[CoverEntry]) -> String {
    let items: String = entries
        .iter()
        .map(|entry| {
            format!(
                "<li>{} <small>({})</small></li>\n",
                encode_text(&entry.title),
                encode_text(&entry.url)
            )
        })
        .collect();
    format!(
        "<!DOCTYPE html>
<html>
<head>
<meta charset=\"utf-8\">
<title>{heading}</title>
<style>{COVER_STYLESHEET}</style>
</head>
<body>
<h1>{heading}</h1>
<h2>{subtitle}</h2>
<div class=\"toc\">
<h3>Table of Contents</h3>
<ol>
{items}</ol>
</div>
</body>
</html>
",
        heading = encode_text(heading),
        subtitle = encode_text(subtitle),
    )
}
