//! Block-aware plain text rendering of HTML.

use lazy_static::lazy_static;
use scraper::{Html, Node, Selector};

lazy_static! {
    static ref BODY: Selector = Selector::parse("body").unwrap();
}

const PARAGRAPHS: &[&str] = &["p", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "table"];

const BLOCKS: &[&str] = &[
    "div", "section", "article", "main", "ul", "ol", "li", "dl", "dt", "dd", "tr",
    "blockquote", "figure", "figcaption", "hr",
];

const SKIPPED: &[&str] = &["script", "style", "noscript", "template", "head", "title"];

/// Extracts the readable text of the `<body>` of `markup`.
///
/// Headings and paragraphs are separated by a blank line, other block elements start
/// a new line, whitespace is collapsed except inside `<pre>`.
pub fn plain_text(markup: &str) -> String {
    let html = Html::parse_document(markup);
    let root = html
        .select(&BODY)
        .next()
        .unwrap_or_else(|| html.root_element());

    let mut out = String::new();
    for node in root.descendants() {
        match node.value() {
            Node::Element(element) => {
                let name = element.name();
                if name == "br" {
                    out.push('\n');
                } else if PARAGRAPHS.contains(&name) {
                    paragraph_break(&mut out);
                } else if BLOCKS.contains(&name) {
                    line_break(&mut out);
                }
            }
            Node::Text(text) => {
                let mut in_pre = false;
                let mut skipped = false;
                for ancestor in node.ancestors() {
                    if let Node::Element(element) = ancestor.value() {
                        in_pre |= element.name() == "pre";
                        skipped |= SKIPPED.contains(&element.name());
                    }
                }
                if skipped {
                    continue;
                }
                if in_pre {
                    out.push_str(text);
                } else {
                    push_collapsed(&mut out, text);
                }
            }
            _ => (),
        }
    }

    tidy(&out)
}

fn line_break(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn paragraph_break(out: &mut String) {
    line_break(out);
    if !out.is_empty() && !out.ends_with("\n\n") {
        out.push('\n');
    }
}

fn push_collapsed(out: &mut String, text: &str) {
    let at_line_start = out.is_empty() || out.ends_with(char::is_whitespace);
    if text.starts_with(char::is_whitespace) && !at_line_start {
        out.push(' ');
    }
    let mut words = text.split_whitespace().peekable();
    while let Some(word) = words.next() {
        out.push_str(word);
        if words.peek().is_some() {
            out.push(' ');
        }
    }
    if text.ends_with(char::is_whitespace) && !text.trim().is_empty() {
        out.push(' ');
    }
}

fn tidy(out: &str) -> String {
    let mut tidy = String::with_capacity(out.len());
    let mut blank = 0;
    for line in out.lines().map(str::trim_end) {
        if line.is_empty() {
            blank += 1;
            if blank > 1 {
                continue;
            }
        } else {
            blank = 0;
        }
        tidy.push_str(line);
        tidy.push('\n');
    }
    tidy.trim_matches('\n').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_and_inline() {
        let text = plain_text(
            "<html><head><title>T</title><style>p { color: red }</style></head>
             <body><h1>Title</h1><p>Some <b>bold</b>   text.</p>
             <ul><li>one</li><li>two</li></ul></body></html>",
        );
        assert_eq!(text, "Title\n\nSome bold text.\none\ntwo");
    }

    #[test]
    fn pre_keeps_whitespace() {
        let text = plain_text("<body><pre>if x\n    y()</pre></body>");
        assert_eq!(text, "if x\n    y()");
    }

    #[test]
    fn scripts_are_skipped() {
        let text = plain_text("<body><p>a</p><script>var x = 1;</script><p>b</p></body>");
        assert_eq!(text, "a\n\nb");
    }
}
