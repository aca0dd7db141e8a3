use anyhow::Result;
use docbundle_html::plain_text;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use url::Url;

use crate::config::RenderConfig;
use crate::render::Renderer;

const FONT_SIZE: f32 = 10.0;
const LEADING: f32 = 14.0;
// Helvetica averages a bit more than half an em per glyph
const CHAR_WIDTH: f32 = 0.55 * FONT_SIZE;

/// Lays the text of a page out with the standard Helvetica font.
///
/// Styling, images and links are lost, but no browser or external tool is needed.
#[derive(Debug, Clone)]
pub struct PlainRenderer {
    width: f32,
    height: f32,
    margin: f32,
}

impl PlainRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        let (width, height) = config.page_size.points();
        Self {
            width,
            height,
            margin: (config.margin * 72.0).clamp(0.0, width.min(height) / 4.0),
        }
    }

    fn chars_per_line(&self) -> usize {
        (((self.width - 2.0 * self.margin) / CHAR_WIDTH) as usize).max(1)
    }

    fn lines_per_page(&self) -> usize {
        (((self.height - 2.0 * self.margin) / LEADING) as usize).max(1)
    }

    /// Splits `text` into pages of wrapped lines, there is always at least one page.
    pub fn layout(&self, text: &str) -> Vec<Vec<String>> {
        let width = self.chars_per_line();
        let lines: Vec<String> = text.lines().flat_map(|line| wrap(line, width)).collect();
        if lines.is_empty() {
            return vec![vec![]];
        }
        lines
            .chunks(self.lines_per_page())
            .map(|page| page.to_vec())
            .collect()
    }

    fn page_content(&self, lines: &[String]) -> Result<Vec<u8>> {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]),
            Operation::new("TL", vec![LEADING.into()]),
            Operation::new(
                "Td",
                vec![
                    self.margin.into(),
                    (self.height - self.margin - FONT_SIZE).into(),
                ],
            ),
        ];
        for line in lines {
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(win_ansi(line))],
            ));
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new("ET", vec![]));
        Ok(Content { operations }.encode()?)
    }
}

impl Renderer for PlainRenderer {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn render(&self, html: &str, _base_url: Option<&Url>) -> Result<Vec<u8>> {
        let pages = self.layout(&plain_text(html));

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = vec![];
        for lines in &pages {
            let content_id = doc.add_object(Stream::new(dictionary! {}, self.page_content(lines)?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), self.width.into(), self.height.into()],
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages.len() as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut pdf = vec![];
        doc.save_to(&mut pdf)?;
        Ok(pdf)
    }
}

fn wrap(line: &str, width: usize) -> Vec<String> {
    let mut lines = vec![];
    let mut current = String::new();
    let mut current_len = 0;
    for word in line.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        if current_len > 0 && current_len + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current_len += word.len();
        current.extend(word);
    }
    if current_len > 0 || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Encodes `s` for a WinAnsi encoded simple font, unknown characters become `?`.
fn win_ansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7e}' | '\u{a0}'..='\u{ff}' => c as u8,
            '\t' => b' ',
            '\u{2026}' => 0x85,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201c}' => 0x93,
            '\u{201d}' => 0x94,
            '\u{20ac}' => 0x80,
            _ => b'?',
        })
        .collect()
}
