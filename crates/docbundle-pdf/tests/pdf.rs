use docbundle_pdf::{
    extract_pages, merge, page_count, split_by_size, Engine, PlainRenderer, RenderConfig,
    Renderer,
};
use lopdf::content::Content;
use lopdf::{Document, Object};

fn render(body: &str) -> Vec<u8> {
    let renderer = PlainRenderer::new(&RenderConfig {
        engine: Engine::Plain,
        ..Default::default()
    });
    renderer
        .render(&format!("<html><body>{body}</body></html>"), None)
        .unwrap()
}

/// A document of `n` pages, page `i` starting with the line `"{name} {i}"`.
fn pages(name: &str, n: usize) -> Vec<u8> {
    let pdfs: Vec<Vec<u8>> = (1..=n)
        .map(|i| render(&format!("<p>{name} {i}</p><p>filler text</p>")))
        .collect();
    merge(&pdfs).unwrap()
}

/// First shown text of every page.
fn first_lines(pdf: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .values()
        .map(|page_id| {
            let content = Content::decode(&doc.get_page_content(*page_id).unwrap()).unwrap();
            content
                .operations
                .iter()
                .find(|op| op.operator == "Tj")
                .and_then(|op| match op.operands.first() {
                    Some(Object::String(bytes, _)) => Some(String::from_utf8_lossy(bytes).into_owned()),
                    _ => None,
                })
                .unwrap_or_default()
        })
        .collect()
}

#[test]
fn plain_render_is_a_pdf() {
    let pdf = render("<h1>Loops</h1><p>for i = 0 to 10</p>");
    assert!(pdf.starts_with(b"%PDF-"));
    assert_eq!(page_count(&pdf).unwrap(), 1);
    assert_eq!(first_lines(&pdf), vec!["Loops"]);
}

#[test]
fn long_pages_are_paginated() {
    let body: String = (0..200).map(|i| format!("<p>Paragraph {i}</p>")).collect();
    let pdf = render(&body);
    let count = page_count(&pdf).unwrap();
    assert!(count > 1, "{count} pages");
    assert_eq!(first_lines(&pdf)[0], "Paragraph 0");
}

#[test]
fn merge_keeps_order() {
    let merged = merge(&[pages("a", 2), pages("b", 1), pages("c", 2)]).unwrap();
    assert_eq!(
        first_lines(&merged),
        vec!["a 1", "a 2", "b 1", "c 1", "c 2"]
    );
}

#[test]
fn merge_skips_unreadable_inputs() {
    let merged = merge(&[b"%PDF-garbage".to_vec(), pages("ok", 1)]).unwrap();
    assert_eq!(first_lines(&merged), vec!["ok 1"]);
}

#[test]
fn extract_page_range() {
    let pdf = pages("p", 5);
    let middle = extract_pages(&pdf, 2..=4).unwrap();
    assert_eq!(first_lines(&middle), vec!["p 2", "p 3", "p 4"]);
    assert!(extract_pages(&pdf, 0..=1).is_err());
    assert!(extract_pages(&pdf, 4..=6).is_err());
}

#[test]
fn split_small_document_is_untouched() {
    let pdf = pages("p", 2);
    let parts = split_by_size(&pdf, pdf.len() as u64).unwrap();
    assert_eq!(parts, vec![pdf]);
}

#[test]
fn split_by_page_ratio() {
    let pdf = pages("p", 9);
    let target = pdf.len() as u64 / 3;
    let parts = split_by_size(&pdf, target).unwrap();

    let pages_per_part = std::cmp::max(1, (9 * target / pdf.len() as u64) as usize);
    assert_eq!(parts.len(), (9 + pages_per_part - 1) / pages_per_part);

    let lines: Vec<String> = parts.iter().flat_map(|part| first_lines(part)).collect();
    let expected: Vec<String> = (1..=9).map(|i| format!("p {i}")).collect();
    assert_eq!(lines, expected);
}
