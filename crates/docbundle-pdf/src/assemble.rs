use std::cmp;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use anyhow::{anyhow, bail, Result};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

const MAX_TREE_DEPTH: usize = 32;

fn load(pdf: &[u8]) -> Result<Document> {
    Document::load_mem(pdf).map_err(|e| anyhow!("Couldn't read PDF: {e}"))
}

pub fn page_count(pdf: &[u8]) -> Result<usize> {
    Ok(load(pdf)?.get_pages().len())
}

/// Concatenates `pdfs`, keeping the page order of each input and the input order.
///
/// Inputs that cannot be read are logged and skipped, the merge fails only when no
/// page is left.
pub fn merge<P: AsRef<[u8]>>(pdfs: &[P]) -> Result<Vec<u8>> {
    let mut assembler = Assembler::new();
    for (i, pdf) in pdfs.iter().enumerate() {
        match load(pdf.as_ref()) {
            Ok(doc) => assembler.append(doc, |_| true),
            Err(e) => log::warn!("Skipping document {} of the merge: {e}", i + 1),
        }
    }
    assembler.finish()
}

/// Keeps the pages of `range` (1-based, inclusive) only.
pub fn extract_pages(pdf: &[u8], range: RangeInclusive<usize>) -> Result<Vec<u8>> {
    let doc = load(pdf)?;
    let total = doc.get_pages().len();
    if *range.start() == 0 || range.is_empty() || *range.end() > total {
        bail!("Invalid page range {range:?} for a document of {total} pages");
    }
    let mut assembler = Assembler::new();
    assembler.append(doc, |n| range.contains(&n));
    assembler.finish()
}

/// Splits `pdf` in parts of roughly `target` bytes.
///
/// Page sizes are unknown so the page count of a part is estimated from the
/// average page size: `max(1, total_pages * target / size)`. A document already
/// within `target` is returned as is.
pub fn split_by_size(pdf: &[u8], target: u64) -> Result<Vec<Vec<u8>>> {
    let size = pdf.len() as u64;
    if size <= target {
        return Ok(vec![pdf.to_vec()]);
    }
    let total = page_count(pdf)?;
    let pages_per_part = cmp::max(1, (total as u64 * target / size) as usize);
    log::debug!("Splitting {size} bytes, {total} pages, in parts of {pages_per_part} pages");

    (1..=total)
        .step_by(pages_per_part)
        .map(|first| {
            let last = cmp::min(first + pages_per_part - 1, total);
            extract_pages(pdf, first..=last)
        })
        .collect()
}

/// Builds a single document out of the pages of several ones.
struct Assembler {
    max_id: u32,
    pages: Vec<(ObjectId, Dictionary)>,
    objects: BTreeMap<ObjectId, Object>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            max_id: 1,
            pages: vec![],
            objects: BTreeMap::new(),
        }
    }

    /// Appends the pages of `doc` whose 1-based number satisfies `keep`.
    fn append(&mut self, mut doc: Document, keep: impl Fn(usize) -> bool) {
        doc.renumber_objects_with(self.max_id);
        self.max_id = doc.max_id + 1;

        for (n, page_id) in doc.get_pages() {
            if !keep(n as usize) {
                continue;
            }
            match flattened_page(&doc, page_id) {
                Some(page) => self.pages.push((page_id, page)),
                None => log::warn!("Skipping unreadable page {n}"),
            }
        }

        for (id, object) in doc.objects {
            let skipped = matches!(
                type_name(&object),
                Some(b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline" | b"XRef" | b"ObjStm")
            );
            if !skipped {
                self.objects.insert(id, object);
            }
        }
    }

    fn finish(self) -> Result<Vec<u8>> {
        if self.pages.is_empty() {
            bail!("No page to assemble");
        }

        let mut doc = Document::with_version("1.5");
        doc.objects = self.objects;
        doc.max_id = self.max_id;
        let pages_id = doc.new_object_id();

        let mut kids: Vec<Object> = vec![];
        for (page_id, mut page) in self.pages {
            page.set("Parent", pages_id);
            doc.objects.insert(page_id, Object::Dictionary(page));
            kids.push(page_id.into());
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        doc.prune_objects();
        doc.renumber_objects();
        doc.compress();

        let mut pdf = vec![];
        doc.save_to(&mut pdf)?;
        Ok(pdf)
    }
}

fn type_name(object: &Object) -> Option<&[u8]> {
    let dict = match object {
        Object::Dictionary(dict) => dict,
        Object::Stream(stream) => &stream.dict,
        _ => return None,
    };
    dict.get(b"Type").and_then(Object::as_name).ok()
}

/// Returns a copy of the page dictionary with its inherited attributes made explicit,
/// so that the page no longer depends on the page tree it comes from.
fn flattened_page(doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
    let mut page = doc.get_dictionary(page_id).ok()?.clone();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(parent_id) = parent {
        if depth == MAX_TREE_DEPTH {
            break;
        }
        let node = match doc.get_dictionary(parent_id) {
            Ok(node) => node,
            Err(_) => break,
        };
        for key in INHERITABLE {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key, value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }
    Some(page)
}
