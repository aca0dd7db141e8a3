use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use docbundle_html::{cover_page, CoverEntry};
use docbundle_pdf::{merge, page_count, split_by_size, Renderer};
use fs_err as fs;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::batch::batch_by_size;
use crate::bundler::Page;
use crate::config::BundlerConfig;

const MAX_FILENAME_LEN: usize = 100;

lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^\w\s-]").unwrap();
    static ref SEPARATORS: Regex = Regex::new(r"[-\s]+").unwrap();
}

/// A PDF file written to the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputFile {
    pub file: String,
    pub section: String,
    pub size: u64,
    /// Number of PDF pages, cover included
    pub pages: usize,
}

/// Makes `name` safe to use as a file name on any platform.
pub fn sanitize_filename(name: &str) -> String {
    let name = UNSAFE_CHARS.replace_all(name.trim(), "");
    let name = SEPARATORS.replace_all(&name, "_");
    let name: String = name.chars().take(MAX_FILENAME_LEN).collect();
    if name.is_empty() {
        String::from("untitled")
    } else {
        name
    }
}

/// Writes the pages of every section as PDF files whose page sizes add up to at most
/// `max_bundle_size`, sections in the order they were first seen.
///
/// An output unit that cannot be written is logged and skipped.
pub fn write_bundles(
    config: &BundlerConfig,
    renderer: &dyn Renderer,
    pages: &[Page],
) -> Result<Vec<OutputFile>> {
    fs::create_dir_all(&config.output_dir)?;

    let mut outputs = vec![];
    let mut names = FileNames::default();
    for (section, section_pages) in by_section(pages) {
        let batches = batch_by_size(section_pages, config.max_bundle_size, |page| page.size);
        let count = batches.len();
        log::debug!("Section {section}: {count} file(s)");

        let base = sanitize_filename(&format!("{}_{}", config.file_prefix, section));
        for (i, batch) in batches.iter().enumerate() {
            let name = match count {
                1 => base.clone(),
                _ => format!("{base}_part{}", i + 1),
            };

            let subtitle = match count {
                1 => section.to_string(),
                _ => format!("{section} - Part {}", i + 1),
            };
            match write_unit(config, renderer, &mut names, &name, count > 1, &subtitle, batch) {
                Ok(files) => outputs.extend(files.into_iter().map(|(file, size, pages)| {
                    OutputFile {
                        file,
                        section: section.to_string(),
                        size,
                        pages,
                    }
                })),
                Err(e) => log::error!("Skipping {name}: {e:#}"),
            }
        }
    }

    let total: u64 = outputs.iter().map(|output| output.size).sum();
    log::info!(
        "Created {} PDF file(s) in {}, {} in total",
        outputs.len(),
        config.output_dir.display(),
        human_size(total)
    );
    Ok(outputs)
}

/// Groups pages by section, keeping the first-seen order of sections and the page
/// order within each section.
fn by_section(pages: &[Page]) -> Vec<(&str, Vec<&Page>)> {
    let mut sections: Vec<(&str, Vec<&Page>)> = vec![];
    for page in pages {
        match sections.iter_mut().find(|(name, _)| *name == page.section) {
            Some((_, section_pages)) => section_pages.push(page),
            None => sections.push((page.section.as_str(), vec![page])),
        }
    }
    sections
}

/// File names handed out so far, compared case-insensitively.
#[derive(Debug, Default)]
struct FileNames {
    used: HashSet<String>,
}

impl FileNames {
    /// Returns `{stem}.pdf`, or `{stem}_{n}.pdf` with the lowest `n` not taken yet.
    fn claim(&mut self, stem: &str) -> String {
        let mut file = format!("{stem}.pdf");
        let mut n = 2;
        while !self.used.insert(file.to_lowercase()) {
            file = format!("{stem}_{n}.pdf");
            n += 1;
        }
        if n > 2 {
            log::warn!("{stem}.pdf is already taken, writing {file} instead");
        }
        file
    }
}

/// Merges one batch, with its cover, into one file, or several when the merged
/// file exceeds `max_file_size`. Returns the name, size and page count of each file.
///
/// `numbered` tells whether `name` already carries a part number.
fn write_unit(
    config: &BundlerConfig,
    renderer: &dyn Renderer,
    names: &mut FileNames,
    name: &str,
    numbered: bool,
    subtitle: &str,
    batch: &[&Page],
) -> Result<Vec<(String, u64, usize)>> {
    let mut pdfs: Vec<&[u8]> = vec![];

    let mut cover = None;
    if config.cover_page {
        let entries: Vec<CoverEntry> = batch
            .iter()
            .map(|page| CoverEntry {
                title: page.title.clone(),
                url: page.url.clone(),
            })
            .collect();
        let html = cover_page(&config.title, subtitle, &entries);
        match renderer.render(&html, None) {
            Ok(pdf) => cover = Some(pdf),
            Err(e) => log::warn!("No cover page for {name}: {e:#}"),
        }
    }
    if let Some(cover) = &cover {
        pdfs.push(cover);
    }
    pdfs.extend(batch.iter().map(|page| page.pdf.as_slice()));

    let merged = merge(&pdfs)?;
    let parts = if merged.len() as u64 > config.max_file_size {
        log::info!(
            "{name} is {}, splitting it",
            human_size(merged.len() as u64)
        );
        split_by_size(&merged, config.max_bundle_size)?
    } else {
        vec![merged]
    };

    let single = parts.len() == 1;
    let mut files = vec![];
    for (i, part) in parts.into_iter().enumerate() {
        let file = match (single, numbered) {
            (true, _) => names.claim(name),
            (false, false) => names.claim(&format!("{name}_part{}", i + 1)),
            (false, true) => names.claim(&format!("{name}_{}", i + 1)),
        };
        let pages = page_count(&part)?;
        write_file(&config.output_dir.join(&file), &part)?;
        files.push((file, part.len() as u64, pages));
    }
    Ok(files)
}

fn write_file(path: &Path, pdf: &[u8]) -> Result<()> {
    fs::write(path, pdf)?;
    log::info!("Created {} ({})", path.display(), human_size(pdf.len() as u64));
    Ok(())
}

fn human_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}
