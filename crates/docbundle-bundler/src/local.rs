use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use docbundle_crawler::{PageLocation, Scrapable, ScrapingContext};
use fs_err as fs;

use crate::bundler::PdfBundler;
use crate::config::BundlerConfig;
use crate::output::OutputFile;

/// Bundles the HTML files matching the glob `pattern`, grouped by directory.
///
/// Sections are the directories below `local_root`, or below the literal prefix of
/// `pattern` when it is not set. Files are read in path order. A file that cannot be
/// read or rendered is logged and skipped.
pub fn bundle_local(config: &BundlerConfig, pattern: &str) -> Result<Vec<OutputFile>> {
    let mut config = config.clone();
    if config.local_root.is_none() {
        config.local_root = Some(literal_prefix(pattern));
    }
    let mut bundler = PdfBundler::new(&config)?;

    let paths = glob::glob(pattern).with_context(|| format!("Invalid pattern {pattern:?}"))?;
    for path in paths {
        let path = match path {
            Ok(path) if path.is_file() => path,
            Ok(_) => continue,
            Err(e) => {
                log::warn!("Skipping {}: {e}", e.path().display());
                continue;
            }
        };
        let page = match fs::read_to_string(&path) {
            Ok(page) => page,
            Err(e) => {
                log::warn!("Skipping {e}");
                continue;
            }
        };
        let ctx = ScrapingContext::with_location(PageLocation::Path(path.clone()));
        if let Err(e) = bundler.scrap(page, ctx) {
            log::error!("Skipping {}: {e:#}", path.display());
        }
    }

    if bundler.pages().is_empty() {
        log::warn!("No HTML file matched {pattern:?}");
    }
    bundler.finish()
}

/// Directory part of `pattern` before its first wildcard.
fn literal_prefix(pattern: &str) -> PathBuf {
    Path::new(pattern)
        .components()
        .take_while(|component| {
            !component
                .as_os_str()
                .to_string_lossy()
                .contains(['*', '?', '['])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_prefix() {
        assert_eq!(literal_prefix("site/**/*.html"), PathBuf::from("site"));
        assert_eq!(literal_prefix("/tmp/a/b/*.htm?"), PathBuf::from("/tmp/a/b"));
        assert_eq!(literal_prefix("*.html"), PathBuf::new());
    }
}
