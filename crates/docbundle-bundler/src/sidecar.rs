use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use fs_err as fs;
use serde::Serialize;

use crate::bundler::Page;
use crate::output::OutputFile;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Metadata<'a> {
    generated_at: String,
    total_pages: usize,
    total_outputs: usize,
    pages: &'a [Page],
    outputs: &'a [OutputFile],
}

/// Writes a JSON summary of the rendered pages and the files they were bundled in.
pub fn write_metadata(path: &Path, pages: &[Page], outputs: &[OutputFile]) -> Result<()> {
    let metadata = Metadata {
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        total_pages: pages.len(),
        total_outputs: outputs.len(),
        pages,
        outputs,
    };
    let mut file = fs::File::create(path)?;
    serde_json::to_writer_pretty(&mut file, &metadata)
        .with_context(|| format!("Couldn't write metadata to {}", path.display()))?;
    file.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        let pages = vec![Page {
            url: "https://example.com/docs/".into(),
            title: "Welcome".into(),
            section: "main".into(),
            size: 1234,
            pdf: b"%PDF-1.5".to_vec(),
        }];
        let outputs = vec![OutputFile {
            file: "docs_main.pdf".into(),
            section: "main".into(),
            size: 2000,
            pages: 2,
        }];
        write_metadata(&path, &pages, &outputs).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["totalPages"], 1);
        assert_eq!(json["totalOutputs"], 1);
        assert!(json["generatedAt"].as_str().unwrap().ends_with('Z'));
        assert_eq!(
            json["pages"][0],
            serde_json::json!({
                "url": "https://example.com/docs/",
                "title": "Welcome",
                "section": "main",
                "size": 1234,
            })
        );
        assert_eq!(json["outputs"][0]["file"], "docs_main.pdf");
        assert_eq!(json["outputs"][0]["pages"], 2);
    }
}
