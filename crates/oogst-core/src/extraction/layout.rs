use std::fs;
use std::path::{Path, PathBuf};

use crate::error::OogstError;
use crate::extraction::{DocumentContent, PdfExtractor};

/// Extraction backend that reads a pre-computed layout dump.
///
/// A companion tool walks each PDF and writes `<stem>.layout.json` next to
/// it: page text, table cell grids with row bboxes, embedded images (saved
/// as files, referenced by relative path), and colored banner spans. This
/// backend only loads that JSON, so the pipeline itself stays free of PDF
/// internals.
pub struct LayoutDumpExtractor;

impl LayoutDumpExtractor {
    pub fn new() -> Self {
        LayoutDumpExtractor
    }

    /// Path of the sidecar dump for a given PDF.
    pub fn dump_path(pdf_path: &Path) -> PathBuf {
        pdf_path.with_extension("layout.json")
    }

    /// Load a dump file directly (used when the caller already has the
    /// sidecar path, e.g. in tests).
    pub fn load_dump(dump_path: &Path) -> Result<DocumentContent, OogstError> {
        let bytes = fs::read(dump_path)?;
        let mut doc: DocumentContent = serde_json::from_slice(&bytes)?;
        doc.base_dir = dump_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(doc)
    }
}

impl Default for LayoutDumpExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfExtractor for LayoutDumpExtractor {
    fn extract_document(&self, pdf_path: &Path) -> Result<DocumentContent, OogstError> {
        let dump = Self::dump_path(pdf_path);
        if !dump.is_file() {
            return Err(OogstError::LayoutDumpMissing {
                path: pdf_path.to_path_buf(),
            });
        }
        Self::load_dump(&dump)
    }

    fn backend_name(&self) -> &str {
        "layout-dump"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_path() {
        assert_eq!(
            LayoutDumpExtractor::dump_path(Path::new("/x/makita-catalogus.pdf")),
            PathBuf::from("/x/makita-catalogus.layout.json")
        );
    }

    #[test]
    fn test_load_minimal_dump() {
        let dir = tempfile::tempdir().unwrap();
        let dump = dir.path().join("cat.layout.json");
        std::fs::write(
            &dump,
            r#"{"source":"cat.pdf","pages":[{"number":1,"width":595.0,"height":842.0,"text":"hello"}]}"#,
        )
        .unwrap();
        let doc = LayoutDumpExtractor::load_dump(&dump).unwrap();
        assert_eq!(doc.stem(), "cat");
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0].text, "hello");
        assert_eq!(doc.base_dir, dir.path());
    }

    #[test]
    fn test_missing_dump_is_an_error() {
        let e = LayoutDumpExtractor
            .extract_document(Path::new("/nonexistent/cat.pdf"))
            .unwrap_err();
        assert!(matches!(e, OogstError::LayoutDumpMissing { .. }));
    }
}
