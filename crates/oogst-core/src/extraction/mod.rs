pub mod layout;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::OogstError;
use crate::geometry::BBox;

/// One table as the layout tool found it: raw cell grid (header rows
/// included, cells may be missing) plus a bbox per row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTable {
    pub bbox: BBox,
    pub rows: Vec<Vec<Option<String>>>,
    pub row_bboxes: Vec<BBox>,
}

/// An embedded image on a page. `path` is relative to the layout dump.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageImage {
    pub path: PathBuf,
    pub bbox: BBox,
    pub width: u32,
    pub height: u32,
}

/// A positioned line of text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    pub bbox: BBox,
}

/// A text span with a solid colored background (section banners).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Banner {
    pub text: String,
    pub rgb: [u8; 3],
    pub bbox: BBox,
}

/// Content extracted from a single page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageContent {
    pub number: usize,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub lines: Vec<TextLine>,
    #[serde(default)]
    pub tables: Vec<RawTable>,
    #[serde(default)]
    pub images: Vec<PageImage>,
    #[serde(default)]
    pub banners: Vec<Banner>,
}

/// A whole document as extracted by the layout tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentContent {
    pub source: String,
    pub pages: Vec<PageContent>,
    /// Directory image paths resolve against. Set on load, not serialized.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl DocumentContent {
    /// Stem of the source PDF, used to namespace series ids and image dirs.
    pub fn stem(&self) -> &str {
        Path::new(&self.source)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.source)
    }

    pub fn resolve_image_path(&self, image: &PageImage) -> PathBuf {
        self.base_dir.join(&image.path)
    }
}

/// Trait for layout extraction backends.
///
/// The pipeline never touches PDF internals itself: a backend hands it
/// pages, tables, and images, and everything downstream works on those.
pub trait PdfExtractor: Send + Sync {
    fn extract_document(&self, pdf_path: &Path) -> Result<DocumentContent, OogstError>;

    /// Name of this extraction backend (for diagnostics).
    fn backend_name(&self) -> &str;
}
