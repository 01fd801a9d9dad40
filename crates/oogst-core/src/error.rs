use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum OogstError {
    #[error("no layout dump found for {path}: run the layout dump tool first")]
    LayoutDumpMissing { path: PathBuf },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
