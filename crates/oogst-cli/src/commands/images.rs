use std::fs;
use std::path::Path;

use log::info;
use oogst_core::error::OogstError;
use oogst_core::images::{self, ImageStore};

/// Collapse perceptual duplicates in an existing output directory and
/// rewrite every JSON payload that still references a removed file.
pub fn dedupe(dir: &Path) -> Result<(), OogstError> {
    let mut store = ImageStore::new(dir);
    store.load_existing()?;
    let replaced = store.dedupe();
    if replaced.is_empty() {
        println!("No duplicate images found in {}", dir.display());
        return Ok(());
    }

    let mut rewritten = 0usize;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if !is_json {
            continue;
        }
        let mut value: serde_json::Value = serde_json::from_slice(&fs::read(&path)?)?;
        let before = value.to_string();
        images::rewrite_json_value(&mut value, &replaced);
        if value.to_string() != before {
            fs::write(&path, serde_json::to_string_pretty(&value)?)?;
            info!("rewrote {}", path.display());
            rewritten += 1;
        }
    }

    println!(
        "Removed {} duplicate image(s), rewrote {} JSON file(s)",
        replaced.len(),
        rewritten
    );
    Ok(())
}
