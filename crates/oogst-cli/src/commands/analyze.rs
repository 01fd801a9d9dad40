use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info};
use oogst_core::catalog::CatalogConfig;
use oogst_core::error::OogstError;
use oogst_core::extraction::layout::LayoutDumpExtractor;
use oogst_core::extraction::PdfExtractor;
use oogst_core::images::{self, ImageMapping, ImageStore};

/// PDF files in the catalog directory, sorted by name.
fn discover_pdfs(pdf_dir: &Path, only: Option<&str>) -> Result<Vec<PathBuf>, OogstError> {
    let mut pdfs: Vec<PathBuf> = fs::read_dir(pdf_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
        })
        .filter(|p| match only {
            Some(needle) => p
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.to_lowercase().contains(&needle.to_lowercase())),
            None => true,
        })
        .collect();
    pdfs.sort();
    Ok(pdfs)
}

pub fn run(
    pdf_dir: &Path,
    only: Option<&str>,
    output_dir: &Path,
    clean_images: bool,
) -> Result<(), OogstError> {
    let pdfs = discover_pdfs(pdf_dir, only)?;
    if pdfs.is_empty() {
        eprintln!("No PDF files found in {}", pdf_dir.display());
        return Ok(());
    }
    fs::create_dir_all(output_dir)?;

    let extractor = LayoutDumpExtractor::new();
    let mut sku_mapping: BTreeMap<String, ImageMapping> = BTreeMap::new();
    let mut unique_skus: BTreeSet<String> = BTreeSet::new();
    let mut processed = 0usize;
    let mut failed = 0usize;
    let mut total_products = 0usize;

    for pdf_path in &pdfs {
        match analyze_one(
            pdf_path,
            &extractor,
            output_dir,
            clean_images,
            &mut sku_mapping,
            &mut unique_skus,
        ) {
            Ok(count) => {
                processed += 1;
                total_products += count;
            }
            Err(err) => {
                // One broken catalog must not sink the batch.
                failed += 1;
                error!("{}: {err}", pdf_path.display());
            }
        }
    }

    if !sku_mapping.is_empty() {
        let mapping_path = output_dir.join("images").join("image-sku-mapping.json");
        if let Some(parent) = mapping_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&mapping_path, serde_json::to_string_pretty(&sku_mapping)?)?;
        info!("wrote {}", mapping_path.display());
    }

    println!(
        "Processed {processed} catalog(s) ({failed} failed): {total_products} products, {} unique SKUs",
        unique_skus.len()
    );
    Ok(())
}

fn analyze_one(
    pdf_path: &Path,
    extractor: &LayoutDumpExtractor,
    output_dir: &Path,
    clean_images: bool,
    sku_mapping: &mut BTreeMap<String, ImageMapping>,
    unique_skus: &mut BTreeSet<String>,
) -> Result<usize, OogstError> {
    let file_name = pdf_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let config = CatalogConfig::for_file(file_name);
    info!("{file_name}: {:?}", config.kind);

    let doc = extractor.extract_document(pdf_path)?;
    let mut store = ImageStore::new(output_dir);
    if clean_images {
        store.clean_document(doc.stem());
    }

    let records = oogst_core::analyze_document(&doc, &config, Some(&mut store))?;
    // Image paths are namespaced by pdf stem, so entries never collide
    // across catalogs.
    sku_mapping.extend(images::build_sku_mapping(&records));

    let payload = oogst_core::flatten::flatten_records(records, &doc.source);
    for product in &payload.products {
        if let Some(sku) = product.get("sku").and_then(|v| v.as_str()) {
            unique_skus.insert(sku.to_string());
        }
    }

    // Each catalog's JSON is a top-level array of product objects.
    let out_path = output_dir.join(format!("{}.json", doc.stem()));
    fs::write(&out_path, serde_json::to_string_pretty(&payload.products)?)?;
    println!(
        "{file_name}: {} products, {} series -> {}",
        payload.product_count,
        payload.series_count,
        out_path.display()
    );
    Ok(payload.product_count)
}
