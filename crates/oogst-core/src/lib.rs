//! Product catalog extraction from supplier PDFs.
//!
//! The pipeline turns a layout-extracted PDF into flat product records:
//! a backend delivers pages with tables, text lines, images, and banners;
//! [`analyze_document`] classifies each table, extracts rows (or columns,
//! for transposed tables), attaches series and page context, enriches the
//! records, and associates product images. [`flatten::flatten_records`]
//! then produces the JSON payload for one source PDF.

pub mod catalog;
pub mod context;
pub mod enrich;
pub mod error;
pub mod extraction;
pub mod flatten;
pub mod geometry;
pub mod images;
pub mod model;
pub mod recognize;
pub mod rows;
pub mod series;
pub mod tables;
pub mod text;
pub mod transposed;

use std::fs;
use std::path::Path;

use log::{debug, info, warn};

use crate::catalog::{CatalogConfig, CatalogKind, TableLayout};
use crate::error::OogstError;
use crate::extraction::{DocumentContent, PageContent, PdfExtractor};
use crate::geometry::BBox;
use crate::images::ImageStore;
use crate::model::{CatalogPayload, Record, RowContext};
use crate::series::Series;

/// Bboxes of the lines printing the page's column series titles.
fn title_boxes(page: &PageContent, titles: &[Series]) -> Vec<(String, BBox)> {
    titles
        .iter()
        .filter_map(|s| {
            page.lines
                .iter()
                .find(|l| l.text.trim() == s.name)
                .map(|l| (s.slug.clone(), l.bbox))
        })
        .collect()
}

/// Pick the series for a table printed in a two-column fitting catalog.
fn column_series(page: &PageContent, table_bbox: &BBox, titles: &[Series]) -> Option<Series> {
    match titles {
        [] => None,
        [only] => Some(only.clone()),
        [left, right, ..] => {
            if page.width > 0.0 && table_bbox.center_x() >= page.width / 2.0 {
                Some(right.clone())
            } else {
                Some(left.clone())
            }
        }
    }
}

/// Store a page's embedded images, anchored to the nearest series title.
fn store_page_images(
    doc: &DocumentContent,
    page: &PageContent,
    anchors: &[(String, BBox)],
    fallback_slug: &str,
    store: &mut ImageStore,
) -> Vec<(String, BBox)> {
    let mut stored = Vec::new();
    for img in &page.images {
        if img.width < images::RAW_MIN_DIMENSION || img.height < images::RAW_MIN_DIMENSION {
            continue;
        }
        let path = doc.resolve_image_path(img);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("cannot read image {}: {err}", path.display());
                continue;
            }
        };
        let slug = images::nearest_series(&img.bbox, anchors)
            .unwrap_or(fallback_slug)
            .to_string();
        match store.store(doc.stem(), page.number, &slug, &bytes) {
            Ok(Some(rel_path)) => stored.push((rel_path, img.bbox)),
            Ok(None) => debug!("image on page {} rejected by quality gate", page.number),
            Err(err) => warn!("cannot store image from page {}: {err}", page.number),
        }
    }
    stored
}

/// Analyze one extracted document into product records.
///
/// Pages listed in the config are skipped. Series carry forward across
/// pages until a new banner or title replaces them, so continuation pages
/// keep the family they belong to.
pub fn analyze_document(
    doc: &DocumentContent,
    config: &CatalogConfig,
    mut store: Option<&mut ImageStore>,
) -> Result<Vec<Record>, OogstError> {
    let mut records: Vec<Record> = Vec::new();
    let mut carried_series: Option<Series> = None;
    let mut carried_specs = std::collections::BTreeMap::new();

    for page in &doc.pages {
        if config.skip_pages.contains(&page.number) {
            debug!("skipping page {}", page.number);
            continue;
        }

        let page_series = series::series_from_banners(&page.banners)
            .or_else(|| series::series_from_title(&page.text));
        if page_series.is_some() {
            carried_series = page_series;
        }

        let column_titles = if config.kind.uses_column_split() {
            series::page_series_titles(&page.text)
        } else {
            Vec::new()
        };
        let anchors = title_boxes(page, &column_titles);

        let mut page_specs = context::product_specs_from_text(&page.text);
        if config.kind == CatalogKind::PumpSpecials && page_specs.is_empty() {
            // Continuation pages of a special repeat no spec block.
            page_specs = carried_specs.clone();
        } else if !page_specs.is_empty() {
            carried_specs = page_specs.clone();
        }

        let stored: Vec<(String, BBox)> = match (&mut store, config.extract_images) {
            (Some(store), true) => {
                let fallback = carried_series
                    .as_ref()
                    .map(|s| s.slug.as_str())
                    .unwrap_or("page");
                store_page_images(doc, page, &anchors, fallback, store)
            }
            _ => Vec::new(),
        };

        for table in &page.tables {
            let (title, application) = context::text_above_table(&page.lines, &table.bbox);

            let mut table_series = None;
            if config.detect_series {
                table_series = series::series_from_banners(&page.banners)
                    .or_else(|| title.as_deref().and_then(series::series_from_title))
                    .or_else(|| column_series(page, &table.bbox, &column_titles))
                    .or_else(|| {
                        title
                            .as_deref()
                            .filter(|t| !series::is_placeholder_series(t))
                            .and_then(Series::from_name)
                    })
                    .or_else(|| carried_series.clone());
            }

            let mut ctx = RowContext {
                source_pdf: doc.source.clone(),
                page_number: page.number,
                category: Some(config.kind.category().to_string()),
                application,
                brand: config
                    .brand
                    .map(str::to_string)
                    .or_else(|| context::brand_from_text(&page.text).map(str::to_string)),
                specs_text: context::specs_text_from(&page.text),
                product_specs: page_specs.clone(),
                ..RowContext::default()
            };
            if let Some(series) = &table_series {
                ctx.series_id = Some(series.slug.clone());
                ctx.series_name = Some(series.name.clone());
            }

            // Images for this table's column of the page, then the table
            // region itself; rows narrow further below.
            let col_images = if config.kind.uses_column_split() && page.width > 0.0 {
                images::filter_by_column(
                    &stored,
                    page.width / 2.0,
                    table.bbox.center_x() < page.width / 2.0,
                )
            } else {
                stored.clone()
            };
            let mut table_images = images::overlapping_images(&col_images, &table.bbox);
            if table_images.is_empty() {
                table_images = col_images.iter().map(|(p, _)| p.clone()).collect();
            }

            match config.layout {
                TableLayout::Transposed => {
                    for fields in transposed::extract_transposed(config.kind, table) {
                        let mut ctx = ctx.clone();
                        ctx.images = table_images.clone();
                        let mut record = Record::new(fields, ctx);
                        enrich::enrich_record(&mut record);
                        records.push(record);
                    }
                }
                TableLayout::HeaderAsSku => {
                    for fields in rows::extract_header_as_sku(config.kind, table) {
                        let mut ctx = ctx.clone();
                        ctx.images = table_images.clone();
                        let mut record = Record::new(fields, ctx);
                        enrich::enrich_record(&mut record);
                        records.push(record);
                    }
                }
                TableLayout::RowWise => {
                    let mut classified = tables::classify(table);
                    tables::repair_rows(
                        &mut classified,
                        &page.lines,
                        recognize::sku_pattern(config.kind),
                    );
                    let mut carry = rows::RowCarry::default();

                    for (i, row) in classified.rows.iter().enumerate() {
                        if rows::row_is_empty(row) {
                            continue;
                        }
                        let mut fields = rows::extract_row(config.kind, &classified.keys, row);
                        if fields.is_empty() {
                            continue;
                        }
                        if config.kind == CatalogKind::Compressors {
                            carry.apply(&mut fields, config.sku_field);
                        }

                        let mut ctx = ctx.clone();
                        ctx.images = classified
                            .row_bboxes
                            .get(i)
                            .map(|bb| images::overlapping_images(&col_images, bb))
                            .filter(|imgs| !imgs.is_empty())
                            .unwrap_or_else(|| table_images.clone());
                        let mut record = Record::new(fields, ctx);
                        enrich::enrich_record(&mut record);
                        records.push(record);
                    }
                }
            }
        }
    }

    if let Some(store) = store {
        let replaced = store.dedupe();
        if !replaced.is_empty() {
            info!("collapsed {} duplicate images", replaced.len());
            images::rewrite_image_refs(&mut records, &replaced);
        }
    }

    info!(
        "{}: {} records from {} pages",
        doc.source,
        records.len(),
        doc.pages.len()
    );
    Ok(records)
}

/// Analyze one PDF end to end: extract, analyze, flatten.
///
/// The catalog family is detected from the file name.
pub fn analyze_pdf(
    pdf_path: &Path,
    extractor: &dyn PdfExtractor,
    store: Option<&mut ImageStore>,
) -> Result<CatalogPayload, OogstError> {
    let file_name = pdf_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let config = CatalogConfig::for_file(file_name);
    debug!(
        "{file_name}: {:?} via {}",
        config.kind,
        extractor.backend_name()
    );
    let doc = extractor.extract_document(pdf_path)?;
    let records = analyze_document(&doc, &config, store)?;
    Ok(flatten::flatten_records(records, &doc.source))
}
