//! Product image handling: quality gate, row association, series anchoring,
//! WebP output, and perceptual-hash deduplication.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, RgbImage};
use img_hash::{HashAlg, HasherConfig, ImageHash};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::error::OogstError;
use crate::geometry::BBox;
use crate::model::Record;

/// Raw embedded images below this edge are dropped before any decoding.
pub const RAW_MIN_DIMENSION: u32 = 50;
/// Product images must be at least this wide and tall.
pub const MIN_DIMENSION: u32 = 150;
/// Encoded size band: below is icon/vector junk, above is a page scan.
pub const MIN_BYTES: usize = 15 * 1024;
pub const MAX_BYTES: usize = 200 * 1024;
pub const MIN_ASPECT: f64 = 0.3;
pub const MAX_ASPECT: f64 = 3.0;
/// Minimum image-area fraction overlapping a row/table to associate.
pub const MIN_OVERLAP_RATIO: f64 = 0.15;
/// An image farther than this from every series title stays unanchored.
pub const ANCHOR_DISTANCE_CUTOFF: f64 = 300.0;
/// Hamming distance below which two hashes count as duplicates.
pub const HAMMING_THRESHOLD: u32 = 5;

const MIN_MEAN_SATURATION: f64 = 15.0;
const MIN_LUMA_STD: f64 = 35.0;
const MAX_EDGE_RATIO: f64 = 0.15;
const EDGE_LUMA_DELTA: i32 = 40;

/// Decide whether an extracted image is worth keeping as a product photo.
///
/// Rejects tiny images, anything outside the byte band, extreme aspect
/// ratios, near-grayscale content (line drawings, dimension sketches), flat
/// backgrounds, and text-heavy crops.
pub fn is_good_product_image(bytes: &[u8]) -> bool {
    if bytes.len() < MIN_BYTES || bytes.len() > MAX_BYTES {
        return false;
    }
    let Ok(decoded) = image::load_from_memory(bytes) else {
        return false;
    };
    let rgb = decoded.to_rgb8();
    let (w, h) = rgb.dimensions();
    if w < MIN_DIMENSION || h < MIN_DIMENSION {
        return false;
    }
    let aspect = w as f64 / h as f64;
    if !(MIN_ASPECT..=MAX_ASPECT).contains(&aspect) {
        return false;
    }

    let (mean_sat, luma_std, edge_ratio) = color_metrics(&rgb);
    if mean_sat < MIN_MEAN_SATURATION {
        debug!("image rejected: near-grayscale (sat {mean_sat:.1})");
        return false;
    }
    if luma_std < MIN_LUMA_STD {
        debug!("image rejected: flat content (luma std {luma_std:.1})");
        return false;
    }
    if edge_ratio > MAX_EDGE_RATIO {
        debug!("image rejected: text-heavy (edge ratio {edge_ratio:.2})");
        return false;
    }
    true
}

fn color_metrics(rgb: &RgbImage) -> (f64, f64, f64) {
    let (w, h) = rgb.dimensions();
    let stride = ((w as usize * h as usize) / 10_000).max(1);

    let mut sat_sum = 0.0f64;
    let mut luma_sum = 0.0f64;
    let mut luma_sq_sum = 0.0f64;
    let mut count = 0usize;
    for (i, pixel) in rgb.pixels().enumerate() {
        if i % stride != 0 {
            continue;
        }
        let [r, g, b] = pixel.0;
        let max = r.max(g).max(b) as f64;
        let min = r.min(g).min(b) as f64;
        sat_sum += max - min;
        let luma = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
        luma_sum += luma;
        luma_sq_sum += luma * luma;
        count += 1;
    }
    if count == 0 {
        return (0.0, 0.0, 0.0);
    }
    let mean_sat = sat_sum / count as f64;
    let luma_mean = luma_sum / count as f64;
    let luma_std = (luma_sq_sum / count as f64 - luma_mean * luma_mean).max(0.0).sqrt();

    // Edge density over one center row keeps this O(width).
    let y = h / 2;
    let mut edges = 0usize;
    for x in 1..w {
        let a = rgb.get_pixel(x - 1, y).0;
        let b = rgb.get_pixel(x, y).0;
        let la = (0.299 * a[0] as f64 + 0.587 * a[1] as f64 + 0.114 * a[2] as f64) as i32;
        let lb = (0.299 * b[0] as f64 + 0.587 * b[1] as f64 + 0.114 * b[2] as f64) as i32;
        if (la - lb).abs() > EDGE_LUMA_DELTA {
            edges += 1;
        }
    }
    let edge_ratio = edges as f64 / (w.saturating_sub(1)).max(1) as f64;

    (mean_sat, luma_std, edge_ratio)
}

/// Paths of images whose area overlaps `target` by at least the minimum
/// ratio.
pub fn overlapping_images(images: &[(String, BBox)], target: &BBox) -> Vec<String> {
    images
        .iter()
        .filter(|(_, bbox)| bbox.overlap_ratio(target) >= MIN_OVERLAP_RATIO)
        .map(|(path, _)| path.clone())
        .collect()
}

/// Keep only images on one side of the page midline.
pub fn filter_by_column(images: &[(String, BBox)], page_mid_x: f64, left: bool) -> Vec<(String, BBox)> {
    images
        .iter()
        .filter(|(_, bbox)| (bbox.center_x() < page_mid_x) == left)
        .cloned()
        .collect()
}

/// Anchor an image to the vertically nearest series title.
///
/// Product shots sit above their series header, so an image above a
/// candidate title scores plainly while an image below one pays double
/// distance; anything past the cutoff stays unanchored.
pub fn nearest_series<'a>(img: &BBox, titles: &'a [(String, BBox)]) -> Option<&'a str> {
    titles
        .iter()
        .map(|(slug, title)| {
            let gap = img.vertical_gap(title);
            let distance = if title.y1 <= img.y0 { gap * 2.0 } else { gap };
            (slug, distance)
        })
        .filter(|(_, d)| *d <= ANCHOR_DISTANCE_CUTOFF)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(slug, _)| slug.as_str())
}

#[derive(Debug)]
struct StoredImage {
    rel_path: String,
    abs_path: PathBuf,
    file_name: String,
    file_size: u64,
    hash: ImageHash,
}

/// Writes accepted product images as WebP under `images/<pdf-stem>/` and
/// remembers a perceptual hash per file for the dedup pass.
pub struct ImageStore {
    root: PathBuf,
    hasher: img_hash::Hasher,
    entries: Vec<StoredImage>,
}

impl ImageStore {
    /// `output_dir` is the JSON output directory; images land in its
    /// `images/` subdirectory.
    pub fn new(output_dir: &Path) -> Self {
        ImageStore {
            root: output_dir.join("images"),
            hasher: HasherConfig::new()
                .hash_alg(HashAlg::Gradient)
                .hash_size(8, 8)
                .to_hasher(),
            entries: Vec::new(),
        }
    }

    /// Remove previously extracted images for one document.
    pub fn clean_document(&self, pdf_stem: &str) {
        let dir = self.root.join(pdf_stem);
        if dir.is_dir() {
            info!("removing previous images under {}", dir.display());
            let _ = fs::remove_dir_all(&dir);
        }
    }

    /// Load already-written images back into the store so a standalone
    /// dedup pass can run over an existing output directory.
    pub fn load_existing(&mut self) -> Result<(), OogstError> {
        if !self.root.is_dir() {
            return Ok(());
        }
        for stem_entry in fs::read_dir(&self.root)? {
            let stem_dir = stem_entry?.path();
            let Some(stem) = stem_dir
                .file_name()
                .and_then(|s| s.to_str())
                .map(str::to_string)
            else {
                continue;
            };
            if !stem_dir.is_dir() {
                continue;
            }
            let mut files: Vec<PathBuf> = fs::read_dir(&stem_dir)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect();
            files.sort();
            for abs_path in files {
                let Some(file_name) = abs_path
                    .file_name()
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
                else {
                    continue;
                };
                let bytes = fs::read(&abs_path)?;
                let rgb = match image::load_from_memory(&bytes) {
                    Ok(img) => img.to_rgb8(),
                    Err(err) => {
                        warn!("cannot decode {}: {err}", abs_path.display());
                        continue;
                    }
                };
                let hash = self.hasher.hash_image(&compat_image(&rgb));
                self.entries.push(StoredImage {
                    rel_path: format!("images/{stem}/{file_name}"),
                    abs_path,
                    file_name,
                    file_size: bytes.len() as u64,
                    hash,
                });
            }
        }
        Ok(())
    }

    /// Convert and store one accepted image. Returns the relative path, or
    /// None when the quality gate rejects it.
    pub fn store(
        &mut self,
        pdf_stem: &str,
        page: usize,
        series_slug: &str,
        bytes: &[u8],
    ) -> Result<Option<String>, OogstError> {
        if !is_good_product_image(bytes) {
            return Ok(None);
        }
        let rgb = image::load_from_memory(bytes)?.to_rgb8();

        let dir = self.root.join(pdf_stem);
        fs::create_dir_all(&dir)?;

        let base = format!("{pdf_stem}__p{page}__{series_slug}");
        let mut file_name = format!("{base}.webp");
        let mut version = 2;
        while dir.join(&file_name).exists() {
            file_name = format!("{base}__v{version}.webp");
            version += 1;
        }
        let abs_path = dir.join(&file_name);

        let (w, h) = rgb.dimensions();
        let writer = BufWriter::new(fs::File::create(&abs_path)?);
        WebPEncoder::new_lossless(writer).encode(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)?;

        let hash = self.hasher.hash_image(&compat_image(&rgb));
        let file_size = fs::metadata(&abs_path)?.len();
        let rel_path = format!("images/{pdf_stem}/{file_name}");
        self.entries.push(StoredImage {
            rel_path: rel_path.clone(),
            abs_path,
            file_name,
            file_size,
            hash,
        });
        Ok(Some(rel_path))
    }

    /// Collapse perceptual duplicates. Returns removed -> canonical paths.
    ///
    /// Canonical preference: a name without a `__v{n}` suffix, then the
    /// shorter name, then the larger file.
    pub fn dedupe(&mut self) -> BTreeMap<String, String> {
        let mut replaced = BTreeMap::new();
        let mut keep: Vec<StoredImage> = Vec::new();

        let mut pending: Vec<StoredImage> = std::mem::take(&mut self.entries);
        while !pending.is_empty() {
            let seed_hash = pending[0].hash.clone();
            let (mut group, rest): (Vec<_>, Vec<_>) = pending
                .drain(..)
                .partition(|e| e.hash.dist(&seed_hash) < HAMMING_THRESHOLD);
            pending = rest;

            group.sort_by(|a, b| {
                canonical_rank(a)
                    .cmp(&canonical_rank(b))
                    .then(a.file_name.len().cmp(&b.file_name.len()))
                    .then(b.file_size.cmp(&a.file_size))
            });
            let canonical = group.remove(0);
            for dup in group {
                debug!("duplicate image {} -> {}", dup.rel_path, canonical.rel_path);
                let _ = fs::remove_file(&dup.abs_path);
                replaced.insert(dup.rel_path, canonical.rel_path.clone());
            }
            keep.push(canonical);
        }

        if !replaced.is_empty() {
            info!("removed {} duplicate image(s)", replaced.len());
        }
        self.entries = keep;
        replaced
    }
}

fn canonical_rank(entry: &StoredImage) -> u8 {
    u8::from(entry.file_name.contains("__v"))
}

/// Bridge an `image` buffer into the hashing crate's own image types.
fn compat_image(rgb: &RgbImage) -> img_hash::image::DynamicImage {
    let (w, h) = rgb.dimensions();
    let buffer = img_hash::image::RgbImage::from_raw(w, h, rgb.as_raw().clone())
        .unwrap_or_else(|| img_hash::image::RgbImage::new(w, h));
    img_hash::image::DynamicImage::ImageRgb8(buffer)
}

/// Rewrite image references on records after dedup removed files.
pub fn rewrite_image_refs(records: &mut [Record], replaced: &BTreeMap<String, String>) {
    if replaced.is_empty() {
        return;
    }
    for record in records {
        for path in &mut record.context.images {
            if let Some(canonical) = replaced.get(path) {
                *path = canonical.clone();
            }
        }
        record.context.images.dedup();
        for key in ["image", "images"] {
            if let Some(value) = record.fields.get_mut(key) {
                rewrite_json_value(value, replaced);
            }
        }
    }
}

/// Replace every string matching a removed path anywhere in a JSON value.
pub fn rewrite_json_value(value: &mut Value, replaced: &BTreeMap<String, String>) {
    match value {
        Value::String(s) => {
            if let Some(canonical) = replaced.get(s) {
                *s = canonical.clone();
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                rewrite_json_value(item, replaced);
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                rewrite_json_value(item, replaced);
            }
        }
        _ => {}
    }
}

/// Sidecar entry for one stored image: the series it pictures, where it
/// came from, and every SKU of that series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageMapping {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_name: Option<String>,
    pub pdf: String,
    pub page: usize,
    pub skus: Vec<String>,
}

/// Image path -> [`ImageMapping`] side table, written next to the images.
///
/// An image carries the complete sorted SKU list of its series, not just
/// the rows that happened to sit under it; images without a series fall
/// back to the SKUs of the rows that reference them.
pub fn build_sku_mapping(records: &[Record]) -> BTreeMap<String, ImageMapping> {
    let mut series_skus: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for record in records {
        if let (Some(slug), Some(sku)) =
            (record.context.series_id.as_deref(), record.str_field("sku"))
        {
            series_skus.entry(slug).or_default().insert(sku);
        }
    }

    let mut mapping: BTreeMap<String, ImageMapping> = BTreeMap::new();
    let mut slugs: BTreeMap<String, Option<String>> = BTreeMap::new();
    let mut referencing: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for record in records {
        let Some(sku) = record.str_field("sku") else { continue };
        let ctx = &record.context;
        for path in &ctx.images {
            referencing
                .entry(path.clone())
                .or_default()
                .insert(sku.to_string());
            if !mapping.contains_key(path) {
                let stem = Path::new(&ctx.source_pdf)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| ctx.source_pdf.clone());
                mapping.insert(
                    path.clone(),
                    ImageMapping {
                        series_id: ctx
                            .series_id
                            .as_deref()
                            .map(|slug| crate::series::series_id(&stem, slug)),
                        series_name: ctx.series_name.clone(),
                        pdf: ctx.source_pdf.clone(),
                        page: ctx.page_number,
                        skus: Vec::new(),
                    },
                );
                slugs.insert(path.clone(), ctx.series_id.clone());
            }
        }
    }

    for (path, entry) in &mut mapping {
        let from_series = slugs
            .get(path)
            .and_then(|s| s.as_deref())
            .and_then(|slug| series_skus.get(slug));
        entry.skus = match from_series {
            Some(set) => set.iter().map(|s| s.to_string()).collect(),
            None => referencing
                .remove(path)
                .unwrap_or_default()
                .into_iter()
                .collect(),
        };
    }
    mapping
}
