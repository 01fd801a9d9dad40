//! Raw table classification: deciding which leading rows are headers,
//! merging split headers, and synthesizing keys for headerless tables.

use std::sync::LazyLock;

use regex::Regex;

use crate::extraction::{RawTable, TextLine};
use crate::geometry::BBox;
use crate::text::slugify_header;

static LETTER_DIGIT_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2,}[A-Z0-9]*\d+").unwrap());
static NUMERIC_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{5,10}$").unwrap());
static METER_VALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\s*m\b").unwrap());

static SIZE_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:[.,]\d+)?\s*mm\b").unwrap());
static PRESSURE_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:[.,]\d+)?\s*bar\b").unwrap());
static LENGTH_VALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+\s*m\b").unwrap());

const CODE_KEYS: [&str; 6] = [
    "bestelnr",
    "bestelnummer",
    "artikelnr",
    "artikelnummer",
    "art_nr",
    "code",
];

/// A table after header classification: slugified keys plus data rows.
#[derive(Debug, Clone)]
pub struct ClassifiedTable {
    pub keys: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    pub row_bboxes: Vec<BBox>,
    pub bbox: BBox,
    pub header_rows: usize,
}

/// True when a row reads as product data rather than header text.
pub fn looks_like_data(row: &[Option<String>]) -> bool {
    for cell in row.iter().flatten() {
        let cell = cell.trim();
        if LETTER_DIGIT_CODE.is_match(cell) || NUMERIC_CODE.is_match(cell) {
            return true;
        }
    }
    row.iter()
        .flatten()
        .map(|c| c.trim())
        .find(|c| !c.is_empty())
        .is_some_and(|c| c.starts_with(|ch: char| ch.is_ascii_digit()))
}

/// Number of leading header rows: 0, 1 or 2.
///
/// Two-row headers occur when the catalog splits a label over a main row
/// and a unit/refinement row; both rows must read as non-data.
pub fn header_row_count(rows: &[Vec<Option<String>>]) -> usize {
    let Some(first) = rows.first() else { return 0 };
    if looks_like_data(first) {
        return 0;
    }
    match rows.get(1) {
        Some(second)
            if !looks_like_data(second)
                && second.iter().flatten().any(|c| !c.trim().is_empty())
                && rows.len() > 2 =>
        {
            2
        }
        _ => 1,
    }
}

/// Merge two header rows cell-wise with a single space.
fn merge_header_rows(a: &[Option<String>], b: &[Option<String>]) -> Vec<Option<String>> {
    let width = a.len().max(b.len());
    (0..width)
        .map(|i| {
            let top = a.get(i).and_then(|c| c.as_deref()).unwrap_or("").trim();
            let bottom = b.get(i).and_then(|c| c.as_deref()).unwrap_or("").trim();
            let merged = match (top.is_empty(), bottom.is_empty()) {
                (true, true) => return None,
                (false, true) => top.to_string(),
                (true, false) => bottom.to_string(),
                (false, false) => format!("{top} {bottom}"),
            };
            Some(merged)
        })
        .collect()
}

/// Classify a raw table: split off header rows and derive per-column keys.
///
/// Header cells slugify to `snake_case` keys; empty or missing cells get a
/// positional `col_N` key. Headerless tables synthesize `col_N` throughout,
/// then header inference may still name the first and last columns from
/// their values.
pub fn classify(table: &RawTable) -> ClassifiedTable {
    let header_rows = header_row_count(&table.rows);
    let width = table.rows.iter().map(Vec::len).max().unwrap_or(0);

    let header_cells: Vec<Option<String>> = match header_rows {
        2 => merge_header_rows(&table.rows[0], &table.rows[1]),
        1 => table.rows[0].clone(),
        _ => vec![None; width],
    };

    let mut keys: Vec<String> = (0..width)
        .map(|i| {
            header_cells
                .get(i)
                .and_then(|c| c.as_deref())
                .map(slugify_header)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("col_{i}"))
        })
        .collect();

    let rows: Vec<Vec<Option<String>>> = table.rows[header_rows..].to_vec();
    let row_bboxes: Vec<BBox> = table.row_bboxes.get(header_rows..).unwrap_or(&[]).to_vec();

    if header_rows == 0 {
        infer_headerless_keys(&mut keys, &rows);
    }

    ClassifiedTable {
        keys,
        rows,
        row_bboxes,
        bbox: table.bbox,
        header_rows,
    }
}

/// Name columns of a headerless table from their values: the column that
/// scores as order codes is the order number, a last column of `N m`
/// values is a length.
fn infer_headerless_keys(keys: &mut [String], rows: &[Vec<Option<String>>]) {
    if keys.is_empty() {
        return;
    }

    let col_values = |idx: usize| {
        rows.iter()
            .filter_map(move |r| r.get(idx).and_then(|c| c.as_deref()))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(col) = crate::recognize::detect_sku_column(rows) {
        keys[col] = "bestelnr".to_string();
    }

    let last = keys.len() - 1;
    let (last_total, last_hits) = col_values(last).fold((0usize, 0usize), |(t, h), v| {
        (t + 1, h + usize::from(METER_VALUE.is_match(v)))
    });
    if last_total >= 2 && last_hits == last_total {
        keys[last] = "lengte".to_string();
    }
}

fn compact(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

fn find_unit(row_text: &str, pattern: &Regex, present: &[String]) -> Option<String> {
    pattern
        .find_iter(row_text)
        .map(|m| m.as_str().to_string())
        .find(|v| !present.contains(&compact(v)))
}

/// Backfill blank cells from the text lines covering each row.
///
/// Cell extraction sometimes drops a value even though it is visible in
/// the table. Each row's line text is reassembled by vertical position and
/// matched against the column schema (order code, `mm` size, `bar`
/// pressure, `m` length); only values not already sitting in another cell
/// of the row are filled in. Only lines overlapping the row may be read,
/// never the whole page.
pub fn repair_rows(table: &mut ClassifiedTable, lines: &[TextLine], code_pattern: &Regex) {
    let keys = table.keys.clone();
    for (row, row_bbox) in table.rows.iter_mut().zip(&table.row_bboxes) {
        let row_text = lines
            .iter()
            .filter(|l| l.bbox.y0 < row_bbox.y1 && l.bbox.y1 > row_bbox.y0)
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        if row_text.trim().is_empty() {
            continue;
        }

        let mut present: Vec<String> = row.iter().flatten().map(|c| compact(c)).collect();
        for idx in 0..row.len() {
            if row[idx].as_deref().is_some_and(|c| !c.trim().is_empty()) {
                continue;
            }
            let key = keys.get(idx).map(String::as_str).unwrap_or("");
            let found = if CODE_KEYS.contains(&key) {
                let compact_text = compact(&row_text);
                code_pattern
                    .find_iter(&compact_text)
                    .map(|m| m.as_str().to_string())
                    .find(|c| !present.contains(c))
            } else if key.contains("maat") || key.contains("diameter") {
                find_unit(&row_text, &SIZE_VALUE, &present)
            } else if key.contains("druk") {
                find_unit(&row_text, &PRESSURE_VALUE, &present)
            } else if key.contains("lengte") {
                find_unit(&row_text, &LENGTH_VALUE, &present)
            } else {
                None
            };
            if let Some(value) = found {
                present.push(compact(&value));
                row[idx] = Some(value);
            }
        }
    }
}
