//! Flatten extracted records into the uniform output shape.
//!
//! Flattening merges the page context into each record, settles on one
//! canonical `sku` (dropping records without one), translates Dutch column
//! keys, renames positional `col_N` keys from their values, denormalizes
//! page specs, and sorts. Running it on an already-flat payload changes
//! nothing.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::model::{CatalogPayload, Fields, Record};
use crate::series;
use crate::text::{is_all_caps, strip_artifacts};

/// SKU shapes that are table filler, not codes.
static INVALID_SKU_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"^-\s*-$", r"^-\s+\d+", r"^-+\s*$", r"^\s*$", r"^\d+\s*-\s*$"]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
});

static FRACTION_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\d+(\s+\d+)?/\d+\s*"?$"#).unwrap());
static GENERIC_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2,}[A-Z0-9]*\d+$|^\d{5,10}$").unwrap());
static COL_KEY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^col_\d+$").unwrap());

static X_SIZE_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+([.,]\d+)?\s*[xX]\s*\d+([.,]\d+)?$").unwrap());
static MM_VALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+([.,]\d+)?\s*mm$").unwrap());
static DIAMETER_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Ø\s*\d+([.,]\d+)?(\s*mm)?$").unwrap());
static KG_VALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+([.,]\d+)?\s*kg$").unwrap());
static BAR_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+([.,]\d+)?\s*bar$").unwrap());
static M_VALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\s*m$").unwrap());
static LITER_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+([.,]\d+)?\s*[lL]$").unwrap());

/// Dutch table headers -> stable English keys.
static KEY_RENAMES: &[(&str, &str)] = &[
    ("maat", "size"),
    ("afmeting", "size"),
    ("werkdruk", "pressure_bar"),
    ("werkdruk_bar", "pressure_bar"),
    ("lengte", "length"),
    ("lengte_m", "length_m"),
    ("gewicht", "weight"),
    ("gewicht_kg", "weight_kg"),
    ("omschrijving", "description"),
    ("kleur", "color"),
    ("inhoud", "volume"),
    ("aansluiting", "connection"),
    ("materiaal", "material"),
    ("opvoerhoogte", "head_m"),
    ("opvoerhoogte_m", "head_m"),
];

fn is_invalid_sku(value: &str) -> bool {
    INVALID_SKU_PATTERNS.iter().any(|p| p.is_match(value))
}

/// Settle the canonical `sku` field: explicit code fields first, then a
/// positional sweep that refuses fraction sizes, then validation. Returns
/// false when no valid code can be found; such records are dropped.
fn resolve_sku(fields: &mut Fields) -> bool {
    let existing = fields
        .get("sku")
        .and_then(Value::as_str)
        .map(strip_artifacts);
    let mut sku = existing.filter(|s| !s.is_empty());

    if sku.is_none() {
        for key in ["order_number", "bestelnr", "article_sku", "article_nr", "code", "model"] {
            if let Some(v) = fields.get(key).and_then(Value::as_str) {
                let v = strip_artifacts(v);
                if !v.is_empty() {
                    sku = Some(v);
                    break;
                }
            }
        }
    }

    if sku.is_none() {
        // Positional fallback: first code-like value that is not a size.
        sku = fields.values().find_map(|v| {
            let v = strip_artifacts(v.as_str()?);
            (GENERIC_CODE.is_match(&v) && !FRACTION_SIZE.is_match(&v)).then_some(v)
        });
    }

    match sku.filter(|s| !is_invalid_sku(s)) {
        Some(sku) => {
            fields.insert("sku".to_string(), Value::String(sku));
            true
        }
        None => false,
    }
}

fn rename_keys(fields: &mut Fields) {
    for (from, to) in KEY_RENAMES {
        if fields.contains_key(*from) && !fields.contains_key(*to) {
            if let Some(value) = fields.remove(*from) {
                fields.insert(to.to_string(), value);
            }
        }
    }
}

/// Rename `col_N` keys from what their values look like.
fn rename_positional_keys(fields: &mut Fields) {
    let renames: Vec<(String, &'static str)> = fields
        .iter()
        .filter(|(key, _)| COL_KEY.is_match(key))
        .filter_map(|(key, value)| {
            let v = value.as_str()?.trim();
            let target = if X_SIZE_VALUE.is_match(v) || FRACTION_SIZE.is_match(v) {
                "size"
            } else if MM_VALUE.is_match(v) {
                "length_mm"
            } else if DIAMETER_VALUE.is_match(v) {
                "diameter_mm"
            } else if KG_VALUE.is_match(v) {
                "weight_kg"
            } else if BAR_VALUE.is_match(v) {
                "pressure_bar"
            } else if M_VALUE.is_match(v) {
                "length_m"
            } else if LITER_VALUE.is_match(v) {
                "volume_l"
            } else if key == "col_0" && is_all_caps(v) {
                "model_name"
            } else {
                return None;
            };
            Some((key.clone(), target))
        })
        .collect();

    for (from, to) in renames {
        if !fields.contains_key(to) {
            if let Some(value) = fields.remove(&from) {
                fields.insert(to.to_string(), value);
            }
        }
    }
}

/// Replace a stitched-header series name with one derived from the SKU.
fn repair_series(fields: &mut Fields, pdf_stem: &str) {
    let placeholder = fields
        .get("series_name")
        .and_then(Value::as_str)
        .is_some_and(series::is_placeholder_series);
    if !placeholder {
        return;
    }
    let derived = fields
        .get("sku")
        .and_then(Value::as_str)
        .and_then(series::series_from_sku);
    match derived {
        Some(s) => {
            fields.insert("series_name".to_string(), Value::String(s.name));
            fields.insert(
                "series_id".to_string(),
                Value::String(series::series_id(pdf_stem, &s.slug)),
            );
        }
        None => {
            fields.remove("series_name");
            fields.remove("series_id");
        }
    }
}

/// Merge a record's page context into its flat field map.
fn merge_context(record: Record, pdf_stem: &str) -> Fields {
    let Record { mut fields, context } = record;

    let mut set = |key: &str, value: Value| {
        if !fields.contains_key(key) {
            fields.insert(key.to_string(), value);
        }
    };
    set("source_pdf", Value::String(context.source_pdf));
    set("page", Value::from(context.page_number));
    if let Some(category) = context.category {
        set("category", Value::String(category));
    }
    if let Some(slug) = context.series_id {
        set(
            "series_id",
            Value::String(series::series_id(pdf_stem, &slug)),
        );
    }
    if let Some(name) = context.series_name {
        set("series_name", Value::String(name));
    }
    if let Some(application) = context.application {
        set("application", Value::String(application));
    }
    if let Some(brand) = context.brand {
        set("brand", Value::String(brand));
    }
    if let Some(specs_text) = context.specs_text {
        set("specs_text", Value::String(specs_text));
    }
    if !context.images.is_empty() {
        set("image", Value::String(context.images[0].clone()));
        set(
            "images",
            Value::Array(context.images.into_iter().map(Value::String).collect()),
        );
    }
    for (key, value) in context.product_specs {
        let key = format!("spec_{key}");
        if !fields.contains_key(&key) {
            fields.insert(key, Value::String(value));
        }
    }
    fields
}

/// Normalize already-flat products. Records whose SKU cannot be resolved
/// (or is a table-filler placeholder) are dropped. Idempotent.
pub fn normalize_flat(mut products: Vec<Fields>, pdf_stem: &str) -> Vec<Fields> {
    products.retain_mut(|fields| {
        if !resolve_sku(fields) {
            return false;
        }
        rename_keys(fields);
        rename_positional_keys(fields);
        repair_series(fields, pdf_stem);
        true
    });
    products.sort_by(|a, b| {
        let key = |f: &Fields| {
            (
                f.get("sku").and_then(Value::as_str).unwrap_or("").to_string(),
                f.get("series_id").and_then(Value::as_str).unwrap_or("").to_string(),
            )
        };
        key(a).cmp(&key(b))
    });
    products
}

/// Flatten extracted records into the output payload for one PDF.
pub fn flatten_records(records: Vec<Record>, source_pdf: &str) -> CatalogPayload {
    let pdf_stem = Path::new(source_pdf)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source_pdf)
        .to_string();

    let flat: Vec<Fields> = records
        .into_iter()
        .map(|r| merge_context(r, &pdf_stem))
        .collect();
    let products = normalize_flat(flat, &pdf_stem);

    let mut series_ids: Vec<&str> = products
        .iter()
        .filter_map(|f| f.get("series_id").and_then(Value::as_str))
        .collect();
    series_ids.sort_unstable();
    series_ids.dedup();

    CatalogPayload {
        source_pdf: source_pdf.to_string(),
        product_count: products.len(),
        series_count: series_ids.len(),
        products,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RowContext;
    use serde_json::json;

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    #[test]
    fn test_basic_flatten_scenario() {
        let mut ctx = RowContext::default();
        ctx.source_pdf = "drukbuizen.pdf".into();
        ctx.page_number = 3;
        let rec = Record::new(
            fields(&[("bestelnr", "DB12345"), ("maat", "110 mm"), ("werkdruk", "10 bar")]),
            ctx,
        );
        let payload = flatten_records(vec![rec], "drukbuizen.pdf");
        assert_eq!(payload.product_count, 1);
        let p = &payload.products[0];
        assert_eq!(p["sku"], "DB12345");
        assert_eq!(p["size"], "110 mm");
        assert_eq!(p["pressure_bar"], "10 bar");
        assert_eq!(p["page"], 3);
    }

    #[test]
    fn test_invalid_skus_drop_the_record() {
        for bad in ["- -", "---", "12 -", "-  34", "  "] {
            let mut f = fields(&[]);
            f.insert("sku".into(), json!(bad));
            let out = normalize_flat(vec![f], "x");
            assert!(out.is_empty(), "{bad:?} should drop the record");
        }
    }

    #[test]
    fn test_record_without_resolvable_sku_dropped() {
        let f = fields(&[("omschrijving", "alleen tekst")]);
        assert!(normalize_flat(vec![f], "x").is_empty());
    }

    #[test]
    fn test_fraction_never_becomes_sku() {
        // A lone size cell must not be promoted to a code; without any
        // code the record goes away.
        let f = fields(&[("size", "1/2\"")]);
        assert!(normalize_flat(vec![f], "x").is_empty());
    }

    #[test]
    fn test_artifacts_stripped_from_sku() {
        let f = fields(&[("bestelnr", "✓ DB12345")]);
        let out = normalize_flat(vec![f], "x");
        assert_eq!(out[0]["sku"], "DB12345");
    }

    #[test]
    fn test_col_value_renames() {
        let f = fields(&[
            ("bestelnr", "DB12345"),
            ("col_0", "POMP X"),
            ("col_1", "40x40"),
            ("col_2", "110 mm"),
            ("col_3", "Ø 63"),
            ("col_4", "3,5 kg"),
            ("col_5", "16 bar"),
            ("col_6", "25 L"),
        ]);
        let out = normalize_flat(vec![f], "x");
        let p = &out[0];
        assert_eq!(p["model_name"], "POMP X");
        assert_eq!(p["size"], "40x40");
        assert_eq!(p["length_mm"], "110 mm");
        assert_eq!(p["diameter_mm"], "Ø 63");
        assert_eq!(p["weight_kg"], "3,5 kg");
        assert_eq!(p["pressure_bar"], "16 bar");
        assert_eq!(p["volume_l"], "25 L");
    }

    #[test]
    fn test_placeholder_series_rederived_from_sku() {
        let f = fields(&[
            ("sku", "MF241812"),
            ("series_name", "Bestelnr Maat"),
            ("series_id", "cat__bestelnr-maat"),
        ]);
        let out = normalize_flat(vec![f], "cat");
        assert_eq!(out[0]["series_name"], "Knie 90");
        assert_eq!(out[0]["series_id"], "cat__knie-90");
    }

    #[test]
    fn test_spec_prefix_and_series_namespace() {
        let mut ctx = RowContext::default();
        ctx.source_pdf = "cat.pdf".into();
        ctx.page_number = 1;
        ctx.series_id = Some("pvc-druk".into());
        ctx.series_name = Some("PVC Druk".into());
        ctx.product_specs.insert("werkdruk".into(), "10 bar".into());
        let rec = Record::new(fields(&[("bestelnr", "DB12345")]), ctx);
        let payload = flatten_records(vec![rec], "cat.pdf");
        let p = &payload.products[0];
        assert_eq!(p["series_id"], "cat__pvc-druk");
        assert_eq!(p["spec_werkdruk"], "10 bar");
        assert_eq!(payload.series_count, 1);
    }

    #[test]
    fn test_sort_by_sku_then_series() {
        let a = fields(&[("sku", "B2")]);
        let b = fields(&[("sku", "A1"), ("series_id", "x__t")]);
        let c = fields(&[("sku", "A1"), ("series_id", "x__s")]);
        let out = normalize_flat(vec![a, b, c], "x");
        assert_eq!(out[0]["series_id"], "x__s");
        assert_eq!(out[1]["series_id"], "x__t");
        assert_eq!(out[2]["sku"], "B2");
    }

    #[test]
    fn test_normalize_flat_is_idempotent() {
        let f = fields(&[
            ("bestelnr", "DB12345"),
            ("maat", "110 mm"),
            ("col_2", "16 bar"),
            ("series_name", "Bestelnr Maat"),
        ]);
        let once = normalize_flat(vec![f], "cat");
        let twice = normalize_flat(once.clone(), "cat");
        assert_eq!(once, twice);
    }
}
