//! Record enrichment: canonical SKU, material, angle, inch sizes, family id.
//!
//! Enrichment only ever fills gaps. A value the extractor already produced
//! is never overwritten.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::model::Record;
use crate::text::slugify;

/// SKU prefix -> material, longest prefix first.
static MATERIAL_PREFIXES: &[(&str, &str)] = &[
    ("9ZF", "rvs"),
    ("9LA", "rvs"),
    ("7ZF", "staal-zwart"),
    ("7GB", "staal-zwart"),
    ("7LA", "staal-zwart"),
    ("MF", "messing"),
    ("ZF", "verzinkt-staal"),
    ("GB", "verzinkt-staal"),
    ("BUL", "verzinkt-staal"),
];

/// Digit code -> printed inch size, longest code first.
static INCH_SIZE_CODES: &[(&str, &str)] = &[
    ("212", "2 1/2\""),
    ("114", "1 1/4\""),
    ("112", "1 1/2\""),
    ("18", "1/8\""),
    ("14", "1/4\""),
    ("38", "3/8\""),
    ("12", "1/2\""),
    ("34", "3/4\""),
    ("1", "1\""),
    ("2", "2\""),
    ("3", "3\""),
    ("4", "4\""),
];

/// Series keywords meaning the SKU encodes two sizes.
static TWO_SIZE_KEYWORDS: &[&str] = &["VERLOOP", "WARTEL", "OVERGANG", "REDUCTIE"];

static DEGREE_VALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{1,3})\s*°").unwrap());
static ELBOW_DEGREES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:KNIE|BOCHT)\D{0,8}(\d{2,3})").unwrap());
static GRADEN_PHRASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,3})\s*GRADEN").unwrap());
static BRASS_SKU_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^MF\d{2}(\d+)$").unwrap());

/// Canonicalize `sku` from whichever code field the extractor filled.
pub fn normalize_sku(record: &mut Record) {
    if record.str_field("sku").is_some() {
        return;
    }
    for key in ["bestelnr", "order_number", "article_sku", "article_nr", "code", "model"] {
        if let Some(v) = record.str_field(key) {
            let v = v.trim().to_string();
            record.fields.insert("sku".to_string(), Value::String(v));
            return;
        }
    }
}

fn material_for_sku(sku: &str) -> Option<&'static str> {
    let sku = sku.to_uppercase();
    MATERIAL_PREFIXES
        .iter()
        .filter(|(prefix, _)| sku.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, material)| *material)
}

/// Angle in degrees from the strongest available signal: an explicit `°`
/// value, an elbow keyword with digits, a `GRADEN` phrase, or a tee (always
/// 90).
pub fn angle_from_text(text: &str) -> Option<i64> {
    let upper = text.to_uppercase();
    for pattern in [&*DEGREE_VALUE, &*ELBOW_DEGREES, &*GRADEN_PHRASE] {
        if let Some(caps) = pattern.captures(&upper) {
            if let Ok(angle) = caps[1].parse::<i64>() {
                if (15..=180).contains(&angle) {
                    return Some(angle);
                }
            }
        }
    }
    if upper.contains("T-STUK") {
        return Some(90);
    }
    None
}

/// Decode the digit tail of a brass fitting SKU into printed inch sizes.
///
/// Tries every prefix decomposition into one (or, for reducer-style series,
/// two) size codes and keeps the decode with the least leftover digits.
pub fn decode_inch_sizes(digits: &str, two_sizes: bool) -> Vec<&'static str> {
    let mut best: Option<(usize, Vec<&'static str>)> = None;
    let mut consider = |leftover: usize, sizes: Vec<&'static str>| {
        if best.as_ref().is_none_or(|(b, _)| leftover < *b) {
            best = Some((leftover, sizes));
        }
    };

    for (code_a, size_a) in INCH_SIZE_CODES {
        let Some(rest) = digits.strip_prefix(code_a) else { continue };
        if two_sizes {
            for (code_b, size_b) in INCH_SIZE_CODES {
                if let Some(tail) = rest.strip_prefix(code_b) {
                    consider(tail.len(), vec![size_a, size_b]);
                }
            }
        } else {
            consider(rest.len(), vec![size_a]);
        }
    }

    best.map(|(_, sizes)| sizes).unwrap_or_default()
}

fn identity_text(record: &Record) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for key in ["sku", "type", "model", "maat"] {
        if let Some(v) = record.str_field(key) {
            parts.push(v);
        }
    }
    if let Some(series) = &record.context.series_id {
        parts.push(series);
    }
    parts.join("|")
}

/// Stable family id: slug of the series/type plus a short content digest.
fn build_family_id(record: &Record) -> Option<String> {
    let base = record
        .context
        .series_name
        .as_deref()
        .or_else(|| record.str_field("type"))
        .or_else(|| record.str_field("model"))?;
    let slug = slugify(base);
    if slug.is_empty() {
        return None;
    }
    let digest = md5::compute(identity_text(record));
    let hash = format!("{digest:x}");
    Some(format!("{slug}-{}", &hash[..6]))
}

/// Fill in derived fields. Existing values always win.
pub fn enrich_record(record: &mut Record) {
    normalize_sku(record);

    let sku = record.str_field("sku").map(str::to_string);

    if let Some(sku) = &sku {
        if let Some(material) = material_for_sku(sku) {
            record.set_if_absent("material", Value::String(material.to_string()));
        }
    }

    if !record.fields.contains_key("angle") {
        let mut signal = String::new();
        for key in ["type", "model", "omschrijving"] {
            if let Some(v) = record.str_field(key) {
                signal.push_str(v);
                signal.push(' ');
            }
        }
        if let Some(name) = &record.context.series_name {
            signal.push_str(name);
        }
        if let Some(angle) = angle_from_text(&signal) {
            record
                .fields
                .insert("angle".to_string(), Value::from(angle));
        }
    }

    if !record.fields.contains_key("size") {
        if let Some(sku) = &sku {
            if let Some(caps) = BRASS_SKU_DIGITS.captures(sku) {
                let two = record
                    .context
                    .series_name
                    .as_deref()
                    .map(str::to_uppercase)
                    .is_some_and(|n| TWO_SIZE_KEYWORDS.iter().any(|k| n.contains(k)));
                let sizes = decode_inch_sizes(&caps[1], two);
                let mut it = sizes.into_iter();
                if let Some(first) = it.next() {
                    record
                        .fields
                        .insert("size".to_string(), Value::String(first.to_string()));
                }
                if let Some(second) = it.next() {
                    record
                        .fields
                        .insert("size_2".to_string(), Value::String(second.to_string()));
                }
            }
        }
    }

    if !record.fields.contains_key("family_id") {
        if let Some(family) = build_family_id(record) {
            record
                .fields
                .insert("family_id".to_string(), Value::String(family));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Fields, RowContext};
    use serde_json::json;

    fn record(pairs: &[(&str, &str)]) -> Record {
        let mut fields = Fields::new();
        for (k, v) in pairs {
            fields.insert(k.to_string(), json!(v));
        }
        Record::new(fields, RowContext::default())
    }

    #[test]
    fn test_normalize_sku_prefers_existing() {
        let mut rec = record(&[("sku", "KEEP1"), ("bestelnr", "DB12345")]);
        normalize_sku(&mut rec);
        assert_eq!(rec.str_field("sku"), Some("KEEP1"));
    }

    #[test]
    fn test_normalize_sku_from_bestelnr() {
        let mut rec = record(&[("bestelnr", "DB12345")]);
        normalize_sku(&mut rec);
        assert_eq!(rec.str_field("sku"), Some("DB12345"));
    }

    #[test]
    fn test_material_longest_prefix() {
        assert_eq!(material_for_sku("9ZF1234"), Some("rvs"));
        assert_eq!(material_for_sku("ZF1234"), Some("verzinkt-staal"));
        assert_eq!(material_for_sku("MF241812"), Some("messing"));
        assert_eq!(material_for_sku("DB12345"), None);
    }

    #[test]
    fn test_angle_sources() {
        assert_eq!(angle_from_text("KNIE 90°"), Some(90));
        assert_eq!(angle_from_text("BOCHT 45"), Some(45));
        assert_eq!(angle_from_text("90 GRADEN KNIE"), Some(90));
        assert_eq!(angle_from_text("T-STUK 1/2\""), Some(90));
        assert_eq!(angle_from_text("SOK"), None);
    }

    #[test]
    fn test_decode_single_size() {
        assert_eq!(decode_inch_sizes("12", false), vec!["1/2\""]);
        assert_eq!(decode_inch_sizes("212", false), vec!["2 1/2\""]);
    }

    #[test]
    fn test_decode_two_sizes_least_leftover() {
        // "1812" must read as 1/8" x 1/2", not 1/8" + leftover.
        assert_eq!(decode_inch_sizes("1812", true), vec!["1/8\"", "1/2\""]);
        assert_eq!(decode_inch_sizes("11212", true), vec!["1 1/2\"", "1/2\""]);
    }

    #[test]
    fn test_enrich_never_clobbers() {
        let mut rec = record(&[("sku", "MF241812"), ("material", "brons")]);
        enrich_record(&mut rec);
        assert_eq!(rec.str_field("material"), Some("brons"));
        assert_eq!(rec.str_field("size"), Some("1/8\""));
    }

    #[test]
    fn test_family_id_stable() {
        let mut ctx = RowContext::default();
        ctx.series_name = Some("Knie 90".into());
        let mut a = Record::new(record(&[("sku", "MF241812")]).fields, ctx.clone());
        let mut b = Record::new(record(&[("sku", "MF241812")]).fields, ctx);
        enrich_record(&mut a);
        enrich_record(&mut b);
        assert_eq!(a.fields["family_id"], b.fields["family_id"]);
        let id = a.fields["family_id"].as_str().unwrap();
        assert!(id.starts_with("knie-90-"));
        assert_eq!(id.len(), "knie-90-".len() + 6);
    }
}
