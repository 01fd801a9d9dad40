//! Row-wise product extraction.
//!
//! One engine serves every row-wise catalog family; the differences live in
//! per-family field tables. A wanted field resolves to a column by, in
//! order: exact slug match, substring match, fixed position, and finally a
//! value-pattern override where a cell claims the field by what it contains
//! rather than what its header says.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::catalog::{CatalogConfig, CatalogKind};
use crate::extraction::RawTable;
use crate::model::Fields;
use crate::recognize::is_sku;

/// How a field claims a column.
pub struct FieldSpec {
    /// Output key.
    pub name: &'static str,
    /// Exact slugified header names.
    pub exact: &'static [&'static str],
    /// Substring matches against the slugified header.
    pub contains: &'static [&'static str],
    /// Positional fallback.
    pub position: Option<usize>,
    /// Value-pattern override: a cell matching this predicate claims the
    /// field even under an unrelated header.
    pub value_matches: Option<fn(&str) -> bool>,
}

static BAR_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+([.,]\d+)?\s*bar$").unwrap());
static MM_VALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+([.,]\d+)?\s*mm$").unwrap());
static METER_VALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\s*m$").unwrap());
static VOLT_VALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{3}(/\d{3})?\s*V$").unwrap());
static KW_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+([.,]\d+)?\s*kW$").unwrap());
static FLOW_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+([.,]\d+)?\s*m3?/h$").unwrap());
static MARK_VALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[xX✓✔]$").unwrap());

fn is_bar(v: &str) -> bool {
    BAR_VALUE.is_match(v.trim())
}
fn is_mm(v: &str) -> bool {
    MM_VALUE.is_match(v.trim())
}
fn is_meters(v: &str) -> bool {
    METER_VALUE.is_match(v.trim())
}
fn is_voltage(v: &str) -> bool {
    VOLT_VALUE.is_match(v.trim())
}
fn is_kw(v: &str) -> bool {
    KW_VALUE.is_match(v.trim())
}
fn is_flow(v: &str) -> bool {
    FLOW_VALUE.is_match(v.trim())
}

const ORDER_CODE: FieldSpec = FieldSpec {
    name: "bestelnr",
    exact: &["bestelnr", "bestelnummer", "artikelnr", "artikelnummer", "order_number"],
    contains: &["bestel", "artikel"],
    position: Some(0),
    value_matches: None,
};

static PUMP_SPECS: &[FieldSpec] = &[
    ORDER_CODE,
    FieldSpec {
        name: "type",
        exact: &["type", "model"],
        contains: &["type"],
        position: Some(1),
        value_matches: None,
    },
    FieldSpec {
        name: "spanning_v",
        exact: &["spanning", "spanning_v", "voltage"],
        contains: &["spanning"],
        position: None,
        value_matches: Some(is_voltage),
    },
    FieldSpec {
        name: "vermogen_kw",
        exact: &["vermogen", "vermogen_kw"],
        contains: &["vermogen"],
        position: None,
        value_matches: Some(is_kw),
    },
    FieldSpec {
        name: "debiet_m3_h",
        exact: &["debiet", "debiet_m3_h", "capaciteit"],
        contains: &["debiet", "capaciteit"],
        position: None,
        value_matches: Some(is_flow),
    },
    FieldSpec {
        name: "opvoerhoogte_m",
        exact: &["opvoerhoogte", "opvoerhoogte_m"],
        contains: &["opvoerhoogte"],
        position: None,
        value_matches: None,
    },
];

static PIPE_SPECS: &[FieldSpec] = &[
    ORDER_CODE,
    FieldSpec {
        name: "maat",
        exact: &["maat", "afmeting", "diameter"],
        contains: &["maat", "afmeting", "diameter"],
        position: None,
        value_matches: Some(is_mm),
    },
    FieldSpec {
        name: "werkdruk",
        exact: &["werkdruk", "druk"],
        contains: &["druk"],
        position: None,
        value_matches: Some(is_bar),
    },
    FieldSpec {
        name: "lengte",
        exact: &["lengte", "lengte_m"],
        contains: &["lengte"],
        position: None,
        value_matches: Some(is_meters),
    },
];

static DRIVE_SPECS: &[FieldSpec] = &[
    FieldSpec {
        name: "code",
        exact: &["code", "bestelnr", "artikelnr"],
        contains: &["code"],
        position: Some(0),
        value_matches: None,
    },
    FieldSpec {
        name: "omschrijving",
        exact: &["omschrijving", "beschrijving"],
        contains: &["omschrijving"],
        position: Some(1),
        value_matches: None,
    },
    FieldSpec {
        name: "vermogen_kw",
        exact: &["vermogen", "vermogen_kw"],
        contains: &["vermogen"],
        position: None,
        value_matches: Some(is_kw),
    },
];

static COMPRESSOR_SPECS: &[FieldSpec] = &[
    FieldSpec {
        name: "article_sku",
        exact: &["artikelnr", "artikelnummer", "bestelnr", "art_nr"],
        contains: &["artikel", "bestel"],
        position: None,
        value_matches: None,
    },
    FieldSpec {
        name: "model_name",
        exact: &["model", "type", "omschrijving"],
        contains: &["model", "type"],
        position: None,
        value_matches: None,
    },
    FieldSpec {
        name: "werkdruk",
        exact: &["werkdruk", "max_druk"],
        contains: &["druk"],
        position: None,
        value_matches: Some(is_bar),
    },
];

static FITTING_SPECS: &[FieldSpec] = &[
    ORDER_CODE,
    FieldSpec {
        name: "maat",
        exact: &["maat", "afmeting"],
        contains: &["maat", "afmeting"],
        position: Some(1),
        value_matches: None,
    },
];

/// Field table for a row-wise family.
pub fn field_specs(kind: CatalogKind) -> &'static [FieldSpec] {
    use CatalogKind::*;
    match kind {
        WellPumps | SubmersiblePumps | PistonPumps | CentrifugalPumps | PumpSpecials => PUMP_SPECS,
        PressurePipes | DrainPipes | AirPipes | PePipes | GalvanizedPipes => PIPE_SPECS,
        DriveTech => DRIVE_SPECS,
        Compressors => COMPRESSOR_SPECS,
        BrassFittings | StainlessFittings | BlackFittings | HoseCouplings | HoseClamps => {
            FITTING_SPECS
        }
        PressureCleaners | PowerTools | Generic => &[],
    }
}

fn cell<'a>(row: &'a [Option<String>], idx: usize) -> Option<&'a str> {
    row.get(idx)
        .and_then(|c| c.as_deref())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Extract one row-wise product record.
///
/// Columns not claimed by any field spec keep their slugified header key
/// (or `col_N`), so nothing a catalog prints is silently dropped.
pub fn extract_row(kind: CatalogKind, keys: &[String], row: &[Option<String>]) -> Fields {
    let mut fields = Fields::new();
    let width = keys.len().max(row.len());
    let mut claimed = vec![false; width];

    for spec in field_specs(kind) {
        let mut idx = keys
            .iter()
            .position(|k| spec.exact.contains(&k.as_str()))
            .or_else(|| {
                keys.iter()
                    .position(|k| spec.contains.iter().any(|n| k.contains(n)))
            });
        if idx.is_none() {
            idx = spec.position.filter(|&p| cell(row, p).is_some());
        }
        if idx.is_none() {
            if let Some(pred) = spec.value_matches {
                idx = (0..width).find(|&i| !claimed[i] && cell(row, i).is_some_and(pred));
            }
        }
        if let Some(i) = idx {
            if let Some(v) = cell(row, i) {
                if !claimed[i] && !fields.contains_key(spec.name) {
                    fields.insert(spec.name.to_string(), Value::String(v.to_string()));
                    claimed[i] = true;
                }
            }
        }
    }

    // Value override for the order code: a cell matching the family grammar
    // claims the code field even when no header said so.
    let sku_field = CatalogConfig::for_kind(kind).sku_field;
    if !fields.contains_key(sku_field) && !fields.contains_key("bestelnr") {
        if let Some(i) = (0..width).find(|&i| !claimed[i] && cell(row, i).is_some_and(|v| is_sku(kind, v)))
        {
            if let Some(v) = cell(row, i) {
                fields.insert(sku_field.to_string(), Value::String(v.to_string()));
                claimed[i] = true;
            }
        }
    }

    for i in 0..width {
        if claimed[i] {
            continue;
        }
        if let Some(v) = cell(row, i) {
            let key = keys.get(i).cloned().unwrap_or_else(|| format!("col_{i}"));
            fields
                .entry(key)
                .or_insert_with(|| Value::String(v.to_string()));
        }
    }

    fields
}

/// True when no cell carries a value.
pub fn row_is_empty(row: &[Option<String>]) -> bool {
    !row.iter().flatten().any(|c| !c.trim().is_empty())
}

/// Tables whose column headers are themselves SKUs with `x` marks in the
/// body: one record per marked column, the first column naming the variant
/// each mark applies to.
pub fn extract_header_as_sku(kind: CatalogKind, table: &RawTable) -> Vec<Fields> {
    let Some(header) = table.rows.first() else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for (col, head) in header.iter().enumerate().skip(1) {
        let Some(sku) = head.as_deref().map(str::trim).filter(|h| is_sku(kind, h)) else {
            continue;
        };
        let mut variants = Vec::new();
        for row in &table.rows[1..] {
            let marked = cell(row, col).is_some_and(|v| MARK_VALUE.is_match(v));
            if marked {
                if let Some(label) = cell(row, 0) {
                    variants.push(Value::String(label.to_string()));
                }
            }
        }
        let mut fields = Fields::new();
        fields.insert("sku".to_string(), Value::String(sku.to_string()));
        if !variants.is_empty() {
            fields.insert("variants".to_string(), Value::Array(variants));
        }
        records.push(fields);
    }
    records
}

/// Carry-forward state for grouped tables: continuation rows without their
/// own code inherit the previous row's code, model, and product group and
/// are marked as variants.
#[derive(Debug, Default)]
pub struct RowCarry {
    sku: Option<String>,
    model: Option<String>,
    group: Option<String>,
}

impl RowCarry {
    pub fn apply(&mut self, fields: &mut Fields, sku_field: &str) {
        if let Some(group) = fields.get("product_type").and_then(Value::as_str) {
            self.group = Some(group.to_string());
        } else if let Some(group) = &self.group {
            fields.insert("product_type".to_string(), Value::String(group.clone()));
        }

        match fields.get(sku_field).and_then(Value::as_str) {
            Some(sku) => {
                self.sku = Some(sku.to_string());
                self.model = fields
                    .get("model_name")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
            None => {
                if let Some(sku) = &self.sku {
                    fields.insert(sku_field.to_string(), Value::String(sku.clone()));
                    if let Some(model) = &self.model {
                        fields
                            .entry("model_name".to_string())
                            .or_insert_with(|| Value::String(model.clone()));
                    }
                    fields.insert("is_variant".to_string(), Value::Bool(true));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BBox;

    fn cells(vals: &[&str]) -> Vec<Option<String>> {
        vals.iter()
            .map(|v| (!v.is_empty()).then(|| v.to_string()))
            .collect()
    }

    #[test]
    fn test_exact_header_match_wins() {
        let keys = vec!["bestelnr".to_string(), "maat".to_string(), "werkdruk".to_string()];
        let f = extract_row(
            CatalogKind::PressurePipes,
            &keys,
            &cells(&["DB12345", "110 mm", "10 bar"]),
        );
        assert_eq!(f["bestelnr"], "DB12345");
        assert_eq!(f["maat"], "110 mm");
        assert_eq!(f["werkdruk"], "10 bar");
    }

    #[test]
    fn test_substring_header_match() {
        let keys = vec!["bestelnr".to_string(), "max_werkdruk_bar".to_string()];
        let f = extract_row(CatalogKind::PressurePipes, &keys, &cells(&["DB12345", "16 bar"]));
        assert_eq!(f["werkdruk"], "16 bar");
    }

    #[test]
    fn test_value_pattern_override() {
        // Header is useless; the bar cell still lands on werkdruk.
        let keys = vec!["col_0".to_string(), "col_1".to_string()];
        let f = extract_row(CatalogKind::PressurePipes, &keys, &cells(&["DB12345", "10 bar"]));
        assert_eq!(f["werkdruk"], "10 bar");
        assert_eq!(f["bestelnr"], "DB12345");
    }

    #[test]
    fn test_unresolved_columns_keep_slug_key() {
        let keys = vec!["bestelnr".to_string(), "kleur".to_string()];
        let f = extract_row(CatalogKind::PressurePipes, &keys, &cells(&["DB12345", "grijs"]));
        assert_eq!(f["kleur"], "grijs");
    }

    #[test]
    fn test_header_as_sku_marks() {
        let table = RawTable {
            bbox: BBox::new(0.0, 0.0, 100.0, 30.0),
            rows: vec![
                cells(&["Maat", "GM10012", "GM10016"]),
                cells(&["8-12 mm", "x", ""]),
                cells(&["12-16 mm", "", "x"]),
            ],
            row_bboxes: vec![],
        };
        let recs = extract_header_as_sku(CatalogKind::HoseClamps, &table);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0]["sku"], "GM10012");
        assert_eq!(recs[0]["variants"], serde_json::json!(["8-12 mm"]));
    }

    #[test]
    fn test_carry_forward_marks_variants() {
        let mut carry = RowCarry::default();

        let mut first = Fields::new();
        first.insert("article_sku".into(), "36501".into());
        first.insert("model_name".into(), "HL 360".into());
        carry.apply(&mut first, "article_sku");
        assert!(first.get("is_variant").is_none());

        let mut cont = Fields::new();
        cont.insert("werkdruk".into(), "10 bar".into());
        carry.apply(&mut cont, "article_sku");
        assert_eq!(cont["article_sku"], "36501");
        assert_eq!(cont["model_name"], "HL 360");
        assert_eq!(cont["is_variant"], true);
    }
}
