//! Transposed model tables: one product per column.
//!
//! Power-tool and high-pressure-cleaner catalogs print a model code per
//! column and spec names down the first column. Records come out one per
//! column; price rows get euro parsing plus VAT completion, and a regex
//! battery distills typed properties from the free-text spec values.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::catalog::CatalogKind;
use crate::extraction::RawTable;
use crate::model::Fields;
use crate::recognize::is_sku;
use crate::text::slugify_header;

static EURO_PRICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"€?\s*(\d{1,3}(?:\.\d{3})*|\d+)\s*(?:,\s*(\d{2}))?").unwrap());

static DUAL_VOLTAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*[xX]\s*(\d+)\s*V\b").unwrap());
static VOLTAGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*V\b").unwrap());
static POWER_KW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)\s*kW\b").unwrap());
static POWER_W: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,3}(?:\.\d{3})+|\d+)\s*W\b").unwrap());
static WEIGHT_KG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)\s*kg\b").unwrap());
static RPM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d{3})?)\s*(?:t/min|tpm|rpm|min-1|/min)").unwrap());
static TORQUE_NM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*Nm\b").unwrap());
static BATTERY_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(BL\d{4}[A-Z]?)\b").unwrap());
static CHARGER_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(DC\d{2}[A-Z]{1,2})\b").unwrap());

const VAT_RATE_PCT: u32 = 21;

/// Parse a euro price string: `€ 1.234,56`, `€ 419 ,00`, `1234,56`.
/// Thousands dots drop, the comma is the decimal separator.
pub fn parse_euro_price(text: &str) -> Option<Decimal> {
    let caps = EURO_PRICE.captures(text.trim())?;
    let whole: String = caps.get(1)?.as_str().chars().filter(|c| *c != '.').collect();
    let cents = caps.get(2).map(|m| m.as_str()).unwrap_or("00");
    format!("{whole}.{cents}").parse().ok()
}

fn vat_rate() -> Decimal {
    Decimal::ONE + Decimal::new(VAT_RATE_PCT as i64, 2)
}

/// Excl-VAT price from an incl-VAT price, rounded to cents.
pub fn price_excl_vat(incl: Decimal) -> Decimal {
    (incl / vat_rate()).round_dp(2)
}

/// Incl-VAT price from an excl-VAT price, rounded to cents.
pub fn price_incl_vat(excl: Decimal) -> Decimal {
    (excl * vat_rate()).round_dp(2)
}

/// Fill in whichever of the two price fields is missing.
fn complete_vat(fields: &mut Fields) {
    let get = |fields: &Fields, key: &str| -> Option<Decimal> {
        fields.get(key)?.as_str()?.parse().ok()
    };
    let incl = get(fields, "price_incl_vat");
    let excl = get(fields, "price_excl_vat");
    match (incl, excl) {
        (Some(incl), None) => {
            fields.insert(
                "price_excl_vat".into(),
                Value::String(price_excl_vat(incl).to_string()),
            );
        }
        (None, Some(excl)) => {
            fields.insert(
                "price_incl_vat".into(),
                Value::String(price_incl_vat(excl).to_string()),
            );
        }
        _ => {}
    }
}

/// Run the property battery over every string field and add typed keys,
/// never clobbering values that are already present.
pub fn normalize_properties(fields: &mut Fields) {
    let haystack: String = fields
        .values()
        .filter_map(Value::as_str)
        .collect::<Vec<_>>()
        .join(" ");

    let mut add = |key: &str, value: Value| {
        if !fields.contains_key(key) {
            fields.insert(key.to_string(), value);
        }
    };

    if let Some(caps) = DUAL_VOLTAGE.captures(&haystack) {
        let count: i64 = caps[1].parse().unwrap_or(0);
        let volts: i64 = caps[2].parse().unwrap_or(0);
        add("voltage_v", Value::from(volts));
        add("voltage_total_v", Value::from(count * volts));
    } else if let Some(caps) = VOLTAGE.captures(&haystack) {
        if let Ok(v) = caps[1].parse::<i64>() {
            add("voltage_v", Value::from(v));
        }
    }

    if let Some(caps) = POWER_KW.captures(&haystack) {
        if let Ok(kw) = caps[1].replace(',', ".").parse::<f64>() {
            add("power_kw", Value::from(kw));
        }
    } else if let Some(caps) = POWER_W.captures(&haystack) {
        if let Ok(w) = caps[1].replace('.', "").parse::<i64>() {
            add("power_w", Value::from(w));
        }
    }

    if let Some(caps) = WEIGHT_KG.captures(&haystack) {
        if let Ok(kg) = caps[1].replace(',', ".").parse::<f64>() {
            add("weight_kg", Value::from(kg));
        }
    }
    if let Some(caps) = RPM.captures(&haystack) {
        if let Ok(rpm) = caps[1].replace('.', "").parse::<i64>() {
            add("rpm", Value::from(rpm));
        }
    }
    if let Some(caps) = TORQUE_NM.captures(&haystack) {
        if let Ok(nm) = caps[1].parse::<i64>() {
            add("torque_nm", Value::from(nm));
        }
    }
    if let Some(caps) = BATTERY_CODE.captures(&haystack) {
        add("battery_code", Value::String(caps[1].to_string()));
    }
    if let Some(caps) = CHARGER_CODE.captures(&haystack) {
        add("charger_code", Value::String(caps[1].to_string()));
    }
}

fn trimmed<'a>(row: &'a [Option<String>], idx: usize) -> Option<&'a str> {
    row.get(idx)
        .and_then(|c| c.as_deref())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Extract a transposed table into one record per model column.
///
/// Power-tool headers must parse as model codes; cleaner catalogs put free
/// model names in the header and the article number in an `Art.-nr` row.
/// Article cells holding several `|`-separated numbers fan out into one
/// record per number (accessory tables).
pub fn extract_transposed(kind: CatalogKind, table: &RawTable) -> Vec<Fields> {
    let Some(header) = table.rows.first() else {
        return Vec::new();
    };

    let model_cols: Vec<(usize, String)> = header
        .iter()
        .enumerate()
        .skip(1)
        .filter_map(|(i, cell)| {
            let name = cell.as_deref().map(str::trim).filter(|c| !c.is_empty())?;
            if kind == CatalogKind::PowerTools && !is_sku(kind, name) {
                return None;
            }
            Some((i, name.to_string()))
        })
        .collect();
    if model_cols.is_empty() {
        return Vec::new();
    }

    let mut per_column: Vec<Fields> = model_cols
        .iter()
        .map(|(_, name)| {
            let mut fields = Fields::new();
            fields.insert("model".to_string(), Value::String(name.clone()));
            fields
        })
        .collect();

    for row in &table.rows[1..] {
        let Some(label) = trimmed(row, 0) else { continue };
        let key = slugify_header(label);
        if key.is_empty() {
            continue;
        }
        let label_lower = label.to_lowercase();
        let is_article_row = label_lower.contains("art") || label_lower.contains("bestelnr");
        let price_key = if label_lower.contains("prijs") || label_lower.contains("price") {
            if label_lower.contains("excl") {
                Some("price_excl_vat")
            } else {
                Some("price_incl_vat")
            }
        } else {
            None
        };

        for (slot, (col, _)) in model_cols.iter().enumerate() {
            let Some(value) = trimmed(row, *col) else { continue };
            let fields = &mut per_column[slot];
            if is_article_row {
                fields.insert("article_nr".to_string(), Value::String(value.to_string()));
            } else if let Some(price_key) = price_key {
                if let Some(price) = parse_euro_price(value) {
                    fields.insert(price_key.to_string(), Value::String(price.to_string()));
                }
            } else {
                fields
                    .entry(key.clone())
                    .or_insert_with(|| Value::String(value.to_string()));
            }
        }
    }

    let mut records = Vec::new();
    for mut fields in per_column {
        complete_vat(&mut fields);
        normalize_properties(&mut fields);

        // Accessory fan-out: several article numbers in one cell.
        let split: Option<Vec<String>> = fields
            .get("article_nr")
            .and_then(Value::as_str)
            .filter(|v| v.contains('|'))
            .map(|v| {
                v.split('|')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            });
        match split {
            Some(numbers) => {
                for nr in numbers {
                    let mut clone = fields.clone();
                    clone.insert("article_nr".to_string(), Value::String(nr));
                    records.push(clone);
                }
            }
            None => records.push(fields),
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BBox;
    use rust_decimal_macros::dec;

    fn cells(vals: &[&str]) -> Vec<Option<String>> {
        vals.iter()
            .map(|v| (!v.is_empty()).then(|| v.to_string()))
            .collect()
    }

    fn table(rows: Vec<Vec<Option<String>>>) -> RawTable {
        RawTable {
            bbox: BBox::new(0.0, 0.0, 100.0, 100.0),
            rows,
            row_bboxes: vec![],
        }
    }

    #[test]
    fn test_parse_euro_price_variants() {
        assert_eq!(parse_euro_price("€ 1.234,56"), Some(dec!(1234.56)));
        assert_eq!(parse_euro_price("€ 419 ,00"), Some(dec!(419.00)));
        assert_eq!(parse_euro_price("249,95"), Some(dec!(249.95)));
        assert_eq!(parse_euro_price("€ 85"), Some(dec!(85.00)));
    }

    #[test]
    fn test_vat_both_directions() {
        assert_eq!(price_excl_vat(dec!(100.00)), dec!(82.64));
        assert_eq!(price_incl_vat(dec!(100.00)), dec!(121.00));
    }

    #[test]
    fn test_transposed_two_models_with_voltage() {
        let t = table(vec![
            cells(&["", "MODEL-A1", "MODEL-B2"]),
            cells(&["Spanning", "18V", "2 x 18V"]),
            cells(&["Gewicht", "1,5 kg", "2,1 kg"]),
        ]);
        let recs = extract_transposed(CatalogKind::PowerTools, &t);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0]["model"], "MODEL-A1");
        assert_eq!(recs[0]["spanning"], "18V");
        assert_eq!(recs[0]["voltage_v"], 18);
        assert_eq!(recs[1]["voltage_v"], 18);
        assert_eq!(recs[1]["voltage_total_v"], 36);
    }

    #[test]
    fn test_price_rows_complete_vat() {
        let t = table(vec![
            cells(&["", "DHP486Z"]),
            cells(&["Prijs incl. BTW", "€ 100,00"]),
        ]);
        let recs = extract_transposed(CatalogKind::PowerTools, &t);
        assert_eq!(recs[0]["price_incl_vat"], "100.00");
        assert_eq!(recs[0]["price_excl_vat"], "82.64");
    }

    #[test]
    fn test_article_row_and_pipe_fanout() {
        let t = table(vec![
            cells(&["", "K 1152 TS"]),
            cells(&["Art.-nr", "49712 | 49713"]),
            cells(&["Werkdruk", "130 bar"]),
        ]);
        let recs = extract_transposed(CatalogKind::PressureCleaners, &t);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0]["article_nr"], "49712");
        assert_eq!(recs[1]["article_nr"], "49713");
        assert_eq!(recs[1]["werkdruk"], "130 bar");
    }

    #[test]
    fn test_property_battery() {
        let mut fields = Fields::new();
        fields.insert("specs".into(), "1.200 W, 3,2 kg, 400 Nm, 2.300 rpm, BL1850B, DC18RC".into());
        normalize_properties(&mut fields);
        assert_eq!(fields["power_w"], 1200);
        assert_eq!(fields["weight_kg"], 3.2);
        assert_eq!(fields["torque_nm"], 400);
        assert_eq!(fields["rpm"], 2300);
        assert_eq!(fields["battery_code"], "BL1850B");
        assert_eq!(fields["charger_code"], "DC18RC");
    }
}
