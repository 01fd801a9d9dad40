use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Open-schema field map for one extracted product row.
///
/// Catalogs disagree wildly about which columns exist, so records keep a
/// JSON object shape end to end and only a handful of keys (`sku`,
/// `series_id`, ...) are treated as well known.
pub type Fields = serde_json::Map<String, Value>;

/// Page-level context attached to every record extracted from that page.
///
/// Built once per page (and per table where the table overrides the page
/// series) and never mutated afterwards; continuation pages receive a
/// carried-forward clone instead of editing the previous one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RowContext {
    pub source_pdf: String,
    pub page_number: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specs_text: Option<String>,
    /// Label -> value specs parsed from the text block above the table.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub product_specs: BTreeMap<String, String>,
    /// Relative paths of images associated with this row.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

/// One extracted product row plus its page context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub fields: Fields,
    pub context: RowContext,
}

impl Record {
    pub fn new(fields: Fields, context: RowContext) -> Self {
        Self { fields, context }
    }

    /// String value of a field, if present and non-empty.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn set_if_absent(&mut self, key: &str, value: Value) {
        if !self.fields.contains_key(key) {
            self.fields.insert(key.to_string(), value);
        }
    }
}

/// Flat extraction result for one source PDF.
///
/// Only `products` is serialized to disk (as a top-level JSON array); the
/// counts feed printed summaries.
#[derive(Debug, Clone)]
pub struct CatalogPayload {
    pub source_pdf: String,
    pub product_count: usize,
    pub series_count: usize,
    pub products: Vec<Fields>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_str_field_skips_empty() {
        let mut fields = Fields::new();
        fields.insert("sku".into(), json!("DB12345"));
        fields.insert("blank".into(), json!("  "));
        fields.insert("num".into(), json!(7));
        let rec = Record::new(fields, RowContext::default());
        assert_eq!(rec.str_field("sku"), Some("DB12345"));
        assert_eq!(rec.str_field("blank"), None);
        assert_eq!(rec.str_field("num"), None);
    }

    #[test]
    fn test_set_if_absent_never_clobbers() {
        let mut fields = Fields::new();
        fields.insert("material".into(), json!("messing"));
        let mut rec = Record::new(fields, RowContext::default());
        rec.set_if_absent("material", json!("rvs"));
        rec.set_if_absent("angle", json!(90));
        assert_eq!(rec.fields["material"], json!("messing"));
        assert_eq!(rec.fields["angle"], json!(90));
    }
}
