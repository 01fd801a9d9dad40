//! Series (product family) detection.
//!
//! Priority: colored section banner, then a title line above the table,
//! then the page's left/right column titles, and as a last resort the SKU
//! prefix tables. Series ids are always namespaced by the source PDF stem
//! so two catalogs can both have a "koppelingen" series.

use std::sync::LazyLock;

use regex::Regex;

use crate::extraction::Banner;
use crate::text::{is_all_caps, slugify};

/// House style background of section banners.
pub const BANNER_RGB: [u8; 3] = [0, 160, 200];
/// Euclidean RGB distance still accepted as the banner color.
pub const BANNER_RGB_TOLERANCE: f64 = 60.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub slug: String,
    pub name: String,
}

impl Series {
    pub fn from_name(name: &str) -> Option<Series> {
        let name = name.trim();
        let slug = slugify(name);
        if slug.is_empty() {
            return None;
        }
        Some(Series {
            slug,
            name: name.to_string(),
        })
    }
}

static SERIES_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)NR\.?\s*\d+\s*[-–]\s*(.+)").unwrap());

/// Header-ish words that disqualify a candidate series name.
static PLACEHOLDER_WORDS: &[&str] = &[
    "bestelnr",
    "bestelnummer",
    "artikelnr",
    "maat",
    "afmeting",
    "werkdruk",
    "lengte",
    "type",
    "prijs",
];

fn rgb_distance(a: [u8; 3], b: [u8; 3]) -> f64 {
    let dr = a[0] as f64 - b[0] as f64;
    let dg = a[1] as f64 - b[1] as f64;
    let db = a[2] as f64 - b[2] as f64;
    (dr * dr + dg * dg + db * db).sqrt()
}

/// Series named by a section banner in the house color.
pub fn series_from_banners(banners: &[Banner]) -> Option<Series> {
    banners
        .iter()
        .find(|b| rgb_distance(b.rgb, BANNER_RGB) <= BANNER_RGB_TOLERANCE)
        .and_then(|b| Series::from_name(&b.text))
}

/// Series named by a `NR 4 - PRODUCT NAME` title line.
pub fn series_from_title(text: &str) -> Option<Series> {
    let caps = SERIES_TITLE.captures(text)?;
    Series::from_name(caps.get(1)?.as_str())
}

/// All-caps series titles on a fittings page, in reading order.
///
/// Fitting catalogs print two product columns per page, each headed by an
/// all-caps name; tables pick their series by horizontal position later.
pub fn page_series_titles(page_text: &str) -> Vec<Series> {
    let mut titles = Vec::new();
    for line in page_text.lines() {
        let line = line.trim();
        if line.len() < 3 || line.len() > 48 || !is_all_caps(line) {
            continue;
        }
        if line.chars().filter(|c| c.is_alphabetic()).count() < 3 {
            continue;
        }
        if is_placeholder_series(line) {
            continue;
        }
        if let Some(series) = Series::from_name(line) {
            if !titles.contains(&series) {
                titles.push(series);
            }
        }
        if titles.len() == 2 {
            break;
        }
    }
    titles
}

/// Brass fitting SKU prefixes, longest first.
static BRASS_PREFIX_SERIES: &[(&str, &str)] = &[
    ("MF328", "Verloopring"),
    ("MF241", "Knie 90"),
    ("MF270", "T-stuk"),
    ("MF130", "Sok"),
    ("MF280", "Nippel"),
    ("MF290", "Verloopnippel"),
    ("MF310", "Plug"),
    ("MF24", "Knie"),
    ("MF27", "T-stuk"),
    ("MF13", "Sok"),
    ("MF28", "Nippel"),
    ("MF31", "Plug"),
];

/// Stainless and steel fitting SKU prefixes, longest first.
static STEEL_PREFIX_SERIES: &[(&str, &str)] = &[
    ("9ZFBF", "RVS Buitendraadfitting"),
    ("9ZFVL", "RVS Vlakke fitting"),
    ("9LABR", "RVS Lasbocht"),
    ("9LAK", "RVS Knie"),
    ("9LAT", "RVS T-stuk"),
    ("9LAS", "RVS Sok"),
    ("9LAN", "RVS Nippel"),
    ("9ZF", "RVS Draadfitting"),
    ("7ZFBF", "Zwarte Buitendraadfitting"),
    ("7LAK", "Zwarte Knie"),
    ("7LAT", "Zwarte T-stuk"),
    ("7ZF", "Zwarte Draadfitting"),
    ("7GB", "Zwarte Gasbuis"),
    ("ZF", "Verzinkte Draadfitting"),
    ("GB", "Verzinkte Gasbuis"),
    ("BUL", "Verzinkte Buisleiding"),
];

/// Derive a series from the SKU prefix tables, longest prefix first.
pub fn series_from_sku(sku: &str) -> Option<Series> {
    let sku = sku.trim().to_uppercase();
    BRASS_PREFIX_SERIES
        .iter()
        .chain(STEEL_PREFIX_SERIES.iter())
        .filter(|(prefix, _)| sku.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .and_then(|(_, name)| Series::from_name(name))
}

/// Namespaced series id.
pub fn series_id(pdf_stem: &str, series_slug: &str) -> String {
    format!("{pdf_stem}__{series_slug}")
}

/// True when a "series name" is really a stitched-together table header.
pub fn is_placeholder_series(name: &str) -> bool {
    let words: Vec<String> = name
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();
    !words.is_empty() && words.iter().all(|w| PLACEHOLDER_WORDS.contains(&w.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BBox;

    #[test]
    fn test_banner_within_tolerance() {
        let banners = vec![Banner {
            text: "Dompelpompen RVS".into(),
            rgb: [10, 150, 210],
            bbox: BBox::new(0.0, 0.0, 100.0, 20.0),
        }];
        let s = series_from_banners(&banners).unwrap();
        assert_eq!(s.slug, "dompelpompen-rvs");
        assert_eq!(s.name, "Dompelpompen RVS");
    }

    #[test]
    fn test_banner_outside_tolerance_ignored() {
        let banners = vec![Banner {
            text: "Voorwoord".into(),
            rgb: [200, 30, 30],
            bbox: BBox::new(0.0, 0.0, 100.0, 20.0),
        }];
        assert!(series_from_banners(&banners).is_none());
    }

    #[test]
    fn test_series_from_numbered_title() {
        let s = series_from_title("NR 4 - CENTRIFUGAALPOMP CM").unwrap();
        assert_eq!(s.name, "CENTRIFUGAALPOMP CM");
        assert_eq!(s.slug, "centrifugaalpomp-cm");
    }

    #[test]
    fn test_page_titles_take_first_two() {
        let text = "KNIE 90\nBestelnr Maat\nMF241812 1/2\"\nT-STUK\nMF271234 3/4\"\n";
        let titles = page_series_titles(text);
        assert_eq!(titles.len(), 2);
        assert_eq!(titles[0].name, "KNIE 90");
        assert_eq!(titles[1].name, "T-STUK");
    }

    #[test]
    fn test_series_from_sku_longest_prefix() {
        assert_eq!(series_from_sku("MF241812").unwrap().name, "Knie 90");
        assert_eq!(series_from_sku("MF279999").unwrap().name, "T-stuk");
        assert_eq!(series_from_sku("9ZFBF12").unwrap().name, "RVS Buitendraadfitting");
        assert!(series_from_sku("DB12345").is_none());
    }

    #[test]
    fn test_series_id_is_namespaced() {
        assert_eq!(series_id("drukbuizen-2024", "pvc-druk"), "drukbuizen-2024__pvc-druk");
    }

    #[test]
    fn test_placeholder_series_rejected() {
        assert!(is_placeholder_series("Bestelnr Maat"));
        assert!(is_placeholder_series("Bestelnr Maat Werkdruk"));
        assert!(!is_placeholder_series("Knie 90"));
    }
}
