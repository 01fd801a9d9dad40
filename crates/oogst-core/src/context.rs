//! Page-level context: category and application text above a table, page
//! spec labels, and brand detection.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::extraction::TextLine;
use crate::geometry::BBox;
use crate::text::is_all_caps;

/// How far above a table its title and application text may sit.
const ABOVE_TABLE_WINDOW: f64 = 120.0;

/// Label -> output key for page-level spec lines above a table.
static SPEC_LABELS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)omgevingstemperatuur\s*:?\s*(.+)", "max_temp"),
        (r"(?i)max\.?\s*temperatuur\s*:?\s*(.+)", "max_temp"),
        (r"(?i)werkdruk\s*:?\s*(.+)", "werkdruk"),
        (r"(?i)aansluiting\s*:?\s*(.+)", "aansluiting"),
        (r"(?i)materiaal\s*:?\s*(.+)", "materiaal"),
        (r"(?i)spanning\s*:?\s*(.+)", "spanning"),
        (r"(?i)vermogen\s*:?\s*(.+)", "vermogen"),
        (r"(?i)opvoerhoogte\s*:?\s*(.+)", "opvoerhoogte"),
        (r"(?i)capaciteit\s*:?\s*(.+)", "capaciteit"),
    ]
    .iter()
    .map(|(p, k)| (Regex::new(p).unwrap(), *k))
    .collect()
});

/// Thread-type keywords whose lines become the series specs text.
static THREAD_KEYWORDS: &[&str] = &["BUITENDRAAD", "BINNENDRAAD", "BUITEN/BINNENDRAAD"];

static KNOWN_BRANDS: &[&str] = &["Makita", "Kranzle", "Airpress", "DAB", "Pedrollo", "Tallas"];

/// Title and application text directly above a table.
///
/// The nearest all-caps line is the title; remaining lines in the window
/// join into the application text (typical use notes under the title).
pub fn text_above_table(lines: &[TextLine], table_bbox: &BBox) -> (Option<String>, Option<String>) {
    let mut above: Vec<&TextLine> = lines
        .iter()
        .filter(|l| {
            l.bbox.y1 <= table_bbox.y0
                && table_bbox.y0 - l.bbox.y1 <= ABOVE_TABLE_WINDOW
                && l.bbox.intersection_area(&BBox::new(
                    table_bbox.x0,
                    l.bbox.y0,
                    table_bbox.x1,
                    l.bbox.y1,
                )) > 0.0
        })
        .collect();
    above.sort_by(|a, b| a.bbox.y0.total_cmp(&b.bbox.y0));

    let title = above
        .iter()
        .rev()
        .find(|l| is_all_caps(l.text.trim()) && l.text.trim().len() >= 3)
        .map(|l| l.text.trim().to_string());

    let application: Vec<&str> = above
        .iter()
        .map(|l| l.text.trim())
        .filter(|t| !t.is_empty() && Some(*t) != title.as_deref())
        .collect();
    let application = if application.is_empty() {
        None
    } else {
        Some(application.join(" "))
    };

    (title, application)
}

/// Parse labelled spec lines (`Werkdruk: 10 bar`) out of free text.
pub fn product_specs_from_text(text: &str) -> BTreeMap<String, String> {
    let mut specs = BTreeMap::new();
    for line in text.lines() {
        for (pattern, key) in SPEC_LABELS.iter() {
            if let Some(caps) = pattern.captures(line) {
                let value = caps[1].trim().to_string();
                if !value.is_empty() {
                    specs.entry(key.to_string()).or_insert(value);
                }
            }
        }
    }
    specs
}

/// Thread-type specs line (`BUITENDRAAD x BINNENDRAAD`), if present.
pub fn specs_text_from(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| THREAD_KEYWORDS.iter().any(|k| line.contains(k)))
        .map(str::to_string)
}

/// First known brand mentioned in the text.
pub fn brand_from_text(text: &str) -> Option<&'static str> {
    KNOWN_BRANDS
        .iter()
        .find(|b| text.contains(*b))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str, y0: f64) -> TextLine {
        TextLine {
            text: text.into(),
            bbox: BBox::new(50.0, y0, 300.0, y0 + 12.0),
        }
    }

    #[test]
    fn test_title_and_application_above_table() {
        let lines = vec![
            line("Pagina 12", 20.0),
            line("DOMPELPOMP RVS-125", 200.0),
            line("Voor vuilwater met vaste delen tot 10 mm", 216.0),
        ];
        let table = BBox::new(40.0, 260.0, 500.0, 600.0);
        let (title, application) = text_above_table(&lines, &table);
        assert_eq!(title.as_deref(), Some("DOMPELPOMP RVS-125"));
        assert_eq!(
            application.as_deref(),
            Some("Voor vuilwater met vaste delen tot 10 mm")
        );
    }

    #[test]
    fn test_far_lines_ignored() {
        let lines = vec![line("KOPTEKST", 20.0)];
        let table = BBox::new(40.0, 500.0, 500.0, 700.0);
        let (title, application) = text_above_table(&lines, &table);
        assert!(title.is_none());
        assert!(application.is_none());
    }

    #[test]
    fn test_spec_labels() {
        let specs = product_specs_from_text(
            "Omgevingstemperatuur: 40 °C\nWerkdruk 10 bar\nAansluiting: 1\"",
        );
        assert_eq!(specs["max_temp"], "40 °C");
        assert_eq!(specs["werkdruk"], "10 bar");
        assert_eq!(specs["aansluiting"], "1\"");
    }

    #[test]
    fn test_thread_specs_line() {
        let text = "KNIE 90\nBUITENDRAAD x BINNENDRAAD\n";
        assert_eq!(
            specs_text_from(text).as_deref(),
            Some("BUITENDRAAD x BINNENDRAAD")
        );
        assert!(specs_text_from("geen draad hier").is_none());
    }

    #[test]
    fn test_brand_detection() {
        assert_eq!(brand_from_text("Makita DHP486"), Some("Makita"));
        assert_eq!(brand_from_text("onbekend"), None);
    }
}
