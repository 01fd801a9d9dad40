//! SKU and value recognizers.
//!
//! Order codes look different per catalog family, and plenty of cell values
//! (sizes, pressures, voltages) look deceptively code-like. The NON-SKU
//! filter runs first; only then does the family grammar get a say.

use std::sync::LazyLock;

use regex::Regex;

use crate::catalog::CatalogKind;

/// Unit-like values that must never be taken for an order code.
static NON_SKU_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^\d+([.,]\d+)?\s*[lL](iter)?$",
        r"^\d+([.,]\d+)?\s*bar$",
        r"^\d+([.,]\d+)?\s*mm$",
        r"^\d+([.,]\d+)?\s*kg$",
        r"^-?\d+\s*°\s*C$",
        r"^\d+([.,]\d+)?\s*m3?/h$",
        r"^\d+([.,]\d+)?\s*l/min$",
        r"^\d+([.,]\d+)?\s*(V|kW|W)$",
        r#"^\d+(\s+\d+)?/\d+\s*"?$"#,
        r"^R\d{3}[a-z]?$",
        r"^\d+\s*[xX]\s*\d+\s*[xX]\s*\d+$",
        r"^Ø\s*\d+([.,]\d+)?$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static GENERIC_SKU: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2,}[A-Z0-9]*\d+$|^\d{5,10}$").unwrap());
static COMPRESSOR_SKU: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5,10}$|^\d{2}\.\d{3,6}$").unwrap());
static WELL_PUMP_SKU: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{8}$").unwrap());
static PRESSURE_PIPE_SKU: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2,3}\d{5,7}$").unwrap());
static PUMP_SKU: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{2,}[\s-]?\d+.*$").unwrap());
static PISTON_PUMP_SKU: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^X\d{7}$").unwrap());
static CLEANER_SKU: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{5,6}(-\d+)?$").unwrap());
static TOOL_MODEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2,}[0-9]+[A-Z0-9]*$").unwrap());
static BRASS_SKU: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^MF\d+$").unwrap());
static STAINLESS_SKU: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^9(ZF|BUL|LAK|LAT|LAE|LAR|LABR|ZFBF|LAN|LAS|LAF|LAFL|ZFVL|ZFGF)[A-Z]*\d+$")
        .unwrap()
});
static BLACK_SKU: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^7(ZF|GB|BUL|LAK|LAT|LAE|LAR|LABR|ZFBF|LAN|LAS|LAF)[A-Z]*\d+$").unwrap()
});
static GALVANIZED_SKU: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(ZF|GB|BUL)\d+$").unwrap());
static COUPLING_SKU: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d?[BC]\d{4,}$").unwrap());
static CLAMP_SKU: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(GMI?|MAXI?|SBIV?|QDW|X)\d{4,}$").unwrap());

// Column scoring patterns.
static EXACT_NUMERIC_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{7,8}$").unwrap());
static LETTER_DIGIT_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{1,6}\d{5,}$").unwrap());

/// True when the value is a unit-like quantity rather than a code.
pub fn is_non_sku(value: &str) -> bool {
    let value = value.trim();
    NON_SKU_PATTERNS.iter().any(|p| p.is_match(value))
}

/// Order-code grammar for a catalog family.
pub fn sku_pattern(kind: CatalogKind) -> &'static Regex {
    use CatalogKind::*;
    match kind {
        Compressors => &COMPRESSOR_SKU,
        WellPumps => &WELL_PUMP_SKU,
        PressurePipes | DrainPipes => &PRESSURE_PIPE_SKU,
        SubmersiblePumps | CentrifugalPumps | PumpSpecials => &PUMP_SKU,
        PistonPumps => &PISTON_PUMP_SKU,
        PressureCleaners => &CLEANER_SKU,
        PowerTools => &TOOL_MODEL,
        BrassFittings => &BRASS_SKU,
        StainlessFittings => &STAINLESS_SKU,
        BlackFittings => &BLACK_SKU,
        GalvanizedPipes => &GALVANIZED_SKU,
        HoseCouplings => &COUPLING_SKU,
        HoseClamps => &CLAMP_SKU,
        AirPipes | PePipes | DriveTech | Generic => &GENERIC_SKU,
    }
}

/// True when `value` is a plausible order code for the family.
pub fn is_sku(kind: CatalogKind, value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !is_non_sku(value) && sku_pattern(kind).is_match(value)
}

/// Find the column most likely to hold order codes.
///
/// Scores every column (+3 exact 7-8 digit code, +2 letter+digit code,
/// +1 numeric after stripping inner whitespace); a column only wins with at
/// least two matching cells. Column 0 wins outright when it alone already
/// has two hits, which covers the overwhelmingly common layout.
pub fn detect_sku_column(rows: &[Vec<Option<String>>]) -> Option<usize> {
    let width = rows.iter().map(Vec::len).max()?;
    let mut scores = vec![0u32; width];
    let mut hits = vec![0u32; width];

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let Some(cell) = cell.as_deref() else { continue };
            let cell = cell.trim();
            if cell.is_empty() || is_non_sku(cell) {
                continue;
            }
            let stripped: String = cell.chars().filter(|c| !c.is_whitespace()).collect();
            let score = if EXACT_NUMERIC_CODE.is_match(cell) {
                3
            } else if LETTER_DIGIT_CODE.is_match(cell) {
                2
            } else if EXACT_NUMERIC_CODE.is_match(&stripped) {
                1
            } else {
                continue;
            };
            scores[idx] += score;
            hits[idx] += 1;
        }
    }

    if hits.first().copied().unwrap_or(0) >= 2 && hits.iter().skip(1).all(|&h| h < 2) {
        return Some(0);
    }

    scores
        .iter()
        .enumerate()
        .filter(|(i, _)| hits[*i] >= 2)
        .max_by_key(|(_, s)| **s)
        .map(|(i, _)| i)
}
