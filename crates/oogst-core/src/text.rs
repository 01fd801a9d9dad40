//! Small text helpers shared across the pipeline.

/// Lowercase slug with `-` separators, used for series ids and file names.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_dash = true;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Lowercase slug with `_` separators, used for record keys derived from
/// table headers.
pub fn slugify_header(text: &str) -> String {
    slugify(text).replace('-', "_")
}

/// Strip PDF artifact characters (checkmarks, bullets, stray punctuation)
/// that pdf table extraction sometimes leaves in cells.
pub fn strip_artifacts(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '✓' | '✔' | '•' | '●' | '◦' | '\u{f0fc}'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// True when the string contains at least one letter and they are all
/// uppercase.
pub fn is_all_caps(text: &str) -> bool {
    let mut has_alpha = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            has_alpha = true;
            if c.is_lowercase() {
                return false;
            }
        }
    }
    has_alpha
}
