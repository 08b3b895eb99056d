use once_cell::sync::Lazy;
use regex::Regex;

static GRADE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)grade\s*(\d+)").expect("valid regex"));
static KINDERGARTEN_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)kindergarten|kindy").expect("valid regex"));
static KINDERGARTEN_BAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)kindy|kindergarten|\bpre-?k\b|\bk1\b|\bk2\b").expect("valid regex"));
static PRE_K: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bpre-?k\b").expect("valid regex"));
static K1: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bk1\b").expect("valid regex"));
static K2: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bk2\b").expect("valid regex"));
static KIND_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^kind\w*(?:\s*-\s*(.+))?$").expect("valid regex"));
static SPECIFIC_GRADE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Grade \d+$").expect("valid regex"));

pub const KINDERGARTEN: &str = "Kindergarten";
pub const KINDERGARTEN_PRE_K: &str = "Kindergarten Pre-K";
pub const KINDERGARTEN_K1: &str = "Kindergarten K1";
pub const KINDERGARTEN_K2: &str = "Kindergarten K2";

pub const KINDERGARTEN_GRADES: [&str; 3] = [KINDERGARTEN_PRE_K, KINDERGARTEN_K1, KINDERGARTEN_K2];

pub fn normalize_grade(raw: &str) -> String {
    let text = collapse_whitespace(raw);
    if text.is_empty() {
        return String::new();
    }

    if let Some(caps) = GRADE_NUMBER.captures(&text) {
        return format!("Grade {}", canonical_number(&caps[1]));
    }

    if KINDERGARTEN_TOKEN.is_match(&text) {
        return kindergarten_variant(&text).unwrap_or(KINDERGARTEN).to_string();
    }

    text.split('-').next().unwrap_or("").trim().to_string()
}

pub fn normalize_class(raw: &str) -> String {
    let text = collapse_whitespace(raw);
    match KIND_CLASS.captures(&text) {
        Some(caps) => match caps.get(1) {
            Some(section) => format!("{KINDERGARTEN} - {}", title_case(section.as_str())),
            None => KINDERGARTEN.to_string(),
        },
        None => text,
    }
}

/// The specific kindergarten sub-band named in `text`, if any.
pub fn kindergarten_variant(text: &str) -> Option<&'static str> {
    if PRE_K.is_match(text) {
        Some(KINDERGARTEN_PRE_K)
    } else if K1.is_match(text) {
        Some(KINDERGARTEN_K1)
    } else if K2.is_match(text) {
        Some(KINDERGARTEN_K2)
    } else {
        None
    }
}

pub fn mentions_kindergarten(text: &str) -> bool {
    KINDERGARTEN_TOKEN.is_match(text)
}

/// Broader than [`mentions_kindergarten`]: bare band tokens like "Pre-K" or "K2" count too.
pub fn in_kindergarten_band(text: &str) -> bool {
    KINDERGARTEN_BAND.is_match(text)
}

/// Every `grade N` mention in free text, canonicalized, in order of appearance.
pub fn grade_mentions(text: &str) -> Vec<String> {
    GRADE_NUMBER
        .captures_iter(text)
        .map(|caps| format!("Grade {}", canonical_number(&caps[1])))
        .collect()
}

/// True for labels that name one concrete grade rather than a unit or job title.
pub fn is_specific_grade(label: &str) -> bool {
    SPECIFIC_GRADE.is_match(label) || label.starts_with(KINDERGARTEN)
}

pub fn normalize_key(raw: &str) -> String {
    collapse_whitespace(raw).to_lowercase()
}

pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn canonical_number(digits: &str) -> &str {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0"
    } else {
        trimmed
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| word.split('-').map(capitalize).collect::<Vec<String>>().join("-"))
        .collect::<Vec<String>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            // a capital that expands to several chars (ß -> SS) would not survive a second pass
            let mut upper = first.to_uppercase();
            let head = match (upper.next(), upper.next()) {
                (Some(single), None) => single,
                _ => first,
            };
            std::iter::once(head).chain(chars.flat_map(char::to_lowercase)).collect()
        }
        None => String::new(),
    }
}
