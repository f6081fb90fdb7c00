use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("valid regex"));

static CODE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,31}$").expect("valid regex"));

pub fn is_valid_email(raw: &str) -> bool {
    EMAIL_PATTERN.is_match(raw.trim())
}

pub fn is_valid_code(raw: &str) -> bool {
    CODE_PATTERN.is_match(raw.trim())
}
