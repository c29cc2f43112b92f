//! Token extraction from free-form chat input
//!
//! Both extractors are total: absence is `None`, never an error.

use regex::Regex;
use std::sync::LazyLock;

/// `local@domain.tld` with ASCII token classes
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").expect("valid e-mail pattern")
});

/// Maximal runs of ASCII digits
static DIGIT_RUN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("valid digit pattern"));

/// Return the first e-mail token in `text`, scanning left to right.
pub fn find_email(text: &str) -> Option<&str> {
    EMAIL_PATTERN.find(text).map(|m| m.as_str())
}

/// Return the first standalone run of exactly `digits` decimal digits.
///
/// Runs are maximal, so a 7-digit run never satisfies a 6-digit search and
/// "code 1234567" yields `None` rather than a prefix.
pub fn extract_code(text: &str, digits: usize) -> Option<&str> {
    DIGIT_RUN_PATTERN
        .find_iter(text)
        .map(|m| m.as_str())
        .find(|run| run.len() == digits)
}

/// Mask an address for logs: `alice@example.com` -> `a***@example.com`
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            format!("{first}***@{domain}")
        }
        None => "***".to_string(),
    }
}
