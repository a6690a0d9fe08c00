//! Student-ID check for users in the AWAITING_ID state.

use std::sync::LazyLock;

use regex::Regex;

static STUDENT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^ACT-[0-9]{4}-[0-9]{2}$").expect("valid regex"));

/// The normalized (uppercase) ID if `text` is exactly `ACT-####-##`.
pub fn parse_student_id(text: &str) -> Option<String> {
    let text = text.trim();
    STUDENT_ID.is_match(text).then(|| text.to_uppercase())
}
