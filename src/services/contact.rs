//! Pulls a name and an email address out of a free-text reply while the
//! assistant is collecting contact data for a draft.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::BookingDraft;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").unwrap());

static NAME_LEADIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(mi\s*nombre\s*es|me\s*llamo|soy|nombre:|mi)\b").unwrap()
});
static EMAIL_LEADIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(mi\s*correo\s*es|correo|email|mail|e-mail|es:?)\b").unwrap()
});

fn title_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Merges whatever the utterance provides into the draft. Fields already
/// set are kept unless the message re-supplies them; a stripped remainder
/// under two characters never overwrites the name.
pub fn extract_contact(text: &str, draft: &mut BookingDraft) {
    let raw = text.trim();

    let email = EMAIL_RE.find(raw).map(|m| m.as_str().to_string());
    let mut remainder = raw.to_string();
    if let Some(email) = &email {
        remainder = remainder.replace(email.as_str(), " ");
        draft.email = Some(email.clone());
    }

    let remainder = NAME_LEADIN_RE.replace_all(&remainder, " ");
    let remainder = EMAIL_LEADIN_RE.replace_all(&remainder, " ");
    let remainder = remainder
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let remainder = remainder
        .trim_matches(|c| matches!(c, '-' | ':' | ','))
        .trim();

    if remainder.chars().count() >= 2 {
        let name = remainder
            .split_whitespace()
            .map(title_first)
            .collect::<Vec<_>>()
            .join(" ");
        if name.chars().count() >= 2 {
            draft.name = Some(name);
        }
    }
}
