//! Tag name normalization.

/// Canonical form used for tag identity: trimmed and lowercased.
pub fn normalize_tag_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_lowercase())
}

/// Normalize a requested tag list, dropping blanks and duplicates while
/// keeping first-seen order.
pub fn normalize_tag_names<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut names: Vec<String> = Vec::new();
    for value in raw {
        let Some(name) = normalize_tag_name(value.as_ref()) else {
            continue;
        };
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}
