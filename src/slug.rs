//! URL slugs.

use crate::error::Error;

/// Turns free text into a lowercase, hyphen-separated ASCII slug.
///
/// Anything that is not `[a-z0-9]` after lower-casing acts as a separator, so
/// punctuation, whitespace and non-Latin scripts all collapse into single
/// hyphens and vanish from the ends. Text with no Latin letters or digits
/// fails with [`Error::InvalidInput`] instead of producing an empty slug.
///
/// ```rust
/// assert_eq!(toolkit::slugify("NOW!!? is the time 123").unwrap(), "now-is-the-time-123");
/// assert!(toolkit::slugify("Привет, мир").is_err());
/// ```
pub fn slugify(text: &str) -> Result<String, Error> {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for ch in text.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(ch);
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        return Err(Error::InvalidInput(
            "after removing characters, slug is zero length".to_owned(),
        ));
    }
    Ok(slug)
}
