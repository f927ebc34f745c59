//! Stable record identifiers.

use std::ops::Range;

/// Length of a record id in hex characters.
pub const RECORD_ID_LEN: usize = 32;

/// Identifier of the chunk covering `char_range` of `page` in `source`.
///
/// Ids depend only on content position, so re-ingesting a source with the
/// same chunk configuration overwrites the same records.
#[must_use]
pub fn record_id(source: &str, page: Option<u32>, char_range: &Range<usize>) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(source.as_bytes());
    hasher.update(&[0]);
    match page {
        Some(page) => hasher.update(&page.to_le_bytes()),
        None => hasher.update(b"-"),
    };
    hasher.update(&(char_range.start as u64).to_le_bytes());
    hasher.update(&(char_range.end as u64).to_le_bytes());

    let mut id = hasher.finalize().to_hex().to_string();
    id.truncate(RECORD_ID_LEN);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_is_stable() {
        let a = record_id("/docs/a.pdf", Some(1), &(0..1200));
        let b = record_id("/docs/a.pdf", Some(1), &(0..1200));
        assert_eq!(a, b);
        assert_eq!(a.len(), RECORD_ID_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_record_id_depends_on_position() {
        let base = record_id("/docs/a.pdf", Some(1), &(0..1200));
        assert_ne!(base, record_id("/docs/b.pdf", Some(1), &(0..1200)));
        assert_ne!(base, record_id("/docs/a.pdf", Some(2), &(0..1200)));
        assert_ne!(base, record_id("/docs/a.pdf", None, &(0..1200)));
        assert_ne!(base, record_id("/docs/a.pdf", Some(1), &(1050..2250)));
    }
}
