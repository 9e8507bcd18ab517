//! Revision filename codec.
//!
//! A revision is a backup copy of a file living under
//! `<metaDir>/<entryUuid>/`. The filename stem *is* the last-modified
//! timestamp in milliseconds; the extension is the original file's
//! extension. This used to be an implicit parse-the-stem convention, it is
//! formalized here with an explicit serializer and parser.

/// Encode a revision file name: `"<millis>.<ext>"`, or `"<millis>"` when
/// the original file has no extension.
pub fn revision_file_name(lmdt_millis: i64, orig_extension: &str) -> String {
    if orig_extension.is_empty() {
        lmdt_millis.to_string()
    } else {
        format!("{}.{}", lmdt_millis, orig_extension)
    }
}

/// Decode the timestamp embedded in a revision file name.
///
/// Returns `None` for names whose stem is not a plain integer, so foreign
/// files inside a revision directory are skipped rather than misordered.
pub fn parse_revision_lmdt(file_name: &str) -> Option<i64> {
    let stem = file_name.split('.').next().unwrap_or(file_name);
    stem.parse::<i64>().ok()
}
