//! Helpers for turning client-supplied names into safe file names and for
//! keeping full paths out of log fields.

use std::path::Path;

/// Longest sanitized filename kept on disk, in bytes.
const MAX_FILENAME_LEN: usize = 200;

/// Reduces an uploaded filename to a single safe path component.
///
/// Directory parts are dropped, separators and control characters become
/// `_`, and names that would be empty or refer to `.`/`..` fall back to
/// `upload`. The extension survives so the stored bytes keep their type.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let mut cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect();
    cleaned = cleaned.trim().to_string();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        return "upload".to_string();
    }

    if cleaned.len() > MAX_FILENAME_LEN {
        let mut cut = MAX_FILENAME_LEN;
        while !cleaned.is_char_boundary(cut) {
            cut -= 1;
        }
        cleaned.truncate(cut);
    }
    cleaned
}

/// Returns only the filename component of a path (no directory).
///
/// Used in log fields so uploads are identifiable without exposing the
/// storage directory.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}
