//! Positional identity for detected comments
//!
//! An id is derived from where a comment sits, not from what it says:
//! `md5("{path}:{line}")` truncated to [`ID_LEN`] hex characters. Inserting or
//! deleting lines above a comment moves it to a new id; the metadata recorded
//! under the old id stays in the store.

use std::path::Path;

/// Number of hex characters kept from the digest
pub const ID_LEN: usize = 12;

/// Id for the comment at 0-based `line_number` in `file_path`
pub fn item_id(file_path: &Path, line_number: usize) -> String {
    let digest = md5::compute(format!("{}:{}", file_path.display(), line_number));
    let mut hex = format!("{:x}", digest);
    hex.truncate(ID_LEN);
    hex
}
