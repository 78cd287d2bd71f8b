//! Content hashing for run-state fingerprints.

use sha2::{Digest, Sha256};

use crate::model::Table;

/// Compute the SHA256 of a table's rendered contents.
///
/// The header and every row are hashed as their CSV field text, so a table
/// read back from its processed CSV hashes the same as the one written.
/// Returns a 64-character lowercase hexadecimal string.
pub fn content_hash(table: &Table) -> String {
    let mut hasher = Sha256::new();
    for name in table.column_names() {
        hasher.update(name.as_bytes());
        hasher.update([0x1f]);
    }
    hasher.update([b'\n']);
    for row in &table.rows {
        for value in row {
            hasher.update(value.to_field().as_bytes());
            hasher.update([0x1f]);
        }
        hasher.update([b'\n']);
    }
    format!("{:x}", hasher.finalize())
}
