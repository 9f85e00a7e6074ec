use sha2::{Digest, Sha256};

/// Hex SHA-256 of a generated file.
pub fn calculate_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Content-addressed file name, so regenerating identical bytes lands on the same object.
pub fn content_file_name(bytes: &[u8], extension: &str) -> String {
    format!("{}.{}", calculate_hash(bytes), extension)
}
