//! Server-side names for staged and stored files.
//!
//! Names are a fresh UUID plus the lowercased extension of the client's file name, so no
//! client-controlled path segment ever reaches the filesystem.

use uuid::Uuid;

const MAX_EXTENSION_LEN: usize = 16;

/// Extension of `original_name`, lowercased, if it is 1-16 ASCII alphanumeric characters.
pub fn sanitized_extension(original_name: &str) -> Option<String> {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty()
        || ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Generate a unique name for a new staged or stored file.
pub fn generate_stored_name(original_name: &str) -> String {
    let id = Uuid::new_v4();
    match sanitized_extension(original_name) {
        Some(ext) => format!("{}.{}", id, ext),
        None => id.to_string(),
    }
}
