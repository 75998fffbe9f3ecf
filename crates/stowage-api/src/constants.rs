/// Prefix of every versioned API route (e.g. `/api/v0/uploads`).
pub const API_PREFIX: &str = "/api/v0";

/// Extra request body allowance on top of the max file size, for multipart framing.
pub const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;
