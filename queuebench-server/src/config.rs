/// Address the publisher binds to when none is given.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:3000";

/// Largest report file the publisher will read into memory.
pub const MAX_REPORT_BYTES: u64 = 64 * 1024 * 1024;
