//! Constants for the fetch module (timeouts, redirect budget, buffering).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes, applied to every body read).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Upper bound accepted for either timeout (1 hour).
pub const MAX_TIMEOUT_SECS: u64 = 3600;

/// Default number of redirects followed before giving up.
pub const DEFAULT_MAX_REDIRECTS: u32 = 2;

/// Retained stream bytes kept in memory before spilling to disk (1 MiB).
pub const DEFAULT_SPILL_THRESHOLD: usize = 1024 * 1024;
