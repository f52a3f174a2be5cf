//! Tunable limits and defaults for the relay engine.
//!
//! Every bounded resource in the engine is sized here: pool capacities,
//! retry budgets, timeouts, and payload bounds. Components take these as
//! config defaults; nothing reads them ad hoc at runtime.

// === Pagination ===

/// Maximum characters per delivered page.
pub const DEFAULT_MAX_PAGE_CHARS: usize = 3500;

/// Hard cap on memoized format/paginate results.
pub const PAGINATION_CACHE_CAPACITY: u64 = 128;

// === Image pipeline ===

/// Concurrent image jobs (pool slots).
pub const DEFAULT_PIPELINE_CAPACITY: usize = 3;

/// Total attempts per image job.
pub const DEFAULT_JOB_ATTEMPTS: u32 = 2;

/// Per-attempt deadline for an image job's upstream call.
pub const DEFAULT_JOB_ATTEMPT_TIMEOUT_SECS: u64 = 180;

/// Base for the job retry backoff (`base * 2^(attempt-1)`).
pub const DEFAULT_JOB_BACKOFF_BASE_MS: u64 = 1000;

/// Age past which a tracked job is considered stale and evicted.
pub const DEFAULT_JOB_STALE_AFTER_SECS: u64 = 300;

/// How long shutdown waits for outstanding jobs to settle.
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;

// === Upstream client ===

/// Concurrent upstream calls; excess calls queue FIFO.
pub const DEFAULT_UPSTREAM_CONCURRENCY: usize = 5;

/// Total attempts per upstream call.
pub const DEFAULT_UPSTREAM_ATTEMPTS: u32 = 3;

/// Per-attempt network deadline.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 120;

/// Base for the upstream retry backoff (`base * 2^(attempt-1)`).
pub const DEFAULT_UPSTREAM_BACKOFF_BASE_MS: u64 = 400;

// === Single flight ===

/// Safety deadline after which a stuck flight entry is reclaimable.
pub const DEFAULT_FLIGHT_TTL_SECS: u64 = 180;

// === History ===

/// Turns of conversation history kept per user.
pub const DEFAULT_HISTORY_TURNS: usize = 20;

// === Inbound payload bounds ===

/// Maximum inbound text message length (chars).
pub const MAX_TEXT_LEN: usize = 4096;

/// Maximum image caption length (chars).
pub const MAX_CAPTION_LEN: usize = 1024;

/// Maximum decoded image payload size (10MB).
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
