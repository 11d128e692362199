/// Build identity reported by `--version` and attached to every log line.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_COMMIT_HASH: &str = env!("HISTORY_IMPORT_GIT_COMMIT_HASH");
pub const VERSION_WITH_COMMIT: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "+",
    env!("HISTORY_IMPORT_GIT_COMMIT_HASH")
);

const SHORT_HASH_LEN: usize = 12;

/// Abbreviated commit for log context; `"unknown"` passes through unchanged.
pub fn short_commit_hash() -> &'static str {
    GIT_COMMIT_HASH
        .get(..SHORT_HASH_LEN)
        .filter(|_| GIT_COMMIT_HASH != "unknown")
        .unwrap_or(GIT_COMMIT_HASH)
}
