use thiserror::Error;

/// Failures that abort a rebuild. Per-unit compilation failures and
/// unresolvable extensions never do; they land in the report instead.
#[derive(Debug, Error)]
pub enum RebuildError {
    #[error("compiler produced results for {results} targets, the program has {targets}")]
    TargetCountMismatch { targets: usize, results: usize },
    #[error("malformed program descriptor: {0}")]
    Descriptor(#[from] serde_json::Error),
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
