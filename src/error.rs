use crate::store::StoreError;

/// Errors surfaced by the decision pipeline.
///
/// These map onto the error kinds in the design doc: store outages,
/// malformed request fields, bad config fetched from the store, and
/// cancellation. All four are handled by the same policy upstream
/// (fail open), but keeping them distinct lets telemetry and logs say
/// which one happened.
#[derive(Debug, thiserror::Error)]
pub enum GuardianError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("config parse error: {0}")]
    ConfigParse(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl GuardianError {
    /// Every GuardianError implies fail-open admission. Centralizing the
    /// predicate here keeps that policy from being re-decided ad hoc
    /// at each call site.
    pub fn fail_open(&self) -> bool {
        true
    }
}
