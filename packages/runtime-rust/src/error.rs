//! Errors surfaced by Scene operations.

/// Errors returned by the Scene's data-access and remote-call facades.
///
/// Port failures are carried unchanged: the original `anyhow::Error` (and any
/// typed error inside it) is preserved and can be downcast by the caller.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("no `{class}` record matches the filter")]
    NotFound { class: String },
    #[error("expected exactly one `{class}` record, found {count}")]
    MultipleMatches { class: String, count: usize },
    #[error("argument or result conversion failed: {0}")]
    Codec(String),
    #[error(transparent)]
    Port(#[from] anyhow::Error),
}

impl SceneError {
    /// Returns the port failure, if this error came from a port.
    #[must_use]
    pub fn port_error(&self) -> Option<&anyhow::Error> {
        match self {
            SceneError::Port(err) => Some(err),
            _ => None,
        }
    }

    /// Short label used in logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SceneError::NotFound { .. } => "not_found",
            SceneError::MultipleMatches { .. } => "multiple_matches",
            SceneError::Codec(_) => "codec",
            SceneError::Port(_) => "port",
        }
    }
}
