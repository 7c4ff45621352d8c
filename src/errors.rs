use thiserror::Error;

/// A live read against the cluster failed.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound { kind: String, namespace: String, name: String },

    #[error("invalid label selector: {0}")]
    Selector(String),

    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("failed to convert {kind} {name} into its structured shape: {source}")]
    Conversion { kind: String, name: String, source: serde_json::Error },

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("{kind} {namespace}/{name}: backend is not supported yet")]
    UnsupportedBackend { kind: String, namespace: String, name: String },

    #[error("finalize failed: {0}")]
    Finalize(String),

    #[error("render failed: {0}")]
    Render(String),
}
