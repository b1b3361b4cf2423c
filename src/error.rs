use crate::model::ResourceKey;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Previous,
    Current,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Previous => f.write_str("previous snapshot"),
            Side::Current => f.write_str("current inventory"),
        }
    }
}

/// Fatal errors of a report run.
///
/// Degraded paths (audit lookups, retention, notification) never surface
/// here; they are logged where they happen.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The inventory feed could not be read within its attempt budget.
    /// A partial inventory would under-report deletions, so the run stops.
    #[error("inventory feed exhausted after {attempts} attempts: {source}")]
    FeedExhausted {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("duplicate resource key {key} in {side}")]
    DuplicateKey { side: Side, key: ResourceKey },

    #[error("storage error on {key}: {source}")]
    Storage {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("report rendering failed: {0}")]
    Render(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ReportError {
    pub fn storage(key: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        ReportError::Storage {
            key: key.into(),
            source: source.into(),
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for ReportError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ReportError::Render(err.to_string())
    }
}
