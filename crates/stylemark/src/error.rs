//! Error types for the token pipeline.

use std::path::PathBuf;

/// Errors that abort a pipeline stage.
///
/// Every variant that concerns a file carries its path, so the message printed
/// by the CLI names the file the user has to fix.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required input file does not exist.
    #[error("missing input file: {}", path.display())]
    MissingInput { path: PathBuf, hint: Option<String> },

    /// An input file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An input file is not valid JSON for the expected shape.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A config file parsed but its content cannot be used.
    #[error("{}: {reason}", path.display())]
    InvalidConfig { path: PathBuf, reason: String },

    /// The base URL routes are resolved against does not parse.
    #[error("invalid base URL {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Input JSON parsed but has neither inventory shape.
    #[error("{}: expected a raw inventory array or a deduplicated object with a \"fields\" map", path.display())]
    InvalidInventory { path: PathBuf },

    /// An output file or directory could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serializing an output document failed.
    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The stylesheet template failed to render.
    #[error("failed to render stylesheet: {0}")]
    Template(#[from] minijinja::Error),
}

impl Error {
    /// Returns the remediation hint attached to a missing-input error, if any.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Error::MissingInput { hint, .. } => hint.as_deref(),
            _ => None,
        }
    }
}

/// A per-route sampling failure reported by a [`StyleProbe`](crate::StyleProbe).
///
/// These never abort a run; the sampler records them as route errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProbeError {
    message: String,
}

impl ProbeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for ProbeError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ProbeError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_input_names_path() {
        let err = Error::MissingInput {
            path: PathBuf::from("artifacts/style-inventory.raw.json"),
            hint: Some("run the inventory stage first".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("missing input file"));
        assert!(msg.contains("artifacts/style-inventory.raw.json"));
        assert_eq!(err.hint(), Some("run the inventory stage first"));
    }

    #[test]
    fn test_invalid_inventory_display() {
        let err = Error::InvalidInventory {
            path: PathBuf::from("in.json"),
        };
        assert!(err.to_string().contains("\"fields\""));
        assert_eq!(err.hint(), None);
    }

    #[test]
    fn test_probe_error_from_string() {
        let err: ProbeError = "navigation timed out".into();
        assert_eq!(err.message(), "navigation timed out");
        assert_eq!(err.to_string(), "navigation timed out");
    }

    #[test]
    fn test_config_errors_name_their_source() {
        let err = Error::InvalidConfig {
            path: PathBuf::from("reference.config.json"),
            reason: "referenceBaseUrl must not be empty".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "reference.config.json: referenceBaseUrl must not be empty"
        );

        let err = Error::InvalidBaseUrl {
            url: "not a url".to_string(),
            source: url::ParseError::RelativeUrlWithoutBase,
        };
        assert!(err.to_string().starts_with("invalid base URL \"not a url\""));
        assert_eq!(err.hint(), None);
    }
}
