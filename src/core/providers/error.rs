use thiserror::Error;

/// Error type returned by info providers.
///
/// Only the `Display` text of these errors ever reaches an aggregated report,
/// so variants are free to carry whatever context helps when reading logs.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Failed to read a file from disk.
    #[error("Failed to read file {path}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Encountered a parsing error while extracting a value.
    #[error("Failed to parse {field} from {location}: {reason}")]
    ParseError {
        field: String,
        location: String,
        reason: String,
    },

    /// Data was found but did not conform to the expected format.
    #[error("Invalid format in {location}: {reason}")]
    InvalidFormat { location: String, reason: String },

    /// The provider is compiled in but cannot report on this platform.
    #[error("Unsupported provider: {0}")]
    Unsupported(String),

    /// The provider gave up waiting on something itself.
    ///
    /// Reported exactly like an invoker-enforced timeout.
    #[error("Fetching info timed out")]
    TimedOut,

    /// The provider output could not be turned into a JSON value.
    #[error("Failed to serialize provider output: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The provider output serialized to something other than a mapping.
    #[error("Provider returned {0} instead of a mapping")]
    InvalidPayload(&'static str),

    /// Free-form failure; displayed verbatim.
    #[error("{0}")]
    Message(String),

    /// Any other error, displayed through its own `Display` impl.
    #[error("{0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl ProviderError {
    /// Builds a [`ProviderError::Message`] from anything string-like.
    pub fn msg(message: impl Into<String>) -> Self {
        ProviderError::Message(message.into())
    }

    /// Wraps an arbitrary error, keeping its description intact.
    pub fn other<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ProviderError::Other(Box::new(err))
    }

    /// True for errors that should be reported as a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::TimedOut)
    }
}

impl From<tokio::time::error::Elapsed> for ProviderError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ProviderError::TimedOut
    }
}
