use std::time::Duration;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the encoder and the log store core.
///
/// Nothing is swallowed: encoding failures abort the write of the entry that
/// produced them, transport failures are passed through unchanged.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A nested object/array marshaler reported a failure.
    #[error("failed to encode field `{key}`: {message}")]
    Encoding { key: String, message: String },

    /// A reflected value could not be serialized to JSON.
    #[error("failed to serialize field `{key}`: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The producer rejected the record or failed to close.
    #[error(transparent)]
    Transport(#[from] ProducerError),

    /// Invalid configuration value.
    #[error("invalid configuration for {field}: {message}")]
    Config { field: String, message: String },

    /// The global tracing subscriber could not be installed.
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

impl Error {
    /// Build an [`Error::Encoding`] for `key`.
    pub fn encoding(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Encoding {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors returned by a [`Producer`](crate::producer::Producer).
#[derive(thiserror::Error, Debug)]
pub enum ProducerError {
    #[error("producer is closed")]
    Closed,

    #[error("producer queue full, record dropped")]
    QueueFull,

    #[error("producer did not finish flushing within {0:?}")]
    CloseTimeout(Duration),

    /// Delivery failure reported by the underlying sink.
    #[error("sink error: {0}")]
    Sink(#[source] Box<dyn std::error::Error + Send + Sync>),
}
