use thiserror::Error;

/// Failures talking to the prediction backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The payload parsed but failed validation.
    #[error("invalid field `{field}`: {message}")]
    Invalid { field: String, message: String },

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}

impl ApiError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }

    /// True for failures where the backend could not be reached at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ApiError::Transport { .. } | ApiError::Status { .. })
    }
}
