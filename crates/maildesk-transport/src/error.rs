//! Error types for transport operations.

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Transport error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed before a provider response arrived
    /// (connect failure, request timeout, body read error).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider rejected the send with an error response.
    #[error("Send rejected {status}: {message}")]
    Rejected {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Response body from the provider.
        message: String,
    },

    /// No API credentials are configured.
    #[error("Missing provider API credentials")]
    Credentials,

    /// Provider accepted the send but returned an unreadable body.
    #[error("Invalid send response: {0}")]
    Response(String),
}

impl Error {
    /// Creates a rejection error from a status code and response body.
    #[must_use]
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Returns true if retrying the send cannot succeed: the provider
    /// rejected the request itself (4xx other than 408/429) or no
    /// credentials exist.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        match self {
            Self::Rejected { status, .. } => {
                *status >= 400 && *status < 500 && *status != 408 && *status != 429
            }
            Self::Credentials | Self::Response(_) => true,
            Self::Http(_) => false,
        }
    }

    /// Returns true if a later retry may succeed (timeouts, connect
    /// failures, provider 5xx responses, rate limiting).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        !self.is_permanent()
    }
}
