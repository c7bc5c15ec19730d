//! Provider send API client.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{OutboundEmail, SendReceipt};

/// Default bound on one send request, connection setup included.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Async seam to the provider's send API.
///
/// The delivery dispatcher is generic over this trait so the engine can be
/// exercised without network access. A request that exceeds the timeout
/// surfaces as a transient [`Error::Http`], distinct from the provider
/// rejecting the email.
pub trait Mailer: Send + Sync {
    /// Submit one composed email to the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, times out, or the provider
    /// rejects the email. Use [`Error::is_transient`] to decide whether a
    /// retry is worthwhile.
    fn send(&self, email: &OutboundEmail) -> impl Future<Output = Result<SendReceipt>> + Send;
}

/// Production mailer: bearer-authenticated JSON POST to the provider.
#[derive(Debug, Clone)]
pub struct HttpMailer {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpMailer {
    /// Create a mailer for the given provider base URL.
    ///
    /// `api_key` may be absent; sends then fail with
    /// [`Error::Credentials`] instead of reaching the network, which the
    /// dispatcher records as a failed delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        Self::with_timeout(base_url, api_key, DEFAULT_SEND_TIMEOUT)
    }

    /// Create a mailer with a custom request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn with_timeout(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into();

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

impl Mailer for HttpMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt> {
        let Some(api_key) = &self.api_key else {
            return Err(Error::Credentials);
        };

        debug!(
            "sending email {} to {} recipient(s)",
            email.message_id,
            email.to.len()
        );

        let response = self
            .http
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(api_key)
            .json(email)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let receipt: SendReceipt = response
                .json()
                .await
                .map_err(|e| Error::Response(e.to_string()))?;
            debug!(
                "provider accepted {} as {:?}",
                email.message_id, receipt.provider_id
            );
            Ok(receipt)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(Error::rejected(status.as_u16(), message))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_without_credentials_fails_before_network() {
        let mailer = HttpMailer::new("https://provider.invalid", None).unwrap();
        let email = OutboundEmail {
            from: "a@b".into(),
            to: vec!["c@d".into()],
            message_id: "<x@y>".into(),
            ..OutboundEmail::default()
        };

        let err = mailer.send(&email).await.unwrap_err();
        assert!(matches!(err, Error::Credentials));
        assert!(err.is_permanent());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let mailer = HttpMailer::new("https://provider.example/api/", None).unwrap();
        assert_eq!(mailer.base_url, "https://provider.example/api");
    }
}
