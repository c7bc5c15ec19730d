//! Wire types exchanged with the mail provider.

use serde::{Deserialize, Serialize};

/// A fully composed email handed to the provider's send API.
///
/// Threading headers (`Message-ID`, `In-Reply-To`, `References`) are
/// composed by the caller; the provider transmits them verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEmail {
    /// Sender in `Name <address>` form.
    pub from: String,
    /// Recipient addresses.
    pub to: Vec<String>,
    /// CC addresses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    /// BCC addresses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// HTML body, signature already appended.
    pub html_body: String,
    /// Plain-text body, if one was composed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_body: Option<String>,
    /// `Message-ID` header value, angle brackets included.
    pub message_id: String,
    /// `In-Reply-To` header value, if this email is a reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    /// `References` header value: ancestor Message-IDs joined by spaces.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
    /// Attachments, passed through by reference.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<EmailAttachment>,
}

/// An attachment reference passed to the provider.
///
/// maildesk never handles attachment bytes; the provider fetches them
/// from the given URL at send time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmailAttachment {
    /// File name shown to the recipient.
    pub file_name: String,
    /// MIME type, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Location the provider fetches the content from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Provider acknowledgement of an accepted send.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    /// Provider-side identifier of the accepted email, when reported.
    #[serde(default)]
    pub provider_id: Option<String>,
}

/// Final delivery outcome reported by the provider.
///
/// Only terminal outcomes arrive over the webhook; `sent` is recorded
/// locally when the send API accepts the email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOutcome {
    /// The recipient server accepted the email.
    Delivered,
    /// The recipient server rejected the email.
    Bounced,
}

impl DeliveryOutcome {
    /// Webhook string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Bounced => "bounced",
        }
    }
}

/// Delivery-status webhook payload sent by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryEvent {
    /// The Message-ID of the email the outcome applies to.
    pub external_email_id: String,
    /// Terminal outcome.
    pub status: DeliveryOutcome,
}
