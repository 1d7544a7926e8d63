//! # SMS Core
//!
//! Core traits and types for the smsgate multi-provider SMS abstraction.
//!
//! This crate provides the fundamental building blocks shared by every provider adapter:
//! - [`SmsClient`] trait for sending templated / one-time-code SMS
//! - [`SmsError`] and its [`ErrorKind`] taxonomy
//! - [`ProviderKind`] and [`ConstructionArgs`] used by the factory
//! - [`HttpTransport`] and the per-encoding [`HttpRequest`] builders
//! - [`MockClient`] for environments where delivery must be suppressed
//!
//! ## Example
//!
//! ```rust,ignore
//! use sms_core::{params_with_code, SmsClient};
//!
//! // Any SMS provider implements SmsClient
//! client.send(&params_with_code("482913"), &["+8613800138000"]).await?;
//! ```

use async_trait::async_trait;

pub mod args;
pub mod crypto;
mod mock;
pub mod params;
pub mod provider;
mod registry;
pub mod request;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;

pub use args::ConstructionArgs;
pub use mock::MockClient;
pub use params::{
    params_with_code, render_code_template, require_code, require_recipients, TemplateParams, CODE,
};
pub use provider::ProviderKind;
pub use registry::SenderRegistry;
pub use request::{HttpRequest, Method};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport, ReqwestTransportBuilder};

/// Errors that can occur while constructing a provider or sending through it
#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    /// The provider identifier is not one of the known tags
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),
    /// A positional construction argument the provider needs was not supplied
    #[error("missing construction parameter: {0}")]
    MissingConstructionParameter(&'static str),
    /// Construction failed for another reason, e.g. a rejected credential probe
    #[error("construction failed: {0}")]
    Construction(String),
    /// A template variable the provider needs was not supplied
    #[error("missing template parameter: {0}")]
    MissingTemplateParam(&'static str),
    /// The recipient list was empty (or too short for the provider)
    #[error("missing recipients")]
    MissingRecipients,
    /// Invalid request parameters
    #[error("invalid request: {0}")]
    Invalid(String),
    /// HTTP communication or request-building error
    #[error("http error: {0}")]
    Http(String),
    /// Authentication/authorization error reported by the provider
    #[error("authentication error: {0}")]
    Auth(String),
    /// SMS provider rejected the request
    #[error("{provider} error{}: {message}", code_suffix(.code))]
    Provider {
        provider: ProviderKind,
        code: Option<String>,
        message: String,
    },
    /// The provider answered with something we could not decode
    #[error("unexpected: {0}")]
    Unexpected(String),
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_ref().map(|c| format!(" [{c}]")).unwrap_or_default()
}

/// Coarse classification of [`SmsError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnsupportedProvider,
    Construction,
    Validation,
    Transport,
    Vendor,
}

impl SmsError {
    /// Vendor business-level rejection without a vendor code.
    pub fn vendor(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::Provider {
            provider,
            code: None,
            message: message.into(),
        }
    }

    /// Vendor business-level rejection with the vendor's own code and text.
    pub fn vendor_code(
        provider: ProviderKind,
        code: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        Self::Provider {
            provider,
            code: Some(code.to_string()),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedProvider(_) => ErrorKind::UnsupportedProvider,
            Self::MissingConstructionParameter(_) | Self::Construction(_) => {
                ErrorKind::Construction
            }
            Self::MissingTemplateParam(_) | Self::MissingRecipients | Self::Invalid(_) => {
                ErrorKind::Validation
            }
            Self::Http(_) => ErrorKind::Transport,
            Self::Auth(_) | Self::Provider { .. } | Self::Unexpected(_) => ErrorKind::Vendor,
        }
    }
}

/// Lightweight header representation to avoid tying the core to any HTTP framework.
pub type Headers = Vec<(String, String)>;

#[async_trait]
pub trait SmsClient: Send + Sync {
    /// Which provider this adapter talks to.
    fn provider(&self) -> ProviderKind;

    /// Send the template to every recipient.
    ///
    /// Returns `Ok(())` once the vendor accepted the message for delivery. Adapters that
    /// contact the vendor once per recipient stop at the first failure; recipients before
    /// it have already been handed to the vendor.
    async fn send(&self, params: &TemplateParams, recipients: &[&str]) -> Result<(), SmsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_display_includes_code() {
        let err = SmsError::vendor_code(ProviderKind::SmsBao, 51, "phone number incorrect");
        assert_eq!(err.to_string(), "SmsBao error [51]: phone number incorrect");

        let err = SmsError::vendor(ProviderKind::Netgsm, "bad header");
        assert_eq!(err.to_string(), "Netgsm error: bad header");
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            SmsError::UnsupportedProvider("x".into()).kind(),
            ErrorKind::UnsupportedProvider
        );
        assert_eq!(
            SmsError::MissingConstructionParameter("region").kind(),
            ErrorKind::Construction
        );
        assert_eq!(SmsError::MissingRecipients.kind(), ErrorKind::Validation);
        assert_eq!(
            SmsError::MissingTemplateParam("code").kind(),
            ErrorKind::Validation
        );
        assert_eq!(SmsError::Http("boom".into()).kind(), ErrorKind::Transport);
        assert_eq!(SmsError::Auth("denied".into()).kind(), ErrorKind::Vendor);
    }
}
