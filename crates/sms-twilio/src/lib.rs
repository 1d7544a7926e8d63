//! # Twilio SMS Provider
//!
//! Sends a code-bearing template through the Twilio Messages REST API, one request per
//! recipient.
//!
//! The first entry of the recipient list is the Twilio number the messages are sent *from*;
//! the remaining entries are the destinations.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sms_core::{params_with_code, ReqwestTransport, SmsClient};
//! use sms_twilio::TwilioClient;
//!
//! let client = TwilioClient::new("AC...", "token", "Your code is %s", ReqwestTransport::shared());
//! client.send(&params_with_code("482913"), &["+15005550006", "+14155550100"]).await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use sms_core::{
    crypto, render_code_template, require_code, ConstructionArgs, HttpRequest, HttpTransport,
    ProviderKind, SmsClient, SmsError, TemplateParams,
};
use tracing::{debug, info, warn};

const PROVIDER: ProviderKind = ProviderKind::Twilio;
const DEFAULT_BASE_URL: &str = "https://api.twilio.com";

/// Twilio REST client.
#[derive(Clone)]
pub struct TwilioClient {
    /// Twilio Account SID.
    account_sid: String,
    /// Twilio Auth Token (password for Basic auth).
    auth_token: String,
    /// Message body with a `%s` placeholder for the code.
    template: String,
    /// API base URL; override for testing/mocking.
    base_url: String,
    transport: Arc<dyn HttpTransport>,
}

impl TwilioClient {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        template: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            template: template.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            transport,
        }
    }

    /// `access_id` = Account SID, `access_key` = Auth Token.
    pub fn from_args(
        args: &ConstructionArgs,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, SmsError> {
        Ok(Self::new(
            &args.access_id,
            &args.access_key,
            &args.template,
            transport,
        ))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url.trim_end_matches('/'),
            self.account_sid
        )
    }

    fn basic_auth(&self) -> String {
        format!(
            "Basic {}",
            crypto::base64(format!("{}:{}", self.account_sid, self.auth_token))
        )
    }
}

#[derive(Debug, Deserialize)]
struct TwilioErrorResponse {
    code: Option<i64>,
    message: Option<String>,
}

fn decode_error(status: u16, body: &str) -> SmsError {
    let parsed: Option<TwilioErrorResponse> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|e| e.message.clone())
        .unwrap_or_else(|| format!("HTTP {}: {}", status, body));
    if status == 401 {
        return SmsError::Auth(message);
    }
    match parsed.and_then(|e| e.code) {
        Some(code) => SmsError::vendor_code(PROVIDER, code, message),
        None => SmsError::vendor(PROVIDER, message),
    }
}

#[async_trait]
impl SmsClient for TwilioClient {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    async fn send(&self, params: &TemplateParams, recipients: &[&str]) -> Result<(), SmsError> {
        let code = require_code(params)?;
        let (from, destinations) = match recipients {
            [from, rest @ ..] if !rest.is_empty() => (*from, rest),
            _ => return Err(SmsError::MissingRecipients),
        };

        let body = render_code_template(&self.template, code);
        let url = self.messages_url();
        debug!(from, recipients = destinations.len(), "sending via Twilio");

        for to in destinations {
            let req = HttpRequest::post(&url)
                .header("Authorization", self.basic_auth())
                .form(&[("From", from), ("To", *to), ("Body", body.as_str())])?;
            let res = self.transport.execute(req).await?;
            if !res.is_success() {
                warn!(status = res.status, to = *to, "Twilio rejected message");
                return Err(decode_error(res.status, &res.body));
            }
        }

        info!(recipients = destinations.len(), "Twilio accepted messages");
        Ok(())
    }
}
