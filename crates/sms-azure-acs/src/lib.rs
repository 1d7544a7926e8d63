//! # Azure Communication Services SMS Provider
//!
//! Sends a fixed message to every recipient in a single `POST /sms` call authenticated with
//! a bearer token.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sms_core::{
    require_recipients, ConstructionArgs, HttpRequest, HttpTransport, ProviderKind, SmsClient,
    SmsError, TemplateParams,
};
use tracing::{debug, info, warn};

const PROVIDER: ProviderKind = ProviderKind::AzureAcs;
const API_VERSION: &str = "2021-03-07";

/// Azure Communication Services SMS client.
#[derive(Clone)]
pub struct AzureAcsClient {
    access_token: String,
    /// Resource endpoint, e.g. `https://contoso.communication.azure.com`.
    endpoint: String,
    /// Sender phone number registered with the resource.
    sender: String,
    message: String,
    transport: Arc<dyn HttpTransport>,
}

impl AzureAcsClient {
    pub fn new(
        access_token: impl Into<String>,
        endpoint: impl Into<String>,
        sender: impl Into<String>,
        message: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            endpoint: endpoint.into(),
            sender: sender.into(),
            message: message.into(),
            transport,
        }
    }

    /// `access_key` = bearer token, `template` = message, `extra` = `[endpoint, sender]`.
    pub fn from_args(
        args: &ConstructionArgs,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, SmsError> {
        let endpoint = args.required_extra(0, "endpoint")?;
        let sender = args.required_extra(1, "sender")?;
        Ok(Self::new(
            &args.access_key,
            endpoint,
            sender,
            &args.template,
            transport,
        ))
    }

    /// Target of every send request.
    pub fn request_url(&self) -> String {
        format!(
            "{}/sms?api-version={}",
            self.endpoint.trim_end_matches('/'),
            API_VERSION
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendBody<'a> {
    from: &'a str,
    message: &'a str,
    sms_recipients: Vec<Recipient<'a>>,
}

#[derive(Debug, Serialize)]
struct Recipient<'a> {
    to: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    value: Vec<SendResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResult {
    to: String,
    successful: bool,
    http_status_code: Option<u16>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: String,
}

fn decode_failure(status: u16, body: &str) -> SmsError {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let code = envelope.error.code.unwrap_or_else(|| status.to_string());
            return if status == 401 {
                SmsError::Auth(envelope.error.message)
            } else {
                SmsError::vendor_code(PROVIDER, code, envelope.error.message)
            };
        }
        Err(_) => format!("HTTP {}: {}", status, body),
    };
    if status == 401 {
        SmsError::Auth(message)
    } else {
        SmsError::vendor_code(PROVIDER, status, message)
    }
}

#[async_trait]
impl SmsClient for AzureAcsClient {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    async fn send(&self, _params: &TemplateParams, recipients: &[&str]) -> Result<(), SmsError> {
        require_recipients(recipients)?;

        let body = SendBody {
            from: &self.sender,
            message: &self.message,
            sms_recipients: recipients.iter().copied().map(|to| Recipient { to }).collect(),
        };
        let req = HttpRequest::post(self.request_url())
            .header("Authorization", format!("Bearer {}", self.access_token))
            .json(&body)?;
        debug!(recipients = recipients.len(), "sending via Azure ACS");

        let res = self.transport.execute(req).await?;
        if !res.is_success() {
            warn!(status = res.status, "Azure ACS rejected request");
            return Err(decode_failure(res.status, &res.body));
        }

        // Older resources answer 202 with an empty body.
        if res.body.trim().is_empty() {
            return Ok(());
        }
        let parsed: SendResponse = res.json()?;
        let failures: Vec<String> = parsed
            .value
            .iter()
            .filter(|r| !r.successful)
            .map(|r| {
                format!(
                    "{}: {} ({})",
                    r.to,
                    r.error_message.as_deref().unwrap_or("rejected"),
                    r.http_status_code.unwrap_or_default()
                )
            })
            .collect();
        if !failures.is_empty() {
            return Err(SmsError::vendor(PROVIDER, failures.join("|")));
        }

        info!(recipients = recipients.len(), "Azure ACS accepted messages");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sms_core::testing::RecordingTransport;
    use serde_json::json;

    fn args() -> ConstructionArgs {
        ConstructionArgs::new("", "token-abc", "", "Your code arrived")
            .with_extra(["https://contoso.communication.azure.com", "+18005550100"])
    }

    #[test]
    fn endpoint_and_sender_required() {
        let transport = Arc::new(RecordingTransport::replying(202, ""));
        let short = ConstructionArgs::new("", "t", "", "m")
            .with_extra(["https://contoso.communication.azure.com"]);
        assert!(matches!(
            AzureAcsClient::from_args(&short, transport.clone()),
            Err(SmsError::MissingConstructionParameter("sender"))
        ));
        assert!(matches!(
            AzureAcsClient::from_args(&ConstructionArgs::default(), transport),
            Err(SmsError::MissingConstructionParameter("endpoint"))
        ));
    }

    #[test]
    fn trailing_slash_on_endpoint_is_ignored() {
        let transport = Arc::new(RecordingTransport::replying(202, ""));
        let args = ConstructionArgs::new("", "t", "", "m")
            .with_extra(["https://contoso.communication.azure.com/", "+18005550100"]);
        let client = AzureAcsClient::from_args(&args, transport).unwrap();
        assert_eq!(
            client.request_url(),
            "https://contoso.communication.azure.com/sms?api-version=2021-03-07"
        );
    }

    #[tokio::test]
    async fn batches_all_recipients() {
        let transport = Arc::new(RecordingTransport::replying(
            202,
            r#"{"value":[{"to":"+14155550100","successful":true,"httpStatusCode":202},{"to":"+14155550101","successful":true,"httpStatusCode":202}]}"#,
        ));
        let client = AzureAcsClient::from_args(&args(), transport.clone()).unwrap();
        assert_eq!(
            client.request_url(),
            "https://contoso.communication.azure.com/sms?api-version=2021-03-07"
        );

        client
            .send(&TemplateParams::new(), &["+14155550100", "+14155550101"])
            .await
            .unwrap();

        let req = transport.single_request();
        assert_eq!(req.url, client.request_url());
        assert_eq!(req.header_value("Authorization"), Some("Bearer token-abc"));
        assert_eq!(
            req.body_json().unwrap(),
            json!({
                "from": "+18005550100",
                "message": "Your code arrived",
                "smsRecipients": [{"to": "+14155550100"}, {"to": "+14155550101"}]
            })
        );
    }

    #[tokio::test]
    async fn per_recipient_failure_is_reported() {
        let transport = Arc::new(RecordingTransport::replying(
            202,
            r#"{"value":[{"to":"+14155550100","successful":true},{"to":"123","successful":false,"httpStatusCode":400,"errorMessage":"Invalid To phone number format."}]}"#,
        ));
        let client = AzureAcsClient::from_args(&args(), transport).unwrap();
        let err = client
            .send(&TemplateParams::new(), &["+14155550100", "123"])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid To phone number format."));
    }

    #[tokio::test]
    async fn unauthorized() {
        let transport = Arc::new(RecordingTransport::replying(
            401,
            r#"{"error":{"code":"Unauthorized","message":"Denied by the resource provider."}}"#,
        ));
        let client = AzureAcsClient::from_args(&args(), transport).unwrap();
        let err = client
            .send(&TemplateParams::new(), &["+14155550100"])
            .await
            .unwrap_err();
        assert!(matches!(err, SmsError::Auth(ref m) if m.contains("Denied")));
    }

    #[tokio::test]
    async fn empty_recipients() {
        let transport = Arc::new(RecordingTransport::replying(202, ""));
        let client = AzureAcsClient::from_args(&args(), transport.clone()).unwrap();
        assert!(matches!(
            client.send(&TemplateParams::new(), &[]).await,
            Err(SmsError::MissingRecipients)
        ));
        assert_eq!(transport.request_count(), 0);
    }
}
