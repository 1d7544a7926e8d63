//! # Infobip SMS Provider
//!
//! Sends one advanced text message addressed to every recipient. Numbers with a leading
//! `0` are treated as Taiwanese local numbers and rewritten to `886...`; a leading `+` is
//! dropped.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sms_core::{
    render_code_template, require_code, require_recipients, ConstructionArgs, HttpRequest,
    HttpTransport, ProviderKind, SmsClient, SmsError, TemplateParams,
};
use tracing::{debug, info, warn};

const PROVIDER: ProviderKind = ProviderKind::Infobip;

#[derive(Clone)]
pub struct InfobipClient {
    base_url: String,
    sender: String,
    api_key: String,
    template: String,
    transport: Arc<dyn HttpTransport>,
}

#[derive(Debug, Serialize)]
struct MessageData<'a> {
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    from: &'a str,
    destinations: Vec<Destination>,
    text: String,
}

#[derive(Debug, Serialize)]
struct Destination {
    to: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    request_error: RequestError,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestError {
    service_exception: ServiceException,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceException {
    message_id: Option<String>,
    text: String,
}

/// Rewrites a number into the form Infobip expects.
pub fn normalize_number(mobile: &str) -> String {
    let mobile = match mobile.strip_prefix('0') {
        Some(rest) => format!("886{rest}"),
        None => mobile.to_string(),
    };
    match mobile.strip_prefix('+') {
        Some(rest) => rest.to_string(),
        None => mobile,
    }
}

impl InfobipClient {
    pub fn new(
        base_url: impl Into<String>,
        sender: impl Into<String>,
        api_key: impl Into<String>,
        template: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            sender: sender.into(),
            api_key: api_key.into(),
            template: template.into(),
            transport,
        }
    }

    /// `access_id` = sender, `access_key` = API key, `extra` = `[baseUrl]`.
    pub fn from_args(
        args: &ConstructionArgs,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, SmsError> {
        let base_url = args.required_extra(0, "baseUrl")?;
        Ok(Self::new(
            base_url,
            &args.access_id,
            &args.access_key,
            &args.template,
            transport,
        ))
    }

    fn endpoint(&self) -> String {
        format!("{}/sms/2/text/advanced", self.base_url.trim_end_matches('/'))
    }
}

fn decode_error(status: u16, body: &str) -> SmsError {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(e) => {
            let exception = e.request_error.service_exception;
            if status == 401 {
                return SmsError::Auth(exception.text);
            }
            match exception.message_id {
                Some(id) => SmsError::vendor_code(PROVIDER, id, exception.text),
                None => SmsError::vendor(PROVIDER, exception.text),
            }
        }
        Err(_) => SmsError::vendor_code(PROVIDER, status, body.to_string()),
    }
}

#[async_trait]
impl SmsClient for InfobipClient {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    async fn send(&self, params: &TemplateParams, recipients: &[&str]) -> Result<(), SmsError> {
        let code = require_code(params)?;
        require_recipients(recipients)?;

        let data = MessageData {
            messages: [Message {
                from: &self.sender,
                destinations: recipients
                    .iter()
                    .map(|to| Destination {
                        to: normalize_number(to),
                    })
                    .collect(),
                text: render_code_template(&self.template, code),
            }],
        };
        let req = HttpRequest::post(self.endpoint())
            .header("Authorization", format!("App {}", self.api_key))
            .json(&data)?;
        debug!(recipients = recipients.len(), "sending via Infobip");

        let res = self.transport.execute(req).await?;
        if !res.is_success() {
            warn!(status = res.status, "Infobip rejected message");
            return Err(decode_error(res.status, &res.body));
        }

        info!(recipients = recipients.len(), "Infobip accepted message");
        Ok(())
    }
}
