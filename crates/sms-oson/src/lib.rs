//! # OSON SMS Provider
//!
//! One signed GET per recipient with `str_hash = sha256(txn_id;login;from;phone;secret)`.
//! The code is appended to the configured message; an empty message falls back to a
//! default greeting.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use sms_core::{
    crypto, require_recipients, ConstructionArgs, HttpRequest, HttpTransport, ProviderKind,
    SmsClient, SmsError, TemplateParams, CODE,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

const PROVIDER: ProviderKind = ProviderKind::Oson;
const SEND_URL: &str = "https://api.osonsms.com/sendsms_v1.php";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Clone)]
pub struct OsonClient {
    login: String,
    hash_secret: String,
    from: String,
    message: String,
    url: String,
    transport: Arc<dyn HttpTransport>,
}

#[derive(Debug, Deserialize)]
struct OsonResponse {
    status: Option<String>,
    msg_id: Option<serde_json::Value>,
    error: Option<OsonError>,
}

#[derive(Debug, Deserialize)]
struct OsonError {
    code: Option<serde_json::Value>,
    msg: Option<String>,
}

/// `str_hash` for one message.
pub fn str_hash(txn_id: &str, login: &str, from: &str, phone: &str, secret: &str) -> String {
    crypto::sha256_hex([txn_id, login, from, phone, secret].join(";"))
}

impl OsonClient {
    pub fn new(
        login: impl Into<String>,
        hash_secret: impl Into<String>,
        from: impl Into<String>,
        message: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            login: login.into(),
            hash_secret: hash_secret.into(),
            from: from.into(),
            message: message.into(),
            url: SEND_URL.to_string(),
            transport,
        }
    }

    /// `access_id` = login, `access_key` = hash secret, `sign` = sender name,
    /// `template` = message prefix.
    pub fn from_args(
        args: &ConstructionArgs,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, SmsError> {
        Ok(Self::new(
            &args.access_id,
            &args.access_key,
            &args.sign,
            &args.template,
            transport,
        ))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Text actually delivered for `code`.
    pub fn message_for(&self, code: &str) -> String {
        if self.message.is_empty() {
            format!("Hello. Your authorization code: {}", code)
        } else {
            format!("{}{}", self.message, code)
        }
    }
}

fn decode_failure(status: u16, body: &str) -> SmsError {
    match serde_json::from_str::<OsonResponse>(body).ok().and_then(|r| r.error) {
        Some(OsonError { code, msg }) => {
            let message = msg.unwrap_or_else(|| body.to_string());
            match code {
                Some(serde_json::Value::String(code)) => SmsError::vendor_code(PROVIDER, code, message),
                Some(code) => SmsError::vendor_code(PROVIDER, code, message),
                None => SmsError::vendor(PROVIDER, message),
            }
        }
        None => SmsError::vendor_code(PROVIDER, status, body.to_string()),
    }
}

#[async_trait]
impl SmsClient for OsonClient {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    async fn send(&self, params: &TemplateParams, recipients: &[&str]) -> Result<(), SmsError> {
        require_recipients(recipients)?;

        let code = params.get(CODE).map(String::as_str).unwrap_or_default();
        let message = self.message_for(code);
        debug!(recipients = recipients.len(), "sending via OSON");

        for phone in recipients.iter().copied() {
            let txn_id = Uuid::new_v4().to_string();
            let hash = str_hash(&txn_id, &self.login, &self.from, phone, &self.hash_secret);
            let req = HttpRequest::get(&self.url)
                .query([
                    ("from", self.from.as_str()),
                    ("phone_number", phone),
                    ("msg", message.as_str()),
                    ("str_hash", hash.as_str()),
                    ("txn_id", txn_id.as_str()),
                    ("login", self.login.as_str()),
                ])?
                .timeout(REQUEST_TIMEOUT);
            let res = self.transport.execute(req).await?;

            let decoded: Option<OsonResponse> = serde_json::from_str(&res.body).ok();
            match decoded {
                Some(OsonResponse {
                    status: Some(ref status),
                    ref msg_id,
                    ..
                }) if status == "ok" => {
                    debug!(txn_id = %txn_id, msg_id = ?msg_id, "OSON accepted message");
                }
                _ => {
                    warn!(status = res.status, "OSON rejected message");
                    return Err(decode_failure(res.status, &res.body));
                }
            }
        }

        info!(recipients = recipients.len(), "OSON accepted messages");
        Ok(())
    }
}
