//! # GCCPAY SMS Provider
//!
//! One batched request per send. Each recipient is keyed by a fresh random token and the
//! request is authenticated with `sign = md5(clientname + timestamp + secret)`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sms_core::{
    crypto, require_code, require_recipients, ConstructionArgs, HttpRequest, HttpTransport,
    ProviderKind, SmsClient, SmsError, TemplateParams,
};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

const PROVIDER: ProviderKind = ProviderKind::Gccpay;
const SEND_URL: &str = "https://smscenter.sgate.sa/api/v1/client/sendSms";
const KEY_BYTES: usize = 16;

#[derive(Clone)]
pub struct GccpayClient {
    client_name: String,
    secret: String,
    template_code: String,
    url: String,
    transport: Arc<dyn HttpTransport>,
}

/// Request signature: hex MD5 of `client_name`, the decimal `timestamp` and `secret`.
pub fn sign(client_name: &str, timestamp: i64, secret: &str) -> String {
    crypto::md5_hex(format!("{}{}{}", client_name, timestamp, secret))
}

fn entry_key() -> Result<String, SmsError> {
    let mut bytes = [0u8; KEY_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| SmsError::Http(format!("GCCPAY key generation failed: {}", e)))?;
    Ok(crypto::base64(bytes))
}

#[derive(Debug, Serialize)]
struct Entry<'a> {
    mobile: &'a str,
    template_code: &'a str,
    template_params: &'a TemplateParams,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    code: Option<i64>,
    message: Option<String>,
    msg: Option<String>,
}

impl SendResponse {
    fn text(self) -> Option<String> {
        self.message
            .filter(|m| !m.is_empty())
            .or(self.msg.filter(|m| !m.is_empty()))
    }
}

impl GccpayClient {
    pub fn new(
        client_name: impl Into<String>,
        secret: impl Into<String>,
        template_code: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            client_name: client_name.into(),
            secret: secret.into(),
            template_code: template_code.into(),
            url: SEND_URL.to_string(),
            transport,
        }
    }

    /// `access_id` = client name, `access_key` = secret, `template` = template code.
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

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl SmsClient for GccpayClient {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    async fn send(&self, params: &TemplateParams, recipients: &[&str]) -> Result<(), SmsError> {
        require_code(params)?;
        require_recipients(recipients)?;

        let mut entries = BTreeMap::new();
        for mobile in recipients.iter().copied() {
            entries.insert(
                entry_key()?,
                Entry {
                    mobile: mobile.strip_prefix('+').unwrap_or(mobile),
                    template_code: &self.template_code,
                    template_params: params,
                },
            );
        }

        let timestamp = OffsetDateTime::now_utc().unix_timestamp();
        let req = HttpRequest::post(&self.url)
            .json(&entries)?
            .header("clientname", &self.client_name)
            .header("timestamp", timestamp.to_string())
            .header("sign", sign(&self.client_name, timestamp, &self.secret));
        debug!(recipients = recipients.len(), "sending via GCCPAY");

        let res = self.transport.execute(req).await?;
        let decoded: Option<SendResponse> = serde_json::from_str(&res.body).ok();
        let vendor_code = decoded.as_ref().and_then(|r| r.code);
        if !res.is_success() || vendor_code.is_some_and(|c| c != 0 && c != 200) {
            warn!(status = res.status, code = ?vendor_code, "GCCPAY rejected batch");
            let message = decoded
                .and_then(SendResponse::text)
                .unwrap_or_else(|| format!("HTTP {}: {}", res.status, res.body));
            return Err(match vendor_code {
                Some(code) => SmsError::vendor_code(PROVIDER, code, message),
                None => SmsError::vendor(PROVIDER, message),
            });
        }

        info!(recipients = recipients.len(), "GCCPAY accepted batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sms_core::params_with_code;
    use sms_core::testing::RecordingTransport;
    use sms_core::ErrorKind;

    fn client(transport: Arc<RecordingTransport>) -> GccpayClient {
        let args = ConstructionArgs::new("acme", "s3cret", "", "OTP_LOGIN");
        GccpayClient::from_args(&args, transport).unwrap()
    }

    #[test]
    fn signature_is_deterministic() {
        let a = sign("acme", 1_700_000_000, "s3cret");
        assert_eq!(a, sign("acme", 1_700_000_000, "s3cret"));
        assert_eq!(a, crypto::md5_hex("acme1700000000s3cret"));
        assert_ne!(a, sign("acme", 1_700_000_001, "s3cret"));
    }

    #[tokio::test]
    async fn one_batch_keyed_by_random_tokens() {
        let transport = Arc::new(RecordingTransport::replying(200, r#"{"code":200}"#));
        client(transport.clone())
            .send(&params_with_code("8080"), &["+966500000001", "966500000002"])
            .await
            .unwrap();

        let req = transport.single_request();
        assert_eq!(req.url, SEND_URL);
        assert_eq!(req.header_value("clientname"), Some("acme"));

        let timestamp: i64 = req.header_value("timestamp").unwrap().parse().unwrap();
        assert_eq!(
            req.header_value("sign"),
            Some(sign("acme", timestamp, "s3cret").as_str())
        );

        let body = req.body_json().unwrap();
        let entries = body.as_object().unwrap();
        assert_eq!(entries.len(), 2);
        let mut mobiles: Vec<&str> = entries
            .iter()
            .map(|(key, entry)| {
                assert_eq!(crypto::base64([0u8; KEY_BYTES]).len(), key.len());
                assert_eq!(entry["template_code"], "OTP_LOGIN");
                assert_eq!(entry["template_params"]["code"], "8080");
                entry["mobile"].as_str().unwrap()
            })
            .collect();
        mobiles.sort();
        assert_eq!(mobiles, vec!["966500000001", "966500000002"]);
    }

    #[tokio::test]
    async fn code_is_required() {
        let transport = Arc::new(RecordingTransport::replying(200, "{}"));
        let err = client(transport.clone())
            .send(&TemplateParams::new(), &["966500000001"])
            .await
            .unwrap_err();
        assert!(matches!(err, SmsError::MissingTemplateParam("code")));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn vendor_code_is_surfaced() {
        let transport = Arc::new(RecordingTransport::replying(
            200,
            r#"{"code":4003,"message":"sign invalid"}"#,
        ));
        let err = client(transport)
            .send(&params_with_code("1"), &["966500000001"])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "GCCPAY error [4003]: sign invalid");
    }

    #[tokio::test]
    async fn msg_and_message_together_keep_the_code() {
        let transport = Arc::new(RecordingTransport::replying(
            200,
            r#"{"code":4010,"msg":"template not found","message":""}"#,
        ));
        let err = client(transport)
            .send(&params_with_code("1"), &["966500000001"])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "GCCPAY error [4010]: template not found");
    }

    #[tokio::test]
    async fn empty_recipients_are_rejected() {
        let transport = Arc::new(RecordingTransport::replying(200, "{}"));
        let err = client(transport.clone())
            .send(&params_with_code("1234"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, SmsError::MissingRecipients));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(transport.request_count(), 0);
    }
}
