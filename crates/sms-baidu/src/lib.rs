//! # Baidu Cloud SMS Provider
//!
//! SMS v3 `sendSms` authenticated with `bce-auth-v1`. Signed headers are `host` and
//! `x-bce-date`; the query string is always empty.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sms_core::{
    crypto, require_code, require_recipients, ConstructionArgs, HttpRequest, HttpTransport,
    ProviderKind, SmsClient, SmsError, TemplateParams,
};
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

const PROVIDER: ProviderKind = ProviderKind::BaiduCloud;
const SEND_PATH: &str = "/api/v3/sendSms";
const EXPIRATION_SECONDS: u32 = 1800;
const SIGNED_HEADERS: &str = "host;x-bce-date";
const SUCCESS: &str = "1000";

#[derive(Clone)]
pub struct BaiduClient {
    access_key_id: String,
    secret_access_key: String,
    signature_id: String,
    template: String,
    /// Endpoint with scheme, e.g. `https://smsv3.bj.baidubce.com`.
    endpoint: String,
    transport: Arc<dyn HttpTransport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendSmsArgs<'a> {
    mobile: String,
    template: &'a str,
    signature_id: &'a str,
    content_var: ContentVar<'a>,
}

#[derive(Debug, Serialize)]
struct ContentVar<'a> {
    code: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendSmsResult {
    code: String,
    #[serde(default)]
    message: String,
    request_id: Option<String>,
}

/// Computes the `Authorization` header for a request without query parameters.
///
/// `timestamp` is the `x-bce-date` value (`YYYY-MM-DDThh:mm:ssZ`).
pub fn authorization(
    access_key_id: &str,
    secret_access_key: &str,
    method: &str,
    path: &str,
    host: &str,
    timestamp: &str,
) -> Result<String, SmsError> {
    let prefix = format!(
        "bce-auth-v1/{}/{}/{}",
        access_key_id, timestamp, EXPIRATION_SECONDS
    );
    let signing_key = crypto::hmac_sha256_hex(secret_access_key.as_bytes(), prefix.as_bytes())?;
    let canonical_headers = format!(
        "host:{}\nx-bce-date:{}",
        crypto::percent_encode(host),
        crypto::percent_encode(timestamp)
    );
    let canonical_request = format!("{}\n{}\n\n{}", method, path, canonical_headers);
    let signature = crypto::hmac_sha256_hex(signing_key.as_bytes(), canonical_request.as_bytes())?;
    Ok(format!("{}/{}/{}", prefix, SIGNED_HEADERS, signature))
}

impl BaiduClient {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        signature_id: impl Into<String>,
        template: impl Into<String>,
        endpoint: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let endpoint = endpoint.into();
        let endpoint = if endpoint.contains("://") {
            endpoint
        } else {
            format!("https://{}", endpoint)
        };
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            signature_id: signature_id.into(),
            template: template.into(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            transport,
        }
    }

    /// `sign` = signature id, `extra` = `[endpoint]`.
    pub fn from_args(
        args: &ConstructionArgs,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, SmsError> {
        let endpoint = args.required_extra(0, "endpoint")?;
        Ok(Self::new(
            &args.access_id,
            &args.access_key,
            &args.sign,
            &args.template,
            endpoint,
            transport,
        ))
    }

    fn host(&self) -> &str {
        self.endpoint
            .split_once("://")
            .map_or(self.endpoint.as_str(), |(_, host)| host)
    }
}

#[async_trait]
impl SmsClient for BaiduClient {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    async fn send(&self, params: &TemplateParams, recipients: &[&str]) -> Result<(), SmsError> {
        let code = require_code(params)?;
        require_recipients(recipients)?;

        let body = SendSmsArgs {
            mobile: recipients.join(","),
            template: &self.template,
            signature_id: &self.signature_id,
            content_var: ContentVar { code },
        };
        let timestamp = OffsetDateTime::now_utc()
            .format(format_description!(
                "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
            ))
            .map_err(|e| SmsError::Http(format!("timestamp format: {}", e)))?;
        let auth = authorization(
            &self.access_key_id,
            &self.secret_access_key,
            "POST",
            SEND_PATH,
            self.host(),
            &timestamp,
        )?;
        let req = HttpRequest::post(format!("{}{}", self.endpoint, SEND_PATH))
            .json(&body)?
            .header("x-bce-date", timestamp)
            .header("Authorization", auth);
        debug!(recipients = recipients.len(), "sending via Baidu Cloud");

        let res = self.transport.execute(req).await?;
        let result: SendSmsResult = res.json()?;
        if result.code != SUCCESS {
            warn!(
                code = %result.code,
                request_id = result.request_id.as_deref().unwrap_or_default(),
                "Baidu Cloud rejected request"
            );
            return Err(SmsError::vendor_code(PROVIDER, result.code, result.message));
        }

        info!(recipients = recipients.len(), "Baidu Cloud accepted request");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sms_core::params_with_code;
    use sms_core::testing::RecordingTransport;
    use sms_core::ErrorKind;

    fn args(endpoint: &str) -> ConstructionArgs {
        ConstructionArgs::new("ak", "sk", "sms-sign-id", "sms-tmpl-id").with_extra([endpoint])
    }

    #[test]
    fn endpoint_scheme_is_added() {
        let transport = Arc::new(RecordingTransport::replying(200, "{}"));
        let client = BaiduClient::from_args(&args("smsv3.bj.baidubce.com"), transport.clone()).unwrap();
        assert_eq!(client.endpoint, "https://smsv3.bj.baidubce.com");
        assert_eq!(client.host(), "smsv3.bj.baidubce.com");

        let client =
            BaiduClient::from_args(&args("http://127.0.0.1:8080/"), transport.clone()).unwrap();
        assert_eq!(client.endpoint, "http://127.0.0.1:8080");
        assert_eq!(client.host(), "127.0.0.1:8080");

        assert!(matches!(
            BaiduClient::from_args(&ConstructionArgs::default(), transport),
            Err(SmsError::MissingConstructionParameter("endpoint"))
        ));
    }

    #[test]
    fn authorization_is_pure() {
        let auth = authorization(
            "ak",
            "sk",
            "POST",
            SEND_PATH,
            "smsv3.bj.baidubce.com",
            "2024-01-02T03:04:05Z",
        )
        .unwrap();
        let prefix = "bce-auth-v1/ak/2024-01-02T03:04:05Z/1800/host;x-bce-date/";
        assert!(auth.starts_with(prefix), "{auth}");

        let signing_key = crypto::hmac_sha256_hex(b"sk", b"bce-auth-v1/ak/2024-01-02T03:04:05Z/1800").unwrap();
        let expected = crypto::hmac_sha256_hex(
            signing_key.as_bytes(),
            b"POST\n/api/v3/sendSms\n\nhost:smsv3.bj.baidubce.com\nx-bce-date:2024-01-02T03%3A04%3A05Z",
        )
        .unwrap();
        assert_eq!(&auth[prefix.len()..], expected);
    }

    #[tokio::test]
    async fn batched_request() {
        let transport = Arc::new(RecordingTransport::replying(
            200,
            r#"{"requestId":"r-1","code":"1000","message":"成功","data":[]}"#,
        ));
        let client = BaiduClient::from_args(&args("smsv3.bj.baidubce.com"), transport.clone()).unwrap();
        client
            .send(&params_with_code("9999"), &["13800138000", "13800138001"])
            .await
            .unwrap();

        let req = transport.single_request();
        assert_eq!(req.url, "https://smsv3.bj.baidubce.com/api/v3/sendSms");
        assert!(req.header_value("x-bce-date").is_some());
        assert!(req
            .header_value("Authorization")
            .unwrap()
            .starts_with("bce-auth-v1/ak/"));
        assert_eq!(
            req.body_json().unwrap(),
            json!({
                "mobile": "13800138000,13800138001",
                "template": "sms-tmpl-id",
                "signatureId": "sms-sign-id",
                "contentVar": {"code": "9999"}
            })
        );
    }

    #[tokio::test]
    async fn non_success_code() {
        let transport = Arc::new(RecordingTransport::replying(
            200,
            r#"{"requestId":"r-2","code":"401","message":"template not exist"}"#,
        ));
        let err = BaiduClient::from_args(&args("smsv3.bj.baidubce.com"), transport)
            .unwrap()
            .send(&params_with_code("1"), &["13800138000"])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "BaiduCloud error [401]: template not exist");
    }

    #[tokio::test]
    async fn code_is_required() {
        let transport = Arc::new(RecordingTransport::replying(200, "{}"));
        let client = BaiduClient::from_args(&args("smsv3.bj.baidubce.com"), transport.clone()).unwrap();
        assert!(matches!(
            client.send(&TemplateParams::new(), &["13800138000"]).await,
            Err(SmsError::MissingTemplateParam("code"))
        ));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn empty_recipients_are_rejected() {
        let transport = Arc::new(RecordingTransport::replying(200, "{}"));
        let err = BaiduClient::from_args(&args("smsv3.bj.baidubce.com"), transport.clone()).unwrap()
            .send(&params_with_code("1234"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, SmsError::MissingRecipients));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(transport.request_count(), 0);
    }
}
