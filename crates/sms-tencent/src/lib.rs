//! # Tencent Cloud SMS Provider
//!
//! `SendSms` (API version 2021-01-11) signed with TC3-HMAC-SHA256.
//!
//! Template parameters are positional: the params named `"0"`, `"1"`, ... are collected in
//! order until the first missing or empty one.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sms_core::{
    crypto, require_recipients, ConstructionArgs, HttpRequest, HttpTransport, ProviderKind,
    SmsClient, SmsError, TemplateParams,
};
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

const PROVIDER: ProviderKind = ProviderKind::TencentCloud;
const HOST: &str = "sms.tencentcloudapi.com";
const SERVICE: &str = "sms";
const REGION: &str = "ap-guangzhou";
const ACTION: &str = "SendSms";
const VERSION: &str = "2021-01-11";
const ALGORITHM: &str = "TC3-HMAC-SHA256";
const CONTENT_TYPE: &str = "application/json; charset=utf-8";
const SIGNED_HEADERS: &str = "content-type;host";

#[derive(Clone)]
pub struct TencentClient {
    secret_id: String,
    secret_key: String,
    app_id: String,
    sign_name: String,
    template_id: String,
    base_url: String,
    transport: Arc<dyn HttpTransport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendSmsRequest<'a> {
    phone_number_set: &'a [&'a str],
    sms_sdk_app_id: &'a str,
    sign_name: &'a str,
    template_id: &'a str,
    template_param_set: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Envelope {
    response: SendSmsResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendSmsResponse {
    error: Option<ApiError>,
    #[serde(default)]
    send_status_set: Vec<SendStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiError {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendStatus {
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    phone_number: String,
}

/// Positional template values: `params["0"]`, `params["1"]`, ... up to the first gap.
pub fn positional_params(params: &TemplateParams) -> Vec<&str> {
    (0..)
        .map_while(|i| {
            params
                .get(&i.to_string())
                .map(String::as_str)
                .filter(|v| !v.is_empty())
        })
        .collect()
}

/// `Authorization` header value for a JSON `POST /` with the given payload.
pub fn authorization(
    secret_id: &str,
    secret_key: &str,
    payload: &[u8],
    timestamp: i64,
) -> Result<String, SmsError> {
    let date = OffsetDateTime::from_unix_timestamp(timestamp)
        .map_err(|e| SmsError::Http(format!("timestamp: {}", e)))?
        .format(format_description!("[year]-[month]-[day]"))
        .map_err(|e| SmsError::Http(format!("timestamp format: {}", e)))?;

    let canonical_request = format!(
        "POST\n/\n\ncontent-type:{}\nhost:{}\n\n{}\n{}",
        CONTENT_TYPE,
        HOST,
        SIGNED_HEADERS,
        crypto::sha256_hex(payload)
    );
    let scope = format!("{}/{}/tc3_request", date, SERVICE);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        timestamp,
        scope,
        crypto::sha256_hex(canonical_request)
    );

    let secret_date = crypto::hmac_sha256(format!("TC3{}", secret_key).as_bytes(), date.as_bytes())?;
    let secret_service = crypto::hmac_sha256(&secret_date, SERVICE.as_bytes())?;
    let secret_signing = crypto::hmac_sha256(&secret_service, b"tc3_request")?;
    let signature = crypto::hmac_sha256_hex(&secret_signing, string_to_sign.as_bytes())?;

    Ok(format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, secret_id, scope, SIGNED_HEADERS, signature
    ))
}

impl TencentClient {
    pub fn new(
        secret_id: impl Into<String>,
        secret_key: impl Into<String>,
        app_id: impl Into<String>,
        sign_name: impl Into<String>,
        template_id: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            secret_id: secret_id.into(),
            secret_key: secret_key.into(),
            app_id: app_id.into(),
            sign_name: sign_name.into(),
            template_id: template_id.into(),
            base_url: format!("https://{}", HOST),
            transport,
        }
    }

    /// `extra` = `[SmsSdkAppId]`.
    pub fn from_args(
        args: &ConstructionArgs,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, SmsError> {
        let app_id = args.required_extra(0, "appId")?;
        Ok(Self::new(
            &args.access_id,
            &args.access_key,
            app_id,
            &args.sign,
            &args.template,
            transport,
        ))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

fn decode_response(body: &str) -> Result<(), SmsError> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| SmsError::Unexpected(format!("Tencent response: {}: {}", e, body)))?;
    let response = envelope.response;
    if let Some(error) = response.error {
        if error.code.starts_with("AuthFailure") {
            return Err(SmsError::Auth(format!("{}: {}", error.code, error.message)));
        }
        return Err(SmsError::vendor_code(PROVIDER, error.code, error.message));
    }
    match response.send_status_set.iter().find(|s| s.code != "Ok") {
        Some(status) => Err(SmsError::vendor_code(
            PROVIDER,
            &status.code,
            format!("{}: {}", status.phone_number, status.message),
        )),
        None => Ok(()),
    }
}

#[async_trait]
impl SmsClient for TencentClient {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    async fn send(&self, params: &TemplateParams, recipients: &[&str]) -> Result<(), SmsError> {
        require_recipients(recipients)?;

        let body = SendSmsRequest {
            phone_number_set: recipients,
            sms_sdk_app_id: &self.app_id,
            sign_name: &self.sign_name,
            template_id: &self.template_id,
            template_param_set: positional_params(params),
        };
        let timestamp = OffsetDateTime::now_utc().unix_timestamp();
        let req = HttpRequest::post(&self.base_url).json(&body)?;
        let auth = authorization(&self.secret_id, &self.secret_key, &req.body, timestamp)?;
        let req = req
            .header("Content-Type", CONTENT_TYPE)
            .header("Authorization", auth)
            .header("X-TC-Action", ACTION)
            .header("X-TC-Version", VERSION)
            .header("X-TC-Region", REGION)
            .header("X-TC-Timestamp", timestamp.to_string());
        debug!(recipients = recipients.len(), "sending via Tencent Cloud");

        let res = self.transport.execute(req).await?;
        if let Err(e) = decode_response(&res.body) {
            warn!(status = res.status, error = %e, "Tencent Cloud rejected request");
            return Err(e);
        }

        info!(recipients = recipients.len(), "Tencent Cloud accepted request");
        Ok(())
    }
}
