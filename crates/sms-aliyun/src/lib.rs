//! # Aliyun (Alibaba Cloud) SMS Provider
//!
//! Calls the Dysms `SendSms` RPC action with signature version 1.0: every parameter is
//! sorted, RFC 3986 encoded, and signed with HMAC-SHA1 keyed by `secret + "&"`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use sms_core::{
    crypto, require_recipients, ConstructionArgs, HttpRequest, HttpTransport, ProviderKind,
    SmsClient, SmsError, TemplateParams,
};
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

const PROVIDER: ProviderKind = ProviderKind::Aliyun;
const ENDPOINT: &str = "https://dysmsapi.aliyuncs.com";
const REGION: &str = "cn-hangzhou";
const API_VERSION: &str = "2017-05-25";

#[derive(Clone)]
pub struct AliyunClient {
    access_key_id: String,
    access_key_secret: String,
    sign_name: String,
    template_code: String,
    endpoint: String,
    transport: Arc<dyn HttpTransport>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendSmsResponse {
    code: String,
    #[serde(default)]
    message: String,
    request_id: Option<String>,
}

/// Sorted, encoded `k=v&...` string shared by the string-to-sign and the final URL.
pub fn canonical_query(params: &BTreeMap<&str, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", crypto::percent_encode(k), crypto::percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Base64 HMAC-SHA1 signature over `GET&%2F&{encoded canonical query}`.
pub fn signature(canonical: &str, access_key_secret: &str) -> Result<String, SmsError> {
    let string_to_sign = format!(
        "GET&{}&{}",
        crypto::percent_encode("/"),
        crypto::percent_encode(canonical)
    );
    crypto::hmac_sha1_base64(
        format!("{}&", access_key_secret).as_bytes(),
        string_to_sign.as_bytes(),
    )
}

fn timestamp() -> Result<String, SmsError> {
    OffsetDateTime::now_utc()
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
        ))
        .map_err(|e| SmsError::Http(format!("timestamp format: {}", e)))
}

impl AliyunClient {
    pub fn new(
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
        sign_name: impl Into<String>,
        template_code: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
            sign_name: sign_name.into(),
            template_code: template_code.into(),
            endpoint: ENDPOINT.to_string(),
            transport,
        }
    }

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

    pub fn with_base_url(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn signed_url(
        &self,
        params: &TemplateParams,
        recipients: &[&str],
        timestamp: String,
        nonce: String,
    ) -> Result<String, SmsError> {
        let template_param = serde_json::to_string(params)
            .map_err(|e| SmsError::Http(format!("json encode: {}", e)))?;
        let query: BTreeMap<&str, String> = BTreeMap::from([
            ("AccessKeyId", self.access_key_id.clone()),
            ("Action", "SendSms".to_string()),
            ("Format", "JSON".to_string()),
            ("PhoneNumbers", recipients.join(",")),
            ("RegionId", REGION.to_string()),
            ("SignName", self.sign_name.clone()),
            ("SignatureMethod", "HMAC-SHA1".to_string()),
            ("SignatureNonce", nonce),
            ("SignatureVersion", "1.0".to_string()),
            ("TemplateCode", self.template_code.clone()),
            ("TemplateParam", template_param),
            ("Timestamp", timestamp),
            ("Version", API_VERSION.to_string()),
        ]);
        let canonical = canonical_query(&query);
        let signature = signature(&canonical, &self.access_key_secret)?;
        Ok(format!(
            "{}/?Signature={}&{}",
            self.endpoint.trim_end_matches('/'),
            crypto::percent_encode(&signature),
            canonical
        ))
    }
}

#[async_trait]
impl SmsClient for AliyunClient {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    async fn send(&self, params: &TemplateParams, recipients: &[&str]) -> Result<(), SmsError> {
        require_recipients(recipients)?;

        let url = self.signed_url(
            params,
            recipients,
            timestamp()?,
            Uuid::new_v4().to_string(),
        )?;
        debug!(recipients = recipients.len(), "sending via Aliyun");

        let res = self.transport.execute(HttpRequest::get(url)).await?;
        let decoded: SendSmsResponse = res.json()?;
        if decoded.code != "OK" {
            warn!(
                code = %decoded.code,
                request_id = decoded.request_id.as_deref().unwrap_or_default(),
                "Aliyun rejected request"
            );
            return Err(SmsError::vendor_code(PROVIDER, decoded.code, decoded.message));
        }

        info!(recipients = recipients.len(), "Aliyun accepted request");
        Ok(())
    }
}
