//! # Volcengine SMS Provider
//!
//! `SendSms` (version 2020-01-01) signed with Volcengine's HMAC-SHA256 request signature
//! (region `cn-north-1`, service `volcSMS`).

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

const PROVIDER: ProviderKind = ProviderKind::VolcEngine;
const HOST: &str = "sms.volcengineapi.com";
const QUERY: &str = "Action=SendSms&Version=2020-01-01";
const REGION: &str = "cn-north-1";
const SERVICE: &str = "volcSMS";
const ALGORITHM: &str = "HMAC-SHA256";
const CONTENT_TYPE: &str = "application/json";
const SIGNED_HEADERS: &str = "content-type;host;x-content-sha256;x-date";

#[derive(Clone)]
pub struct VolcClient {
    access_key_id: String,
    secret_access_key: String,
    sign: String,
    template_id: String,
    sms_account: String,
    base_url: String,
    transport: Arc<dyn HttpTransport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SmsRequest<'a> {
    sms_account: &'a str,
    sign: &'a str,
    #[serde(rename = "TemplateID")]
    template_id: &'a str,
    template_param: String,
    phone_numbers: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SmsResponse {
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResponseMetadata {
    request_id: Option<String>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiError {
    code: String,
    message: String,
}

/// Signing inputs for one request.
#[derive(Debug, Clone, Copy)]
pub struct SigningContext<'a> {
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    /// `YYYYMMDDThhmmssZ`, also sent as `X-Date`.
    pub x_date: &'a str,
    /// Hex SHA-256 of the body, also sent as `X-Content-Sha256`.
    pub payload_hash: &'a str,
}

/// `Authorization` header for `POST /?Action=SendSms&Version=2020-01-01`.
pub fn authorization(ctx: SigningContext<'_>) -> Result<String, SmsError> {
    let short_date = ctx.x_date.get(..8).ok_or_else(|| {
        SmsError::Invalid(format!("malformed X-Date: {}", ctx.x_date))
    })?;
    let canonical_request = format!(
        "POST\n/\n{}\ncontent-type:{}\nhost:{}\nx-content-sha256:{}\nx-date:{}\n\n{}\n{}",
        QUERY, CONTENT_TYPE, HOST, ctx.payload_hash, ctx.x_date, SIGNED_HEADERS, ctx.payload_hash
    );
    let scope = format!("{}/{}/{}/request", short_date, REGION, SERVICE);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        ctx.x_date,
        scope,
        crypto::sha256_hex(canonical_request)
    );

    let k_date = crypto::hmac_sha256(ctx.secret_access_key.as_bytes(), short_date.as_bytes())?;
    let k_region = crypto::hmac_sha256(&k_date, REGION.as_bytes())?;
    let k_service = crypto::hmac_sha256(&k_region, SERVICE.as_bytes())?;
    let k_signing = crypto::hmac_sha256(&k_service, b"request")?;
    let signature = crypto::hmac_sha256_hex(&k_signing, string_to_sign.as_bytes())?;

    Ok(format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, ctx.access_key_id, scope, SIGNED_HEADERS, signature
    ))
}

impl VolcClient {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        sign: impl Into<String>,
        template_id: impl Into<String>,
        sms_account: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            sign: sign.into(),
            template_id: template_id.into(),
            sms_account: sms_account.into(),
            base_url: format!("https://{}", HOST),
            transport,
        }
    }

    /// `extra` = `[smsAccount]`.
    pub fn from_args(
        args: &ConstructionArgs,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, SmsError> {
        let sms_account = args.required_extra(0, "smsAccount")?;
        Ok(Self::new(
            &args.access_id,
            &args.access_key,
            &args.sign,
            &args.template,
            sms_account,
            transport,
        ))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SmsClient for VolcClient {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    async fn send(&self, params: &TemplateParams, recipients: &[&str]) -> Result<(), SmsError> {
        require_recipients(recipients)?;

        let template_param = serde_json::to_string(params)
            .map_err(|e| SmsError::Http(format!("json encode: {}", e)))?;
        let body = SmsRequest {
            sms_account: &self.sms_account,
            sign: &self.sign,
            template_id: &self.template_id,
            template_param,
            phone_numbers: recipients.join(","),
        };
        let req = HttpRequest::post(format!("{}/?{}", self.base_url.trim_end_matches('/'), QUERY))
            .json(&body)?;

        let x_date = OffsetDateTime::now_utc()
            .format(format_description!(
                "[year][month][day]T[hour][minute][second]Z"
            ))
            .map_err(|e| SmsError::Http(format!("timestamp format: {}", e)))?;
        let payload_hash = crypto::sha256_hex(&req.body);
        let auth = authorization(SigningContext {
            access_key_id: &self.access_key_id,
            secret_access_key: &self.secret_access_key,
            x_date: &x_date,
            payload_hash: &payload_hash,
        })?;
        let req = req
            .header("X-Date", x_date)
            .header("X-Content-Sha256", payload_hash)
            .header("Authorization", auth);
        debug!(recipients = recipients.len(), "sending via Volcengine");

        let res = self.transport.execute(req).await?;
        let decoded: Option<SmsResponse> = serde_json::from_str(&res.body).ok();
        let error = decoded.and_then(|r| {
            let metadata = r.response_metadata;
            metadata.error.map(|e| (e, metadata.request_id))
        });
        if let Some((error, request_id)) = error {
            warn!(
                status = res.status,
                code = %error.code,
                request_id = request_id.as_deref().unwrap_or_default(),
                "Volcengine rejected request"
            );
            return Err(SmsError::vendor_code(PROVIDER, error.code, error.message));
        }
        if !res.is_success() {
            warn!(status = res.status, "Volcengine rejected request");
            return Err(SmsError::vendor_code(
                PROVIDER,
                res.status,
                format!("send message failed, statusCode: {}", res.status),
            ));
        }

        info!(recipients = recipients.len(), "Volcengine accepted request");
        Ok(())
    }
}
