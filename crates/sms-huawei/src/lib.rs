//! # Huawei Cloud SMS Provider
//!
//! `batchSendSms/v1` with WSSE UsernameToken authentication:
//! `PasswordDigest = base64(sha256(nonce + created + app_secret))`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use sms_core::{
    crypto, require_code, require_recipients, ConstructionArgs, HttpRequest, HttpTransport,
    ProviderKind, SmsClient, SmsError, TemplateParams,
};
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

const PROVIDER: ProviderKind = ProviderKind::HuaweiCloud;
const AUTH_HEADER_VALUE: &str = r#"WSSE realm="SDP",profile="UsernameToken",type="Appkey""#;
const SUCCESS: &str = "000000";

#[derive(Clone)]
pub struct HuaweiClient {
    app_key: String,
    app_secret: String,
    signature: String,
    template_id: String,
    /// Full `.../sms/batchSendSms/v1` URL.
    url: String,
    sender: String,
    transport: Arc<dyn HttpTransport>,
}

#[derive(Debug, Deserialize)]
struct BatchSendResponse {
    code: String,
    #[serde(default)]
    description: String,
}

/// `X-WSSE` header value for the given nonce and creation time.
pub fn wsse_header(app_key: &str, app_secret: &str, nonce: &str, created: &str) -> String {
    let digest = crypto::sha256_base64(format!("{}{}{}", nonce, created, app_secret));
    format!(
        r#"UsernameToken Username="{}",PasswordDigest="{}",Nonce="{}",Created="{}""#,
        app_key, digest, nonce, created
    )
}

impl HuaweiClient {
    pub fn new(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        signature: impl Into<String>,
        template_id: impl Into<String>,
        api_address: &str,
        sender: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            signature: signature.into(),
            template_id: template_id.into(),
            url: format!("{}/sms/batchSendSms/v1", api_address.trim_end_matches('/')),
            sender: sender.into(),
            transport,
        }
    }

    /// `extra` = `[apiAddress, sender]`.
    pub fn from_args(
        args: &ConstructionArgs,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, SmsError> {
        let api_address = args.required_extra(0, "apiAddress")?;
        let sender = args.required_extra(1, "sender")?;
        Ok(Self::new(
            &args.access_id,
            &args.access_key,
            &args.sign,
            &args.template,
            api_address,
            sender,
            transport,
        ))
    }

    fn fresh_wsse_header(&self) -> Result<String, SmsError> {
        let created = OffsetDateTime::now_utc()
            .format(format_description!(
                "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
            ))
            .map_err(|e| SmsError::Http(format!("timestamp format: {}", e)))?;
        let nonce = Uuid::new_v4().simple().to_string();
        Ok(wsse_header(&self.app_key, &self.app_secret, &nonce, &created))
    }
}

#[async_trait]
impl SmsClient for HuaweiClient {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    async fn send(&self, params: &TemplateParams, recipients: &[&str]) -> Result<(), SmsError> {
        let code = require_code(params)?;
        require_recipients(recipients)?;

        let to = recipients.join(",");
        let template_paras = serde_json::to_string(&[code])
            .map_err(|e| SmsError::Http(format!("json encode: {}", e)))?;
        let mut form = vec![
            ("from", self.sender.as_str()),
            ("to", to.as_str()),
            ("templateId", self.template_id.as_str()),
            ("templateParas", template_paras.as_str()),
        ];
        if !self.signature.is_empty() {
            form.push(("signature", self.signature.as_str()));
        }

        let req = HttpRequest::post(&self.url)
            .form(&form)?
            .header("Authorization", AUTH_HEADER_VALUE)
            .header("X-WSSE", self.fresh_wsse_header()?);
        debug!(recipients = recipients.len(), "sending via Huawei Cloud");

        let res = self.transport.execute(req).await?;
        let decoded: BatchSendResponse = res.json()?;
        if decoded.code != SUCCESS {
            warn!(status = res.status, code = %decoded.code, "Huawei Cloud rejected batch");
            return Err(SmsError::vendor_code(
                PROVIDER,
                decoded.code,
                decoded.description,
            ));
        }

        info!(recipients = recipients.len(), "Huawei Cloud accepted batch");
        Ok(())
    }
}
