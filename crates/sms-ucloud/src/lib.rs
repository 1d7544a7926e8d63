//! # UCloud USMS Provider
//!
//! `SendUSMSMessage` as a signed form POST. The signature is the SHA-1 hex of every
//! parameter concatenated as `key + value` in key order, followed by the private key.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use sms_core::{
    crypto, require_code, require_recipients, ConstructionArgs, HttpRequest, HttpTransport,
    ProviderKind, SmsClient, SmsError, TemplateParams,
};
use tracing::{debug, info, warn};

const PROVIDER: ProviderKind = ProviderKind::UCloud;
const API_URL: &str = "https://api.ucloud.cn";

#[derive(Clone)]
pub struct UcloudClient {
    public_key: String,
    private_key: String,
    sig_content: String,
    template_id: String,
    project_id: String,
    url: String,
    transport: Arc<dyn HttpTransport>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiResponse {
    ret_code: i64,
    #[serde(default)]
    message: String,
}

/// SHA-1 parameter signature.
pub fn signature(params: &BTreeMap<String, String>, private_key: &str) -> String {
    let mut payload: String = params.iter().map(|(k, v)| format!("{k}{v}")).collect();
    payload.push_str(private_key);
    crypto::sha1_hex(payload)
}

impl UcloudClient {
    pub fn new(
        public_key: impl Into<String>,
        private_key: impl Into<String>,
        sig_content: impl Into<String>,
        template_id: impl Into<String>,
        project_id: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: private_key.into(),
            sig_content: sig_content.into(),
            template_id: template_id.into(),
            project_id: project_id.into(),
            url: API_URL.to_string(),
            transport,
        }
    }

    /// `access_id` = public key, `access_key` = private key, `extra` = `[projectId]`.
    pub fn from_args(
        args: &ConstructionArgs,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, SmsError> {
        let project_id = args.required_extra(0, "projectId")?;
        Ok(Self::new(
            &args.access_id,
            &args.access_key,
            &args.sign,
            &args.template,
            project_id,
            transport,
        ))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    fn signed_params(&self, code: &str, recipients: &[&str]) -> BTreeMap<String, String> {
        let mut params = BTreeMap::from([
            ("Action".to_string(), "SendUSMSMessage".to_string()),
            ("ProjectId".to_string(), self.project_id.clone()),
            ("PublicKey".to_string(), self.public_key.clone()),
            ("SigContent".to_string(), self.sig_content.clone()),
            ("TemplateId".to_string(), self.template_id.clone()),
            ("TemplateParams.0".to_string(), code.to_string()),
        ]);
        for (i, phone) in recipients.iter().enumerate() {
            params.insert(format!("PhoneNumbers.{i}"), phone.to_string());
        }
        let signature = signature(&params, &self.private_key);
        params.insert("Signature".to_string(), signature);
        params
    }
}

#[async_trait]
impl SmsClient for UcloudClient {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    async fn send(&self, params: &TemplateParams, recipients: &[&str]) -> Result<(), SmsError> {
        let code = require_code(params)?;
        require_recipients(recipients)?;

        let req = HttpRequest::post(&self.url).form(&self.signed_params(code, recipients))?;
        debug!(recipients = recipients.len(), "sending via UCloud");

        let res = self.transport.execute(req).await?;
        let decoded: ApiResponse = res.json()?;
        if decoded.ret_code != 0 {
            warn!(ret_code = decoded.ret_code, "UCloud rejected request");
            return Err(SmsError::vendor_code(
                PROVIDER,
                decoded.ret_code,
                decoded.message,
            ));
        }

        info!(recipients = recipients.len(), "UCloud accepted request");
        Ok(())
    }
}
