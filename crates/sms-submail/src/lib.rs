//! # Submail SMS Provider
//!
//! Uses the `multixsend` endpoint: one multipart request whose `multi` field lists every
//! recipient together with the template variables.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sms_core::{
    require_recipients, ConstructionArgs, HttpRequest, HttpTransport, ProviderKind, SmsClient,
    SmsError, TemplateParams,
};
use tracing::{debug, info, warn};

const PROVIDER: ProviderKind = ProviderKind::Submail;
const MULTIXSEND_URL: &str = "https://api-v4.mysubmail.com/sms/multixsend";

#[derive(Clone)]
pub struct SubmailClient {
    app_id: String,
    signature: String,
    project: String,
    url: String,
    transport: Arc<dyn HttpTransport>,
}

#[derive(Debug, Serialize)]
struct MultiEntry<'a> {
    to: &'a str,
    vars: &'a TemplateParams,
}

#[derive(Debug, Deserialize)]
struct SubmailResult {
    #[serde(default)]
    status: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SubmailResponse {
    Batch(Vec<SubmailResult>),
    Single(SubmailResult),
}

impl SubmailClient {
    pub fn new(
        app_id: impl Into<String>,
        signature: impl Into<String>,
        project: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            signature: signature.into(),
            project: project.into(),
            url: MULTIXSEND_URL.to_string(),
            transport,
        }
    }

    /// `access_id` = appid, `access_key` = app signature, `template` = project id.
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

fn code_text(code: &Option<serde_json::Value>) -> String {
    match code {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "0".to_string(),
    }
}

fn decode_response(body: &str) -> Result<(), SmsError> {
    let response: SubmailResponse = serde_json::from_str(body)
        .map_err(|e| SmsError::Unexpected(format!("Submail response: {}: {}", e, body)))?;
    match response {
        SubmailResponse::Batch(results) => {
            let failures: Vec<String> = results
                .iter()
                .filter(|r| r.status != "success")
                .map(|r| format!("{}, {}, {}", r.status, code_text(&r.code), r.msg))
                .collect();
            if failures.is_empty() {
                Ok(())
            } else {
                Err(SmsError::vendor(PROVIDER, failures.join("|")))
            }
        }
        SubmailResponse::Single(result) if result.status == "error" || !result.msg.is_empty() => {
            Err(SmsError::vendor_code(PROVIDER, code_text(&result.code), result.msg))
        }
        SubmailResponse::Single(_) => Ok(()),
    }
}

#[async_trait]
impl SmsClient for SubmailClient {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    async fn send(&self, params: &TemplateParams, recipients: &[&str]) -> Result<(), SmsError> {
        require_recipients(recipients)?;

        let multi: Vec<MultiEntry<'_>> = recipients
            .iter()
            .copied()
            .map(|to| MultiEntry { to, vars: params })
            .collect();
        let multi = serde_json::to_string(&multi)
            .map_err(|e| SmsError::Http(format!("json encode: {}", e)))?;
        let req = HttpRequest::post(&self.url).multipart(&[
            ("appid", self.app_id.as_str()),
            ("signature", self.signature.as_str()),
            ("project", self.project.as_str()),
            ("multi", multi.as_str()),
        ]);
        debug!(recipients = recipients.len(), "sending via Submail");

        let res = self.transport.execute(req).await?;
        if let Err(e) = decode_response(&res.body) {
            warn!(status = res.status, error = %e, "Submail rejected batch");
            return Err(e);
        }

        info!(recipients = recipients.len(), "Submail accepted batch");
        Ok(())
    }
}
