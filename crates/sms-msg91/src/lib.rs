//! # Msg91 SMS Provider
//!
//! Triggers a Msg91 flow once per recipient. Template parameters are merged into the top
//! level of the flow body, which is where Msg91 looks for flow variables.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use sms_core::{
    require_recipients, ConstructionArgs, HttpRequest, HttpTransport, ProviderKind, SmsClient,
    SmsError, TemplateParams,
};
use tracing::{debug, info, warn};

const PROVIDER: ProviderKind = ProviderKind::Msg91;
const FLOW_URL: &str = "https://control.msg91.com/api/v5/flow/";

#[derive(Clone)]
pub struct Msg91Client {
    sender_id: String,
    auth_key: String,
    template_id: String,
    url: String,
    transport: Arc<dyn HttpTransport>,
}

impl Msg91Client {
    pub fn new(
        sender_id: impl Into<String>,
        auth_key: impl Into<String>,
        template_id: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            auth_key: auth_key.into(),
            template_id: template_id.into(),
            url: FLOW_URL.to_string(),
            transport,
        }
    }

    /// `access_id` = sender id, `access_key` = authkey, `template` = flow template id.
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

    fn flow_body(&self, mobile: &str, params: &TemplateParams) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("template_id".into(), Value::from(self.template_id.as_str()));
        body.insert("sender".into(), Value::from(self.sender_id.as_str()));
        body.insert("short_url".into(), Value::from("0"));
        body.insert("mobiles".into(), Value::from(mobile));
        for (name, value) in params {
            body.insert(name.clone(), Value::from(value.as_str()));
        }
        body
    }
}

#[derive(Debug, Deserialize)]
struct FlowResponse {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
}

#[async_trait]
impl SmsClient for Msg91Client {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    async fn send(&self, params: &TemplateParams, recipients: &[&str]) -> Result<(), SmsError> {
        require_recipients(recipients)?;
        debug!(recipients = recipients.len(), "sending via Msg91");

        for mobile in recipients.iter().copied() {
            let mobile = mobile.strip_prefix('+').unwrap_or(mobile);
            let req = HttpRequest::post(&self.url)
                .header("accept", "application/json")
                .header("authkey", &self.auth_key)
                .json(&self.flow_body(mobile, params))?;
            let res = self.transport.execute(req).await?;

            let decoded: Option<FlowResponse> = serde_json::from_str(&res.body).ok();
            let rejected = decoded
                .as_ref()
                .is_some_and(|r| r.kind.as_deref() == Some("error"));
            if rejected || !res.is_success() {
                warn!(status = res.status, "Msg91 rejected flow");
                let message = decoded
                    .and_then(|r| r.message)
                    .unwrap_or_else(|| format!("HTTP {}: {}", res.status, res.body));
                return Err(if res.status == 401 {
                    SmsError::Auth(message)
                } else {
                    SmsError::vendor(PROVIDER, message)
                });
            }
        }

        info!(recipients = recipients.len(), "Msg91 accepted flows");
        Ok(())
    }
}
