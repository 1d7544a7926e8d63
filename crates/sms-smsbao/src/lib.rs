//! # SmsBao SMS Provider
//!
//! Mainland-China only. Numbers are normalized before anything is sent: `+86` is stripped
//! and any other country code rejects the whole call.

use std::sync::Arc;

use async_trait::async_trait;
use sms_core::{
    render_code_template, require_code, require_recipients, ConstructionArgs, HttpRequest,
    HttpTransport, ProviderKind, SmsClient, SmsError, TemplateParams,
};
use tracing::{debug, info, warn};

const PROVIDER: ProviderKind = ProviderKind::SmsBao;
const SEND_URL: &str = "https://api.smsbao.com/sms";

#[derive(Clone)]
pub struct SmsBaoClient {
    username: String,
    api_key: String,
    sign: String,
    template: String,
    goods_id: String,
    url: String,
    transport: Arc<dyn HttpTransport>,
}

/// Strips `+86`; any other `+` prefix is an unsupported country code.
pub fn normalize_number(mobile: &str) -> Result<&str, SmsError> {
    if let Some(local) = mobile.strip_prefix("+86") {
        Ok(local)
    } else if mobile.starts_with('+') {
        Err(SmsError::Invalid(format!(
            "unsupported country code: {}",
            mobile
        )))
    } else {
        Ok(mobile)
    }
}

/// Description of a non-zero status body.
fn status_description(status: &str) -> Option<&'static str> {
    Some(match status {
        "30" => "password error",
        "40" => "account not exist",
        "41" => "overdue account",
        "43" => "IP address limit",
        "50" => "content contain forbidden words",
        "51" => "phone number incorrect",
        _ => return None,
    })
}

impl SmsBaoClient {
    pub fn new(
        username: impl Into<String>,
        api_key: impl Into<String>,
        sign: impl Into<String>,
        template: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            username: username.into(),
            api_key: api_key.into(),
            sign: sign.into(),
            template: template.into(),
            goods_id: String::new(),
            url: SEND_URL.to_string(),
            transport,
        }
    }

    pub fn with_goods_id(mut self, goods_id: impl Into<String>) -> Self {
        self.goods_id = goods_id.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// `access_id` = username, `access_key` = API key, optional `extra` = `[goodsId]`.
    pub fn from_args(
        args: &ConstructionArgs,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, SmsError> {
        let client = Self::new(
            &args.access_id,
            &args.access_key,
            &args.sign,
            &args.template,
            transport,
        );
        Ok(match args.optional_extra(0) {
            Some(goods_id) => client.with_goods_id(goods_id),
            None => client,
        })
    }

    fn content(&self, code: &str) -> String {
        format!("【{}】{}", self.sign, render_code_template(&self.template, code))
    }
}

#[async_trait]
impl SmsClient for SmsBaoClient {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    async fn send(&self, params: &TemplateParams, recipients: &[&str]) -> Result<(), SmsError> {
        let code = require_code(params)?;
        require_recipients(recipients)?;
        let mobiles = recipients
            .iter()
            .copied()
            .map(normalize_number)
            .collect::<Result<Vec<_>, _>>()?;

        let content = self.content(code);
        debug!(recipients = mobiles.len(), "sending via SmsBao");

        for mobile in mobiles {
            let req = HttpRequest::get(&self.url).query([
                ("u", self.username.as_str()),
                ("p", self.api_key.as_str()),
                ("g", self.goods_id.as_str()),
                ("m", mobile),
                ("c", content.as_str()),
            ])?;
            let res = self.transport.execute(req).await?;
            let status = res.body.trim();
            if status != "0" {
                warn!(status, "SmsBao rejected message");
                let message = status_description(status)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("unknown status code (HTTP {})", res.status));
                return Err(SmsError::vendor_code(PROVIDER, status, message));
            }
        }

        info!(recipients = recipients.len(), "SmsBao accepted messages");
        Ok(())
    }
}
