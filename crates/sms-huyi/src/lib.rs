//! # Huyi (ihuyi.com) SMS Provider
//!
//! One form POST per recipient. The password field is a per-message MD5 over
//! `account + api_key + mobile + content + time`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use sms_core::{
    crypto, render_code_template, require_code, require_recipients, ConstructionArgs,
    HttpRequest, HttpTransport, ProviderKind, SmsClient, SmsError, TemplateParams,
};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

const PROVIDER: ProviderKind = ProviderKind::Huyi;
const SUBMIT_URL: &str = "http://106.ihuyi.com/webservice/sms.php?method=Submit&format=json";
const SUBMITTED: i64 = 2;

#[derive(Clone)]
pub struct HuyiClient {
    account: String,
    api_key: String,
    template: String,
    url: String,
    transport: Arc<dyn HttpTransport>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    code: i64,
    #[serde(default)]
    msg: String,
}

/// Per-message password digest.
pub fn password(account: &str, api_key: &str, mobile: &str, content: &str, time: &str) -> String {
    crypto::md5_hex(format!("{account}{api_key}{mobile}{content}{time}"))
}

impl HuyiClient {
    pub fn new(
        account: impl Into<String>,
        api_key: impl Into<String>,
        template: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            account: account.into(),
            api_key: api_key.into(),
            template: template.into(),
            url: SUBMIT_URL.to_string(),
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
impl SmsClient for HuyiClient {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    async fn send(&self, params: &TemplateParams, recipients: &[&str]) -> Result<(), SmsError> {
        let code = require_code(params)?;
        require_recipients(recipients)?;

        let content = render_code_template(&self.template, code);
        let time = OffsetDateTime::now_utc().unix_timestamp().to_string();
        debug!(recipients = recipients.len(), "sending via Huyi");

        for mobile in recipients.iter().copied() {
            let digest = password(&self.account, &self.api_key, mobile, &content, &time);
            let req = HttpRequest::post(&self.url).form(&[
                ("account", self.account.as_str()),
                ("content", content.as_str()),
                ("time", time.as_str()),
                ("mobile", mobile),
                ("password", digest.as_str()),
            ])?;
            let res = self.transport.execute(req).await?;
            let decoded: SubmitResponse = res.json()?;
            if decoded.code != SUBMITTED {
                warn!(code = decoded.code, "Huyi rejected message");
                return Err(SmsError::vendor_code(PROVIDER, decoded.code, decoded.msg));
            }
        }

        info!(recipients = recipients.len(), "Huyi accepted messages");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sms_core::params_with_code;
    use sms_core::testing::RecordingTransport;

    fn client(transport: Arc<RecordingTransport>) -> HuyiClient {
        let args = ConstructionArgs::new("C123", "apikey", "", "您的验证码是：%s。");
        HuyiClient::from_args(&args, transport).unwrap()
    }

    #[test]
    fn password_digest() {
        assert_eq!(
            password("C123", "apikey", "13800138000", "code 1", "1700000000"),
            crypto::md5_hex("C123apikey13800138000code 11700000000")
        );
    }

    #[tokio::test]
    async fn one_submit_per_recipient() {
        let transport = Arc::new(RecordingTransport::replying(
            200,
            r#"{"code":2,"msg":"提交成功","smsid":"1"}"#,
        ));
        client(transport.clone())
            .send(&params_with_code("2468"), &["13800138000", "13800138001"])
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].url, SUBMIT_URL);
        let body = requests[0].body_text();
        assert!(body.starts_with("account=C123&content="));
        assert!(body.contains("mobile=13800138000"));
        assert!(requests[1].body_text().contains("mobile=13800138001"));
    }

    #[tokio::test]
    async fn rejection_stops_the_loop() {
        let transport = Arc::new(RecordingTransport::replying(
            200,
            r#"{"code":4052,"msg":"访问ip与备案ip不符"}"#,
        ));
        let err = client(transport.clone())
            .send(&params_with_code("1"), &["13800138000", "13800138001"])
            .await
            .unwrap_err();
        assert!(matches!(err, SmsError::Provider { code: Some(ref c), .. } if c == "4052"));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn transport_failure_skips_remaining_recipients() {
        let ok = r#"{"code":2,"msg":"提交成功","smsid":"1"}"#;
        let transport = Arc::new(
            RecordingTransport::replying(200, ok)
                .then_reply(200, ok)
                .then_fail("connection reset by peer"),
        );
        let err = client(transport.clone())
            .send(
                &params_with_code("1"),
                &["13800138000", "13800138001", "13800138002"],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SmsError::Http(ref m) if m == "connection reset by peer"));

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].body_text().contains("mobile=13800138001"));
    }

    #[tokio::test]
    async fn code_is_required() {
        let transport = Arc::new(RecordingTransport::replying(200, "{}"));
        assert!(matches!(
            client(transport.clone())
                .send(&TemplateParams::new(), &["13800138000"])
                .await,
            Err(SmsError::MissingTemplateParam("code"))
        ));
        assert_eq!(transport.request_count(), 0);
    }
}
