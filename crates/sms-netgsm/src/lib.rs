//! # Netgsm SMS Provider
//!
//! Sends through the Netgsm OTP endpoint, one XML request per recipient. The reply is a
//! small XML document whose `main/code` is `0` on success.

use std::sync::Arc;

use async_trait::async_trait;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event;
use quick_xml::Reader;
use sms_core::request::xml;
use sms_core::{
    render_code_template, require_recipients, ConstructionArgs, HttpRequest, HttpTransport,
    ProviderKind, SmsClient, SmsError, TemplateParams, CODE,
};
use tracing::{debug, info, warn};

const PROVIDER: ProviderKind = ProviderKind::Netgsm;
const OTP_URL: &str = "https://api.netgsm.com.tr/sms/send/otp";

#[derive(Clone)]
pub struct NetgsmClient {
    usercode: String,
    password: String,
    msgheader: String,
    template: String,
    url: String,
    transport: Arc<dyn HttpTransport>,
}

/// Fields of interest from a Netgsm reply.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NetgsmReply {
    pub code: String,
    pub job_id: Option<String>,
    pub error: Option<String>,
}

/// Reads `main/code`, `main/jobID` and `main/error` from a reply document.
pub fn parse_reply(document: &str) -> Result<NetgsmReply, SmsError> {
    let mut reader = Reader::from_str(document);
    let mut path: Vec<String> = Vec::new();
    // text of the innermost open element; quick-xml splits it around entity references
    let mut text = String::new();
    let mut reply = NetgsmReply::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                path.push(String::from_utf8_lossy(e.name().as_ref()).to_string());
                text.clear();
            }
            Ok(Event::Text(e)) => {
                let chunk = e
                    .xml_content()
                    .map_err(|e| SmsError::Unexpected(format!("Netgsm reply: {}", e)))?;
                text.push_str(&chunk);
            }
            Ok(Event::GeneralRef(e)) => {
                let resolved = e
                    .resolve_char_ref()
                    .map_err(|e| SmsError::Unexpected(format!("Netgsm reply: {}", e)))?;
                match resolved {
                    Some(c) => text.push(c),
                    None => {
                        let name = e
                            .decode()
                            .map_err(|e| SmsError::Unexpected(format!("Netgsm reply: {}", e)))?;
                        match resolve_predefined_entity(&name) {
                            Some(value) => text.push_str(value),
                            None => {
                                text.push('&');
                                text.push_str(&name);
                                text.push(';');
                            }
                        }
                    }
                }
            }
            Ok(Event::End(_)) => {
                let parent = path.len().checked_sub(2).and_then(|i| path.get(i));
                let value = text.trim();
                if parent.map(String::as_str) == Some("main") && !value.is_empty() {
                    match path.last().map(String::as_str) {
                        Some("code") => reply.code = value.to_string(),
                        Some("jobID") | Some("jobId") => reply.job_id = Some(value.to_string()),
                        Some("error") => reply.error = Some(value.to_string()),
                        _ => {}
                    }
                }
                text.clear();
                path.pop();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(SmsError::Unexpected(format!("Netgsm reply: {}", e))),
        }
    }

    if reply.code.is_empty() {
        return Err(SmsError::Unexpected(format!(
            "Netgsm reply without main/code: {}",
            document
        )));
    }
    Ok(reply)
}

impl NetgsmClient {
    pub fn new(
        usercode: impl Into<String>,
        password: impl Into<String>,
        msgheader: impl Into<String>,
        template: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            usercode: usercode.into(),
            password: password.into(),
            msgheader: msgheader.into(),
            template: template.into(),
            url: OTP_URL.to_string(),
            transport,
        }
    }

    /// `access_id` = usercode, `access_key` = password, `sign` = message header.
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

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    fn document(&self, message: &str, number: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <mainbody>\
             <header>\
             <usercode>{}</usercode>\
             <password>{}</password>\
             <msgheader>{}</msgheader>\
             </header>\
             <body>\
             <msg>{}</msg>\
             <no>{}</no>\
             </body>\
             </mainbody>",
            xml::escape(&self.usercode),
            xml::escape(&self.password),
            xml::escape(&self.msgheader),
            xml::cdata(message),
            xml::escape(number)
        )
    }
}

#[async_trait]
impl SmsClient for NetgsmClient {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    async fn send(&self, params: &TemplateParams, recipients: &[&str]) -> Result<(), SmsError> {
        require_recipients(recipients)?;

        let message = match params.get(CODE) {
            Some(code) => render_code_template(&self.template, code),
            None => self.template.clone(),
        };
        debug!(recipients = recipients.len(), "sending via Netgsm");

        for number in recipients.iter().copied() {
            let req = HttpRequest::post(&self.url).xml(self.document(&message, number));
            let res = self.transport.execute(req).await?;
            let reply = parse_reply(&res.body)?;
            if reply.code != "0" {
                warn!(code = %reply.code, "Netgsm rejected message");
                let message = reply
                    .error
                    .unwrap_or_else(|| format!("Netgsm status {}", reply.code));
                return Err(SmsError::vendor_code(PROVIDER, reply.code, message));
            }
            debug!(job_id = reply.job_id.as_deref().unwrap_or_default(), "Netgsm queued message");
        }

        info!(recipients = recipients.len(), "Netgsm accepted messages");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sms_core::params_with_code;
    use sms_core::testing::RecordingTransport;
    use sms_core::ErrorKind;

    const OK_REPLY: &str =
        r#"<?xml version="1.0"?><xml><main><code>0</code><jobID>2103240819</jobID></main></xml>"#;

    fn client(transport: Arc<RecordingTransport>) -> NetgsmClient {
        let args = ConstructionArgs::new("8503020000", "p<ss", "ACME", "Dogrulama kodunuz: %s");
        NetgsmClient::from_args(&args, transport).unwrap()
    }

    #[test]
    fn reply_parsing() {
        assert_eq!(
            parse_reply(OK_REPLY).unwrap(),
            NetgsmReply {
                code: "0".into(),
                job_id: Some("2103240819".into()),
                error: None,
            }
        );
        let reply = parse_reply(
            "<xml>\n  <main>\n    <code>30</code>\n    <error>Gecersiz kullanici adi</error>\n  </main>\n</xml>",
        )
        .unwrap();
        assert_eq!(reply.code, "30");
        assert_eq!(reply.error.as_deref(), Some("Gecersiz kullanici adi"));
        assert!(parse_reply("not xml at all").is_err());
    }

    #[test]
    fn escaped_error_text_is_kept_whole() {
        let reply = parse_reply(
            "<xml><main><code>30</code><error>a &amp; b &lt;c&gt; &#233;t&#xE9;</error></main></xml>",
        )
        .unwrap();
        assert_eq!(reply.code, "30");
        assert_eq!(reply.error.as_deref(), Some("a & b <c> \u{e9}t\u{e9}"));
    }

    #[tokio::test]
    async fn xml_document_per_recipient() {
        let transport = Arc::new(RecordingTransport::replying(200, OK_REPLY));
        client(transport.clone())
            .send(&params_with_code("3344"), &["905321234567", "905321234568"])
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].url, OTP_URL);
        assert_eq!(requests[0].header_value("Content-Type"), Some("application/xml"));
        let body = requests[0].body_text();
        assert!(body.contains("<usercode>8503020000</usercode>"));
        assert!(body.contains("<password>p&lt;ss</password>"));
        assert!(body.contains("<msgheader>ACME</msgheader>"));
        assert!(body.contains("<msg><![CDATA[Dogrulama kodunuz: 3344]]></msg>"));
        assert!(body.contains("<no>905321234567</no>"));
        assert!(requests[1].body_text().contains("<no>905321234568</no>"));
    }

    #[tokio::test]
    async fn template_sent_verbatim_without_code() {
        let transport = Arc::new(RecordingTransport::replying(200, OK_REPLY));
        client(transport.clone())
            .send(&TemplateParams::new(), &["905321234567"])
            .await
            .unwrap();
        assert!(transport
            .single_request()
            .body_text()
            .contains("<![CDATA[Dogrulama kodunuz: %s]]>"));
    }

    #[tokio::test]
    async fn non_zero_code() {
        let transport = Arc::new(RecordingTransport::replying(
            200,
            "<xml><main><code>40</code><error>Mesaj basligi tanimli degil</error></main></xml>",
        ));
        let err = client(transport.clone())
            .send(&params_with_code("1"), &["905321234567", "905321234568"])
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Netgsm error [40]: Mesaj basligi tanimli degil"
        );
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn empty_recipients_are_rejected() {
        let transport = Arc::new(RecordingTransport::replying(200, "{}"));
        let err = client(transport.clone())
            .send(&params_with_code("1234"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, SmsError::MissingRecipients));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(transport.request_count(), 0);
    }
}
