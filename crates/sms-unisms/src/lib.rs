//! # UniSMS Provider
//!
//! `sms.message.send` on the Uni API. When a secret is configured every call carries an
//! HMAC-SHA256 signature over its sorted query string; without a secret the access key id
//! alone is sent (simple mode).
//!
//! [`UniSmsClient::from_args`] probes the credentials once with the free verification
//! template, so an unknown access key id is reported at construction time.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sms_core::{
    crypto, require_recipients, ConstructionArgs, HttpRequest, HttpTransport, ProviderKind,
    SmsClient, SmsError, TemplateParams,
};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

const PROVIDER: ProviderKind = ProviderKind::UniSms;
const ENDPOINT: &str = "https://uni.apistd.com/";
const ACTION: &str = "sms.message.send";
const ALGORITHM: &str = "hmac-sha256";
const PROBE_TEMPLATE: &str = "pub_verif_register";
const INVALID_ACCESS_KEY_ID: &str = "104111";

#[derive(Clone)]
pub struct UniSmsClient {
    access_key_id: String,
    access_key_secret: String,
    signature: String,
    template_id: String,
    endpoint: String,
    transport: Arc<dyn HttpTransport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessage<'a> {
    to: &'a [&'a str],
    #[serde(skip_serializing_if = "is_blank")]
    signature: &'a str,
    template_id: &'a str,
    #[serde(skip_serializing_if = "has_no_params")]
    template_data: &'a TemplateParams,
}

fn is_blank(value: &&str) -> bool {
    value.is_empty()
}

fn has_no_params(params: &&TemplateParams) -> bool {
    params.is_empty()
}

#[derive(Debug, Deserialize)]
struct UniResponse {
    code: serde_json::Value,
    #[serde(default)]
    message: String,
}

impl UniResponse {
    fn code(&self) -> String {
        match &self.code {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Query parameters for one call, signed when `secret` is non-empty.
pub fn signed_query(
    access_key_id: &str,
    secret: &str,
    timestamp_ms: i64,
    nonce: &str,
) -> Result<BTreeMap<&'static str, String>, SmsError> {
    let mut query = BTreeMap::from([
        ("accessKeyId", access_key_id.to_string()),
        ("action", ACTION.to_string()),
    ]);
    if secret.is_empty() {
        return Ok(query);
    }
    query.insert("algorithm", ALGORITHM.to_string());
    query.insert("timestamp", timestamp_ms.to_string());
    query.insert("nonce", nonce.to_string());
    let string_to_sign = query
        .iter()
        .map(|(k, v)| format!("{}={}", k, crypto::percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let signature = crypto::hmac_sha256_hex(secret.as_bytes(), string_to_sign.as_bytes())?;
    query.insert("signature", signature);
    Ok(query)
}

fn nonce() -> Result<String, SmsError> {
    let mut bytes = [0u8; 8];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| SmsError::Http(format!("UniSMS nonce generation failed: {}", e)))?;
    Ok(hex::encode(bytes))
}

impl UniSmsClient {
    /// Builds a client without the credential probe.
    pub fn new(
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
        signature: impl Into<String>,
        template_id: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
            signature: signature.into(),
            template_id: template_id.into(),
            endpoint: ENDPOINT.to_string(),
            transport,
        }
    }

    pub fn with_base_url(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Builds the client and probes the access key id.
    ///
    /// Only a vendor `104111 InvalidAccessKeyId` fails construction; any other probe
    /// outcome is logged and ignored.
    pub async fn from_args(
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
        client.probe().await?;
        Ok(client)
    }

    async fn probe(&self) -> Result<(), SmsError> {
        let probe = SendMessage {
            to: &["test"],
            signature: "",
            template_id: PROBE_TEMPLATE,
            template_data: &TemplateParams::new(),
        };
        match self.call(&probe).await {
            Ok(()) => Ok(()),
            Err(SmsError::Provider {
                code: Some(code),
                message,
                ..
            }) if code == INVALID_ACCESS_KEY_ID => Err(SmsError::Construction(format!(
                "UniSMS [{}] {}",
                code, message
            ))),
            Err(e) => {
                warn!(error = %e, "UniSMS credential probe inconclusive");
                Ok(())
            }
        }
    }

    async fn call(&self, message: &SendMessage<'_>) -> Result<(), SmsError> {
        let timestamp_ms = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
        let query = signed_query(
            &self.access_key_id,
            &self.access_key_secret,
            timestamp_ms,
            &nonce()?,
        )?;
        let req = HttpRequest::post(&self.endpoint).query(query)?.json(message)?;

        let res = self.transport.execute(req).await?;
        let decoded: UniResponse = res.json()?;
        let code = decoded.code();
        if code != "0" {
            return Err(SmsError::vendor_code(PROVIDER, code, decoded.message));
        }
        Ok(())
    }
}

#[async_trait]
impl SmsClient for UniSmsClient {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    async fn send(&self, params: &TemplateParams, recipients: &[&str]) -> Result<(), SmsError> {
        require_recipients(recipients)?;

        let message = SendMessage {
            to: recipients,
            signature: &self.signature,
            template_id: &self.template_id,
            template_data: params,
        };
        debug!(recipients = recipients.len(), "sending via UniSMS");
        if let Err(e) = self.call(&message).await {
            warn!(error = %e, "UniSMS rejected message");
            return Err(e);
        }

        info!(recipients = recipients.len(), "UniSMS accepted message");
        Ok(())
    }
}
