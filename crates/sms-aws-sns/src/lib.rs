//! # AWS SNS SMS Provider
//!
//! Amazon SNS SMS provider implementation for smsgate.
//!
//! ## Features
//!
//! - Direct-to-phone `Publish`, one call per recipient
//! - Template variables forwarded as SNS message attributes
//! - Static or default-chain AWS credentials
//! - SDK errors mapped onto [`SmsError`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use sms_core::{params_with_code, SmsClient};
//! use sms_aws_sns::AwsSnsClient;
//!
//! let client = AwsSnsClient::new("us-east-1", "access_key", "secret_key", "Your code is %s");
//! client.send(&params_with_code("482913"), &["+14155550100"]).await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sns::error::SdkError;
use aws_sdk_sns::operation::publish::PublishError;
use aws_sdk_sns::types::MessageAttributeValue;
use aws_sdk_sns::{config::Credentials, Client as SnsClient, Config as SnsConfig};
use sms_core::{
    render_code_template, require_code, require_recipients, ConstructionArgs, ProviderKind,
    SmsClient, SmsError, TemplateParams,
};
use tracing::{debug, error, info};

const PROVIDER: ProviderKind = ProviderKind::AmazonSns;
const SMS_TYPE_ATTRIBUTE: &str = "AWS.SNS.SMS.SMSType";

/// The slice of the SNS API the adapter needs.
///
/// Implemented for the SDK client; tests substitute a fake.
#[async_trait]
pub trait SnsPublisher: Send + Sync {
    async fn publish_sms(
        &self,
        phone_number: &str,
        message: &str,
        attributes: HashMap<String, MessageAttributeValue>,
    ) -> Result<Option<String>, SmsError>;
}

#[async_trait]
impl SnsPublisher for SnsClient {
    async fn publish_sms(
        &self,
        phone_number: &str,
        message: &str,
        attributes: HashMap<String, MessageAttributeValue>,
    ) -> Result<Option<String>, SmsError> {
        let output = self
            .publish()
            .phone_number(phone_number)
            .message(message)
            .set_message_attributes(Some(attributes))
            .send()
            .await
            .map_err(|e| {
                error!("AWS SNS publish failed: {}", e);
                if matches!(e, SdkError::DispatchFailure(_) | SdkError::TimeoutError(_)) {
                    return SmsError::Http(e.to_string());
                }
                match e.into_service_error() {
                    PublishError::AuthorizationErrorException(_) => {
                        SmsError::Auth("AWS authorization failed".to_string())
                    }
                    PublishError::InvalidParameterException(e) => {
                        SmsError::Invalid(e.message().unwrap_or("Invalid parameter").to_string())
                    }
                    PublishError::InvalidParameterValueException(e) => SmsError::Invalid(
                        e.message().unwrap_or("Invalid parameter value").to_string(),
                    ),
                    e => SmsError::vendor(PROVIDER, format!("AWS SNS error: {}", e)),
                }
            })?;
        Ok(output.message_id().map(str::to_string))
    }
}

/// AWS SNS SMS client
#[derive(Clone)]
pub struct AwsSnsClient {
    publisher: Arc<dyn SnsPublisher>,
    region: String,
    template: String,
}

impl AwsSnsClient {
    /// Create a new AWS SNS client with static credentials
    pub fn new(
        region: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        let region_str = region.into();

        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None, // session_token
            None, // expiration
            "smsgate",
        );

        let config = SnsConfig::builder()
            .region(Region::new(region_str.clone()))
            .credentials_provider(credentials)
            .behavior_version(BehaviorVersion::latest())
            .build();

        Self::with_publisher(Arc::new(SnsClient::from_conf(config)), region_str, template)
    }

    /// Create a client using the default AWS credential chain
    pub async fn with_default_credentials(
        region: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        let region_str = region.into();
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region_str.clone()))
            .load()
            .await;

        Self::with_publisher(Arc::new(SnsClient::new(&config)), region_str, template)
    }

    pub fn with_publisher(
        publisher: Arc<dyn SnsPublisher>,
        region: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            region: region.into(),
            template: template.into(),
        }
    }

    /// `extra[0]` is the AWS region.
    pub fn from_args(args: &ConstructionArgs) -> Result<Self, SmsError> {
        let region = args.required_extra(0, "region")?;
        Ok(Self::new(
            region,
            &args.access_id,
            &args.access_key,
            &args.template,
        ))
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

fn string_attribute(value: &str) -> Result<MessageAttributeValue, SmsError> {
    MessageAttributeValue::builder()
        .data_type("String")
        .string_value(value)
        .build()
        .map_err(|e| SmsError::Http(format!("Failed to build message attribute: {}", e)))
}

fn message_attributes(
    params: &TemplateParams,
) -> Result<HashMap<String, MessageAttributeValue>, SmsError> {
    let mut attributes = HashMap::new();
    for (name, value) in params {
        attributes.insert(name.clone(), string_attribute(value)?);
    }
    // Transactional gets higher delivery priority than promotional
    attributes.insert(
        SMS_TYPE_ATTRIBUTE.to_string(),
        string_attribute("Transactional")?,
    );
    Ok(attributes)
}

#[async_trait]
impl SmsClient for AwsSnsClient {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    async fn send(&self, params: &TemplateParams, recipients: &[&str]) -> Result<(), SmsError> {
        let code = require_code(params)?;
        require_recipients(recipients)?;

        let message = render_code_template(&self.template, code);
        let attributes = message_attributes(params)?;
        debug!(
            region = %self.region,
            recipients = recipients.len(),
            "Sending SMS via AWS SNS"
        );

        for phone_number in recipients {
            let message_id = self
                .publisher
                .publish_sms(phone_number, &message, attributes.clone())
                .await?;
            info!(
                "SMS sent successfully via AWS SNS with MessageId: {}",
                message_id.unwrap_or_default()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sms_core::params_with_code;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakePublisher {
        calls: Mutex<Vec<(String, String, Vec<String>)>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl SnsPublisher for FakePublisher {
        async fn publish_sms(
            &self,
            phone_number: &str,
            message: &str,
            attributes: HashMap<String, MessageAttributeValue>,
        ) -> Result<Option<String>, SmsError> {
            let mut names: Vec<String> = attributes.into_keys().collect();
            names.sort();
            self.calls.lock().unwrap().push((
                phone_number.to_string(),
                message.to_string(),
                names,
            ));
            if self.fail_on == Some(phone_number) {
                return Err(SmsError::Http("connection reset".into()));
            }
            Ok(Some(format!("msg-{phone_number}")))
        }
    }

    #[test]
    fn client_creation() {
        let args = ConstructionArgs::new("test_key", "test_secret", "", "Code: %s")
            .with_extra(["us-east-1"]);
        let client = AwsSnsClient::from_args(&args).unwrap();
        assert_eq!(client.region(), "us-east-1");
        assert_eq!(client.provider(), ProviderKind::AmazonSns);
    }

    #[test]
    fn region_is_required() {
        let args = ConstructionArgs::new("test_key", "test_secret", "", "Code: %s");
        assert!(matches!(
            AwsSnsClient::from_args(&args),
            Err(SmsError::MissingConstructionParameter("region"))
        ));
    }

    #[tokio::test]
    async fn publishes_once_per_recipient_with_attributes() {
        let publisher = Arc::new(FakePublisher::default());
        let client = AwsSnsClient::with_publisher(publisher.clone(), "us-east-1", "Code: %s");

        client
            .send(&params_with_code("7788"), &["+14155550100", "+14155550101"])
            .await
            .unwrap();

        let calls = publisher.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "+14155550100");
        assert_eq!(calls[0].1, "Code: 7788");
        assert_eq!(calls[0].2, vec!["AWS.SNS.SMS.SMSType", "code"]);
    }

    #[tokio::test]
    async fn fail_fast_skips_remaining_recipients() {
        let publisher = Arc::new(FakePublisher {
            fail_on: Some("B"),
            ..Default::default()
        });
        let client = AwsSnsClient::with_publisher(publisher.clone(), "us-east-1", "%s");

        let err = client
            .send(&params_with_code("1"), &["A", "B", "C"])
            .await
            .unwrap_err();
        assert!(matches!(err, SmsError::Http(_)));

        let phones: Vec<String> = publisher
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.0.clone())
            .collect();
        assert_eq!(phones, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn validation_happens_before_publishing() {
        let publisher = Arc::new(FakePublisher::default());
        let client = AwsSnsClient::with_publisher(publisher.clone(), "us-east-1", "%s");

        assert!(matches!(
            client.send(&TemplateParams::new(), &["A"]).await,
            Err(SmsError::MissingTemplateParam("code"))
        ));
        assert!(matches!(
            client.send(&params_with_code("1"), &[]).await,
            Err(SmsError::MissingRecipients)
        ));
        assert!(publisher.calls.lock().unwrap().is_empty());
    }
}
