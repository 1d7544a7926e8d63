//! Provider selection.
//!
//! [`ProviderFactory`] turns a provider tag plus [`ConstructionArgs`] into a ready
//! `Box<dyn SmsClient>`. Every HTTP-based adapter it builds shares the factory's transport.

use std::sync::Arc;

use sms_aliyun::AliyunClient;
use sms_aws_sns::AwsSnsClient;
use sms_azure_acs::AzureAcsClient;
use sms_baidu::BaiduClient;
use sms_core::{
    ConstructionArgs, HttpTransport, MockClient, ProviderKind, ReqwestTransport, SmsClient,
    SmsError,
};
use sms_gccpay::GccpayClient;
use sms_huawei::HuaweiClient;
use sms_huyi::HuyiClient;
use sms_infobip::InfobipClient;
use sms_msg91::Msg91Client;
use sms_netgsm::NetgsmClient;
use sms_oson::OsonClient;
use sms_smsbao::SmsBaoClient;
use sms_submail::SubmailClient;
use sms_tencent::TencentClient;
use sms_twilio::TwilioClient;
use sms_ucloud::UcloudClient;
use sms_unisms::UniSmsClient;
use sms_volcengine::VolcClient;
use tracing::debug;

use crate::config::HttpConfig;

#[derive(Clone)]
pub struct ProviderFactory {
    transport: Arc<dyn HttpTransport>,
}

impl Default for ProviderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderFactory {
    /// Factory backed by a default [`ReqwestTransport`].
    pub fn new() -> Self {
        Self::with_transport(ReqwestTransport::shared())
    }

    pub fn with_transport(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    pub fn from_config(http: &HttpConfig) -> Result<Self, SmsError> {
        Ok(Self::with_transport(http.build_transport()?))
    }

    /// Parses `provider` (canonical or legacy tag) and builds the matching adapter.
    pub async fn create(
        &self,
        provider: &str,
        args: ConstructionArgs,
    ) -> Result<Box<dyn SmsClient>, SmsError> {
        let kind: ProviderKind = provider.parse()?;
        self.create_kind(kind, args).await
    }

    pub async fn create_kind(
        &self,
        kind: ProviderKind,
        args: ConstructionArgs,
    ) -> Result<Box<dyn SmsClient>, SmsError> {
        debug!(provider = %kind, extra = args.extra.len(), "constructing SMS client");
        let transport = self.transport.clone();
        let client: Box<dyn SmsClient> = match kind {
            ProviderKind::Twilio => Box::new(TwilioClient::from_args(&args, transport)?),
            ProviderKind::AmazonSns => Box::new(AwsSnsClient::from_args(&args)?),
            ProviderKind::AzureAcs => Box::new(AzureAcsClient::from_args(&args, transport)?),
            ProviderKind::Msg91 => Box::new(Msg91Client::from_args(&args, transport)?),
            ProviderKind::Gccpay => Box::new(GccpayClient::from_args(&args, transport)?),
            ProviderKind::Infobip => Box::new(InfobipClient::from_args(&args, transport)?),
            ProviderKind::Submail => Box::new(SubmailClient::from_args(&args, transport)?),
            ProviderKind::SmsBao => Box::new(SmsBaoClient::from_args(&args, transport)?),
            ProviderKind::Aliyun => Box::new(AliyunClient::from_args(&args, transport)?),
            ProviderKind::TencentCloud => Box::new(TencentClient::from_args(&args, transport)?),
            ProviderKind::BaiduCloud => Box::new(BaiduClient::from_args(&args, transport)?),
            ProviderKind::VolcEngine => Box::new(VolcClient::from_args(&args, transport)?),
            ProviderKind::HuaweiCloud => Box::new(HuaweiClient::from_args(&args, transport)?),
            ProviderKind::UCloud => Box::new(UcloudClient::from_args(&args, transport)?),
            ProviderKind::Huyi => Box::new(HuyiClient::from_args(&args, transport)?),
            ProviderKind::Mock => Box::new(MockClient::from_args(&args)),
            ProviderKind::Netgsm => Box::new(NetgsmClient::from_args(&args, transport)?),
            ProviderKind::Oson => Box::new(OsonClient::from_args(&args, transport)?),
            ProviderKind::UniSms => Box::new(UniSmsClient::from_args(&args, transport).await?),
        };
        Ok(client)
    }
}

/// Builds a client for `provider` from positional arguments using a default transport.
///
/// ```rust,ignore
/// let sender = smsgate::create("Aliyun", "LTAI...", "secret", "Acme", "SMS_1234", &[]).await?;
/// sender.send(&sms_core::params_with_code("482913"), &["13800138000"]).await?;
/// ```
pub async fn create(
    provider: &str,
    access_id: &str,
    access_key: &str,
    sign: &str,
    template: &str,
    extra: &[&str],
) -> Result<Box<dyn SmsClient>, SmsError> {
    let args = ConstructionArgs::new(access_id, access_key, sign, template)
        .with_extra(extra.iter().copied());
    ProviderFactory::new().create(provider, args).await
}
