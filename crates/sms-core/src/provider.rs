use std::fmt;
use std::str::FromStr;

use crate::SmsError;

/// Every delivery network the gateway can construct an adapter for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Twilio,
    AmazonSns,
    AzureAcs,
    Msg91,
    Gccpay,
    Infobip,
    Submail,
    SmsBao,
    Aliyun,
    TencentCloud,
    BaiduCloud,
    VolcEngine,
    HuaweiCloud,
    UCloud,
    Huyi,
    Mock,
    Netgsm,
    Oson,
    UniSms,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 19] = [
        Self::Twilio,
        Self::AmazonSns,
        Self::AzureAcs,
        Self::Msg91,
        Self::Gccpay,
        Self::Infobip,
        Self::Submail,
        Self::SmsBao,
        Self::Aliyun,
        Self::TencentCloud,
        Self::BaiduCloud,
        Self::VolcEngine,
        Self::HuaweiCloud,
        Self::UCloud,
        Self::Huyi,
        Self::Mock,
        Self::Netgsm,
        Self::Oson,
        Self::UniSms,
    ];

    /// Canonical, stable identifier tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Twilio => "Twilio",
            Self::AmazonSns => "AmazonSNS",
            Self::AzureAcs => "AzureACS",
            Self::Msg91 => "Msg91",
            Self::Gccpay => "GCCPAY",
            Self::Infobip => "Infobip",
            Self::Submail => "Submail",
            Self::SmsBao => "SmsBao",
            Self::Aliyun => "Aliyun",
            Self::TencentCloud => "TencentCloud",
            Self::BaiduCloud => "BaiduCloud",
            Self::VolcEngine => "VolcEngine",
            Self::HuaweiCloud => "HuaweiCloud",
            Self::UCloud => "UCloud",
            Self::Huyi => "Huyi",
            Self::Mock => "Mock",
            Self::Netgsm => "Netgsm",
            Self::Oson => "OSON",
            Self::UniSms => "UniSMS",
        }
    }

    /// Long-form tag accepted for compatibility with older deployments.
    pub fn legacy_tag(self) -> &'static str {
        match self {
            Self::Twilio => "Twilio_SMS",
            Self::AmazonSns => "Amazon_SNS",
            Self::AzureAcs => "Azure_ACS",
            Self::Msg91 => "Msg91_SMS",
            Self::Gccpay => "GCCPAY_SMS",
            Self::Infobip => "Infobip_SMS",
            Self::Submail => "SUBMAIL_SMS",
            Self::SmsBao => "SmsBao_SMS",
            Self::Aliyun => "Aliyun_SMS",
            Self::TencentCloud => "Tencent_Cloud_SMS",
            Self::BaiduCloud => "Baidu_Cloud_SMS",
            Self::VolcEngine => "Volc_Engine_SMS",
            Self::HuaweiCloud => "Huawei_Cloud_SMS",
            Self::UCloud => "UCloud_SMS",
            Self::Huyi => "Huyi_SMS",
            Self::Mock => "Mock SMS",
            Self::Netgsm => "Netgsm_SMS",
            Self::Oson => "OSON_SMS",
            Self::UniSms => "Uni_SMS",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = SmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s || kind.legacy_tag() == s)
            .ok_or_else(|| SmsError::UnsupportedProvider(s.to_string()))
    }
}
