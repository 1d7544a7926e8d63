use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use sms_core::{ConstructionArgs, HttpTransport, ReqwestTransport, SenderRegistry, SmsError};
use std::collections::BTreeMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::factory::ProviderFactory;

/// Application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// Outbound HTTP configuration shared by every adapter
    #[serde(default)]
    pub http: HttpConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Configured senders, keyed by the name callers look them up with
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderEntry>,
}

/// Outbound HTTP configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    /// Client-wide request timeout in seconds (default: 30)
    pub timeout_seconds: u64,
    /// User-Agent header sent to vendors
    pub user_agent: String,
}

/// One configured sender
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ProviderEntry {
    /// Provider tag, e.g. `Aliyun` or `Tencent_Cloud_SMS`
    pub provider: String,
    #[serde(default)]
    pub access_id: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub sign: String,
    #[serde(default)]
    pub template: String,
    /// Provider-specific positional arguments
    #[serde(default)]
    pub extra: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: json or pretty (default: json)
    pub format: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: concat!("smsgate/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl ProviderEntry {
    pub fn args(&self) -> ConstructionArgs {
        ConstructionArgs::new(
            &self.access_id,
            &self.access_key,
            &self.sign,
            &self.template,
        )
        .with_extra(self.extra.iter().cloned())
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Shared transport honouring the configured timeout and user agent.
    pub fn build_transport(&self) -> Result<Arc<dyn HttpTransport>, SmsError> {
        let transport = ReqwestTransport::builder()
            .timeout(self.timeout())
            .user_agent(&self.user_agent)
            .build()?;
        Ok(Arc::new(transport))
    }
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(Config::try_from(&AppConfig::default())?)
            // Add configuration file based on environment
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local configuration file (gitignored)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (prefixed with SMSGATE_)
            .add_source(Environment::with_prefix("SMSGATE").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Constructs every configured sender and registers it under its entry name.
    ///
    /// Fails on the first entry that cannot be constructed.
    pub async fn build_registry(&self) -> Result<SenderRegistry, SmsError> {
        let factory = ProviderFactory::from_config(&self.http)?;
        let mut registry = SenderRegistry::new();
        for (name, entry) in &self.providers {
            let client = factory.create(&entry.provider, entry.args()).await?;
            tracing::debug!(name = %name, provider = %client.provider(), "registered sender");
            registry = registry.with(name.clone(), Arc::from(client));
        }
        Ok(registry)
    }
}
