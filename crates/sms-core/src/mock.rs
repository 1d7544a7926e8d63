use async_trait::async_trait;
use tracing::debug;

use crate::{ConstructionArgs, ProviderKind, SmsClient, SmsError, TemplateParams};

/// No-op client that reports success without transmitting anything.
///
/// Useful wherever real delivery must be suppressed (tests, sandboxes). It deliberately skips
/// the recipient/template checks the real adapters apply.
#[derive(Debug, Clone, Default)]
pub struct MockClient;

impl MockClient {
    pub fn new() -> Self {
        Self
    }

    /// Accepts and ignores any construction arguments.
    pub fn from_args(_args: &ConstructionArgs) -> Self {
        Self
    }
}

#[async_trait]
impl SmsClient for MockClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    async fn send(&self, params: &TemplateParams, recipients: &[&str]) -> Result<(), SmsError> {
        debug!(
            recipients = recipients.len(),
            params = params.len(),
            "mock provider swallowed message"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_succeeds() {
        let client = MockClient::from_args(&ConstructionArgs::default());
        assert!(client.send(&TemplateParams::new(), &[]).await.is_ok());
        assert!(client
            .send(&crate::params_with_code("1"), &["+15550001111", "bogus"])
            .await
            .is_ok());
        assert_eq!(client.provider(), ProviderKind::Mock);
    }
}
