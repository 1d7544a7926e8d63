use std::collections::HashMap;
use std::sync::Arc;

use crate::SmsClient;

/// Runtime registry so apps can keep several configured senders and look them up by name.
#[derive(Default, Clone)]
pub struct SenderRegistry {
    map: Arc<HashMap<String, Arc<dyn SmsClient>>>,
}

impl SenderRegistry {
    pub fn new() -> Self {
        Self {
            map: Arc::new(HashMap::new()),
        }
    }

    pub fn with(mut self, name: impl Into<String>, client: Arc<dyn SmsClient>) -> Self {
        let mut m = (*self.map).clone();
        m.insert(name.into(), client);
        self.map = Arc::new(m);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SmsClient>> {
        self.map.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MockClient, ProviderKind};

    #[test]
    fn lookup_by_name() {
        let registry = SenderRegistry::new()
            .with("otp", Arc::new(MockClient::new()))
            .with("fallback", Arc::new(MockClient::new()));
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get("otp").map(|c| c.provider()),
            Some(ProviderKind::Mock)
        );
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn with_does_not_mutate_clones() {
        let base = SenderRegistry::new();
        let extended = base.clone().with("otp", Arc::new(MockClient::new()));
        assert!(base.is_empty());
        assert_eq!(extended.names().collect::<Vec<_>>(), vec!["otp"]);
    }
}
