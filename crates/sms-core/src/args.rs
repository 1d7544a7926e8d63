use std::fmt;

use serde::{Deserialize, Serialize};

use crate::SmsError;

/// Positional construction bundle handed to every provider constructor.
///
/// The meaning of `extra` is provider-specific (endpoint, sender number, app id, region...).
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionArgs {
    #[serde(default)]
    pub access_id: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub sign: String,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub extra: Vec<String>,
}

impl ConstructionArgs {
    pub fn new(
        access_id: impl Into<String>,
        access_key: impl Into<String>,
        sign: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            access_id: access_id.into(),
            access_key: access_key.into(),
            sign: sign.into(),
            template: template.into(),
            extra: Vec::new(),
        }
    }

    pub fn with_extra<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra = extra.into_iter().map(Into::into).collect();
        self
    }

    /// The `index`-th extra argument, failing construction if absent.
    pub fn required_extra(&self, index: usize, name: &'static str) -> Result<&str, SmsError> {
        self.extra
            .get(index)
            .map(String::as_str)
            .ok_or(SmsError::MissingConstructionParameter(name))
    }

    pub fn optional_extra(&self, index: usize) -> Option<&str> {
        self.extra.get(index).map(String::as_str)
    }
}

impl fmt::Debug for ConstructionArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructionArgs")
            .field("access_id", &self.access_id)
            .field("access_key", &"<redacted>")
            .field("sign", &self.sign)
            .field("template", &self.template)
            .field("extra", &self.extra)
            .finish()
    }
}
