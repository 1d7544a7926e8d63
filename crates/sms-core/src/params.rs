//! Template variables and the shared send preconditions.

use std::collections::BTreeMap;

use crate::SmsError;

/// Template variable name → substitution value.
///
/// Ordered so that payloads built from it serialize the same way every time.
pub type TemplateParams = BTreeMap<String, String>;

/// Key of the one-time code in [`TemplateParams`].
pub const CODE: &str = "code";

/// Returns the `code` variable or fails with [`SmsError::MissingTemplateParam`].
pub fn require_code(params: &TemplateParams) -> Result<&str, SmsError> {
    params
        .get(CODE)
        .map(String::as_str)
        .ok_or(SmsError::MissingTemplateParam(CODE))
}

pub fn require_recipients(recipients: &[&str]) -> Result<(), SmsError> {
    if recipients.is_empty() {
        return Err(SmsError::MissingRecipients);
    }
    Ok(())
}

/// Convenience for the common single-variable case.
pub fn params_with_code(code: impl Into<String>) -> TemplateParams {
    TemplateParams::from([(CODE.to_string(), code.into())])
}

/// Substitutes the first `%s` in a fixed-format template with the code.
///
/// Templates without a placeholder are returned unchanged.
pub fn render_code_template(template: &str, code: &str) -> String {
    template.replacen("%s", code, 1)
}
