//! Per-encoding request builders.
//!
//! Adapters describe their outbound call as an [`HttpRequest`] value: a method, a target URL,
//! headers and a serialized body. Building is pure, so protocol logic can be unit-tested
//! without touching the network; an [`HttpTransport`](crate::HttpTransport) performs the call.

use std::borrow::Cow;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::{Headers, SmsError};

pub const CONTENT_TYPE: &str = "Content-Type";
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const APPLICATION_JSON: &str = "application/json";
pub const APPLICATION_XML: &str = "application/xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub body: Vec<u8>,
    /// Per-request timeout, on top of whatever the transport applies globally.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    /// Sets a header, replacing any previous value with the same (case-insensitive) name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Appends form-encoded query pairs to the URL.
    pub fn query<I, K, V>(mut self, pairs: I) -> Result<Self, SmsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut url = Url::parse(&self.url)
            .map_err(|e| SmsError::Http(format!("invalid url {}: {}", self.url, e)))?;
        url.query_pairs_mut().extend_pairs(pairs);
        self.url = url.into();
        Ok(self)
    }

    /// `application/x-www-form-urlencoded` body.
    pub fn form<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, SmsError> {
        let encoded = serde_urlencoded::to_string(body)
            .map_err(|e| SmsError::Http(format!("form encode: {}", e)))?;
        self.body = encoded.into_bytes();
        Ok(self.header(CONTENT_TYPE, FORM_URLENCODED))
    }

    /// Form body that has already been encoded, e.g. because its exact bytes were signed.
    pub fn encoded_form(mut self, encoded: String) -> Self {
        self.body = encoded.into_bytes();
        self.header(CONTENT_TYPE, FORM_URLENCODED)
    }

    /// `application/json` body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, SmsError> {
        self.body =
            serde_json::to_vec(body).map_err(|e| SmsError::Http(format!("json encode: {}", e)))?;
        Ok(self.header(CONTENT_TYPE, APPLICATION_JSON))
    }

    /// `application/xml` body. Build documents with [`xml::escape`] and [`xml::cdata`].
    pub fn xml(mut self, document: impl Into<String>) -> Self {
        self.body = document.into().into_bytes();
        self.header(CONTENT_TYPE, APPLICATION_XML)
    }

    /// `multipart/form-data` body made only of text fields.
    ///
    /// Field names are escaped the way browsers and reqwest do it: `"`, CR and LF become
    /// `%22`, `%0D` and `%0A`. Values are written verbatim; a part body may hold any text
    /// because the boundary is a fresh random token.
    pub fn multipart<K, V>(mut self, fields: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let boundary = format!("smsgate-{}", uuid::Uuid::new_v4().simple());
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                escape_field_name(name.as_ref()),
                value.as_ref()
            ));
        }
        body.push_str(&format!("--{boundary}--\r\n"));
        self.body = body.into_bytes();
        self.header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// First value of a query parameter in the target URL, decoded.
    pub fn query_value(&self, name: &str) -> Option<String> {
        let url = Url::parse(&self.url).ok()?;
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Body parsed as JSON, for inspecting JSON requests.
    pub fn body_json(&self) -> Result<serde_json::Value, SmsError> {
        serde_json::from_slice(&self.body).map_err(|e| SmsError::Unexpected(e.to_string()))
    }
}

fn escape_field_name(name: &str) -> Cow<'_, str> {
    if !name.contains(['"', '\r', '\n']) {
        return Cow::Borrowed(name);
    }
    Cow::Owned(
        name.replace('"', "%22")
            .replace('\r', "%0D")
            .replace('\n', "%0A"),
    )
}

pub mod xml {
    use std::borrow::Cow;

    /// Escapes text for use inside an element or attribute.
    pub fn escape(text: &str) -> Cow<'_, str> {
        quick_xml::escape::escape(text)
    }

    /// Wraps text in a CDATA section, splitting any embedded terminator.
    pub fn cdata(text: &str) -> String {
        format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
    }
}
