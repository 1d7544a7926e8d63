//! Scripted transport fake for adapter tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{HttpRequest, HttpResponse, HttpTransport, SmsError};

/// Records every request and answers from a queue of scripted replies.
///
/// When the queue is empty the fallback reply is used.
pub struct RecordingTransport {
    replies: Mutex<VecDeque<Result<HttpResponse, String>>>,
    fallback: HttpResponse,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RecordingTransport {
    /// Every request gets `status` / `body` unless something else was scripted.
    pub fn replying(status: u16, body: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: HttpResponse::new(status, body),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn then_reply(self, status: u16, body: impl Into<String>) -> Self {
        self.lock_replies()
            .push_back(Ok(HttpResponse::new(status, body)));
        self
    }

    /// Next request fails at the transport level.
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.lock_replies().push_back(Err(message.into()));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// The only request made; panics if there were zero or several.
    pub fn single_request(&self) -> HttpRequest {
        let mut requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one request");
        requests.remove(0)
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<HttpResponse, String>>> {
        self.replies.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, SmsError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        match self.lock_replies().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(SmsError::Http(message)),
            None => Ok(self.fallback.clone()),
        }
    }
}
