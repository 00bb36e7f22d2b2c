//! Test doubles for code that talks to MailChimp.
//!
//! Available with the `testing` feature:
//!
//! ```toml
//! [dev-dependencies]
//! mailchimp-client = { path = "../mailchimp-client", features = ["testing"] }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{MailchimpError, Result};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Method};
use crate::MailchimpClient;

/// Transport that records every request and replays queued responses.
///
/// With an empty queue it answers `200 {}`.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    responses: Arc<Mutex<VecDeque<Result<ApiResponse>>>>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw response.
    pub fn with_response(self, status: u16, body: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(ApiResponse::new(status, body)));
        self
    }

    /// Queue a JSON response.
    pub fn with_json(self, status: u16, body: Value) -> Self {
        self.with_response(status, body.to_string())
    }

    /// Queue a network failure.
    pub fn with_transport_error(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(MailchimpError::transport(message)));
        self
    }

    /// Every request sent so far.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<ApiRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Client bound to this transport.
    pub fn client(&self, api_key: &str) -> MailchimpClient {
        MailchimpClient::with_transport(api_key, Arc::new(self.clone()))
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.requests.lock().unwrap().push(request);

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ApiResponse::new(200, "{}")))
    }
}

/// In-memory stand-in for the members endpoint.
///
/// Handles `PUT` and `GET` on `lists/{list}/members/{hash}` with
/// last-write-wins semantics; everything else is a 404.
#[derive(Clone, Default)]
pub struct FakeMembers {
    members: Arc<Mutex<HashMap<(String, String), Value>>>,
}

impl FakeMembers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn member(&self, list_id: &str, subscriber_hash: &str) -> Option<Value> {
        self.members
            .lock()
            .unwrap()
            .get(&(list_id.to_string(), subscriber_hash.to_string()))
            .cloned()
    }

    pub fn member_count(&self) -> usize {
        self.members.lock().unwrap().len()
    }

    pub fn client(&self, api_key: &str) -> MailchimpClient {
        MailchimpClient::with_transport(api_key, Arc::new(self.clone()))
    }
}

#[async_trait]
impl HttpTransport for FakeMembers {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let segments: Vec<&str> = request
            .url
            .split("/3.0/")
            .nth(1)
            .unwrap_or_default()
            .split('/')
            .collect();

        let not_found = || {
            ApiResponse::new(
                404,
                json!({"title": "Resource Not Found", "status": 404}).to_string(),
            )
        };

        let ["lists", list_id, "members", hash] = segments.as_slice() else {
            return Ok(not_found());
        };
        let key = (list_id.to_string(), hash.to_string());

        match request.method {
            Method::Put => {
                let mut member = request.body.unwrap_or_else(|| json!({}));
                member["id"] = json!(hash);
                member["list_id"] = json!(list_id);
                self.members.lock().unwrap().insert(key, member.clone());
                Ok(ApiResponse::new(200, member.to_string()))
            }
            Method::Get => match self.members.lock().unwrap().get(&key) {
                Some(member) => Ok(ApiResponse::new(200, member.to_string())),
                None => Ok(not_found()),
            },
            _ => Ok(not_found()),
        }
    }
}
