//! Builds the MailChimp payload for an order.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use mailchimp_client::{subscriber_hash, MemberStatus, MemberUpsert};
use serde::Serialize;

use crate::config::Configuration;
use crate::order::OrderEvent;

/// Normalized subscription payload for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionRequest {
    pub list_id: String,
    /// Lower-cased billing email.
    pub email: String,
    pub status: MemberStatus,
    pub email_type: String,
    pub merge_fields: BTreeMap<String, String>,
    /// Interest id -> selected. Only ever holds `true` entries unless a hook says otherwise.
    pub interests: BTreeMap<String, bool>,
    pub tags: Vec<String>,
}

impl SubscriptionRequest {
    pub fn subscriber_hash(&self) -> String {
        subscriber_hash(&self.email)
    }

    /// Body for the member upsert call.
    pub fn to_member(&self) -> MemberUpsert {
        MemberUpsert {
            email_address: self.email.clone(),
            status: self.status,
            email_type: self.email_type.clone(),
            merge_fields: self.merge_fields.clone(),
            interests: self.interests.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Transformation applied to every request before it is sent.
pub type RequestHook = Arc<dyn Fn(SubscriptionRequest) -> SubscriptionRequest + Send + Sync>;

/// Builds [`SubscriptionRequest`]s and runs registered hooks in order.
#[derive(Clone, Default)]
pub struct RequestBuilder {
    hooks: Vec<RequestHook>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook; hooks run in registration order.
    pub fn hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(SubscriptionRequest) -> SubscriptionRequest + Send + Sync + 'static,
    {
        self.hooks.push(Arc::new(hook));
        self
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// Build the request for `event`, or `None` when there is no email to
    /// subscribe (before or after hooks).
    pub fn build(&self, event: &OrderEvent, config: &Configuration) -> Option<SubscriptionRequest> {
        let request = build_request(event, config)?;

        let request = self.hooks.iter().fold(request, |request, hook| hook(request));

        let email = request.email.trim().to_lowercase();
        if email.is_empty() {
            return None;
        }
        Some(SubscriptionRequest { email, ..request })
    }
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// Hook-free request construction.
pub fn build_request(event: &OrderEvent, config: &Configuration) -> Option<SubscriptionRequest> {
    let email = event.billing_email.trim().to_lowercase();
    if email.is_empty() {
        return None;
    }

    let merge_fields = BTreeMap::from([
        ("FNAME".to_string(), event.billing_first_name.trim().to_string()),
        ("LNAME".to_string(), event.billing_last_name.trim().to_string()),
    ]);

    let interests = config
        .interest_group_ids
        .iter()
        .map(|id| (id.clone(), true))
        .collect();

    Some(SubscriptionRequest {
        list_id: config.list_id.clone(),
        email,
        status: MemberStatus::from_double_opt_in(config.double_opt_in),
        email_type: "html".to_string(),
        merge_fields,
        interests,
        tags: config.tags.clone(),
    })
}
