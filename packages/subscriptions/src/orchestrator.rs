//! Runs one subscription attempt per order event.
//!
//! ```text
//! Received ─► Evaluated ─┬─► Skipped
//!                        └─► Built ─┬─► Skipped
//!                                   └─► Submitted ─┬─► Succeeded
//!                                                  └─► Failed
//! ```
//!
//! Nothing is persisted between attempts and nothing is retried here. Because
//! the subscribe call is an upsert, re-driving the same event is safe.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use mailchimp_client::{MailchimpClient, MailchimpError};
use serde::Serialize;

use crate::config::{Configuration, ConfigurationProvider};
use crate::eligibility::{self, SkipReason};
use crate::events::{SubscriptionEvent, SubscriptionEventBus};
use crate::notifier::Notifier;
use crate::order::OrderEvent;
use crate::request::{RequestBuilder, SubscriptionRequest};

/// Position of an attempt in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStage {
    Received,
    Evaluated,
    Built,
    Submitted,
    Skipped,
    Succeeded,
    Failed,
}

impl AttemptStage {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptStage::Skipped | AttemptStage::Succeeded | AttemptStage::Failed
        )
    }
}

impl fmt::Display for AttemptStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            AttemptStage::Received => "received",
            AttemptStage::Evaluated => "evaluated",
            AttemptStage::Built => "built",
            AttemptStage::Submitted => "submitted",
            AttemptStage::Skipped => "skipped",
            AttemptStage::Succeeded => "succeeded",
            AttemptStage::Failed => "failed",
        };
        f.write_str(stage)
    }
}

/// Terminal state of an attempt. Callers never see an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubscriptionOutcome {
    Skipped {
        order_id: u64,
        reason: SkipReason,
    },
    Succeeded {
        order_id: u64,
        list_id: String,
        email: String,
    },
    Failed {
        order_id: u64,
        list_id: String,
        email: String,
        error_code: String,
        error_message: String,
    },
}

impl SubscriptionOutcome {
    pub fn stage(&self) -> AttemptStage {
        match self {
            SubscriptionOutcome::Skipped { .. } => AttemptStage::Skipped,
            SubscriptionOutcome::Succeeded { .. } => AttemptStage::Succeeded,
            SubscriptionOutcome::Failed { .. } => AttemptStage::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SubscriptionOutcome::Succeeded { .. })
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            SubscriptionOutcome::Skipped { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// Progress lines for one attempt, emitted only with `debug` enabled.
struct AttemptLog {
    debug: bool,
    order_id: u64,
}

impl AttemptLog {
    fn stage(&self, stage: AttemptStage, detail: &str) {
        if self.debug {
            tracing::info!(order_id = self.order_id, %stage, "{}", detail);
        }
    }
}

/// Coordinates eligibility, request building, the API call and notifications.
///
/// Holds no per-attempt state, so one instance can serve concurrent orders.
#[derive(Clone)]
pub struct SubscriptionOrchestrator {
    config: Arc<dyn ConfigurationProvider>,
    client: MailchimpClient,
    notifier: Arc<dyn Notifier>,
    builder: RequestBuilder,
    events: SubscriptionEventBus,
}

impl SubscriptionOrchestrator {
    pub fn new(
        config: Arc<dyn ConfigurationProvider>,
        client: MailchimpClient,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            client,
            notifier,
            builder: RequestBuilder::new(),
            events: SubscriptionEventBus::new(),
        }
    }

    /// Use `builder` (and its hooks) to shape requests.
    pub fn with_request_builder(mut self, builder: RequestBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Publish outcomes on an existing bus.
    pub fn with_event_bus(mut self, events: SubscriptionEventBus) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &SubscriptionEventBus {
        &self.events
    }

    /// Run one attempt for `event` against the current settings.
    pub async fn handle(&self, event: OrderEvent) -> SubscriptionOutcome {
        let config = self.config.current();
        let log = AttemptLog {
            debug: config.debug,
            order_id: event.order_id,
        };
        log.stage(AttemptStage::Received, "Order event received");

        if let Err(reason) = eligibility::check(&event, &config) {
            log.stage(AttemptStage::Skipped, &format!("Not eligible: {reason}"));
            return SubscriptionOutcome::Skipped {
                order_id: event.order_id,
                reason,
            };
        }
        log.stage(AttemptStage::Evaluated, "Order is eligible");

        let Some(request) = self.builder.build(&event, &config) else {
            log.stage(AttemptStage::Skipped, "No billing email, nothing to subscribe");
            return SubscriptionOutcome::Skipped {
                order_id: event.order_id,
                reason: SkipReason::MissingEmail,
            };
        };
        log.stage(AttemptStage::Built, "Subscription request built");

        log.stage(
            AttemptStage::Submitted,
            &format!("Subscribing to list {}", request.list_id),
        );
        match self
            .client_for(&config)
            .subscribe(&request.list_id, &request.to_member())
            .await
        {
            Ok(_) => {
                log.stage(AttemptStage::Succeeded, "Subscribed");
                self.events.emit(SubscriptionEvent::Succeeded {
                    email: request.email.clone(),
                    list_id: request.list_id.clone(),
                    order_id: event.order_id,
                    occurred_at: Utc::now(),
                });
                SubscriptionOutcome::Succeeded {
                    order_id: event.order_id,
                    list_id: request.list_id,
                    email: request.email,
                }
            }
            Err(err) => self.fail(&config, &event, request, err).await,
        }
    }

    /// The injected client, rebound to the snapshot's API key when it changed.
    fn client_for(&self, config: &Configuration) -> MailchimpClient {
        if self.client.api_key() == config.api_key {
            self.client.clone()
        } else {
            self.client.with_api_key(config.api_key.clone())
        }
    }

    async fn fail(
        &self,
        config: &Configuration,
        event: &OrderEvent,
        request: SubscriptionRequest,
        err: MailchimpError,
    ) -> SubscriptionOutcome {
        tracing::error!(
            order_id = event.order_id,
            list_id = %request.list_id,
            error_code = err.code(),
            error_message = err.message(),
            "MailChimp subscription failed"
        );

        if let Some(admin) = config.admin_email.as_deref().filter(|a| !a.trim().is_empty()) {
            let subject = "WooCommerce MailChimp subscription failed";
            let body = failure_email_body(event, &request, &err);
            if let Err(e) = self.notifier.email(admin, subject, &body).await {
                tracing::warn!(order_id = event.order_id, error = %e, "Failed to send admin alert");
            }
        }

        self.events.emit(SubscriptionEvent::Failed {
            email: request.email.clone(),
            list_id: request.list_id.clone(),
            order_id: event.order_id,
            error_code: err.code().to_string(),
            error_message: err.message().to_string(),
            occurred_at: Utc::now(),
        });

        SubscriptionOutcome::Failed {
            order_id: event.order_id,
            list_id: request.list_id,
            email: request.email,
            error_code: err.code().to_string(),
            error_message: err.message().to_string(),
        }
    }
}

impl fmt::Debug for SubscriptionOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionOrchestrator")
            .field("client", &self.client)
            .field("builder", &self.builder)
            .field("events", &self.events)
            .finish()
    }
}

fn failure_email_body(event: &OrderEvent, request: &SubscriptionRequest, err: &MailchimpError) -> String {
    format!(
        "Subscribing a customer to MailChimp failed.\n\n\
         Order: #{}\n\
         Email: {}\n\
         List: {}\n\
         Error code: {}\n\
         Error message: {}\n",
        event.order_id,
        request.email,
        request.list_id,
        err.code(),
        err.message()
    )
}
