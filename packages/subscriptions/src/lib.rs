//! Order-to-MailChimp subscription pipeline.
//!
//! Turns order status transitions into MailChimp list subscriptions:
//!
//! ```text
//! OrderEvent ─► eligibility::check ─► RequestBuilder (+ hooks)
//!            ─► MailchimpClient::subscribe ─► SubscriptionOutcome
//!                                         └─► Notifier / SubscriptionEventBus
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use subscriptions::{Configuration, OrderEvent, OrderStatus, SubscriptionOrchestrator, TracingNotifier};
//!
//! let config = Configuration::from_env()?;
//! let client = mailchimp_client::MailchimpClient::new(config.api_key.clone())?;
//! let orchestrator = SubscriptionOrchestrator::new(Arc::new(config), client, Arc::new(TracingNotifier));
//!
//! let outcome = orchestrator
//!     .handle(OrderEvent::new(1001, OrderStatus::Completed).with_billing("jane@example.com", "Jane", "Doe"))
//!     .await;
//! ```

pub mod config;
pub mod eligibility;
pub mod events;
pub mod notifier;
pub mod orchestrator;
pub mod order;
pub mod request;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{
    customer_opt_in_from_checkout, ConfigError, Configuration, ConfigurationProvider,
    OptInDefault, StaticConfigurationProvider, TriggerStatus,
};
pub use eligibility::{is_eligible, SkipReason};
pub use events::{SubscriptionEvent, SubscriptionEventBus};
pub use notifier::{Notifier, TracingNotifier};
pub use orchestrator::{AttemptStage, SubscriptionOrchestrator, SubscriptionOutcome};
pub use order::{OrderEvent, OrderEventError, OrderStatus};
pub use request::{build_request, RequestBuilder, RequestHook, SubscriptionRequest};
