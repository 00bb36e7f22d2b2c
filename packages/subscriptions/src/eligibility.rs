//! Decides whether an order transition should subscribe the customer.
//!
//! Pure functions of the event and the settings snapshot: re-evaluating a
//! duplicate delivery gives the same answer and touches nothing.

use std::fmt;

use serde::Serialize;

use crate::config::Configuration;
use crate::order::OrderEvent;

/// Why an attempt ended without calling MailChimp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Integration disabled, or no API key / list.
    InvalidConfiguration,
    /// The order did not enter the configured trigger status.
    StatusMismatch,
    /// The customer unticked the opt-in checkbox.
    OptedOut,
    /// No billing email to subscribe.
    MissingEmail,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::InvalidConfiguration => "integration disabled or not configured",
            SkipReason::StatusMismatch => "order status does not match trigger",
            SkipReason::OptedOut => "customer declined opt-in",
            SkipReason::MissingEmail => "no billing email",
        };
        f.write_str(reason)
    }
}

/// Check every eligibility rule, reporting the first one that fails.
pub fn check(event: &OrderEvent, config: &Configuration) -> Result<(), SkipReason> {
    if !config.is_valid() {
        return Err(SkipReason::InvalidConfiguration);
    }
    if !config.trigger_status.matches(event.new_status) {
        return Err(SkipReason::StatusMismatch);
    }
    // A checkbox that was never shown counts as consent.
    if event.customer_opt_in == Some(false) {
        return Err(SkipReason::OptedOut);
    }
    Ok(())
}

pub fn is_eligible(event: &OrderEvent, config: &Configuration) -> bool {
    check(event, config).is_ok()
}
