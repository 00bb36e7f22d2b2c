use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Malformed order event data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderEventError {
    #[error("unknown order status: {0:?}")]
    UnknownStatus(String),
}

/// Order lifecycle statuses reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    /// Reported once when the order is first written.
    Created,
    Pending,
    Processing,
    OnHold,
    Completed,
    Cancelled,
    Refunded,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::OnHold => "on-hold",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderEventError;

    /// Accepts both `completed` and the stored `wc-completed` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.strip_prefix("wc-").unwrap_or(&normalized) {
            "created" => Ok(OrderStatus::Created),
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "on-hold" => Ok(OrderStatus::OnHold),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "refunded" => Ok(OrderStatus::Refunded),
            "failed" => Ok(OrderStatus::Failed),
            _ => Err(OrderEventError::UnknownStatus(s.to_string())),
        }
    }
}

/// One order status transition, as delivered by the store.
///
/// Delivery is at-least-once; the same transition may arrive twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: u64,
    /// `None` for a freshly created order.
    #[serde(default)]
    pub previous_status: Option<OrderStatus>,
    pub new_status: OrderStatus,
    #[serde(default)]
    pub billing_email: String,
    #[serde(default)]
    pub billing_first_name: String,
    #[serde(default)]
    pub billing_last_name: String,
    /// `None` when the checkout never showed the opt-in checkbox.
    #[serde(default)]
    pub customer_opt_in: Option<bool>,
}

impl OrderEvent {
    pub fn new(order_id: u64, new_status: OrderStatus) -> Self {
        Self {
            order_id,
            previous_status: None,
            new_status,
            billing_email: String::new(),
            billing_first_name: String::new(),
            billing_last_name: String::new(),
            customer_opt_in: None,
        }
    }

    pub fn with_previous_status(mut self, status: OrderStatus) -> Self {
        self.previous_status = Some(status);
        self
    }

    pub fn with_billing(
        mut self,
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        self.billing_email = email.into();
        self.billing_first_name = first_name.into();
        self.billing_last_name = last_name.into();
        self
    }

    pub fn with_opt_in(mut self, opt_in: Option<bool>) -> Self {
        self.customer_opt_in = opt_in;
        self
    }
}
