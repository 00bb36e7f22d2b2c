//! Subscription settings.
//!
//! A [`Configuration`] is an immutable snapshot; the orchestrator reads one
//! per attempt from a [`ConfigurationProvider`].

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::order::OrderStatus;

/// Errors raised while loading settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a boolean (yes/no/true/false/1/0), got {value:?}")]
    InvalidBool { name: &'static str, value: String },

    #[error("{name} is not a recognised value: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// Order transition that triggers the subscribe call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    #[serde(alias = "created", alias = "pending")]
    OrderCreated,
    #[serde(alias = "processing")]
    OrderProcessing,
    #[default]
    #[serde(alias = "completed")]
    OrderCompleted,
}

impl TriggerStatus {
    /// Whether an order entering `status` fires this trigger.
    pub fn matches(&self, status: OrderStatus) -> bool {
        match self {
            TriggerStatus::OrderCreated => {
                matches!(status, OrderStatus::Created | OrderStatus::Pending)
            }
            TriggerStatus::OrderProcessing => status == OrderStatus::Processing,
            TriggerStatus::OrderCompleted => status == OrderStatus::Completed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerStatus::OrderCreated => "order_created",
            TriggerStatus::OrderProcessing => "order_processing",
            TriggerStatus::OrderCompleted => "order_completed",
        }
    }
}

impl fmt::Display for TriggerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerStatus {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "order_created" | "created" | "pending" => Ok(TriggerStatus::OrderCreated),
            "order_processing" | "processing" => Ok(TriggerStatus::OrderProcessing),
            "order_completed" | "completed" => Ok(TriggerStatus::OrderCompleted),
            other => Err(ConfigError::InvalidValue {
                name: "MAILCHIMP_TRIGGER_STATUS",
                value: other.to_string(),
            }),
        }
    }
}

/// Initial state of the checkout opt-in checkbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptInDefault {
    Checked,
    #[default]
    Unchecked,
}

impl FromStr for OptInDefault {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "checked" => Ok(OptInDefault::Checked),
            "unchecked" => Ok(OptInDefault::Unchecked),
            other => Err(ConfigError::InvalidValue {
                name: "MAILCHIMP_OPT_IN_DEFAULT",
                value: other.to_string(),
            }),
        }
    }
}

/// Subscription settings snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub api_key: String,
    pub enabled: bool,
    pub list_id: String,
    pub trigger_status: TriggerStatus,
    pub double_opt_in: bool,
    pub display_opt_in: bool,
    pub opt_in_default: OptInDefault,
    pub interest_group_ids: BTreeSet<String>,
    /// Tags applied to every subscriber.
    pub tags: Vec<String>,
    /// Recipient of failure alerts. No alert is sent when unset.
    pub admin_email: Option<String>,
    pub debug: bool,
}

impl Configuration {
    /// Enabled, with an API key and a list selected.
    pub fn is_valid(&self) -> bool {
        self.enabled && !self.api_key.trim().is_empty() && !self.list_id.trim().is_empty()
    }

    /// Initial checked state of the opt-in checkbox.
    pub fn opt_in_checkbox_checked(&self) -> bool {
        self.opt_in_default == OptInDefault::Checked
    }

    /// Load from `MAILCHIMP_*` environment variables (and `.env` when present).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `MAILCHIMP_API_KEY` | empty |
    /// | `MAILCHIMP_ENABLED` | `no` |
    /// | `MAILCHIMP_LIST_ID` | empty |
    /// | `MAILCHIMP_TRIGGER_STATUS` | `completed` |
    /// | `MAILCHIMP_DOUBLE_OPT_IN` | `no` |
    /// | `MAILCHIMP_DISPLAY_OPT_IN` | `no` |
    /// | `MAILCHIMP_OPT_IN_DEFAULT` | `unchecked` |
    /// | `MAILCHIMP_INTEREST_GROUPS` | none (comma separated) |
    /// | `MAILCHIMP_TAGS` | none (comma separated) |
    /// | `MAILCHIMP_ADMIN_EMAIL` | unset |
    /// | `MAILCHIMP_DEBUG` | `no` |
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let flag = |name: &'static str| -> Result<bool, ConfigError> {
            var(name).map(|v| parse_bool(name, &v)).transpose().map(|v| v.unwrap_or(false))
        };

        Ok(Self {
            api_key: var("MAILCHIMP_API_KEY").unwrap_or_default(),
            enabled: flag("MAILCHIMP_ENABLED")?,
            list_id: var("MAILCHIMP_LIST_ID").unwrap_or_default(),
            trigger_status: var("MAILCHIMP_TRIGGER_STATUS")
                .map(|v| v.parse::<TriggerStatus>())
                .transpose()?
                .unwrap_or_default(),
            double_opt_in: flag("MAILCHIMP_DOUBLE_OPT_IN")?,
            display_opt_in: flag("MAILCHIMP_DISPLAY_OPT_IN")?,
            opt_in_default: var("MAILCHIMP_OPT_IN_DEFAULT")
                .map(|v| v.parse::<OptInDefault>())
                .transpose()?
                .unwrap_or_default(),
            interest_group_ids: split_list(var("MAILCHIMP_INTEREST_GROUPS")).collect(),
            tags: split_list(var("MAILCHIMP_TAGS")).collect(),
            admin_email: var("MAILCHIMP_ADMIN_EMAIL"),
            debug: flag("MAILCHIMP_DEBUG")?,
        })
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" | "on" => Ok(true),
        "no" | "false" | "0" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name,
            value: value.to_string(),
        }),
    }
}

fn split_list(value: Option<String>) -> impl Iterator<Item = String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .into_iter()
}

/// Opt-in choice to record on an order placed at checkout.
///
/// `None` when the checkbox was never shown, which counts as consent.
pub fn customer_opt_in_from_checkout(config: &Configuration, checkbox_checked: bool) -> Option<bool> {
    config.display_opt_in.then_some(checkbox_checked)
}

/// Source of the current settings snapshot.
pub trait ConfigurationProvider: Send + Sync {
    fn current(&self) -> Configuration;
}

impl ConfigurationProvider for Configuration {
    fn current(&self) -> Configuration {
        self.clone()
    }
}

/// Provider holding a snapshot that can be replaced at runtime.
///
/// Attempts already running keep the snapshot they read.
#[derive(Debug, Default)]
pub struct StaticConfigurationProvider {
    config: RwLock<Configuration>,
}

impl StaticConfigurationProvider {
    pub fn new(config: Configuration) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Replace the snapshot.
    pub fn update(&self, config: Configuration) {
        let mut guard = self.config.write().unwrap_or_else(|e| e.into_inner());
        *guard = config;
    }
}

impl ConfigurationProvider for StaticConfigurationProvider {
    fn current(&self) -> Configuration {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
