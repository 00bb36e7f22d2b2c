//! Operator CLI for the WooCommerce MailChimp integration.
//!
//! Looks up the lists, interest groups, merge fields and tags the settings
//! screen offers, validates the API key, and replays order events through
//! the subscription pipeline. Output is JSON.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mailchimp_client::{MailchimpClient, MemoryCache, DEFAULT_CACHE_TTL};
use serde::Serialize;
use subscriptions::{Configuration, OrderEvent, SubscriptionOrchestrator, TracingNotifier};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "wc-mailchimp")]
#[command(about = "MailChimp subscription tools for WooCommerce orders")]
struct Cli {
    /// JSON settings file; `MAILCHIMP_*` environment variables are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the API key
    Check,

    /// Print the effective settings (API key masked)
    Settings,

    /// List audiences
    Lists,

    /// List interest groups of an audience
    InterestGroups {
        /// Audience id (defaults to the configured list)
        #[arg(long)]
        list: Option<String>,
    },

    /// List merge fields of an audience
    MergeFields {
        #[arg(long)]
        list: Option<String>,
    },

    /// List tags of an audience
    Tags {
        #[arg(long)]
        list: Option<String>,
    },

    /// Run an order event (JSON file) through the subscription pipeline
    SubscribeOrder { event: PathBuf },
}

#[derive(Serialize)]
struct Lookup<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    list_id: Option<&'a str>,
    items: BTreeMap<String, String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables (RUST_LOG included)
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,subscriptions=debug,mailchimp_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let client = MailchimpClient::new(config.api_key.clone())
        .context("Failed to create MailChimp client")?
        .with_cache(Arc::new(MemoryCache::new()), DEFAULT_CACHE_TTL);

    match cli.command {
        Commands::Check => {
            let account = client.ping().await.context("API key check failed")?;
            tracing::info!(account_id = %account.account_id, "API key is valid");
            output(&account)
        }
        Commands::Settings => output(&Configuration {
            api_key: mask(&config.api_key),
            ..config
        }),
        Commands::Lists => {
            let items = client.get_lists().await.context("Failed to fetch lists")?;
            output(&Lookup {
                list_id: None,
                items,
            })
        }
        Commands::InterestGroups { list } => {
            let list_id = list_or_default(list.as_deref(), &config)?;
            let items = client
                .get_interest_categories_with_interests(list_id)
                .await
                .context("Failed to fetch interest groups")?;
            output(&Lookup {
                list_id: Some(list_id),
                items,
            })
        }
        Commands::MergeFields { list } => {
            let list_id = list_or_default(list.as_deref(), &config)?;
            let items = client
                .get_merge_fields(list_id)
                .await
                .context("Failed to fetch merge fields")?;
            output(&Lookup {
                list_id: Some(list_id),
                items,
            })
        }
        Commands::Tags { list } => {
            let list_id = list_or_default(list.as_deref(), &config)?;
            let items = client
                .get_tags(list_id)
                .await
                .context("Failed to fetch tags")?;
            output(&Lookup {
                list_id: Some(list_id),
                items,
            })
        }
        Commands::SubscribeOrder { event } => {
            let raw = std::fs::read_to_string(&event)
                .with_context(|| format!("Failed to read {}", event.display()))?;
            let event: OrderEvent =
                serde_json::from_str(&raw).context("Order event is not valid JSON")?;

            let orchestrator =
                SubscriptionOrchestrator::new(Arc::new(config), client, Arc::new(TracingNotifier));
            let outcome = orchestrator.handle(event).await;
            output(&outcome)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Configuration> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&raw).context("Settings file is not valid JSON")
        }
        None => Configuration::from_env().context("Failed to load settings from environment"),
    }
}

fn list_or_default<'a>(list: Option<&'a str>, config: &'a Configuration) -> Result<&'a str> {
    match list {
        Some(list) => Ok(list),
        None if !config.list_id.is_empty() => Ok(&config.list_id),
        None => anyhow::bail!("No --list given and MAILCHIMP_LIST_ID is not set"),
    }
}

fn mask(api_key: &str) -> String {
    match api_key.rsplit_once('-') {
        Some((_, dc)) => format!("****-{dc}"),
        None if api_key.is_empty() => String::new(),
        None => "****".to_string(),
    }
}

fn output<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_keeps_datacenter_only() {
        assert_eq!(mask("0123456789abcdef-us6"), "****-us6");
        assert_eq!(mask("0123456789abcdef"), "****");
        assert_eq!(mask(""), "");
    }

    #[test]
    fn explicit_list_wins_over_configured() {
        let config = Configuration {
            list_id: "L1".into(),
            ..Default::default()
        };
        assert_eq!(list_or_default(Some("L2"), &config).unwrap(), "L2");
        assert_eq!(list_or_default(None, &config).unwrap(), "L1");
        assert!(list_or_default(None, &Configuration::default()).is_err());
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["wc-mailchimp", "interest-groups", "--list", "L9"]).unwrap();
        assert!(matches!(cli.command, Commands::InterestGroups { list: Some(ref l) } if l == "L9"));

        let cli = Cli::try_parse_from(["wc-mailchimp", "--config", "s.json", "subscribe-order", "o.json"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("s.json")));
        assert!(matches!(cli.command, Commands::SubscribeOrder { .. }));
    }
}
