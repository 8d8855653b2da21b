//! dashcache - command-line controller for an admin dashboard API.
//!
//! Lists, searches and watches the account and event collections through the
//! dashcache core services.

mod args;
mod output;

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use dashcache_core::{
    AccountService, Config, EventService, FilterPatch, HttpGateway, RequestGateway,
    ServiceOptions,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use args::{Collection, Command, ListArgs, USAGE};

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Config file values with `DASHCACHE_API_URL` / `DASHCACHE_TOKEN` on top.
fn load_config() -> Result<Config> {
    let mut config = Config::load()?;
    if let Ok(url) = std::env::var("DASHCACHE_API_URL") {
        config.api_base_url = url;
    }
    if let Ok(token) = std::env::var("DASHCACHE_TOKEN") {
        config.api_token = Some(token);
    }
    Ok(config)
}

fn build_gateway(config: &Config) -> Result<Arc<dyn RequestGateway>> {
    let mut gateway = HttpGateway::new(config.api_base_url.clone())?;
    if let Some(ref token) = config.api_token {
        gateway.set_token(token.as_str());
    }
    Ok(Arc::new(gateway))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let command = match args::parse(&argv) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = load_config()?;
    info!(base_url = %config.api_base_url, "dashcache starting");
    let gateway = build_gateway(&config)?;
    let options = config.service_options();

    match command {
        Command::List(Collection::Accounts, list) => {
            list_accounts(gateway, options, &config, list).await
        }
        Command::List(Collection::Events, list) => {
            list_events(gateway, options, &config, list).await
        }
        Command::Stats => stats(gateway, options).await,
        Command::Watch { collection, every } => {
            let every = every
                .or_else(|| config.auto_refresh())
                .unwrap_or(std::time::Duration::from_secs(30));
            watch(gateway, options, collection, every).await
        }
        Command::Help => Ok(()),
    }
}

fn list_patch(list: &ListArgs, category_field: &str) -> FilterPatch {
    let mut patch = FilterPatch::new();
    if let Some(ref term) = list.search {
        patch = patch.search(term.as_str());
    }
    if let Some(ref value) = list.category {
        patch = patch.field(category_field, value.as_str());
    }
    patch
}

async fn list_accounts(
    gateway: Arc<dyn RequestGateway>,
    options: ServiceOptions,
    config: &Config,
    mut list: ListArgs,
) -> Result<()> {
    let service = AccountService::new(gateway, options);
    service.load().await.context("Failed to load accounts")?;

    // Role values are lowercase on the wire
    list.category = list.category.map(|role| role.to_lowercase());
    service.set_filters(list_patch(&list, "role"));

    let page = service.get_paginated(list.page, list.limit.unwrap_or(config.page_size));
    output::print_accounts(&page);
    service.cleanup();
    Ok(())
}

async fn list_events(
    gateway: Arc<dyn RequestGateway>,
    options: ServiceOptions,
    config: &Config,
    list: ListArgs,
) -> Result<()> {
    let service = EventService::new(gateway, options);
    service.load().await.context("Failed to load events")?;
    service.set_filters(list_patch(&list, "category"));

    let page = service.get_paginated(list.page, list.limit.unwrap_or(config.page_size));
    output::print_events(&page);
    service.cleanup();
    Ok(())
}

async fn stats(gateway: Arc<dyn RequestGateway>, options: ServiceOptions) -> Result<()> {
    let accounts = AccountService::new(Arc::clone(&gateway), options);
    let events = EventService::new(gateway, options);

    let (loaded_accounts, loaded_events) = tokio::join!(accounts.load(), events.load());
    loaded_accounts.context("Failed to load accounts")?;
    loaded_events.context("Failed to load events")?;

    output::print_stats(&accounts.stats(), &events.stats(Utc::now()));
    accounts.cleanup();
    events.cleanup();
    Ok(())
}

async fn watch(
    gateway: Arc<dyn RequestGateway>,
    options: ServiceOptions,
    collection: Collection,
    every: std::time::Duration,
) -> Result<()> {
    eprintln!("Watching {:?} every {}s, Ctrl-C to stop", collection, every.as_secs());

    match collection {
        Collection::Accounts => {
            let service = AccountService::new(gateway, options);
            let _subscription = service.subscribe(|event| output::print_event(event));
            if let Err(e) = service.load().await {
                warn!(error = %e, "Initial load failed, waiting for next refresh");
            }
            service.start_auto_refresh(every);
            tokio::signal::ctrl_c().await?;
            service.cleanup();
        }
        Collection::Events => {
            let service = EventService::new(gateway, options);
            let _subscription = service.subscribe(|event| output::print_event(event));
            if let Err(e) = service.load().await {
                warn!(error = %e, "Initial load failed, waiting for next refresh");
            }
            service.start_auto_refresh(every);
            tokio::signal::ctrl_c().await?;
            service.cleanup();
        }
    }

    info!("dashcache watch stopped");
    Ok(())
}
