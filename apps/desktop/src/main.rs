use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use client_core::{
    config::{load_settings, load_settings_from},
    AppStore, GridParams,
};
use shared::domain::SortOrder;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// Settings file; defaults to ./client.toml.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    username: Option<String>,
    #[arg(long, requires = "username")]
    password: Option<String>,
    #[arg(long, default_value_t = 0)]
    page: u32,
    #[arg(long, default_value_t = 10)]
    page_size: u32,
    /// Sort the grid page by this property, ascending.
    #[arg(long)]
    sort: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => load_settings_from(path, |name| std::env::var(name).ok()),
        None => load_settings(),
    };
    let app = AppStore::from_settings(&settings).await?;
    info!(
        application = app.application_name(),
        server_url = %settings.server_url,
        "desktop shell started"
    );

    if let Some(username) = &args.username {
        let password = args.password.as_deref().unwrap_or_default();
        let result = app.session_store().login(username, password).await?;
        if result.error {
            warn!(username = %username, "login rejected");
            bail!(
                "{}: {}",
                result.error_title.unwrap_or_default(),
                result.error_message.unwrap_or_default()
            );
        }
        info!(username = %username, landing = %result.landing_url(None), "logged in");
    }

    if app.session_store().offline().await {
        warn!("server unreachable; showing cached data");
    }

    let events = app.event_store().events().await;
    println!("Events ({}):", events.len());
    println!("{}", serde_json::to_string_pretty(&events)?);

    let grid = app.grid_source();
    let size = grid.mount().await?;
    let mut params = GridParams::new(args.page, args.page_size);
    if let Some(path) = args.sort {
        params = params.sorted_by(vec![SortOrder::asc(path)]);
    }
    let page = grid.request(&params).await?;
    println!("Grid page {} of size {} ({} total):", args.page, args.page_size, size);
    println!("{}", serde_json::to_string_pretty(&page)?);

    app.shutdown().await;
    Ok(())
}
