#![forbid(unsafe_code)]

mod api;
mod config;
mod server;

use std::sync::Arc;

use anyhow::Result;
use im_gateway::{GatewayHub, WireRouteLink};
use im_store::LogStore;
use structopt::StructOpt;

use config::Config;

const DEFAULT_CONFIG_FILENAME: &str = ".im-gateway";

#[derive(StructOpt)]
struct Options {
    /// Path of the config file
    pub config: Option<String>,
}

async fn run() -> Result<()> {
    let options: Options = Options::from_args();
    let config: Config = im_common::config::load_config(options.config, DEFAULT_CONFIG_FILENAME)?;

    let store = Arc::new(LogStore::open(config.data_dir.clone()).await?);
    tokio::spawn(store.clone().run_index_flush_loop());

    let (inbound_tx, inbound_rx) = tokio::sync::mpsc::channel(256);
    let route = WireRouteLink::connect(&config.router_addr, inbound_tx).await?;

    let hub = Arc::new(GatewayHub::new(store, route, config.gateway_config()));
    tokio::spawn(server::run_broker_relay(hub.clone(), inbound_rx));

    let admin_hub = hub.clone();
    let admin_listen: std::net::SocketAddr = config.admin_listen.parse()?;
    tokio::spawn(async move {
        warp::serve(api::routes(admin_hub)).run(admin_listen).await;
    });

    let redis_client = redis::Client::open(config.redis_url.as_str())?;
    server::run(hub, redis_client, &config.listen).await
}

#[tokio::main]
async fn main() {
    im_common::tracing_init::init_tracing();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "failed to start gateway");
    }
}
