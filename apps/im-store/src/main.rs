#![forbid(unsafe_code)]

mod api;
mod config;
mod replica;
mod server;

use std::sync::Arc;

use anyhow::Result;
use im_store::LogStore;
use structopt::StructOpt;

use config::Config;

const DEFAULT_CONFIG_FILENAME: &str = ".im-store";

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

    let admin_store = store.clone();
    let admin_listen: std::net::SocketAddr = config.admin_listen.parse()?;
    tokio::spawn(async move {
        warp::serve(api::routes(admin_store)).run(admin_listen).await;
    });

    let shutdown_store = store.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            if let Err(err) = shutdown_store.flush_now().await {
                tracing::warn!(%err, "final index flush on shutdown failed");
            }
        }
    });

    if let Some(primary_addr) = config.primary_addr.clone() {
        tokio::spawn(replica::run(store.clone(), primary_addr));
    }

    server::run(store, &config.listen).await
}

#[tokio::main]
async fn main() {
    im_common::tracing_init::init_tracing();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "failed to start store");
    }
}
