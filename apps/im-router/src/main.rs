#![forbid(unsafe_code)]

mod api;
mod config;
mod server;

use std::sync::Arc;

use anyhow::Result;
use im_router::{Broker, PushQueue};
use structopt::StructOpt;

use config::Config;

const DEFAULT_CONFIG_FILENAME: &str = ".im-router";

#[derive(StructOpt)]
struct Options {
    /// Path of the config file
    pub config: Option<String>,
}

async fn run() -> Result<()> {
    let options: Options = Options::from_args();
    let config: Config = im_common::config::load_config(options.config, DEFAULT_CONFIG_FILENAME)?;

    let push = PushQueue::connect(&config.redis_url).await?;
    let broker = Arc::new(Broker::new(push));

    let admin_broker = broker.clone();
    let admin_listen: std::net::SocketAddr = config.admin_listen.parse()?;
    tokio::spawn(async move {
        warp::serve(api::routes(admin_broker)).run(admin_listen).await;
    });

    server::run(broker, &config.listen).await
}

#[tokio::main]
async fn main() {
    im_common::tracing_init::init_tracing();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "failed to start router");
    }
}
