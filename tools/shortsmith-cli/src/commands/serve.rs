//! Run the HTTP export server.

use std::net::SocketAddr;

use shortsmith_common::config::AppConfig;

use crate::server;

pub async fn run(mut config: AppConfig, bind: Option<SocketAddr>) -> anyhow::Result<()> {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    println!("Shortsmith export server on http://{}", config.server.bind);
    println!("  Downloads: {}", config.server.downloads_dir.display());
    server::serve(config).await
}
