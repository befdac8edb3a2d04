//! The `glimpse serve` command: run the HTTP service.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Args;
use glimpse_core::{AskService, Config};

use crate::server;

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind (overrides `server.host`)
    #[arg(long, env = "GLIMPSE_HOST")]
    pub host: Option<String>,

    /// Port to listen on (overrides `server.port`)
    #[arg(short, long, env = "GLIMPSE_PORT")]
    pub port: Option<u16>,
}

/// Execute the serve command.
pub async fn execute(args: ServeArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| {
            anyhow::anyhow!(
                "Invalid listen address {}:{}: {e}",
                config.server.host,
                config.server.port
            )
        })?;

    let service = Arc::new(AskService::from_config(&config).await);
    server::serve(addr, service).await
}
