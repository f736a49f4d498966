// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keeper server binary entry point.

use keeper_server::{KeeperServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("keeper_server=info".parse()?)
                .add_directive("keeper_core=info".parse()?),
        )
        .init();

    let config = ServerConfig::from_env()?;

    KeeperServer::new(config).serve().await?;

    Ok(())
}
