mod capture;
mod cli;
mod config;
mod event;
mod resolver;
mod storage;
#[cfg(test)]
mod testing;
mod watcher;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
