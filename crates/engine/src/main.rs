//! IP geolocation engine binary
//!
//! This is the composition root: it assembles adapters, wires them to ports,
//! and starts the HTTP server and background workers.

mod composition;
mod run;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run::run().await
}
