//! # OTUServer - Entry Point
//! src/main.rs
//!
//! Lee la configuración, instala el logging y los handlers de señales y
//! corre el servidor hasta recibir SIGINT o SIGTERM.

use otu_server::config::Config;
use otu_server::server::Server;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let config = Config::new();
    if let Err(e) = config.validate() {
        anyhow::bail!("invalid configuration: {}", e);
    }
    config.print_summary();

    let server = Server::bind(config)?;
    // El host puede resolver a varias direcciones; esta es la que quedó
    println!("Listening on {}", server.local_addr()?);

    // Antes de cualquier fork: Ctrl-C llega a todo el grupo y las réplicas
    // heredan el handler de SIGINT
    server.shutdown_token().register_signals()?;

    println!("server run");
    let result = server.run();
    println!("server stop");

    result
}
