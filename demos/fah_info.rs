//! Example: Ask a Folding@home client for its build and system info
//!
//! Usage:
//!   cargo run --example fah_info -- <host> [port]
//!
//! Example:
//!   cargo run --example fah_info -- 127.0.0.1 36330

use pyon_transport::config::DEFAULT_PORT;
use pyon_transport::{ClientConfig, CommandDispatcher, MessageReader, PyonConnection, Result};
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <host> [port]", args[0]);
        eprintln!("Example: {} 127.0.0.1 {}", args[0], DEFAULT_PORT);
        std::process::exit(1);
    }

    let host = &args[1];
    let port = match args.get(2) {
        Some(port) => port
            .parse()
            .map_err(|_| pyon_transport::PyonError::invalid_argument(format!("bad port: {port}")))?,
        None => DEFAULT_PORT,
    };

    let conn = Arc::new(PyonConnection::new(ClientConfig::new(host.as_str(), port))?);
    conn.on_connected_changed(|connected| println!("connected: {connected}"));
    conn.open().await?;

    CommandDispatcher::new(Arc::clone(&conn)).execute("info").await?;

    let mut reader = MessageReader::new(Arc::clone(&conn));
    if reader.read().await? {
        if let Some(msg) = reader.take_message() {
            println!("{}", msg.identifier);
            println!("{}", msg.text);
        }
    } else {
        println!("No message received");
    }

    conn.close();
    Ok(())
}
