//! WebSocket relay server for room-scoped message broadcast.
//!
//! Clients connect to `/ws?room=<key>`, announce a display name, and
//! exchange messages with the other members of their room.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin zashiki-server
//! cargo run --bin zashiki-server -- --host 0.0.0.0 --port 3000
//! ```

use clap::Parser;

use zashiki_server::server::run_server;
use zashiki_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "zashiki-server")]
#[command(about = "WebSocket relay server with room-scoped broadcast", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_PKG_NAME"), "debug");

    let args = Args::parse();

    if let Err(e) = run_server(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
