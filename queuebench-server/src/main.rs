use clap::Parser;
use queuebench_server::{config::DEFAULT_ADDRESS, Server, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "queuebench-server", about = "Serve queuebench results read-only")]
struct Args {
    /// Directory containing results.json and queues-*.json
    #[arg(long, env = "QUEUEBENCH_OUTPUT_DIR", default_value = "results")]
    dir: PathBuf,

    /// Address to listen on
    #[arg(long, env = "QUEUEBENCH_SERVE", default_value = DEFAULT_ADDRESS)]
    address: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = ServerConfig { address: args.address, dir: args.dir };

    let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();

    // Print the URL once the server signals it is bound.
    tokio::spawn(async move {
        if let Ok(addr) = ready_rx.await {
            println!("View results at http://{}", addr);
        }
    });

    Server::new(config).run(ready_tx).await?;
    Ok(())
}
