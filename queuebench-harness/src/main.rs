use clap::Parser;
use queuebench_client::{Client, ClientConfig};
use queuebench_harness::config::Settings;
use queuebench_harness::orchestrator::{Orchestrator, RunPlan};
use queuebench_harness::report;
use queuebench_server::{Server, ServerConfig};
use std::process;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::parse();

    // Every configuration problem surfaces here, before any request is sent.
    let orchestrator = build_orchestrator(&settings).unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {e}");
        process::exit(3);
    });
    let thresholds = settings.thresholds().unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {e}");
        process::exit(3);
    });

    let report = orchestrator.run().await;

    match report::persist(&report, &settings.output_dir) {
        Ok(paths) => {
            for path in paths {
                info!(path = %path.display(), "wrote report");
            }
        }
        Err(e) => {
            eprintln!("Failed to save results: {e}");
            process::exit(4);
        }
    }

    report::print_report(&report, &thresholds);

    let exit_code = if report::passes(&report.stages, &thresholds) { 0 } else { 1 };

    if let Some(address) = settings.serve {
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            if let Ok(addr) = ready_rx.await {
                println!("View results at http://{}", addr);
            }
        });
        let config = ServerConfig { address, dir: settings.output_dir.clone() };
        if let Err(e) = Server::new(config).run(ready_tx).await {
            error!(error = %e, "results server stopped");
            process::exit(3);
        }
    }

    process::exit(exit_code);
}

fn build_orchestrator(
    settings: &Settings,
) -> Result<Orchestrator<Client>, queuebench_common::ConfigError> {
    let plan = RunPlan::new(settings.registry()?, settings.stages()?)?;
    let client = Client::new(ClientConfig { timeout: settings.request_timeout()? });
    Orchestrator::new(
        plan,
        Arc::new(client),
        settings.providers()?,
        settings.sampler_config()?,
        settings.drain_config()?,
    )
}
