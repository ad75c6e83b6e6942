use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;

use clap::Parser;
use sesam_odata::config::context::build_context;
use sesam_odata::config::schema::load_config;
use sesam_odata::frontend::http::run_server;
use sesam_odata::frontend::odata::metadata_document;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, subscriber};
use tracing_log::LogTracer;
use tracing_subscriber::filter::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "sesam_odata=info,warp=info";

#[derive(Debug, Parser)]
#[clap(name = "sesam-odata", version, about = "Read-only OData v4 gateway to a Sesam instance")]
struct Args {
    #[clap(short, long, help = "Path to the TOML config file")]
    config_path: Option<PathBuf>,

    #[clap(long, help = "Output logs in JSON format")]
    json_logs: bool,

    #[clap(
        long,
        help = "Discover the remote datasets, print the metadata document and exit"
    )]
    print_metadata: bool,
}

fn prepare_tracing(json_logs: bool) {
    // Redirect all `log`'s events to our subscriber, to collect warp's request logs
    if let Err(e) = LogTracer::init() {
        eprintln!("Failed to set up the log bridge: {e}");
    }

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse_lossy(std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| {
            DEFAULT_LOG_FILTER.to_string()
        }));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = if json_logs {
        subscriber::set_global_default(builder.json().finish())
    } else {
        subscriber::set_global_default(builder.finish())
    };
    if let Err(e) = result {
        eprintln!("Failed to set up logging: {e}");
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            error!("Couldn't listen for SIGTERM: {e}");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, shutting down"),
        _ = term.recv() => info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received Ctrl-C, shutting down");
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    prepare_tracing(args.json_logs);

    info!(
        "Starting sesam-odata {}",
        env!("CARGO_PKG_VERSION")
    );

    let config = match load_config(args.config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Error loading the config: {e}");
            exit(1);
        }
    };
    info!("Loaded the config: {config:?}");

    let context = match build_context(&config).await {
        Ok(context) => context,
        Err(e) => {
            error!("Couldn't start up: {e}");
            exit(1);
        }
    };

    if args.print_metadata {
        let document = metadata_document(context.schema.as_ref());
        match serde_json::to_string_pretty(&document) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                error!("Couldn't render the metadata document: {e}");
                exit(1);
            }
        }
        return;
    }

    let http = config.frontend.http.clone();
    if let Err(e) = run_server(Arc::new(context), http, shutdown_signal()).await {
        error!("{e}");
        exit(1);
    }
}
