use clap::Parser;
use mini_web::{handlers, Server};
use std::{net::IpAddr, path::PathBuf, process::ExitCode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Small HTTP/1.1 server with echo, user-agent and file routes.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Directory served and written by `/files/{filename}`
    #[arg(long, default_value = "/tmp")]
    directory: PathBuf,

    /// Port to listen on
    #[arg(long, default_value_t = 4221)]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mini_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    tracing::info!(
        host = %args.host,
        port = args.port,
        directory = %args.directory.display(),
        "starting server"
    );

    let server = match Server::builder()
        .host(args.host)
        .port(args.port)
        .router(handlers::router(args.directory))
        .build()
    {
        Ok(server) => server,
        Err(err) => {
            tracing::error!(error = %err, "failed to start server");
            return ExitCode::FAILURE;
        }
    };

    let close = server.close_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            close.close();
        }
    });

    match server.launch().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "server stopped");
            ExitCode::FAILURE
        }
    }
}
