use std::net::SocketAddr;

use clap::Parser;
use tokio::net::TcpListener;

/// Standalone copy of the test target, for poking at vigil by hand.
#[derive(Debug, Parser)]
#[command(name = "vigil-testserver", about, after_help = "Prints HTTP_URL=<url> to stdout once ready.")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:0")]
    bind: SocketAddr,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let listener = TcpListener::bind(args.bind).await?;
    let app = vigil_testserver::router(vigil_testserver::TestServerStats::default());

    println!("HTTP_URL=http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
