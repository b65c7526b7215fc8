//! Janus - Entry point

use clap::Parser;

use janus::Args;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = janus::run(args).await {
        tracing::error!(error = %format!("{e:#}"), "Janus exited with an error");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
