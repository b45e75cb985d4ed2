use clap::Parser;
use tracing_subscriber::EnvFilter;

use maya::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Env files first so RUST_LOG and MAYA_LOG_FORMAT from them apply.
    let _ = dotenvy::dotenv();
    maya::bootstrap::load_maya_env();

    init_tracing();

    let cli = Cli::parse();
    maya::cli::run(cli).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("maya=info"));
    let json = std::env::var("MAYA_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
