use clap::Parser;
use skilllink::client::cli_client::{run, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // load .env so KEYRING_FALLBACK and the SKILLLINK_* settings can live there
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    run(cli).await
}
