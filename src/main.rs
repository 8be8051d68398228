use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use std::sync::Arc;

use maildraft::completion::OpenRouterClient;
use maildraft::composer::Composer;
use maildraft::config::Config;
use maildraft::controller::FormController;
use maildraft::credential_store::CredentialStore;
use maildraft::gmail_client::GmailClient;
use maildraft::web::{self, AppState};

#[derive(Parser)]
#[command(name = "maildraft")]
#[command(about = "Draft emails with an LLM and send them through Gmail from a local web form")]
#[command(version)]
struct Args {
    /// Address the web form listens on (overrides SERVER_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port the web form listens on (overrides SERVER_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Check the configuration without starting the server
    #[arg(long)]
    check_config: bool,

    /// Run the Gmail consent flow now and store the token, then exit
    #[arg(long)]
    authorize: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load the .env file if there is one
    dotenv::dotenv().ok();

    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = Config::new()?;

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    if args.check_config {
        println!("✅ Configuration valid!");
        println!("🤖 OpenRouter: {} (model: {})", config.openrouter.endpoint, config.openrouter.model);
        println!("🔑 API key: {}", config.masked_api_key());
        println!("📧 Gmail API: {}", config.gmail.api_base_url);
        println!("🔐 Credentials: {}", config.gmail.credentials_path);
        println!("💾 Token cache: {}", config.gmail.token_cache_path);
        println!("🌐 Form: http://{}:{}", config.server.host, config.server.port);
        return Ok(());
    }

    let credential_store = Arc::new(CredentialStore::new(&config.gmail));

    if args.authorize {
        info!("🔐 Running Gmail authorization");
        credential_store
            .authorized_client()
            .await
            .context("Gmail authorization failed")?;
        println!("✅ Token stored to {}", config.gmail.token_cache_path);
        return Ok(());
    }

    let completion = OpenRouterClient::new(&config.openrouter)?;
    info!("🤖 Using model {}", completion.model());

    let gmail = GmailClient::new(&config.gmail, credential_store);
    let controller = FormController::new(
        Arc::new(completion),
        Arc::new(gmail),
        Composer::new(config.gmail.sender_address.clone()),
    );

    let state = AppState::new(
        Arc::new(controller),
        config.sender.clone(),
        config.server.max_upload_bytes,
    )
    .context("Unable to load page templates")?;

    info!("🚀 Starting AI email generator");

    if let Err(e) = web::serve(&config.server, state).await {
        error!("❌ Server error: {}", e);
        return Err(e).context("Web server stopped");
    }

    Ok(())
}
