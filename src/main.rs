use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use seaguard::cli::Cli;
use seaguard::{
    AppState, KhoaClient, LanguageModel, MarineDataSource, OpenAiClient, SeaguardConfig,
    SeaguardError, VERSION, telemetry, web,
};

/// Build a provider client, or `None` when its credentials are absent
fn optional_provider<T>(name: &str, client: seaguard::Result<T>) -> Result<Option<T>> {
    match client {
        Ok(client) => Ok(Some(client)),
        Err(SeaguardError::ConfigurationMissing { message }) => {
            warn!("{} disabled: {}", name, message);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = SeaguardConfig::load_from_path(cli.config.clone())?;
    cli.apply(&mut config);

    let telemetry = telemetry::init(&config.logging, &config.telemetry, cli.verbose)?;
    info!("SeaGuard v{}", VERSION);

    let llm = optional_provider("LLM provider", OpenAiClient::new(&config.llm))?
        .map(|client| Arc::new(client) as Arc<dyn LanguageModel>);
    let marine = optional_provider("Marine data provider", KhoaClient::new(&config.marine))?
        .map(|client| Arc::new(client) as Arc<dyn MarineDataSource>);

    if let Some(llm) = &llm {
        info!("Using model {}", llm.model_name());
    }

    let result = web::run(&config.server, AppState::new(llm, marine)).await;
    telemetry.shutdown();
    result
}
