use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use userpool_local::config::Config;
use userpool_local::context::Context;
use userpool_local::messages::{ConsoleMessageDelivery, Messages};
use userpool_local::services::{CognitoService, RandomOtp, SystemClock};
use userpool_local::store::DataStoreFactory;
use userpool_local::token::{KeyMaterial, TokenGenerator};
use userpool_local::triggers::{LambdaClient, Triggers};
use userpool_local::{api, AppState, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "userpool_local=info".into()),
        )
        .init();

    // Load config
    let config = Config::from_env()?;
    info!("userpool-local v{}", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}:{}", config.host, config.port);
    info!("Data directory: {}", config.data_dir.display());

    // Assemble the collaborator graph
    let ctx = Context::internal();
    let clock = Arc::new(SystemClock);
    let otp = Arc::new(RandomOtp);

    let factory = Arc::new(DataStoreFactory::new(config.data_dir.clone()));
    let cognito = CognitoService::open(&ctx, factory, clock.clone())
        .await
        .map_err(|e| anyhow::anyhow!("opening data stores: {e}"))?;
    info!("Data stores ready ✓");

    let functions = config.trigger_functions();
    if !functions.is_empty() {
        info!(
            "Configured {} trigger function(s) against {}",
            functions.len(),
            config.lambda_endpoint
        );
    }
    let lambda = Arc::new(LambdaClient::new(config.lambda_endpoint.clone(), functions));
    let triggers = Arc::new(Triggers::new(lambda, clock.clone()));

    let messages = Messages::new(triggers.clone(), Arc::new(ConsoleMessageDelivery));
    let tokens = TokenGenerator::new(
        KeyMaterial::local().map_err(|e| anyhow::anyhow!("loading key material: {e}"))?,
        triggers.clone(),
        clock.clone(),
        config.token_issuer_host.clone(),
    );

    let addr = format!("{}:{}", config.host, config.port);
    let state: SharedState = Arc::new(AppState {
        config,
        clock,
        otp,
        cognito,
        triggers,
        messages,
        tokens,
    });

    // Build router and serve
    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server ready ✓");
    axum::serve(listener, app).await?;

    Ok(())
}
