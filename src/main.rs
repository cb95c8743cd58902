use bookshelf::{
    config::{AppConfig, Environment},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(config.env);
    for warning in config.startup_warnings() {
        tracing::warn!("{warning}");
    }

    tracing::info!(env = ?config.env, "starting bookshelf");
    let state = AppState::init(config.clone()).await?;
    let app = bookshelf::build_app(state);

    bookshelf::serve(app, &config.host, config.port).await
}

fn init_tracing(env: Environment) {
    let default_filter = match env {
        Environment::Production => "bookshelf=info,tower_http=info",
        _ => "bookshelf=debug,axum=info,tower_http=info",
    };
    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(env == Environment::Production);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}
