mod app;
mod auth;
mod config;
mod error;
mod routes;
mod state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "mediavault=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;
    tracing::info!(
        env = ?app_state.config.env,
        mock_login = app_state.config.mock_login_enabled,
        providers = app_state.config.providers.len(),
        "configuration loaded"
    );
    for p in &app_state.config.providers {
        tracing::info!(
            provider = %p.provider,
            client_id = %p.client_id,
            callback_url = ?p.callback_url,
            "identity provider enabled"
        );
    }

    app::serve(app::build_app(app_state)).await
}
