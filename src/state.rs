use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::{
    auth::{memory::MemoryUserStore, repo::PgUserStore, repo::UserStore},
    config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = match &config.database_url {
            Some(url) => {
                let db = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;

                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;

                Arc::new(PgUserStore::new(db)) as Arc<dyn UserStore>
            }
            None => {
                tracing::warn!("DATABASE_URL not set; users are kept in memory and lost on restart");
                Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>
            }
        };

        Ok(Self::from_parts(store, config))
    }

    pub fn from_parts(store: Arc<dyn UserStore>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        use crate::auth::repo_types::Provider;
        use crate::config::{Environment, JwtConfig, ProviderConfig};

        let config = Arc::new(AppConfig {
            env: Environment::Development,
            database_url: None,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60 * 24 * 30,
            },
            mock_login_enabled: true,
            providers: vec![ProviderConfig {
                provider: Provider::Google,
                client_id: "google-client".into(),
                client_secret: "google-secret".into(),
                callback_url: None,
            }],
        });
        Self::from_parts(Arc::new(MemoryUserStore::new()), config)
    }
}
