use serde::Deserialize;

use crate::auth::repo_types::Provider;

const DEV_JWT_SECRET: &str = "mediavault-dev-secret-change-me";
const DEFAULT_TTL_MINUTES: i64 = 60 * 24 * 30;
/// One year. Longer lifetimes are refused at startup.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn from_env() -> anyhow::Result<Self> {
        match std::env::var("APP_ENV") {
            Err(_) => Ok(Self::Development),
            Ok(v) => match v.trim().to_lowercase().as_str() {
                "" | "dev" | "development" => Ok(Self::Development),
                "prod" | "production" => Ok(Self::Production),
                other => anyhow::bail!("unknown APP_ENV {other:?}"),
            },
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Credentials shared with the identity broker for one social provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub env: Environment,
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub mock_login_enabled: bool,
    pub providers: Vec<ProviderConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let env = Environment::from_env()?;

        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        if database_url.is_none() && env.is_production() {
            anyhow::bail!("DATABASE_URL must be set in production");
        }

        let secret = match std::env::var("JWT_SECRET") {
            Ok(s) if !s.is_empty() => s,
            _ if env.is_production() => anyhow::bail!("JWT_SECRET must be set in production"),
            _ => {
                tracing::warn!("JWT_SECRET not set; using development fallback secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "mediavault".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "mediavault-users".into()),
            ttl_minutes: parse_ttl_minutes(std::env::var("JWT_TTL_MINUTES").ok().as_deref())?,
        };

        let mock_login_enabled = std::env::var("MOCK_LOGIN_ENABLED")
            .ok()
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(!env.is_production());

        let providers = [Provider::Google, Provider::Facebook]
            .into_iter()
            .filter_map(provider_from_env)
            .collect();

        Ok(Self {
            env,
            database_url,
            jwt,
            mock_login_enabled,
            providers,
        })
    }

    pub fn provider(&self, provider: Provider) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.provider == provider)
    }
}

fn parse_ttl_minutes(raw: Option<&str>) -> anyhow::Result<i64> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(DEFAULT_TTL_MINUTES);
    };
    let minutes: i64 = raw
        .parse()
        .map_err(|_| anyhow::anyhow!("JWT_TTL_MINUTES must be an integer, got {raw:?}"))?;
    if !(1..=MAX_TTL_MINUTES).contains(&minutes) {
        anyhow::bail!("JWT_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}, got {minutes}");
    }
    Ok(minutes)
}

fn provider_from_env(provider: Provider) -> Option<ProviderConfig> {
    let prefix = provider.as_str().to_uppercase();
    let var = |name: &str| {
        std::env::var(format!("{prefix}_{name}"))
            .ok()
            .filter(|v| !v.is_empty())
    };
    Some(ProviderConfig {
        provider,
        client_id: var("CLIENT_ID")?,
        client_secret: var("CLIENT_SECRET")?,
        callback_url: var("CALLBACK_URL"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_defaults_to_thirty_days() {
        assert_eq!(parse_ttl_minutes(None).unwrap(), 43_200);
        assert_eq!(parse_ttl_minutes(Some("  ")).unwrap(), 43_200);
        assert_eq!(parse_ttl_minutes(Some("15")).unwrap(), 15);
        assert_eq!(parse_ttl_minutes(Some(&MAX_TTL_MINUTES.to_string())).unwrap(), MAX_TTL_MINUTES);
    }

    #[test]
    fn ttl_out_of_range_is_refused() {
        for raw in ["0", "-5", "abc", "525601", "9223372036854775807"] {
            assert!(parse_ttl_minutes(Some(raw)).is_err(), "{raw} should be refused");
        }
    }
}
