use axum::extract::FromRef;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{ChangePasswordRequest, LoginRequest, MockLoginRequest, RegisterRequest},
        jwt::{verify_broker_assertion, JwtKeys, TokenError},
        password::{dummy_hash, hash_blocking, verify_blocking},
        repo::StoreError,
        repo_types::{NewUser, Provider, User},
        validation::{is_valid_email, normalize_email, validate_password_change, validate_registration},
    },
    error::AppError,
    state::AppState,
};

pub const MOCK_PASSWORD: &str = "123456";
const MOCK_DEFAULT_NAME: &str = "Demo User";

/// A user together with a freshly issued bearer token.
#[derive(Debug)]
pub struct Session {
    pub user: User,
    pub token: String,
}

fn issue(st: &AppState, user: User) -> Result<Session, AppError> {
    let token = JwtKeys::from_ref(st).issue(user.id)?;
    Ok(Session { user, token })
}

pub async fn register(st: &AppState, req: RegisterRequest) -> Result<Session, AppError> {
    let reg = validate_registration(req).inspect_err(|e| warn!(error = %e, "register rejected"))?;

    let hash = hash_blocking(reg.password).await?;
    // The store's unique constraint decides races between concurrent registrations.
    let user = st
        .store
        .create(NewUser {
            name: reg.name,
            email: reg.email,
            password_hash: Some(hash),
            provider: Provider::Local,
        })
        .await
        .inspect_err(|e| {
            if matches!(e, StoreError::DuplicateEmail) {
                warn!("email already registered");
            }
        })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    issue(st, user)
}

pub async fn login(st: &AppState, req: LoginRequest) -> Result<Session, AppError> {
    let (Some(email), Some(password)) = (
        req.email.as_deref().filter(|v| !v.trim().is_empty()),
        req.password.filter(|v| !v.is_empty()),
    ) else {
        return Err(AppError::validation("Email and password are required"));
    };
    let email = normalize_email(email);

    let Some(user) = st.store.find_by_email(&email).await? else {
        // Pay the same hashing cost as a known account.
        let dummy = dummy_hash().await?.to_string();
        verify_blocking(password, Some(dummy)).await?;
        warn!(email = %email, "login unknown email");
        return Err(AppError::invalid_credentials());
    };

    if !verify_blocking(password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::invalid_credentials());
    }

    if !user.is_active {
        warn!(user_id = %user.id, "login inactive user");
        return Err(AppError::invalid_credentials());
    }

    info!(user_id = %user.id, "user logged in");
    issue(st, user)
}

/// Demo shortcut: fetch-or-create by email without checking any credential.
pub async fn mock_login(st: &AppState, req: MockLoginRequest) -> Result<Session, AppError> {
    let Some(email) = req.email.as_deref().filter(|v| !v.trim().is_empty()) else {
        return Err(AppError::validation("Email is required"));
    };
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(AppError::validation("Invalid email"));
    }

    let user = match st.store.find_by_email(&email).await? {
        Some(user) => user,
        None => {
            let name = req
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| MOCK_DEFAULT_NAME.to_string());
            let hash = hash_blocking(MOCK_PASSWORD.to_string()).await?;
            let new = NewUser {
                name,
                email: email.clone(),
                password_hash: Some(hash),
                provider: Provider::Local,
            };
            find_or_create(st, new).await?
        }
    };

    if !user.is_active {
        warn!(user_id = %user.id, "mock login inactive user");
        return Err(AppError::invalid_credentials());
    }

    info!(user_id = %user.id, "mock login");
    issue(st, user)
}

/// Completes a social login handed over by the identity broker. Unknown emails
/// get a shadow account without a local password.
pub async fn oauth_login(st: &AppState, provider: &str, assertion: &str) -> Result<Session, AppError> {
    let provider: Provider = provider
        .parse()
        .ok()
        .filter(|p| *p != Provider::Local)
        .ok_or_else(|| AppError::validation("Unknown identity provider"))?;
    let Some(cfg) = st.config.provider(provider) else {
        return Err(AppError::validation("Identity provider not enabled"));
    };

    let profile = verify_broker_assertion(assertion, &cfg.client_secret).map_err(|e| {
        warn!(%provider, error = %e, "broker assertion rejected");
        AppError::invalid_credentials()
    })?;

    let email = normalize_email(&profile.email);
    if !is_valid_email(&email) {
        return Err(AppError::validation("Invalid email"));
    }

    let user = match st.store.find_by_email(&email).await? {
        Some(user) => user,
        None => {
            let name = profile
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("{provider} user"));
            let user = find_or_create(
                st,
                NewUser {
                    name,
                    email,
                    password_hash: None,
                    provider,
                },
            )
            .await?;
            info!(user_id = %user.id, %provider, "shadow account created");
            user
        }
    };

    if !user.is_active {
        warn!(user_id = %user.id, "oauth login inactive user");
        return Err(AppError::invalid_credentials());
    }

    issue(st, user)
}

/// Create, or return the row a concurrent request inserted first.
async fn find_or_create(st: &AppState, new: NewUser) -> Result<User, AppError> {
    let email = new.email.clone();
    match st.store.create(new).await {
        Ok(user) => Ok(user),
        Err(StoreError::DuplicateEmail) => st
            .store
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("user vanished after duplicate insert"))),
        Err(e) => Err(e.into()),
    }
}

pub fn verify_token(st: &AppState, token: &str) -> Result<Uuid, TokenError> {
    JwtKeys::from_ref(st).verify(token)
}

/// Gate's resolve step: only existing, active users become principals.
pub async fn resolve_principal(st: &AppState, user_id: Uuid) -> Result<User, AppError> {
    match st.store.find_by_id(user_id).await? {
        Some(user) if user.is_active => Ok(user),
        Some(_) => {
            warn!(%user_id, "token for inactive user");
            Err(AppError::Authentication("Not authorized".into()))
        }
        None => {
            warn!(%user_id, "token for unknown user");
            Err(AppError::Authentication("Not authorized".into()))
        }
    }
}

pub async fn change_password(
    st: &AppState,
    user_id: Uuid,
    req: ChangePasswordRequest,
) -> Result<User, AppError> {
    let (current, new) = validate_password_change(req)?;

    // Re-read to get the hash; principals never carry it.
    let user = resolve_principal(st, user_id).await?;
    if !verify_blocking(current, user.password_hash.clone()).await? {
        warn!(%user_id, "password change with wrong current password");
        return Err(AppError::invalid_credentials());
    }

    let hash = hash_blocking(new).await?;
    let updated = st
        .store
        .update_password(user_id, &hash)
        .await?
        .ok_or_else(|| AppError::Authentication("Not authorized".into()))?;
    info!(%user_id, "password changed");
    Ok(updated)
}

pub async fn deactivate(st: &AppState, user_id: Uuid) -> Result<(), AppError> {
    st.store
        .deactivate(user_id)
        .await?
        .ok_or_else(|| AppError::Authentication("Not authorized".into()))?;
    info!(%user_id, "account deactivated");
    Ok(())
}
