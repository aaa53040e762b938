use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json,
};
use serde::Serialize;
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ChangePasswordRequest, LoginRequest, MessageResponse, MockLoginRequest,
            OAuthCallbackRequest, PublicUser, RegisterRequest, VerifyResponse,
        },
        extractors::{bearer_token, ApiJson, Principal},
        services::{self, Session},
    },
    error::AppError,
    routes::{Access, RouteTable},
    state::AppState,
};

pub fn auth_routes(state: AppState) -> RouteTable {
    let mock_login_enabled = state.config.mock_login_enabled;

    let mut table = RouteTable::new(state)
        .route("/auth/register", Access::Public, post(register))
        .route("/auth/login", Access::Public, post(login))
        .route("/auth/verify", Access::Public, get(verify))
        .route("/auth/logout", Access::Public, post(logout))
        .route("/auth/me", Access::RequiresAuth, get(me))
        .route("/auth/password", Access::RequiresAuth, post(change_password))
        .route("/auth/account", Access::RequiresAuth, delete(deactivate_account))
        // Unknown or disabled providers are answered by the handler with 400.
        .route(
            "/auth/oauth/:provider/callback",
            Access::Public,
            post(oauth_callback),
        );

    if mock_login_enabled {
        table = table.route("/auth/mock-login", Access::Public, post(mock_login));
    }
    table
}

fn auth_response(session: Session, message: &str) -> Json<AuthResponse> {
    Json(AuthResponse {
        success: true,
        user: PublicUser::from(&session.user),
        token: session.token,
        message: message.into(),
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let session = services::register(&state, payload).await?;
    Ok((StatusCode::CREATED, auth_response(session, "User registered")))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let session = services::login(&state, payload).await?;
    Ok(auth_response(session, "Logged in"))
}

#[instrument(skip(state, payload))]
pub async fn mock_login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<MockLoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let session = services::mock_login(&state, payload).await?;
    Ok(auth_response(session, "Demo login"))
}

#[instrument(skip(state, payload))]
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    ApiJson(payload): ApiJson<OAuthCallbackRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let session = services::oauth_login(&state, &provider, &payload.assertion).await?;
    Ok(auth_response(session, "Logged in"))
}

#[instrument(skip_all)]
pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> (StatusCode, Json<VerifyResponse>) {
    let invalid = |message: &str| {
        (
            StatusCode::UNAUTHORIZED,
            Json(VerifyResponse {
                valid: false,
                message: message.into(),
            }),
        )
    };

    let Some(token) = bearer_token(&headers) else {
        return invalid("Token not provided");
    };
    match services::verify_token(&state, token) {
        Ok(_) => (
            StatusCode::OK,
            Json(VerifyResponse {
                valid: true,
                message: "Token valid".into(),
            }),
        ),
        Err(e) => {
            warn!(error = %e, "verify rejected token");
            invalid("Token invalid")
        }
    }
}

/// Tokens are stateless; the client discards its copy.
pub async fn logout() -> Json<MessageResponse> {
    Json(MessageResponse::ok("Logged out"))
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub success: bool,
    pub user: Principal,
}

#[instrument(skip_all, fields(user_id = %principal.id))]
pub async fn me(principal: Principal) -> Json<MeResponse> {
    Json(MeResponse {
        success: true,
        user: principal,
    })
}

#[instrument(skip_all, fields(user_id = %principal.id))]
pub async fn change_password(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    services::change_password(&state, principal.id, payload).await?;
    Ok(Json(MessageResponse::ok("Password changed")))
}

#[instrument(skip_all, fields(user_id = %principal.id))]
pub async fn deactivate_account(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<MessageResponse>, AppError> {
    services::deactivate(&state, principal.id).await?;
    Ok(Json(MessageResponse::ok("Account deactivated")))
}
