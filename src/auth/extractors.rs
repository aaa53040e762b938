use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    auth::{
        repo_types::{Provider, User},
        services::{resolve_principal, verify_token},
    },
    error::AppError,
    state::AppState,
};

/// Authenticated user attached to a request by [`require_auth`].
/// Carries no password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub provider: Provider,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for Principal {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            provider: u.provider,
            is_active: u.is_active,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Reads `Authorization: Bearer <token>`. Anything else counts as no token.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Gate for routes declared `RequiresAuth`: extract, verify, resolve.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(token) = bearer_token(req.headers()) else {
        debug!("request without bearer token");
        return AppError::MissingToken.into_response();
    };

    // One message for every verification failure mode.
    let user_id = match verify_token(&state, token) {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "token rejected");
            return AppError::Authentication("Not authorized, token failed".into()).into_response();
        }
    };

    let user = match resolve_principal(&state, user_id).await {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    req.extensions_mut().insert(Principal::from(user));
    next.run(req).await
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Absent when the route was not declared RequiresAuth: deny.
        parts.extensions.get::<Principal>().cloned().ok_or_else(|| {
            warn!(path = %parts.uri.path(), "principal requested on unguarded route");
            AppError::MissingToken
        })
    }
}

/// JSON body whose rejections come back as 400 validation errors.
///
/// A body sent without a JSON content type is read as `{}`, so the handler's
/// own required-field checks produce the response.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(JsonRejection::MissingJsonContentType(_)) => {
                debug!("body without json content type read as empty object");
                serde_json::from_value(serde_json::json!({}))
                    .map(Self)
                    .map_err(|_| AppError::validation("All fields are required"))
            }
            Err(rejection) => {
                let detail = rejection.body_text();
                warn!(error = %detail, "request body rejected");
                Err(AppError::validation(format!("Malformed request body: {detail}")))
            }
        }
    }
}
