use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,   // user ID
    pub iat: i64,    // issued at (unix timestamp)
    pub exp: i64,    // expires at (unix timestamp)
    pub iss: String, // issuer
    pub aud: String, // audience
}

/// Profile assertion minted by the identity broker after an OAuth exchange,
/// signed with the provider's client secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerClaims {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub exp: i64,
}
