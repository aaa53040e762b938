use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{
    auth::claims::{BrokerClaims, Claims},
    config::{JwtConfig, MAX_TTL_MINUTES},
    state::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidToken => TokenError::Malformed,
            // Anything past the structural split means the signed bytes are not ours.
            _ => TokenError::InvalidSignature,
        }
    }
}

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::new(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::from_secs(cfg.ttl_minutes.clamp(0, MAX_TTL_MINUTES) as u64 * 60),
        }
    }

    pub fn issue(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.issue_at(user_id, OffsetDateTime::now_utc())
    }

    pub fn issue_at(&self, user_id: Uuid, now: OffsetDateTime) -> anyhow::Result<String> {
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        ensure_three_segments(token)?;
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims.sub)
    }
}

/// Verifies a profile assertion handed over by the identity broker.
pub fn verify_broker_assertion(assertion: &str, secret: &str) -> Result<BrokerClaims, TokenError> {
    ensure_three_segments(assertion)?;
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    let data = decode::<BrokerClaims>(
        assertion,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

fn ensure_three_segments(token: &str) -> Result<(), TokenError> {
    let mut parts = token.split('.');
    let well_formed = (0..3).all(|_| parts.next().is_some_and(|p| !p.is_empty()))
        && parts.next().is_none();
    if well_formed {
        Ok(())
    } else {
        Err(TokenError::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 60 * 24 * 30,
        })
    }

    #[test]
    fn issue_then_verify_returns_subject() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let user_id = Uuid::new_v4();
        let token = keys.issue(user_id).expect("issue");
        assert_eq!(keys.verify(&token), Ok(user_id));
    }

    #[test]
    fn oversized_ttl_is_capped_instead_of_overflowing() {
        let keys = JwtKeys::new(&JwtConfig {
            secret: "dev-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: i64::MAX,
        });
        assert_eq!(keys.ttl, Duration::from_secs(MAX_TTL_MINUTES as u64 * 60));
        let user_id = Uuid::new_v4();
        let token = keys.issue(user_id).expect("issue");
        assert_eq!(keys.verify(&token), Ok(user_id));
    }

    #[test]
    fn default_ttl_is_thirty_days() {
        let keys = make_keys("dev-secret", "iss", "aud");
        assert_eq!(keys.ttl, Duration::from_secs(30 * 24 * 60 * 60));
    }

    #[test]
    fn expiry_boundary() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let ttl = TimeDuration::seconds(keys.ttl.as_secs() as i64);
        let now = OffsetDateTime::now_utc();
        let user_id = Uuid::new_v4();

        let expired = keys
            .issue_at(user_id, now - ttl - TimeDuration::seconds(1))
            .unwrap();
        assert_eq!(keys.verify(&expired), Err(TokenError::Expired));

        let about_to_expire = keys
            .issue_at(user_id, now - ttl + TimeDuration::seconds(1))
            .unwrap();
        assert_eq!(keys.verify(&about_to_expire), Ok(user_id));
    }

    #[test]
    fn tampering_any_byte_invalidates_signature() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let token = keys.issue(Uuid::new_v4()).unwrap();

        for (i, c) in token.char_indices() {
            if c == '.' {
                continue;
            }
            let replacement = if c == 'A' { 'B' } else { 'A' };
            let mut tampered = token.clone();
            tampered.replace_range(i..i + 1, &replacement.to_string());
            assert_eq!(
                keys.verify(&tampered),
                Err(TokenError::InvalidSignature),
                "byte {i} tampered"
            );
        }
    }

    #[test]
    fn wrong_secret_is_invalid_signature() {
        let good = make_keys("secret-a", "iss", "aud");
        let other = make_keys("secret-b", "iss", "aud");
        let token = good.issue(Uuid::new_v4()).unwrap();
        assert_eq!(other.verify(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn wrong_issuer_or_audience_is_rejected() {
        let good = make_keys("same-secret", "good-iss", "good-aud");
        let bad = make_keys("same-secret", "bad-iss", "bad-aud");
        let token = good.issue(Uuid::new_v4()).unwrap();
        assert!(bad.verify(&token).is_err());
    }

    #[test]
    fn unparseable_tokens_are_malformed() {
        let keys = make_keys("dev-secret", "iss", "aud");
        for token in ["", "abc", "a.b", "a..c", "a.b.c.d", ".b.c"] {
            assert_eq!(keys.verify(token), Err(TokenError::Malformed), "{token:?}");
        }
    }

    #[test]
    fn broker_assertion_roundtrip_and_expiry() {
        let secret = "google-client-secret";
        let exp = (OffsetDateTime::now_utc() + TimeDuration::minutes(5)).unix_timestamp();
        let claims = BrokerClaims {
            email: "ana@x.com".into(),
            name: Some("Ana".into()),
            exp,
        };
        let assertion = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        let decoded = verify_broker_assertion(&assertion, secret).expect("valid assertion");
        assert_eq!(decoded.email, "ana@x.com");
        assert_eq!(
            verify_broker_assertion(&assertion, "other-secret").unwrap_err(),
            TokenError::InvalidSignature
        );

        let stale = BrokerClaims {
            exp: (OffsetDateTime::now_utc() - TimeDuration::minutes(5)).unix_timestamp(),
            ..claims
        };
        let stale = encode(
            &Header::new(Algorithm::HS256),
            &stale,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        assert_eq!(
            verify_broker_assertion(&stale, secret).unwrap_err(),
            TokenError::Expired
        );
    }
}
