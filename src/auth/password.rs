use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tokio::sync::OnceCell;
use tracing::{error, warn};

pub const MIN_PASSWORD_LEN: usize = 6;

static DUMMY_HASH: OnceCell<String> = OnceCell::const_new();

/// Argon2id with a fresh salt per call; returns a PHC string.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Never errors: a missing or unparseable hash, or an empty password, is a mismatch.
pub fn verify_password(plain: &str, hash: Option<&str>) -> bool {
    let Some(hash) = hash else {
        return false;
    };
    if plain.is_empty() {
        return false;
    }
    let parsed = match PasswordHash::new(hash) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "stored password hash is not a valid PHC string");
            return false;
        }
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}

pub async fn hash_blocking(plain: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .context("hash task panicked")?
}

pub async fn verify_blocking(plain: String, hash: Option<String>) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&plain, hash.as_deref()))
        .await
        .context("verify task panicked")
}

/// Hash with the same parameters as real accounts but no known preimage.
/// Checked on unknown-email logins so they cost as much as real ones.
pub async fn dummy_hash() -> anyhow::Result<&'static str> {
    let hash = DUMMY_HASH
        .get_or_try_init(|| {
            let mut seed = [0u8; 32];
            rand::RngCore::fill_bytes(&mut OsRng, &mut seed);
            let plain: String = seed.iter().map(|b| format!("{b:02x}")).collect();
            hash_blocking(plain)
        })
        .await?;
    Ok(hash.as_str())
}

#[cfg(test)]
pub(crate) fn dummy_hash_initialized() -> bool {
    DUMMY_HASH.initialized()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(hash.starts_with("$argon2"));
        assert_ne!(hash, password);
        assert!(verify_password(password, Some(&hash)));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password("correct-horse-battery-staple").expect("hashing should succeed");
        assert!(!verify_password("wrong-password", Some(&hash)));
    }

    #[test]
    fn same_input_hashes_differently() {
        let a = hash_password("secret1").unwrap();
        let b = hash_password("secret1").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("secret1", Some(&a)));
        assert!(verify_password("secret1", Some(&b)));
    }

    #[test]
    fn verify_fails_closed() {
        let hash = hash_password("secret1").unwrap();
        assert!(!verify_password("anything", Some("not-a-valid-hash")));
        assert!(!verify_password("secret1", None));
        assert!(!verify_password("", Some(&hash)));
    }

    #[tokio::test]
    async fn dummy_hash_is_stable_and_matches_nothing() {
        let a = dummy_hash().await.unwrap();
        let b = dummy_hash().await.unwrap();
        assert_eq!(a, b);
        assert!(PasswordHash::new(a).is_ok());
        assert!(a.starts_with("$argon2id$"));
        assert!(!verify_password("secret1", Some(a)));
        assert!(!verify_password("123456", Some(a)));
    }

    #[tokio::test]
    async fn blocking_wrappers_agree_with_sync_versions() {
        let hash = hash_blocking("secret1".into()).await.unwrap();
        assert!(verify_blocking("secret1".into(), Some(hash.clone())).await.unwrap());
        assert!(!verify_blocking("secret2".into(), Some(hash)).await.unwrap());
    }
}
