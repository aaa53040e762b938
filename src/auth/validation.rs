use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    auth::{
        dto::{ChangePasswordRequest, RegisterRequest},
        password::MIN_PASSWORD_LEN,
    },
    error::AppError,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^\w+([.-]?\w+)*@\w+([.-]?\w+)*(\.\w{2,3})+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.trim().is_empty())
}

#[derive(Debug)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub fn validate_registration(req: RegisterRequest) -> Result<Registration, AppError> {
    let (Some(name), Some(email), Some(password), Some(confirm)) = (
        present(&req.name),
        present(&req.email),
        present(&req.password),
        present(&req.confirm_password),
    ) else {
        return Err(AppError::validation("All fields are required"));
    };

    let email = normalize_email(email);
    let mut errors = Vec::new();
    if !is_valid_email(&email) {
        errors.push("Invalid email".to_string());
    }
    errors.extend(password_errors(password, confirm));
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    Ok(Registration {
        name: name.trim().to_string(),
        email,
        password: password.to_string(),
    })
}

/// Returns (current, new) when the request is well-formed.
pub fn validate_password_change(req: ChangePasswordRequest) -> Result<(String, String), AppError> {
    let (Some(current), Some(new), Some(confirm)) = (
        present(&req.current_password),
        present(&req.new_password),
        present(&req.confirm_password),
    ) else {
        return Err(AppError::validation("All fields are required"));
    };
    let errors = password_errors(new, confirm);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    Ok((current.to_string(), new.to_string()))
}

fn password_errors(password: &str, confirm: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    if password != confirm {
        errors.push("Passwords do not match".to_string());
    }
    errors
}
