use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::{
    claims::Identity,
    dto::{LoginRequest, PublicUser, RegisterRequest, RegisteredUser},
    jwt::JwtKeys,
    password::{hash_password, verify_password},
    repo::{UserStore, DUPLICATE_USER},
};
use crate::error::{AppError, AppResult};

pub const REGISTER_FIELDS_REQUIRED: &str = "Username, email, and password are required";
pub const LOGIN_FIELDS_REQUIRED: &str = "Email and password are required";
pub const INVALID_EMAIL: &str = "Invalid email format";
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(
            r"^[a-zA-Z0-9!#$%&'*+/=?^_`{|}~-]+(\.[a-zA-Z0-9!#$%&'*+/=?^_`{|}~-]+)*@([a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,63}$"
        )
        .unwrap();
    }
    let Some((local, _)) = email.split_once('@') else {
        return false;
    };
    email.len() <= 254 && local.len() <= 64 && EMAIL_RE.is_match(email)
}

/// First failing rule wins: length, uppercase, lowercase, digit.
pub(crate) fn check_password_strength(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err("Password must be at least 8 characters");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("Password must contain at least one uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err("Password must contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one number");
    }
    Ok(())
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Run a CPU-heavy closure (argon2) off the async workers.
async fn blocking<T, F>(f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    let out = tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("blocking task: {e}")))??;
    Ok(out)
}

pub async fn register(store: &dyn UserStore, req: RegisterRequest) -> AppResult<RegisteredUser> {
    let username = present(req.username);
    let email = present(req.email).map(|e| normalize_email(&e));
    let password = req.password.filter(|p| !p.is_empty());
    let (Some(username), Some(email), Some(password)) = (username, email, password) else {
        return Err(AppError::Validation(REGISTER_FIELDS_REQUIRED.into()));
    };

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::Validation(INVALID_EMAIL.into()));
    }
    if let Err(rule) = check_password_strength(&password) {
        return Err(AppError::Validation(rule.into()));
    }

    if store.exists(&email, &username).await? {
        warn!(email = %email, username = %username, "user already exists");
        return Err(AppError::Conflict(DUPLICATE_USER.into()));
    }

    let hash = blocking(move || hash_password(&password)).await?;
    let user = store.create(&username, &email, &hash).await?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(user.into())
}

/// Returns a signed token and the public user. Unknown email and wrong
/// password fail identically.
pub async fn login(
    store: &dyn UserStore,
    keys: &JwtKeys,
    req: LoginRequest,
) -> AppResult<(String, PublicUser)> {
    let email = present(req.email).map(|e| normalize_email(&e));
    let password = req.password.filter(|p| !p.is_empty());
    let (Some(email), Some(password)) = (email, password) else {
        return Err(AppError::Validation(LOGIN_FIELDS_REQUIRED.into()));
    };

    let Some(user) = store.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::Unauthenticated(INVALID_CREDENTIALS.into()));
    };

    let stored = user.password_hash.clone();
    if !blocking(move || verify_password(&password, &stored)).await? {
        warn!(user_id = user.id, "login invalid password");
        return Err(AppError::Unauthenticated(INVALID_CREDENTIALS.into()));
    }

    let token = keys.sign(&Identity {
        user_id: user.id,
        email: user.email.clone(),
    })?;

    info!(user_id = user.id, "user logged in");
    Ok((token, user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_emails() {
        for email in ["test@test.com", "a.b+c@mail.example.org", "x_y@sub-domain.io"] {
            assert!(is_valid_email(email), "{email}");
        }
    }

    #[test]
    fn rejects_malformed_emails() {
        for email in [
            "invalid-email",
            "@example.com",
            "user@",
            "user@localhost",
            "user@@example.com",
            "us er@example.com",
            ".user@example.com",
            "user..name@example.com",
            "user@-example.com",
            "user@example.c",
        ] {
            assert!(!is_valid_email(email), "{email}");
        }
    }

    #[test]
    fn password_rules_apply_in_order() {
        assert_eq!(
            check_password_strength("weak"),
            Err("Password must be at least 8 characters")
        );
        // Short and lacking everything else still reports length first.
        assert_eq!(
            check_password_strength("1234"),
            Err("Password must be at least 8 characters")
        );
        assert_eq!(
            check_password_strength("password1"),
            Err("Password must contain at least one uppercase letter")
        );
        assert_eq!(
            check_password_strength("PASSWORD1"),
            Err("Password must contain at least one lowercase letter")
        );
        assert_eq!(
            check_password_strength("Password"),
            Err("Password must contain at least one number")
        );
        assert_eq!(check_password_strength("Password1"), Ok(()));
    }

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Test@Example.COM "), "test@example.com");
    }
}
