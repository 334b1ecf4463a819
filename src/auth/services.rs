use std::sync::Arc;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::{
    code::{codes_match, CodeGenerator},
    jwt::JwtKeys,
    notifier::Notifier,
    password::{hash_password, verify_against_dummy, verify_password},
    repo::{UserStore, VerificationStore},
    repo_types::User,
};
use crate::error::{AuthError, FieldViolation};

pub const CODE_TTL_MINUTES: i64 = 10;
pub const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Emails are matched case-insensitively: every lookup uses this form.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Returns every violation, not just the first.
pub fn validate_registration(email: &str, password: &str) -> Vec<FieldViolation> {
    let mut violations = Vec::new();
    if !is_valid_email(email) {
        violations.push(FieldViolation {
            field: "email",
            message: "Please provide a valid email",
        });
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        violations.push(FieldViolation {
            field: "password",
            message: "Password must be at least 8 characters long",
        });
    }
    violations
}

/// Registration, code verification and login over injected collaborators.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    codes: Arc<dyn VerificationStore>,
    notifier: Arc<dyn Notifier>,
    generator: Arc<dyn CodeGenerator>,
    keys: JwtKeys,
    notify_timeout: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        codes: Arc<dyn VerificationStore>,
        notifier: Arc<dyn Notifier>,
        generator: Arc<dyn CodeGenerator>,
        keys: JwtKeys,
        notify_timeout: Duration,
    ) -> Self {
        Self {
            users,
            codes,
            notifier,
            generator,
            keys,
            notify_timeout,
        }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    #[instrument(skip(self, password))]
    pub async fn register(&self, email: &str, password: &str) -> Result<Uuid, AuthError> {
        let email = normalize_email(email);

        let violations = validate_registration(&email, password);
        if !violations.is_empty() {
            warn!(email = %email, count = violations.len(), "registration rejected");
            return Err(AuthError::Validation(violations));
        }

        if self.users.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AuthError::DuplicateEmail);
        }

        let hash = hash_password(password)?;
        // A concurrent registration that slipped past the check above is
        // rejected here by the store's uniqueness guarantee.
        let user = self.users.create(&email, &hash).await?;

        self.send_code(&email).await?;

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(user.id)
    }

    /// Persists a fresh code, then attempts delivery. Delivery failures are
    /// logged and swallowed.
    async fn send_code(&self, email: &str) -> Result<(), AuthError> {
        let code = self.generator.next_code();
        let expires_at = OffsetDateTime::now_utc() + TimeDuration::minutes(CODE_TTL_MINUTES);
        let record_id = self.codes.insert(email, &code, expires_at).await?;

        match tokio::time::timeout(
            self.notify_timeout,
            self.notifier.send_verification_code(email, &code),
        )
        .await
        {
            Ok(Ok(())) => info!(%record_id, email = %email, "verification code sent"),
            Ok(Err(e)) => warn!(error = %e, email = %email, "error sending verification code"),
            Err(_) => warn!(
                email = %email,
                timeout_ms = self.notify_timeout.as_millis() as u64,
                "verification code delivery timed out"
            ),
        }
        Ok(())
    }

    /// Checks `code` against the newest record for `email`. Nothing is
    /// consumed: a matching code keeps verifying until it expires.
    #[instrument(skip(self, code))]
    pub async fn verify_code(&self, email: &str, code: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);

        let Some(record) = self.codes.find_latest_by_email(&email).await? else {
            warn!(email = %email, "no verification code on record");
            return Err(AuthError::InvalidCode);
        };

        if !codes_match(&record.code, code) {
            warn!(email = %email, "verification code mismatch");
            return Err(AuthError::InvalidCode);
        }

        if OffsetDateTime::now_utc() > record.expires_at {
            warn!(email = %email, expired_at = %record.expires_at, "verification code expired");
            return Err(AuthError::ExpiredCode);
        }

        info!(email = %email, "email verified");
        Ok(())
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let email = normalize_email(email);

        let Some(user) = self.users.find_by_email(&email).await? else {
            verify_against_dummy(password);
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash)? {
            warn!(email = %email, user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.keys.sign(user.id)?;
        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok(token)
    }

    pub async fn user(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.users.find_by_id(id).await?)
    }
}
