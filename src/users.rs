use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::{AuthConfig, UsersConfig};
use crate::entities::{Credentials, RegisterRequest, Token, User, UserPatch};
use crate::error::{Error, Result};
use crate::repo::{TokenRepository, UserRepository};

const MAX_TOKEN_TTL_DAYS: i64 = 36_500;

/// Accounts and bearer tokens.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn TokenRepository>,
    users_config: UsersConfig,
    auth_config: AuthConfig,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: Arc<dyn TokenRepository>,
        users_config: UsersConfig,
        auth_config: AuthConfig,
    ) -> Self {
        Self {
            users,
            tokens,
            users_config,
            auth_config,
        }
    }

    #[instrument(name = "users.register", skip(self, req), fields(email = %req.email))]
    pub async fn register(&self, req: RegisterRequest) -> Result<User> {
        let email = req.email.trim().to_string();
        validate_email(&email)?;
        if let Some(name) = &req.name {
            self.validate_name(name)?;
        }
        self.validate_password(&req.password)?;

        let user = User {
            id: Uuid::new_v4(),
            name: req.name,
            email,
            password_hash: hash_password(req.password).await?,
        };
        // uniqueness is left to the store's constraint
        self.users.insert(&user).await?;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Check credentials. `None` when the email is unknown or the password is wrong.
    #[instrument(name = "users.authenticate", skip(self, creds), fields(email = %creds.email))]
    pub async fn authenticate(&self, creds: Credentials) -> Result<Option<User>> {
        let user = self.users.find_by_email(creds.email.trim()).await?;

        // `password_auth::verify_password()` is blocking, hence using `tokio::task::spawn_blocking()`
        let password = creds.password;
        let user = tokio::task::spawn_blocking(move || {
            user.filter(|user| password_auth::verify_password(&password, &user.password_hash).is_ok())
        })
        .await?;
        Ok(user)
    }

    /// Verify credentials and issue a fresh bearer token.
    pub async fn login(&self, creds: Credentials) -> Result<Token> {
        let user = self
            .authenticate(creds)
            .await?
            .ok_or(Error::Unauthenticated)?;
        self.issue_token(&user).await
    }

    #[instrument(name = "users.issue_token", skip(self, user), fields(user_id = %user.id))]
    pub async fn issue_token(&self, user: &User) -> Result<Token> {
        let now = Utc::now();
        let expires_at = i64::try_from(self.auth_config.token_ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or_else(|| now + Duration::days(MAX_TOKEN_TTL_DAYS));
        let token = Token {
            token: format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()),
            user_id: user.id,
            created_at: now,
            expires_at,
        };
        let purged = self.tokens.delete_expired(now).await?;
        if purged > 0 {
            debug!(purged, "purged expired tokens");
        }
        self.tokens.insert(&token).await?;
        debug!("token issued");
        Ok(token)
    }

    /// Resolve a bearer token to its user. Unknown and expired tokens are both `Unauthenticated`.
    pub async fn resolve_token(&self, bearer: &str) -> Result<User> {
        let token = self
            .tokens
            .find(bearer)
            .await?
            .ok_or(Error::Unauthenticated)?;

        if token.expires_at <= Utc::now() {
            debug!(user_id = %token.user_id, "rejecting expired token");
            self.tokens.delete(&token.token).await?;
            return Err(Error::Unauthenticated);
        }

        self.users
            .find_by_id(token.user_id)
            .await?
            .ok_or(Error::Unauthenticated)
    }

    pub async fn logout(&self, bearer: &str) -> Result<()> {
        self.tokens.delete(bearer).await?;
        Ok(())
    }

    #[instrument(name = "users.update", skip(self, user, patch), fields(user_id = %user.id))]
    pub async fn update(&self, user: &User, patch: UserPatch) -> Result<User> {
        let mut updated = user.clone();

        if let Some(name) = patch.name {
            self.validate_name(&name)?;
            updated.name = Some(name);
        }
        if let Some(email) = patch.email {
            let email = email.trim().to_string();
            validate_email(&email)?;
            updated.email = email;
        }
        if let Some(password) = patch.password {
            self.validate_password(&password)?;
            updated.password_hash = hash_password(password).await?;
        }

        self.users.update(&updated).await?;
        info!("user updated");
        Ok(updated)
    }

    /// Delete the account; todos and tokens go with it.
    #[instrument(name = "users.delete", skip(self, user), fields(user_id = %user.id))]
    pub async fn delete(&self, user: &User) -> Result<()> {
        if !self.users.delete(user.id).await? {
            return Err(Error::not_found("user"));
        }
        info!("user deleted");
        Ok(())
    }

    fn validate_name(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::validation("name", "must not be blank"));
        }
        if name.chars().count() > self.users_config.max_name_length {
            return Err(Error::validation(
                "name",
                format!("too long (max: {})", self.users_config.max_name_length),
            ));
        }
        Ok(())
    }

    fn validate_password(&self, password: &str) -> Result<()> {
        if password.chars().count() < self.users_config.min_password_length {
            return Err(Error::validation(
                "password",
                format!(
                    "must be at least {} characters",
                    self.users_config.min_password_length
                ),
            ));
        }
        Ok(())
    }
}

async fn hash_password(password: String) -> Result<String> {
    let hash = tokio::task::spawn_blocking(move || password_auth::generate_hash(password)).await?;
    Ok(hash)
}

/// Syntactic email check: one `@`, non-empty local part, dotted domain, no whitespace.
pub fn validate_email(email: &str) -> Result<()> {
    let invalid = || Error::validation("email", format!("'{email}' is not a valid email address"));

    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || local.len() > 64 || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(invalid());
    }
    let label_ok = |label: &&str| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    };
    if !labels.iter().all(label_ok) {
        return Err(invalid());
    }
    Ok(())
}
