//! Registration and sign-in flows.
//!
//! Validation failures and provider rejections are answered with field
//! errors rather than HTTP errors; only datastore failures propagate.

use regex::Regex;
use serde::Serialize;
use std::sync::{Arc, LazyLock};
use tracing::info;

use super::auth_gateway::{AuthProvider, ProviderSession};
use crate::{
    db::{RepositoryResult, users::UserRepository},
    models::user::{LoginType, User},
};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))@((\[[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\])|(([a-zA-Z\-0-9]+\.)+[a-zA-Z]{2,}))$"#,
    )
    .expect("email pattern compiles")
});

static USERNAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+$").expect("username pattern compiles")
});

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Serialize, Clone, Debug, Default)]
pub struct UserResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<ProviderSession>,
}

impl UserResponse {
    fn rejected(errors: Vec<FieldError>) -> Self {
        Self {
            errors: Some(errors),
            ..Default::default()
        }
    }
}

pub fn valid_email_format(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

pub fn valid_username_format(username: &str) -> bool {
    USERNAME_PATTERN.is_match(username)
}

/// Answer for any failed login; identical for unknown users and bad passwords.
fn login_errors() -> Vec<FieldError> {
    vec![
        FieldError::new("username", "Please check username/email."),
        FieldError::new("password", "Please check username/password."),
    ]
}

#[derive(Clone)]
pub struct AccountService {
    provider: Arc<dyn AuthProvider>,
    users: UserRepository,
}

impl AccountService {
    pub fn new(provider: Arc<dyn AuthProvider>, users: UserRepository) -> Self {
        Self { provider, users }
    }

    async fn validate_email(&self, email: &str) -> RepositoryResult<Option<FieldError>> {
        if !valid_email_format(email) {
            return Ok(Some(FieldError::new("email", "Please check your email address")));
        }
        if self.users.find_by_email(email).await?.is_some() {
            return Ok(Some(FieldError::new(
                "email",
                "User already exists. Please sign in.",
            )));
        }
        Ok(None)
    }

    async fn validate_username(&self, username: &str) -> RepositoryResult<Option<FieldError>> {
        if !valid_username_format(username) {
            return Ok(Some(FieldError::new(
                "username",
                "Please choose a username with only letter, numbers, underscores and hyphens.",
            )));
        }
        if self.users.find_by_username(username).await?.is_some() {
            return Ok(Some(FieldError::new(
                "username",
                "Username is not currently available, please choose another.",
            )));
        }
        Ok(None)
    }

    pub async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> RepositoryResult<UserResponse> {
        if let Some(err) = self.validate_email(email).await? {
            return Ok(UserResponse::rejected(vec![err]));
        }
        if let Some(err) = self.validate_username(username).await? {
            return Ok(UserResponse::rejected(vec![err]));
        }

        let outcome = self.provider.sign_up_with_email(email, password).await;
        let provider_user = match (outcome.error, outcome.user) {
            (None, Some(user)) => user,
            (error, _) => {
                return Ok(UserResponse::rejected(vec![FieldError::new(
                    "password",
                    error.unwrap_or_default(),
                )]));
            }
        };

        let user = self
            .users
            .create(&provider_user.id, LoginType::Email, username, email)
            .await?;
        info!(user = %user.id, username, "account registered");
        Ok(UserResponse {
            user: Some(user),
            ..Default::default()
        })
    }

    pub async fn login(&self, username: &str, password: &str) -> RepositoryResult<UserResponse> {
        if !valid_username_format(username) {
            return Ok(UserResponse::rejected(vec![FieldError::new(
                "username",
                "Please check your username.",
            )]));
        }
        let Some(user) = self.users.find_by_username(username).await? else {
            return Ok(UserResponse::rejected(login_errors()));
        };

        let outcome = self.provider.sign_in_with_email(&user.email, password).await;
        match (outcome.error, outcome.user, outcome.session) {
            (None, Some(_), Some(session)) => Ok(UserResponse {
                errors: None,
                user: Some(user),
                session: Some(session),
            }),
            _ => Ok(UserResponse::rejected(login_errors())),
        }
    }

    pub async fn github_login(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> RepositoryResult<UserResponse> {
        let github = self
            .provider
            .sign_in_with_github(access_token, refresh_token)
            .await;

        let user = match github.login.as_deref() {
            Some(login) => self.users.find_by_username(login).await?,
            None => None,
        };
        let Some(user) = user else {
            return Ok(UserResponse::rejected(vec![FieldError::new(
                "githubAccount",
                "Not currently registered",
            )]));
        };

        let outcome = github.outcome;
        match (outcome.error, outcome.user, outcome.session) {
            (None, Some(_), Some(session)) => Ok(UserResponse {
                errors: None,
                user: Some(user),
                session: Some(session),
            }),
            (error, _, _) => Ok(UserResponse::rejected(vec![FieldError::new(
                "githubAccount",
                error.unwrap_or_default(),
            )])),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::FakeProvider;
    use super::*;
    use crate::db::test_pool;

    async fn service() -> (AccountService, UserRepository) {
        let users = UserRepository::new(Arc::new(test_pool().await));
        (
            AccountService::new(Arc::new(FakeProvider), users.clone()),
            users,
        )
    }

    fn fields(response: &UserResponse) -> Vec<(&str, &str)> {
        response
            .errors
            .iter()
            .flatten()
            .map(|e| (e.field.as_str(), e.message.as_str()))
            .collect()
    }

    #[test]
    fn username_pattern_rejects_commas_and_spaces() {
        assert!(valid_username_format("rust_acean-1"));
        assert!(!valid_username_format("rust,acean"));
        assert!(!valid_username_format("rust acean"));
        assert!(!valid_username_format(""));
    }

    #[test]
    fn email_pattern() {
        assert!(valid_email_format("crab@example.com"));
        assert!(valid_email_format("first.last@sub.example.co.uk"));
        assert!(!valid_email_format("crab@localhost"));
        assert!(!valid_email_format("not an email"));
    }

    #[tokio::test]
    async fn register_then_login() {
        let (accounts, _) = service().await;
        let registered = accounts
            .register("crab@example.com", "rustacean", "hunter22")
            .await
            .unwrap();
        assert!(registered.errors.is_none());
        let user = registered.user.unwrap();
        assert_eq!(user.user_id, "ext-1");
        assert_eq!(user.login_type, LoginType::Email);

        let login = accounts.login("rustacean", "hunter22").await.unwrap();
        assert_eq!(login.user.unwrap().id, user.id);
        assert!(login.session.is_some());
    }

    #[tokio::test]
    async fn register_reports_the_first_failing_field() {
        let (accounts, users) = service().await;
        users
            .create("ext-0", LoginType::Email, "rustacean", "crab@example.com")
            .await
            .unwrap();

        let bad_email = accounts.register("crab@", "other", "hunter22").await.unwrap();
        assert_eq!(fields(&bad_email), [("email", "Please check your email address")]);

        let taken_email = accounts
            .register("crab@example.com", "other", "hunter22")
            .await
            .unwrap();
        assert_eq!(
            fields(&taken_email),
            [("email", "User already exists. Please sign in.")]
        );

        let taken_name = accounts
            .register("new@example.com", "rustacean", "hunter22")
            .await
            .unwrap();
        assert_eq!(
            fields(&taken_name),
            [(
                "username",
                "Username is not currently available, please choose another."
            )]
        );

        let weak = accounts
            .register("new@example.com", "newcomer", "abc")
            .await
            .unwrap();
        assert_eq!(
            fields(&weak),
            [("password", "Password should be at least 6 characters")]
        );
        assert!(users.find_by_username("newcomer").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn login_failures_do_not_reveal_which_part_was_wrong() {
        let (accounts, users) = service().await;
        users
            .create("ext-1", LoginType::Email, "rustacean", "crab@example.com")
            .await
            .unwrap();

        let unknown = accounts.login("nobody", "hunter22").await.unwrap();
        let wrong_password = accounts.login("rustacean", "nope").await.unwrap();
        assert_eq!(fields(&unknown), fields(&wrong_password));
        assert_eq!(fields(&unknown).len(), 2);

        let malformed = accounts.login("bad name", "hunter22").await.unwrap();
        assert_eq!(fields(&malformed), [("username", "Please check your username.")]);
    }

    #[tokio::test]
    async fn github_login_requires_a_registered_account() {
        let (accounts, users) = service().await;

        let unregistered = accounts.github_login("gh-token", "refresh").await.unwrap();
        assert_eq!(
            fields(&unregistered),
            [("githubAccount", "Not currently registered")]
        );

        users
            .create("ext-gh", LoginType::Github, "octocrab", "octo@example.com")
            .await
            .unwrap();
        let ok = accounts.github_login("gh-token", "refresh").await.unwrap();
        assert_eq!(ok.user.unwrap().username, "octocrab");
        assert!(ok.session.is_some());
    }
}
