//! # Session
//!
//! Login state bound to the [`ConfigStore`], an [`ApiClient`] and the active
//! [`Project`]. Nothing is cached here: every query re-reads the config
//! document, so the store is always the source of truth.

use crate::core::config_store::{ConfigError, ConfigStore};
use crate::core::project::Project;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Incorrect email or password.")]
    InvalidCredentials,
    #[error("You are not logged in.")]
    NotLoggedIn,
    #[error("Authentication request failed: {0}")]
    Request(String),
    #[error("Unexpected response from the API: {0}")]
    Response(String),
    #[error("Could not persist session: {0}")]
    Persist(#[from] ConfigError),
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What the API returns for a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub token: String,
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub token: String,
}

/// Exchanges credentials for a token.
#[async_trait]
pub trait ApiClient: Send + Sync + fmt::Debug {
    async fn authenticate(
        &self,
        api_url: &str,
        credentials: &Credentials,
    ) -> Result<AuthGrant, AuthError>;
}

/// `POST <api>/login` over HTTPS.
#[derive(Debug, Clone, Default)]
pub struct HttpApiClient {
    http: reqwest::Client,
}

impl HttpApiClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    data: LoginData,
}

#[derive(Deserialize)]
struct LoginData {
    token: String,
    user: LoginUser,
}

#[derive(Deserialize)]
struct LoginUser {
    id: serde_json::Value,
    email: String,
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn authenticate(
        &self,
        api_url: &str,
        credentials: &Credentials,
    ) -> Result<AuthGrant, AuthError> {
        let url = format!("{}/login", api_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "email": credentials.email,
                "password": credentials.password,
                "source": "cli",
            }))
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(AuthError::Request(format!("{} returned {}", url, status)));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Response(e.to_string()))?;

        let user_id = match body.data.user.id {
            serde_json::Value::String(id) => id,
            other => other.to_string(),
        };
        Ok(AuthGrant {
            token: body.data.token,
            user_id,
            email: body.data.user.email,
        })
    }
}

#[derive(Debug)]
pub struct SessionManager {
    config: Arc<ConfigStore>,
    client: Box<dyn ApiClient>,
    project: Arc<Project>,
}

impl SessionManager {
    pub fn new(config: Arc<ConfigStore>, client: Box<dyn ApiClient>, project: Arc<Project>) -> Self {
        Self {
            config,
            client,
            project,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.config
            .document()
            .tokens
            .user
            .is_some_and(|token| !token.is_empty())
    }

    /// The current session as recorded in the config document.
    pub fn current(&self) -> Result<Session, AuthError> {
        let doc = self.config.document();
        match doc.tokens.user {
            Some(token) if !token.is_empty() => Ok(Session {
                user_id: doc.user.id,
                email: doc.user.email,
                token,
            }),
            _ => Err(AuthError::NotLoggedIn),
        }
    }

    /// Authenticates and persists the token and user to the config document.
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let api_url = self.config.document().api_url().to_string();
        let grant = self.client.authenticate(&api_url, credentials).await?;

        self.config.update(|doc| {
            doc.tokens.user = Some(grant.token.clone());
            doc.user.id = Some(grant.user_id.clone());
            doc.user.email = Some(grant.email.clone());
        });
        self.config.save()?;
        log::debug!("Logged in as {}", grant.email);

        Ok(Session {
            user_id: Some(grant.user_id),
            email: Some(grant.email),
            token: grant.token,
        })
    }

    /// Clears the persisted token and user.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.config.update(|doc| {
            doc.tokens.user = None;
            doc.user.id = None;
            doc.user.email = None;
        });
        self.config.save()?;
        Ok(())
    }

    /// The hosted app the active project is linked to, if any.
    pub fn linked_app_id(&self) -> Option<String> {
        match self.project.load() {
            Ok(meta) => meta.pro_id,
            Err(e) => {
                log::debug!("Could not read project for linked app: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::constants::CONFIG_FILE;
    use std::fs;
    use tempfile::tempdir;

    /// Accepts exactly one password.
    #[derive(Debug)]
    pub(crate) struct FakeApiClient {
        pub(crate) password: String,
    }

    #[async_trait]
    impl ApiClient for FakeApiClient {
        async fn authenticate(
            &self,
            _api_url: &str,
            credentials: &Credentials,
        ) -> Result<AuthGrant, AuthError> {
            if credentials.password != self.password {
                return Err(AuthError::InvalidCredentials);
            }
            Ok(AuthGrant {
                token: "token-123".to_string(),
                user_id: "42".to_string(),
                email: credentials.email.clone(),
            })
        }
    }

    fn manager(dir: &std::path::Path) -> (Arc<ConfigStore>, SessionManager) {
        let config = Arc::new(ConfigStore::new(dir, CONFIG_FILE));
        config.load().unwrap();
        let session = SessionManager::new(
            config.clone(),
            Box::new(FakeApiClient {
                password: "hunter2".to_string(),
            }),
            Arc::new(Project::outside()),
        );
        (config, session)
    }

    fn credentials(password: &str) -> Credentials {
        Credentials {
            email: "dev@example.com".to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_login_persists_token() {
        let dir = tempdir().unwrap();
        let (_config, session) = manager(dir.path());
        assert!(!session.is_logged_in());

        let s = session.login(&credentials("hunter2")).await.unwrap();
        assert_eq!(s.token, "token-123");
        assert!(session.is_logged_in());

        // A fresh store sees the same truth.
        let reopened = ConfigStore::new(dir.path(), CONFIG_FILE);
        let doc = reopened.load().unwrap();
        assert_eq!(doc.tokens.user.as_deref(), Some("token-123"));
        assert_eq!(doc.user.email.as_deref(), Some("dev@example.com"));
    }

    #[tokio::test]
    async fn test_login_failure_is_auth_error() {
        let dir = tempdir().unwrap();
        let (_config, session) = manager(dir.path());

        let err = session.login(&credentials("wrong")).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(!session.is_logged_in());
        assert!(!dir.path().join(CONFIG_FILE).exists());
    }

    #[tokio::test]
    async fn test_logout_clears_tokens() {
        let dir = tempdir().unwrap();
        let (config, session) = manager(dir.path());
        session.login(&credentials("hunter2")).await.unwrap();

        session.logout().unwrap();
        assert!(!session.is_logged_in());
        assert!(matches!(session.current(), Err(AuthError::NotLoggedIn)));
        assert_eq!(config.document().user.email, None);

        let on_disk = fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap();
        assert!(!on_disk.contains("token-123"));
    }

    #[test]
    fn test_state_is_derived_from_config() {
        let dir = tempdir().unwrap();
        let (config, session) = manager(dir.path());
        config.update(|doc| doc.tokens.user = Some("external".to_string()));
        assert!(session.is_logged_in());
        assert_eq!(session.current().unwrap().token, "external");
    }

    #[test]
    fn test_linked_app_id_reads_project_file() {
        let app = tempdir().unwrap();
        let cfg = tempdir().unwrap();
        fs::write(
            app.path().join(crate::constants::PROJECT_FILE),
            r#"{"name":"MyApp","type":"custom","pro_id":"abc123"}"#,
        )
        .unwrap();

        let config = Arc::new(ConfigStore::new(cfg.path(), CONFIG_FILE));
        let linked = |project: Project| {
            SessionManager::new(
                config.clone(),
                Box::new(FakeApiClient {
                    password: String::new(),
                }),
                Arc::new(project),
            )
            .linked_app_id()
        };

        let project = crate::core::project::get_project(Some(app.path()));
        assert_eq!(linked(project), Some("abc123".to_string()));
        assert_eq!(linked(Project::outside()), None);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let rendered = format!("{:?}", credentials("hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
