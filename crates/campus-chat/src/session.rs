use tracing::info;
use uuid::Uuid;

use campus_types::models::User;

use crate::error::Result;
use crate::http::HttpBackend;

/// The signed-in user. Built once at login and handed to whatever needs the
/// current identity; dropped (or `logout`) at sign-out.
#[derive(Debug, Clone)]
pub struct Session {
    user: User,
    token: String,
}

impl Session {
    pub fn new(user: User, token: String) -> Self {
        Self { user, token }
    }

    pub async fn login(backend: &HttpBackend, login: &str, password: &str) -> Result<Self> {
        let resp = backend.login(login, password).await?;
        info!("Signed in as {} ({})", resp.user.login, resp.user.id);
        Ok(Self::new(resp.user, resp.token))
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn logout(self) {
        info!("Signed out {}", self.user.login);
    }
}
