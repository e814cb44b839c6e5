use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use campus_types::api::{
    CreateChatRequest, CreateChatResponse, LoginRequest, LoginResponse, RegisterRequest,
    RegisterResponse, SendMessageRequest, SendMessageResponse,
};
use campus_types::models::{Chat, Message, User};

use crate::backend::ChatBackend;
use crate::config::ChatConfig;
use crate::error::{Error, Result};
use crate::session::Session;

/// `ChatBackend` over the Campus REST API.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// A copy of this backend that authenticates as `session`.
    pub fn authorized(&self, session: &Session) -> Self {
        Self {
            token: Some(session.token().to_string()),
            ..self.clone()
        }
    }

    pub async fn login(&self, login: &str, password: &str) -> Result<LoginResponse> {
        let body = LoginRequest {
            login: login.to_string(),
            password: password.to_string(),
        };
        self.send_json(self.request(Method::POST, "/api/login").json(&body)).await
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<Uuid> {
        let resp: RegisterResponse = self
            .send_json(self.request(Method::POST, "/api/register").json(req))
            .await?;
        Ok(resp.user_id)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            debug!("Backend returned {}: {}", status, body);
            return Err(Error::from_status(status, &body));
        }
        resp.json::<T>()
            .await
            .map_err(|e| Error::UnknownBackend(format!("undecodable response: {}", e)))
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn list_chats(&self, user_id: Uuid) -> Result<Vec<Chat>> {
        self.send_json(self.request(Method::GET, &format!("/api/user-chats/{}", user_id)))
            .await
    }

    async fn list_messages(&self, chat_id: Uuid) -> Result<Vec<Message>> {
        self.send_json(self.request(Method::GET, &format!("/api/chat-messages/{}", chat_id)))
            .await
    }

    async fn create_chat(&self, user_id1: Uuid, user_id2: Uuid) -> Result<CreateChatResponse> {
        let body = CreateChatRequest { user_id1, user_id2 };
        self.send_json(self.request(Method::POST, "/api/chats").json(&body))
            .await
    }

    async fn send_message(&self, chat_id: Uuid, sender_id: Uuid, content: &str) -> Result<Message> {
        let body = SendMessageRequest {
            chat_id,
            sender_id,
            content: content.to_string(),
        };
        let resp: SendMessageResponse = self
            .send_json(self.request(Method::POST, "/api/chat-messages").json(&body))
            .await?;
        Ok(resp.message)
    }

    async fn available_users(&self, user_id: Uuid) -> Result<Vec<User>> {
        self.send_json(self.request(Method::GET, &format!("/api/available-users/{}", user_id)))
            .await
    }
}
