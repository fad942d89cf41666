use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::client::config::ClientConfig;
use crate::client::forms::{
    CreateBidInput, CreateJobInput, CreateReviewInput, FundInput, LoginInput, ReleaseInput,
    SendMessageInput, SignupInput,
};
use crate::client::session::SharedSession;
use crate::common::models::{
    Analytics, AuthResponse, Bid, Contract, Job, Message, Review, Role, Thread, Wallet,
};
use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub fn first(limit: u32) -> Self {
        Self { page: 1, limit }
    }
}

/// Everything the views and mutators need from the marketplace backend.
///
/// Write calls take the idempotency key of the intent that triggered them
/// and return the created entity only when the server echoed one back.
#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    async fn login(&self, input: &LoginInput) -> Result<AuthResponse, ClientError>;
    async fn signup(&self, input: &SignupInput) -> Result<AuthResponse, ClientError>;

    async fn list_jobs(&self) -> Result<Vec<Job>, ClientError>;
    async fn get_job(&self, id: &str) -> Result<Job, ClientError>;
    async fn create_job(&self, input: &CreateJobInput, key: Uuid) -> Result<Option<Job>, ClientError>;
    async fn create_bid(&self, input: &CreateBidInput, key: Uuid) -> Result<Option<Bid>, ClientError>;

    async fn list_contracts(&self, page: Page) -> Result<Vec<Contract>, ClientError>;
    async fn get_contract(&self, id: &str) -> Result<Contract, ClientError>;
    async fn approve_milestone(&self, contract_id: &str, milestone_id: &str, key: Uuid) -> Result<(), ClientError>;

    async fn list_threads(&self) -> Result<Vec<Thread>, ClientError>;
    async fn get_thread(&self, id: &str) -> Result<Thread, ClientError>;
    async fn send_message(
        &self,
        thread_id: &str,
        input: &SendMessageInput,
        key: Uuid,
    ) -> Result<Option<Message>, ClientError>;

    async fn list_reviews(&self, user_id: &str, page: Page) -> Result<Vec<Review>, ClientError>;
    async fn create_review(&self, input: &CreateReviewInput, key: Uuid) -> Result<Option<Review>, ClientError>;

    async fn get_wallet(&self) -> Result<Wallet, ClientError>;
    async fn fund_escrow(&self, input: &FundInput, key: Uuid) -> Result<Option<Wallet>, ClientError>;
    async fn release_escrow(&self, input: &ReleaseInput, key: Uuid) -> Result<Option<Wallet>, ClientError>;

    async fn get_analytics(&self, role: Role) -> Result<Analytics, ClientError>;
}

pub type SharedApi = Arc<dyn MarketplaceApi>;

/// reqwest-backed implementation. The bearer token is read from the
/// session on every request, so a login in another part of the program is
/// picked up without rebuilding the client.
pub struct HttpApi {
    http: reqwest::Client,
    base: String,
    session: SharedSession,
    idempotency_keys: bool,
}

impl HttpApi {
    pub fn new(config: &ClientConfig, session: SharedSession) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base: config.api_url.trim_end_matches('/').to_string(),
            session,
            idempotency_keys: config.idempotency_keys,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self.http.request(method, self.url(path));
        if let Some(token) = self.session.token().await {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Sends and returns the JSON body (`Null` for an empty 2xx body).
    async fn send(&self, builder: RequestBuilder) -> Result<Value, ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        let url = response.url().path().to_string();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<Value>(&bytes)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));
            warn!("[API] {} -> {}: {}", url, status.as_u16(), message);
            return Err(ClientError::Api { status: status.as_u16(), message });
        }

        debug!("[API] {} -> {} ({} bytes)", url, status.as_u16(), bytes.len());
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| ClientError::MalformedResponse(e.to_string()))
    }

    async fn get(&self, path: &str) -> Result<Value, ClientError> {
        let builder = self.request(Method::GET, path).await;
        self.send(builder).await
    }

    async fn get_page(&self, path: &str, page: Page) -> Result<Value, ClientError> {
        let builder = self
            .request(Method::GET, path)
            .await
            .query(&[("page", page.page), ("limit", page.limit)]);
        self.send(builder).await
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B, key: Option<Uuid>) -> Result<Value, ClientError> {
        let builder = self.request(Method::POST, path).await.json(body);
        self.send(self.with_key(builder, key)).await
    }

    async fn post_empty(&self, path: &str, key: Option<Uuid>) -> Result<Value, ClientError> {
        let builder = self.request(Method::POST, path).await;
        self.send(self.with_key(builder, key)).await
    }

    fn with_key(&self, builder: RequestBuilder, key: Option<Uuid>) -> RequestBuilder {
        match key.filter(|_| self.idempotency_keys) {
            Some(key) => builder.header("Idempotency-Key", key.to_string()),
            None => builder,
        }
    }
}

/// A list endpoint that does not answer with an array yields no items.
pub fn decode_list<T: DeserializeOwned>(value: Value) -> Result<Vec<T>, ClientError> {
    match value {
        Value::Array(_) => serde_json::from_value(value).map_err(|e| ClientError::MalformedResponse(e.to_string())),
        other => {
            warn!("[API] Expected a list, got {}; treating as empty", kind_of(&other));
            Ok(Vec::new())
        }
    }
}

pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value).map_err(|e| ClientError::MalformedResponse(e.to_string()))
}

/// Write answers are informative only; a body we cannot read is not a failure.
pub fn decode_echo<T: DeserializeOwned>(value: Value) -> Option<T> {
    if value.is_null() {
        return None;
    }
    serde_json::from_value(value).ok()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl MarketplaceApi for HttpApi {
    async fn login(&self, input: &LoginInput) -> Result<AuthResponse, ClientError> {
        decode(self.post("/auth/login", input, None).await?)
    }

    async fn signup(&self, input: &SignupInput) -> Result<AuthResponse, ClientError> {
        decode(self.post("/auth/signup", input, None).await?)
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, ClientError> {
        decode_list(self.get("/jobs").await?)
    }

    async fn get_job(&self, id: &str) -> Result<Job, ClientError> {
        decode(self.get(&format!("/jobs/{}", id)).await?)
    }

    async fn create_job(&self, input: &CreateJobInput, key: Uuid) -> Result<Option<Job>, ClientError> {
        Ok(decode_echo(self.post("/jobs", input, Some(key)).await?))
    }

    async fn create_bid(&self, input: &CreateBidInput, key: Uuid) -> Result<Option<Bid>, ClientError> {
        Ok(decode_echo(self.post("/bids", input, Some(key)).await?))
    }

    async fn list_contracts(&self, page: Page) -> Result<Vec<Contract>, ClientError> {
        decode_list(self.get_page("/contracts", page).await?)
    }

    async fn get_contract(&self, id: &str) -> Result<Contract, ClientError> {
        decode(self.get(&format!("/contracts/{}", id)).await?)
    }

    async fn approve_milestone(&self, contract_id: &str, milestone_id: &str, key: Uuid) -> Result<(), ClientError> {
        let path = format!("/contracts/{}/milestones/{}/approve", contract_id, milestone_id);
        self.post_empty(&path, Some(key)).await.map(|_| ())
    }

    async fn list_threads(&self) -> Result<Vec<Thread>, ClientError> {
        decode_list(self.get("/messages/threads").await?)
    }

    async fn get_thread(&self, id: &str) -> Result<Thread, ClientError> {
        decode(self.get(&format!("/messages/threads/{}", id)).await?)
    }

    async fn send_message(
        &self,
        thread_id: &str,
        input: &SendMessageInput,
        key: Uuid,
    ) -> Result<Option<Message>, ClientError> {
        let path = format!("/messages/threads/{}/messages", thread_id);
        Ok(decode_echo(self.post(&path, input, Some(key)).await?))
    }

    async fn list_reviews(&self, user_id: &str, page: Page) -> Result<Vec<Review>, ClientError> {
        decode_list(self.get_page(&format!("/users/{}/reviews", user_id), page).await?)
    }

    async fn create_review(&self, input: &CreateReviewInput, key: Uuid) -> Result<Option<Review>, ClientError> {
        Ok(decode_echo(self.post("/reviews", input, Some(key)).await?))
    }

    async fn get_wallet(&self) -> Result<Wallet, ClientError> {
        decode(self.get("/wallet").await?)
    }

    async fn fund_escrow(&self, input: &FundInput, key: Uuid) -> Result<Option<Wallet>, ClientError> {
        Ok(decode_echo(self.post("/wallet/fund", input, Some(key)).await?))
    }

    async fn release_escrow(&self, input: &ReleaseInput, key: Uuid) -> Result<Option<Wallet>, ClientError> {
        Ok(decode_echo(self.post("/wallet/release", input, Some(key)).await?))
    }

    async fn get_analytics(&self, role: Role) -> Result<Analytics, ClientError> {
        decode(self.get(&format!("/{}/analytics", role.as_str())).await?)
    }
}
