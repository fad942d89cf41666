// In-memory backend for view and mutation tests.
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::time::Duration;
use uuid::Uuid;

use crate::client::forms::{
    CreateBidInput, CreateJobInput, CreateReviewInput, FundInput, LoginInput, ReleaseInput,
    SendMessageInput, SignupInput,
};
use crate::client::services::api_client::{MarketplaceApi, Page, SharedApi};
use crate::common::models::{
    Analytics, AuthResponse, Bid, Contract, Job, Message, Review, Role, Thread, UserSummary, Wallet,
};
use crate::error::ClientError;

#[derive(Default)]
pub struct FakeData {
    pub jobs: Vec<Job>,
    pub contracts: Vec<Contract>,
    pub threads: Vec<Thread>,
    pub reviews: Vec<Review>,
    pub wallet: Wallet,
    pub analytics: Analytics,
    /// Returned by every call while set.
    pub fail_with: Option<ClientError>,
    /// Whether writes answer with the created entity.
    pub echo_writes: bool,
    /// Applied to reads before they answer.
    pub read_delay: Option<Duration>,
}

#[derive(Default)]
pub struct FakeApi {
    data: Mutex<FakeData>,
    calls: Mutex<Vec<(String, Option<Uuid>)>>,
}

impl FakeApi {
    pub fn with(configure: impl FnOnce(&mut FakeData)) -> Arc<Self> {
        let api = Self::default();
        if let Ok(mut data) = api.data.lock() {
            configure(&mut *data);
        }
        Arc::new(api)
    }

    pub fn shared(self: &Arc<Self>) -> SharedApi {
        self.clone()
    }

    pub fn edit(&self, change: impl FnOnce(&mut FakeData)) {
        change(&mut *self.data.lock().unwrap());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn keys(&self) -> Vec<Uuid> {
        self.calls.lock().unwrap().iter().filter_map(|(_, key)| *key).collect()
    }

    fn record(&self, name: &str, key: Option<Uuid>) -> Result<(), ClientError> {
        self.calls.lock().unwrap().push((name.to_string(), key));
        match &self.data.lock().unwrap().fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn read<T>(&self, name: &str, pick: impl FnOnce(&FakeData) -> T) -> Result<T, ClientError> {
        self.record(name, None)?;
        let delay = self.data.lock().unwrap().read_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(pick(&*self.data.lock().unwrap()))
    }

    fn write<T>(&self, name: &str, key: Uuid, apply: impl FnOnce(&mut FakeData) -> T) -> Result<Option<T>, ClientError> {
        self.record(name, Some(key))?;
        let mut data = self.data.lock().unwrap();
        let echo = apply(&mut *data);
        Ok(if data.echo_writes { Some(echo) } else { None })
    }
}

fn not_found(what: &str) -> ClientError {
    ClientError::Api { status: 404, message: format!("{} not found", what) }
}

#[async_trait]
impl MarketplaceApi for FakeApi {
    async fn login(&self, input: &LoginInput) -> Result<AuthResponse, ClientError> {
        self.record("login", None)?;
        Ok(AuthResponse {
            token: format!("token-{}", input.email),
            user: UserSummary { id: "u1".into(), role: Role::Client },
        })
    }

    async fn signup(&self, input: &SignupInput) -> Result<AuthResponse, ClientError> {
        self.record("signup", None)?;
        Ok(AuthResponse {
            token: format!("token-{}", input.email),
            user: UserSummary { id: "u2".into(), role: input.role },
        })
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, ClientError> {
        self.read("list_jobs", |d| d.jobs.clone()).await
    }

    async fn get_job(&self, id: &str) -> Result<Job, ClientError> {
        self.read("get_job", |d| d.jobs.iter().find(|j| j.id == id).cloned()).await?.ok_or_else(|| not_found("Job"))
    }

    async fn create_job(&self, input: &CreateJobInput, key: Uuid) -> Result<Option<Job>, ClientError> {
        self.write("create_job", key, |d| {
            let job = Job {
                id: format!("j{}", d.jobs.len() + 1),
                title: input.title.clone(),
                description: input.description.clone(),
                budget: input.budget,
                skills: Some(input.skills.clone()),
                client_id: Some("u1".into()),
            };
            d.jobs.insert(0, job.clone());
            job
        })
    }

    async fn create_bid(&self, input: &CreateBidInput, key: Uuid) -> Result<Option<Bid>, ClientError> {
        self.write("create_bid", key, |_| Bid {
            id: "b1".into(),
            job_id: input.job_id.clone(),
            amount: input.amount,
            cover_letter: input.cover_letter.clone(),
        })
    }

    async fn list_contracts(&self, page: Page) -> Result<Vec<Contract>, ClientError> {
        let start = ((page.page.max(1) - 1) * page.limit) as usize;
        self.read("list_contracts", |d| d.contracts.iter().skip(start).take(page.limit as usize).cloned().collect())
            .await
    }

    async fn get_contract(&self, id: &str) -> Result<Contract, ClientError> {
        self.read("get_contract", |d| d.contracts.iter().find(|c| c.id == id).cloned())
            .await?
            .ok_or_else(|| not_found("Contract"))
    }

    async fn approve_milestone(&self, _contract_id: &str, _milestone_id: &str, key: Uuid) -> Result<(), ClientError> {
        self.write("approve_milestone", key, |_| ()).map(|_| ())
    }

    async fn list_threads(&self) -> Result<Vec<Thread>, ClientError> {
        self.read("list_threads", |d| d.threads.clone()).await
    }

    async fn get_thread(&self, id: &str) -> Result<Thread, ClientError> {
        self.read("get_thread", |d| d.threads.iter().find(|t| t.id == id).cloned())
            .await?
            .ok_or_else(|| not_found("Thread"))
    }

    async fn send_message(
        &self,
        thread_id: &str,
        input: &SendMessageInput,
        key: Uuid,
    ) -> Result<Option<Message>, ClientError> {
        self.write("send_message", key, |d| {
            let message = Message {
                id: format!("m-{}", key.simple()),
                content: input.content.clone(),
                sender_id: "u1".into(),
                sender: None,
                timestamp: Some("2024-06-01T12:00:00Z".into()),
            };
            if let Some(thread) = d.threads.iter_mut().find(|t| t.id == thread_id) {
                thread.messages.push(message.clone());
                thread.last_message = Some(message.clone());
            }
            message
        })
    }

    async fn list_reviews(&self, _user_id: &str, page: Page) -> Result<Vec<Review>, ClientError> {
        let start = ((page.page.max(1) - 1) * page.limit) as usize;
        self.read("list_reviews", |d| d.reviews.iter().skip(start).take(page.limit as usize).cloned().collect())
            .await
    }

    async fn create_review(&self, input: &CreateReviewInput, key: Uuid) -> Result<Option<Review>, ClientError> {
        self.write("create_review", key, |d| {
            let review = Review {
                id: format!("r{}", d.reviews.len() + 1),
                contract_id: input.contract_id.clone(),
                rating: input.rating,
                comment: input.comment.clone(),
            };
            d.reviews.insert(0, review.clone());
            review
        })
    }

    async fn get_wallet(&self) -> Result<Wallet, ClientError> {
        self.read("get_wallet", |d| d.wallet).await
    }

    async fn fund_escrow(&self, input: &FundInput, key: Uuid) -> Result<Option<Wallet>, ClientError> {
        self.write("fund_escrow", key, |d| {
            d.wallet.balance -= input.amount;
            d.wallet
        })
    }

    async fn release_escrow(&self, _input: &ReleaseInput, key: Uuid) -> Result<Option<Wallet>, ClientError> {
        self.write("release_escrow", key, |d| d.wallet)
    }

    async fn get_analytics(&self, role: Role) -> Result<Analytics, ClientError> {
        self.read(&format!("get_analytics:{}", role.as_str()), |d| d.analytics.clone()).await
    }
}
