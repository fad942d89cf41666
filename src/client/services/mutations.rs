//! Writes. Each one validates its form, sends exactly one request and, only
//! when that request succeeded, patches the view the user is looking on.
//! A failure leaves the view as it was and is returned to the caller. Nothing
//! is retried automatically; a manual retry of the same [`WriteIntent`] sends
//! the same idempotency key.
use log::{info, warn};

use crate::client::forms::{
    check, ApproveMilestoneInput, CreateBidInput, CreateJobInput, CreateReviewInput, FundInput, LoginInput,
    ReleaseInput, SendMessageInput, SignupInput, WriteIntent,
};
use crate::client::models::contracts::ContractDetailView;
use crate::client::models::jobs::{JobBoardView, JobDetailView};
use crate::client::models::notifications::NotificationCounter;
use crate::client::models::reviews::ReviewsView;
use crate::client::models::threads::ThreadDetailView;
use crate::client::models::wallet::WalletView;
use crate::client::services::api_client::SharedApi;
use crate::client::services::live_view::LiveView;
use crate::client::session::Session;
use crate::common::models::{Bid, Job, MilestoneStatus, Review, UserSummary, Wallet};
use crate::error::ClientError;

fn failed(action: &str, err: ClientError) -> ClientError {
    warn!("[MUTATION] {} failed: {}", action, err);
    err
}

pub async fn login(api: &SharedApi, session: &Session, input: &LoginInput) -> Result<UserSummary, ClientError> {
    check(input)?;
    let auth = api.login(input).await.map_err(|e| failed("login", e))?;
    let user = auth.user.clone();
    session.establish(auth).await?;
    Ok(user)
}

pub async fn signup(api: &SharedApi, session: &Session, input: &SignupInput) -> Result<UserSummary, ClientError> {
    check(input)?;
    let auth = api.signup(input).await.map_err(|e| failed("signup", e))?;
    let user = auth.user.clone();
    session.establish(auth).await?;
    Ok(user)
}

/// Drops the credentials and zeroes the unread badge.
pub async fn logout(session: &Session, notifications: Option<&LiveView<NotificationCounter>>) -> Result<(), ClientError> {
    session.teardown().await?;
    if let Some(counter) = notifications {
        counter.update(NotificationCounter::reset).await;
    }
    Ok(())
}

pub async fn post_job(
    api: &SharedApi,
    board: &LiveView<JobBoardView>,
    intent: &WriteIntent<CreateJobInput>,
) -> Result<Option<Job>, ClientError> {
    check(&intent.input)?;
    let created = api.create_job(&intent.input, intent.key).await.map_err(|e| failed("post job", e))?;
    if let Some(job) = &created {
        info!("[MUTATION] Posted job {}", job.id);
        let job = job.clone();
        board.update(|view| view.prepend(job)).await;
    }
    Ok(created)
}

pub async fn submit_bid(
    api: &SharedApi,
    view: &LiveView<JobDetailView>,
    intent: &WriteIntent<CreateBidInput>,
) -> Result<Bid, ClientError> {
    check(&intent.input)?;
    let echo = api.create_bid(&intent.input, intent.key).await.map_err(|e| failed("submit bid", e))?;
    let bid = echo.unwrap_or_else(|| Bid {
        id: String::new(),
        job_id: intent.input.job_id.clone(),
        amount: intent.input.amount,
        cover_letter: intent.input.cover_letter.clone(),
    });
    let local = bid.clone();
    view.update(|v| v.submitted_bid = Some(local)).await;
    Ok(bid)
}

/// Only a milestone the freelancer has submitted can be approved.
pub async fn approve_milestone(
    api: &SharedApi,
    view: &LiveView<ContractDetailView>,
    intent: &WriteIntent<ApproveMilestoneInput>,
) -> Result<(), ClientError> {
    check(&intent.input)?;
    let milestone_id = intent.input.milestone_id.as_str();
    let (contract_id, status) = view.with(|v| (v.id.clone(), v.milestone(milestone_id).map(|m| m.status))).await;
    match status {
        Some(MilestoneStatus::Submitted) => {}
        Some(other) => {
            return Err(ClientError::Validation(format!(
                "Milestone is {}; only submitted milestones can be approved",
                other.as_str()
            )))
        }
        None => return Err(ClientError::Validation("Milestone not found on this contract".to_string())),
    }

    api.approve_milestone(&contract_id, milestone_id, intent.key)
        .await
        .map_err(|e| failed("approve milestone", e))?;
    view.update(|v| v.mark_approved(milestone_id)).await;
    info!("[MUTATION] Approved milestone {} on {}", milestone_id, contract_id);
    Ok(())
}

/// Appends the server's copy of the message, or reads the thread again when
/// the server did not send one back.
pub async fn send_message(
    api: &SharedApi,
    view: &mut LiveView<ThreadDetailView>,
    intent: &WriteIntent<SendMessageInput>,
) -> Result<(), ClientError> {
    check(&intent.input)?;
    let thread_id = view.with(|v| v.id.clone()).await;
    let echo = api
        .send_message(&thread_id, &intent.input, intent.key)
        .await
        .map_err(|e| failed("send message", e))?;
    match echo {
        Some(message) => {
            view.update(|v| v.append(message)).await;
        }
        None => view.refetch().await,
    }
    Ok(())
}

/// Moves money into escrow; the shown balance drops by the amount right away.
pub async fn fund_escrow(
    api: &SharedApi,
    view: &LiveView<WalletView>,
    intent: &WriteIntent<FundInput>,
) -> Result<(), ClientError> {
    check(&intent.input)?;
    api.fund_escrow(&intent.input, intent.key).await.map_err(|e| failed("fund escrow", e))?;
    let amount = intent.input.amount;
    view.update(|v| v.debit(amount)).await;
    info!("[MUTATION] Funded escrow for contract {}", intent.input.contract_id);
    Ok(())
}

pub async fn release_escrow(
    api: &SharedApi,
    view: &mut LiveView<WalletView>,
    intent: &WriteIntent<ReleaseInput>,
) -> Result<Option<Wallet>, ClientError> {
    check(&intent.input)?;
    let echo = api
        .release_escrow(&intent.input, intent.key)
        .await
        .map_err(|e| failed("release escrow", e))?;
    match echo {
        Some(wallet) => {
            view.update(|v| v.adopt(wallet)).await;
        }
        None => view.refetch().await,
    }
    Ok(echo)
}

pub async fn write_review(
    api: &SharedApi,
    view: &LiveView<ReviewsView>,
    intent: &WriteIntent<CreateReviewInput>,
) -> Result<Option<Review>, ClientError> {
    check(&intent.input)?;
    let created = api
        .create_review(&intent.input, intent.key)
        .await
        .map_err(|e| failed("write review", e))?;
    if let Some(review) = &created {
        let review = review.clone();
        view.update(|v| v.prepend(review)).await;
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::models::view_state::Resource;
    use crate::client::services::testing::FakeApi;
    use crate::client::session::Session;
    use crate::client::utils::session_store::MemoryStore;
    use crate::common::models::{Contract, Role, Thread};
    use serde_json::json;
    use std::sync::Arc;

    fn description() -> String {
        "We need a clean, modern logo for a neighbourhood bakery with a warm feel.".to_string()
    }

    #[tokio::test]
    async fn short_title_fails_before_any_request() {
        let api = FakeApi::with(|_| {});
        let mut board = LiveView::mount(JobBoardView::new(), api.shared(), None).await;
        board.loaded().await;

        let intent = WriteIntent::new(CreateJobInput::new("Logo", description()));
        let err = post_job(&api.shared(), &board, &intent).await.unwrap_err();

        assert_eq!(err.to_string(), "Title must be at least 5 characters");
        assert_eq!(api.calls(), vec!["list_jobs".to_string()]);
    }

    #[tokio::test]
    async fn funding_shows_reduced_balance_immediately() {
        let api = FakeApi::with(|d| d.wallet = Wallet { balance: 500.0 });
        let mut wallet = LiveView::mount(WalletView::new(), api.shared(), None).await;
        wallet.loaded().await;

        let intent = WriteIntent::new(FundInput { contract_id: "c1".into(), amount: 100.0 });
        fund_escrow(&api.shared(), &wallet, &intent).await.unwrap();

        assert_eq!(wallet.with(|v| v.wallet.clone()).await, Resource::Ready(Wallet { balance: 400.0 }));
    }

    #[tokio::test]
    async fn failed_write_leaves_state_untouched() {
        let api = FakeApi::with(|d| d.wallet = Wallet { balance: 500.0 });
        let mut wallet = LiveView::mount(WalletView::new(), api.shared(), None).await;
        wallet.loaded().await;
        api.edit(|d| d.fail_with = Some(ClientError::Api { status: 402, message: "Insufficient funds".into() }));

        let intent = WriteIntent::new(FundInput { contract_id: "c1".into(), amount: 100.0 });
        let err = fund_escrow(&api.shared(), &wallet, &intent).await.unwrap_err();

        assert_eq!(err.to_string(), "Insufficient funds");
        assert_eq!(wallet.with(|v| v.wallet.clone()).await, Resource::Ready(Wallet { balance: 500.0 }));
    }

    #[tokio::test]
    async fn retrying_an_intent_reuses_its_key() {
        let api = FakeApi::with(|d| d.wallet = Wallet { balance: 500.0 });
        let mut wallet = LiveView::mount(WalletView::new(), api.shared(), None).await;
        wallet.loaded().await;
        api.edit(|d| d.fail_with = Some(ClientError::Transport("timed out".into())));

        let intent = WriteIntent::new(FundInput { contract_id: "c1".into(), amount: 50.0 });
        assert!(fund_escrow(&api.shared(), &wallet, &intent).await.is_err());
        api.edit(|d| d.fail_with = None);
        fund_escrow(&api.shared(), &wallet, &intent).await.unwrap();

        assert_eq!(api.keys(), vec![intent.key, intent.key]);
    }

    #[tokio::test]
    async fn approve_requires_submitted_and_patches_locally() {
        let contract: Contract = serde_json::from_value(json!({
            "id": "c1", "title": "Logo", "status": "active",
            "milestones": [
                {"id": "m1", "title": "Sketches", "status": "submitted"},
                {"id": "m2", "title": "Final", "status": "pending"}
            ]
        }))
        .unwrap();
        let api = FakeApi::with(|d| d.contracts = vec![contract]);
        let mut view = LiveView::mount(ContractDetailView::new("c1"), api.shared(), None).await;
        view.loaded().await;

        let pending = WriteIntent::new(ApproveMilestoneInput { milestone_id: "m2".into() });
        assert!(approve_milestone(&api.shared(), &view, &pending).await.unwrap_err().is_validation());

        let submitted = WriteIntent::new(ApproveMilestoneInput { milestone_id: "m1".into() });
        approve_milestone(&api.shared(), &view, &submitted).await.unwrap();

        let status = view.with(|v| v.milestone("m1").map(|m| m.status)).await;
        assert_eq!(status, Some(MilestoneStatus::Approved));
        assert_eq!(api.calls(), vec!["get_contract".to_string(), "approve_milestone".to_string()]);
    }

    #[tokio::test]
    async fn sent_message_is_appended_or_refetched() {
        let thread = Thread { id: "t1".into(), title: None, last_message: None, messages: vec![] };
        let api = FakeApi::with(|d| {
            d.threads = vec![thread];
            d.echo_writes = true;
        });
        let mut view = LiveView::mount(ThreadDetailView::new("t1"), api.shared(), None).await;
        view.loaded().await;

        let blank = WriteIntent::new(SendMessageInput { content: "   ".into() });
        assert_eq!(
            send_message(&api.shared(), &mut view, &blank).await.unwrap_err().to_string(),
            "Message cannot be empty"
        );

        let hello = WriteIntent::new(SendMessageInput { content: "Hello".into() });
        send_message(&api.shared(), &mut view, &hello).await.unwrap();
        assert_eq!(view.with(|v| v.thread.ready().map(|t| t.messages.len())).await, Some(1));

        api.edit(|d| d.echo_writes = false);
        let again = WriteIntent::new(SendMessageInput { content: "Still there?".into() });
        send_message(&api.shared(), &mut view, &again).await.unwrap();
        view.loaded().await;
        assert_eq!(view.with(|v| v.thread.ready().map(|t| t.messages.len())).await, Some(2));
    }

    #[tokio::test]
    async fn created_review_goes_first() {
        let api = FakeApi::with(|d| d.echo_writes = true);
        let mut view = LiveView::mount(ReviewsView::new("u9", 10), api.shared(), None).await;
        view.loaded().await;

        let bad = WriteIntent::new(CreateReviewInput { contract_id: "c1".into(), rating: 0, comment: None });
        assert!(write_review(&api.shared(), &view, &bad).await.is_err());

        let good = WriteIntent::new(CreateReviewInput { contract_id: "c1".into(), rating: 5, comment: Some("Great".into()) });
        write_review(&api.shared(), &view, &good).await.unwrap();
        assert_eq!(view.with(|v| v.reviews.ready().map(|r| r[0].rating)).await, Some(5));
    }

    #[tokio::test]
    async fn login_then_logout_resets_everything() {
        let api = FakeApi::with(|_| {});
        let session = Session::init(Arc::new(MemoryStore::new()));
        let input = LoginInput { email: "ada@example.com".into(), password: "secret1".into() };

        let user = login(&api.shared(), &session, &input).await.unwrap();
        assert_eq!(user.role, Role::Client);
        assert_eq!(session.token().await.as_deref(), Some("token-ada@example.com"));

        let mut counter = LiveView::mount(NotificationCounter::default(), api.shared(), None).await;
        counter.loaded().await;
        counter.update(|c| c.count = 3).await;

        logout(&session, Some(&counter)).await.unwrap();
        assert!(session.token().await.is_none());
        assert_eq!(counter.with(|c| c.count).await, 0);
    }
}
