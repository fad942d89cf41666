use anyhow::{anyhow, Context as _};
use clap::{Parser, Subcommand};
use log::info;
use std::sync::Arc;

use crate::client::config::ClientConfig;
use crate::client::forms::{
    ApproveMilestoneInput, CreateBidInput, CreateJobInput, CreateReviewInput, FundInput, LoginInput,
    ReleaseInput, SendMessageInput, SignupInput, WriteIntent,
};
use crate::client::models::contracts::{ContractDetailView, ContractListView, StatusFilter};
use crate::client::models::dashboard::DashboardView;
use crate::client::models::jobs::{JobBoardView, JobDetailView};
use crate::client::models::notifications::NotificationCounter;
use crate::client::models::reviews::{RatingFilter, ReviewsView};
use crate::client::models::threads::{ThreadDetailView, ThreadListView};
use crate::client::models::view_state::ViewModel;
use crate::client::models::wallet::WalletView;
use crate::client::render::Render;
use crate::client::services::api_client::{HttpApi, SharedApi};
use crate::client::services::live_view::{LiveView, PushConfig, PushStatus};
use crate::client::services::mutations;
use crate::client::services::websocket_client::RetryPolicy;
use crate::client::session::{Session, SharedSession};
use crate::client::utils::session_store::KeyringStore;
use crate::common::models::{JobKind, Role};
use crate::error::ClientError;

#[derive(Parser, Debug)]
#[command(name = "skilllink")]
#[command(about = "Command-line client for the SkillLink freelance marketplace")]
pub struct Cli {
    /// REST base URL (overrides SKILLLINK_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Push channel base URL (overrides SKILLLINK_WS_URL)
    #[arg(long, global = true)]
    pub ws_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and remember the session
    Login { email: String, password: String },
    /// Create an account
    Signup {
        email: String,
        password: String,
        #[arg(long, default_value = "client")]
        role: Role,
        #[arg(long)]
        agree_terms: bool,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    #[command(subcommand)]
    Jobs(JobsCommand),
    /// Bid on a job
    Bid { job_id: String, amount: f64, cover_letter: String },
    #[command(subcommand)]
    Contracts(ContractsCommand),
    #[command(subcommand)]
    Threads(ThreadsCommand),
    #[command(subcommand)]
    Wallet(WalletCommand),
    #[command(subcommand)]
    Reviews(ReviewsCommand),
    /// Show the dashboard for your role
    Dashboard,
    /// Keep a view open and print it on every live update
    #[command(subcommand)]
    Watch(WatchTarget),
}

#[derive(Subcommand, Debug)]
pub enum JobsCommand {
    List {
        #[arg(long)]
        search: Option<String>,
    },
    Show { id: String },
    Post {
        title: String,
        description: String,
        #[arg(long)]
        budget: Option<f64>,
        #[arg(long = "type", default_value = "fixed")]
        kind: JobKind,
        #[arg(long = "skill")]
        skills: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ContractsCommand {
    List {
        #[arg(long, default_value = "all")]
        status: StatusFilter,
        /// How many pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    Show { id: String },
    Approve { contract_id: String, milestone_id: String },
}

#[derive(Subcommand, Debug)]
pub enum ThreadsCommand {
    List,
    Show { id: String },
    Send {
        id: String,
        #[arg(required = true)]
        content: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum WalletCommand {
    Show,
    Fund { contract_id: String, amount: f64 },
    Release {
        contract_id: String,
        #[arg(long)]
        milestone: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReviewsCommand {
    List {
        /// Defaults to the logged-in user
        #[arg(long)]
        user: Option<String>,
        #[arg(long, default_value = "all")]
        rating: RatingFilter,
    },
    Write {
        contract_id: String,
        rating: u8,
        #[arg(long)]
        comment: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum WatchTarget {
    Contract { id: String },
    Contracts,
    Thread { id: String },
    Threads,
    Wallet,
    Reviews {
        #[arg(long)]
        user: Option<String>,
    },
    Dashboard,
    Notifications,
}

struct Context {
    config: ClientConfig,
    session: SharedSession,
    api: SharedApi,
}

/// Validation messages are shown as they are; everything else says what failed.
fn fail(action: &str, err: ClientError) -> anyhow::Error {
    if err.is_validation() {
        anyhow!(err)
    } else {
        anyhow!(err.describe(action))
    }
}

impl Context {
    async fn show<V: ViewModel + Render>(&self, view: V) -> LiveView<V> {
        let mut live = LiveView::mount(view, self.api.clone(), None).await;
        live.loaded().await;
        println!("{}", live.with(Render::render).await);
        live
    }

    async fn load<V: ViewModel>(&self, view: V) -> LiveView<V> {
        let mut live = LiveView::mount(view, self.api.clone(), None).await;
        live.loaded().await;
        live
    }

    async fn push_config(&self) -> PushConfig {
        PushConfig {
            ws_base: self.config.ws_url.clone(),
            token: self.session.token().await,
            policy: RetryPolicy::from(&self.config),
        }
    }

    async fn user_id(&self, explicit: Option<String>) -> anyhow::Result<String> {
        match explicit {
            Some(id) => Ok(id),
            None => Ok(self.session.require_user().await?.id),
        }
    }

    async fn watch<V: ViewModel + Render>(&self, view: V) -> anyhow::Result<()> {
        let push = self.push_config().await;
        let mut live = LiveView::mount(view, self.api.clone(), Some(push)).await;
        let mut changes = live.changes();
        live.loaded().await;
        println!("{}", live.with(Render::render).await);

        loop {
            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    println!("\n{}", live.with(Render::render).await);
                    if let Some(err) = live.event_error().await {
                        eprintln!("{}", err);
                    }
                    if let PushStatus::Lost(reason) = live.push_status().await {
                        live.teardown().await;
                        return Err(anyhow!(reason));
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("[CLI] Interrupted, closing live view");
                    break;
                }
            }
        }
        live.teardown().await;
        Ok(())
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ClientConfig::from_env();
    if let Some(url) = cli.api_url {
        config = config.with_api_url(url);
    }
    if let Some(url) = cli.ws_url {
        config = config.with_ws_url(url);
    }

    let session = Session::init(Arc::new(KeyringStore::new()));
    let api: SharedApi = Arc::new(HttpApi::new(&config, session.clone()).context("building HTTP client")?);
    let ctx = Context { config, session, api };

    match cli.command {
        Command::Login { email, password } => {
            let user = mutations::login(&ctx.api, &ctx.session, &LoginInput { email, password })
                .await
                .map_err(|e| fail("log in", e))?;
            println!("Logged in as {} ({})", user.id, user.role.as_str());
        }
        Command::Signup { email, password, role, agree_terms } => {
            let input = SignupInput { email, password, role, agree_terms };
            let user = mutations::signup(&ctx.api, &ctx.session, &input).await.map_err(|e| fail("sign up", e))?;
            println!("Welcome! Signed up as {} ({})", user.id, user.role.as_str());
        }
        Command::Logout => {
            mutations::logout(&ctx.session, None).await.map_err(|e| fail("log out", e))?;
            println!("Logged out");
        }
        Command::Whoami => match ctx.session.user().await {
            Some(user) => println!("{} ({})", user.id, user.role.as_str()),
            None => println!("Not logged in"),
        },
        Command::Jobs(action) => run_jobs(&ctx, action).await?,
        Command::Bid { job_id, amount, cover_letter } => {
            let view = ctx.load(JobDetailView::new(job_id.clone())).await;
            let intent = WriteIntent::new(CreateBidInput { job_id, amount, cover_letter });
            mutations::submit_bid(&ctx.api, &view, &intent).await.map_err(|e| fail("submit bid", e))?;
            println!("{}", view.with(Render::render).await);
        }
        Command::Contracts(action) => run_contracts(&ctx, action).await?,
        Command::Threads(action) => run_threads(&ctx, action).await?,
        Command::Wallet(action) => run_wallet(&ctx, action).await?,
        Command::Reviews(action) => run_reviews(&ctx, action).await?,
        Command::Dashboard => {
            let role = ctx.session.require_user().await?.role;
            ctx.show(DashboardView::new(role, Some(role))).await;
        }
        Command::Watch(target) => run_watch(&ctx, target).await?,
    }
    Ok(())
}

async fn run_jobs(ctx: &Context, action: JobsCommand) -> anyhow::Result<()> {
    match action {
        JobsCommand::List { search } => {
            let board = ctx.load(JobBoardView::new()).await;
            board.update(|b| b.query = search.unwrap_or_default()).await;
            println!("{}", board.with(Render::render).await);
        }
        JobsCommand::Show { id } => {
            ctx.show(JobDetailView::new(id)).await;
        }
        JobsCommand::Post { title, description, budget, kind, skills } => {
            let mut input = CreateJobInput::new(title, description);
            input.budget = budget;
            input.kind = kind;
            for skill in &skills {
                input.add_skill(skill);
            }
            let board = ctx.load(JobBoardView::new()).await;
            match mutations::post_job(&ctx.api, &board, &WriteIntent::new(input)).await {
                Ok(Some(job)) => println!("Job posted: {}", job.id),
                Ok(None) => println!("Job posted"),
                Err(e) => return Err(fail("post job", e)),
            }
        }
    }
    Ok(())
}

async fn run_contracts(ctx: &Context, action: ContractsCommand) -> anyhow::Result<()> {
    match action {
        ContractsCommand::List { status, pages } => {
            let mut list = ctx.load(ContractListView::new(ctx.config.page_size)).await;
            list.update(|v| v.filter = status).await;
            for _ in 1..pages.max(1) {
                if list.update(ContractListView::load_more).await != Some(true) {
                    break;
                }
                list.refetch().await;
                list.loaded().await;
            }
            println!("{}", list.with(Render::render).await);
        }
        ContractsCommand::Show { id } => {
            ctx.show(ContractDetailView::new(id)).await;
        }
        ContractsCommand::Approve { contract_id, milestone_id } => {
            let view = ctx.load(ContractDetailView::new(contract_id)).await;
            let intent = WriteIntent::new(ApproveMilestoneInput { milestone_id });
            mutations::approve_milestone(&ctx.api, &view, &intent)
                .await
                .map_err(|e| fail("approve milestone", e))?;
            println!("{}", view.with(Render::render).await);
        }
    }
    Ok(())
}

async fn run_threads(ctx: &Context, action: ThreadsCommand) -> anyhow::Result<()> {
    match action {
        ThreadsCommand::List => {
            ctx.show(ThreadListView::new()).await;
        }
        ThreadsCommand::Show { id } => {
            ctx.show(ThreadDetailView::new(id)).await;
        }
        ThreadsCommand::Send { id, content } => {
            let mut view = ctx.load(ThreadDetailView::new(id)).await;
            let intent = WriteIntent::new(SendMessageInput { content: content.join(" ") });
            mutations::send_message(&ctx.api, &mut view, &intent)
                .await
                .map_err(|e| fail("send message", e))?;
            view.loaded().await;
            println!("{}", view.with(Render::render).await);
        }
    }
    Ok(())
}

async fn run_wallet(ctx: &Context, action: WalletCommand) -> anyhow::Result<()> {
    match action {
        WalletCommand::Show => {
            ctx.show(WalletView::new()).await;
        }
        WalletCommand::Fund { contract_id, amount } => {
            let view = ctx.load(WalletView::new()).await;
            let intent = WriteIntent::new(FundInput { contract_id, amount });
            mutations::fund_escrow(&ctx.api, &view, &intent)
                .await
                .map_err(|e| fail("fund escrow", e))?;
            println!("Escrow funded. {}", view.with(Render::render).await);
        }
        WalletCommand::Release { contract_id, milestone } => {
            let mut view = ctx.load(WalletView::new()).await;
            let intent = WriteIntent::new(ReleaseInput { contract_id, milestone_id: milestone });
            mutations::release_escrow(&ctx.api, &mut view, &intent)
                .await
                .map_err(|e| fail("release escrow", e))?;
            view.loaded().await;
            println!("Escrow released. {}", view.with(Render::render).await);
        }
    }
    Ok(())
}

async fn run_reviews(ctx: &Context, action: ReviewsCommand) -> anyhow::Result<()> {
    match action {
        ReviewsCommand::List { user, rating } => {
            let user_id = ctx.user_id(user).await?;
            let view = ctx.load(ReviewsView::new(user_id, ctx.config.page_size)).await;
            view.update(|v| v.filter = rating).await;
            println!("{}", view.with(Render::render).await);
        }
        ReviewsCommand::Write { contract_id, rating, comment } => {
            let user_id = ctx.user_id(None).await?;
            let view = ctx.load(ReviewsView::new(user_id, ctx.config.page_size)).await;
            let intent = WriteIntent::new(CreateReviewInput { contract_id, rating, comment });
            mutations::write_review(&ctx.api, &view, &intent)
                .await
                .map_err(|e| fail("submit review", e))?;
            println!("Review submitted");
        }
    }
    Ok(())
}

async fn run_watch(ctx: &Context, target: WatchTarget) -> anyhow::Result<()> {
    match target {
        WatchTarget::Contract { id } => ctx.watch(ContractDetailView::new(id)).await,
        WatchTarget::Contracts => ctx.watch(ContractListView::new(ctx.config.page_size)).await,
        WatchTarget::Thread { id } => ctx.watch(ThreadDetailView::new(id)).await,
        WatchTarget::Threads => ctx.watch(ThreadListView::new()).await,
        WatchTarget::Wallet => ctx.watch(WalletView::new()).await,
        WatchTarget::Reviews { user } => {
            let user_id = ctx.user_id(user).await?;
            ctx.watch(ReviewsView::new(user_id, ctx.config.page_size)).await
        }
        WatchTarget::Dashboard => {
            let role = ctx.session.role().await;
            let role = role.ok_or_else(|| anyhow!(ClientError::NotAuthenticated))?;
            ctx.watch(DashboardView::new(role, Some(role))).await
        }
        WatchTarget::Notifications => ctx.watch(NotificationCounter::default()).await,
    }
}
