use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::client::models::view_state::{FetchFuture, ViewModel};
use crate::client::services::api_client::SharedApi;
use crate::client::services::websocket_client::{PushSubscriber, RetryPolicy, SubscriberEvent};
use crate::error::ClientError;

/// Where and how a mounted view opens its push channel.
#[derive(Debug, Clone)]
pub struct PushConfig {
    pub ws_base: String,
    pub token: Option<String>,
    pub policy: RetryPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PushStatus {
    /// No channel for this view, or push disabled.
    #[default]
    Idle,
    Connecting,
    Live,
    Reconnecting { attempt: u32 },
    /// Attempts exhausted; the view keeps its last state but gets no updates.
    Lost(String),
}

struct Mounted<V> {
    view: V,
    mounted: bool,
    generation: u64,
    push: PushStatus,
    /// Last bad update. Cleared by the next update that applies.
    event_error: Option<String>,
}

/// One mounted screen: its view model plus the fetch and push tasks that feed
/// it. Dropping or tearing down the `LiveView` stops both tasks, and no state
/// change can land afterwards.
pub struct LiveView<V: ViewModel> {
    shared: Arc<Mutex<Mounted<V>>>,
    api: SharedApi,
    changes: Arc<watch::Sender<u64>>,
    fetch_task: Option<JoinHandle<()>>,
    subscriber_task: Option<JoinHandle<()>>,
    pump_task: Option<JoinHandle<()>>,
}

impl<V: ViewModel> LiveView<V> {
    /// Starts the initial read and, when `push` is given and the view has a
    /// channel, the subscription. The view enters its loading state before
    /// the subscription opens, so an early push is never reset by the read.
    pub async fn mount(view: V, api: SharedApi, push: Option<PushConfig>) -> Self {
        let channel = view.channel();
        let (changes, _) = watch::channel(0u64);
        let mut live = Self {
            shared: Arc::new(Mutex::new(Mounted {
                view,
                mounted: true,
                generation: 0,
                push: PushStatus::Idle,
                event_error: None,
            })),
            api,
            changes: Arc::new(changes),
            fetch_task: None,
            subscriber_task: None,
            pump_task: None,
        };
        let initial = live.begin().await;

        if let (Some(config), Some(channel)) = (push, channel) {
            match PushSubscriber::new(&config.ws_base, &channel, config.policy) {
                Ok(subscriber) => {
                    live.shared.lock().await.push = PushStatus::Connecting;
                    let (tx, rx) = mpsc::unbounded_channel();
                    live.subscriber_task = Some(tokio::spawn(subscriber.with_token(config.token).run(tx)));
                    live.pump_task = Some(tokio::spawn(pump(live.shared.clone(), live.changes.clone(), rx)));
                }
                Err(e) => {
                    warn!("[VIEW] Cannot subscribe to {}: {}", channel.path(), e);
                    live.shared.lock().await.push = PushStatus::Lost(e.to_string());
                }
            }
        }

        if let Some((generation, future)) = initial {
            live.launch(generation, future);
        }
        live
    }

    /// Reads again for the view's current key. An older read still in flight
    /// is cancelled and its answer, if any, is discarded.
    pub async fn refetch(&mut self) {
        if let Some(previous) = self.fetch_task.take() {
            previous.abort();
        }
        if let Some((generation, future)) = self.begin().await {
            self.launch(generation, future);
        }
    }

    /// Bumps the generation and puts the view in its loading state. `None`
    /// once torn down or when the view has nothing to read.
    async fn begin(&self) -> Option<(u64, FetchFuture<V::Payload>)> {
        let (generation, future) = {
            let mut state = self.shared.lock().await;
            if !state.mounted {
                return None;
            }
            state.generation += 1;
            state.view.begin_fetch();
            (state.generation, state.view.fetch(self.api.clone()))
        };
        self.changes.send_modify(|n| *n += 1);
        future.map(|future| (generation, future))
    }

    fn launch(&mut self, generation: u64, future: FetchFuture<V::Payload>) {
        let shared = self.shared.clone();
        let changes = self.changes.clone();
        self.fetch_task = Some(tokio::spawn(async move {
            let result = future.await;
            let mut state = shared.lock().await;
            if !state.mounted || state.generation != generation {
                debug!("[VIEW] Dropping stale read (generation {})", generation);
                return;
            }
            if let Err(e) = &result {
                warn!("[VIEW] Read failed: {}", e);
            }
            state.view.apply_fetch(result);
            drop(state);
            changes.send_modify(|n| *n += 1);
        }));
    }

    /// Waits for the read started by the last `mount`/`refetch`.
    pub async fn loaded(&mut self) {
        if let Some(task) = self.fetch_task.take() {
            let _ = task.await;
        }
    }

    pub async fn with<R>(&self, read: impl FnOnce(&V) -> R) -> R {
        read(&self.shared.lock().await.view)
    }

    /// Applies a local change. Returns `None` once the view is torn down.
    pub async fn update<R>(&self, change: impl FnOnce(&mut V) -> R) -> Option<R> {
        let mut state = self.shared.lock().await;
        if !state.mounted {
            return None;
        }
        let out = change(&mut state.view);
        drop(state);
        self.changes.send_modify(|n| *n += 1);
        Some(out)
    }

    pub async fn push_status(&self) -> PushStatus {
        self.shared.lock().await.push.clone()
    }

    pub async fn event_error(&self) -> Option<String> {
        self.shared.lock().await.event_error.clone()
    }

    /// Ticks after every state change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub async fn is_mounted(&self) -> bool {
        self.shared.lock().await.mounted
    }

    pub async fn teardown(&mut self) {
        self.shared.lock().await.mounted = false;
        self.abort_tasks();
        info!("[VIEW] Unmounted");
    }

    fn abort_tasks(&mut self) {
        for task in [self.fetch_task.take(), self.subscriber_task.take(), self.pump_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }
}

impl<V: ViewModel> Drop for LiveView<V> {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

async fn pump<V: ViewModel>(
    shared: Arc<Mutex<Mounted<V>>>,
    changes: Arc<watch::Sender<u64>>,
    mut events: mpsc::UnboundedReceiver<SubscriberEvent>,
) {
    while let Some(event) = events.recv().await {
        let mut state = shared.lock().await;
        if !state.mounted {
            return;
        }
        match event {
            SubscriberEvent::Connected => state.push = PushStatus::Live,
            SubscriberEvent::Reconnecting { attempt, .. } => state.push = PushStatus::Reconnecting { attempt },
            SubscriberEvent::Exhausted(reason) => {
                state.push = PushStatus::Lost(ClientError::Push(reason).to_string());
            }
            SubscriberEvent::PayloadError(message) => {
                state.event_error = Some(ClientError::PushPayload(message).to_string());
            }
            SubscriberEvent::Event(event) => {
                let kind = event.kind().to_string();
                match state.view.apply_event(event) {
                    Ok(outcome) => {
                        debug!("[VIEW] {} -> {:?}", kind, outcome);
                        state.event_error = None;
                    }
                    Err(e) => {
                        warn!("[VIEW] Could not apply {}: {}", kind, e);
                        state.event_error = Some(e.to_string());
                    }
                }
            }
        }
        drop(state);
        changes.send_modify(|n| *n += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::models::reconciler::Outcome;
    use crate::client::models::contracts::ContractDetailView;
    use crate::client::models::view_state::Resource;
    use crate::client::services::testing::FakeApi;
    use crate::client::services::websocket_client::Channel;
    use crate::common::models::{Contract, ContractStatus, MilestoneStatus, Wallet};
    use crate::common::protocol::PushEvent;
    use futures_util::SinkExt;
    use tokio::net::TcpListener;
    use tokio::time::Duration;
    use tokio_tungstenite::{accept_async, tungstenite::Message};

    #[derive(Default)]
    struct BalanceView {
        wallet: Resource<Wallet>,
        events: u32,
    }

    impl ViewModel for BalanceView {
        type Payload = Wallet;

        fn fetch(&self, api: SharedApi) -> Option<FetchFuture<Wallet>> {
            Some(Box::pin(async move { api.get_wallet().await }))
        }

        fn channel(&self) -> Option<Channel> {
            Some(Channel::Wallet)
        }

        fn apply_fetch(&mut self, result: Result<Wallet, ClientError>) {
            self.wallet = Resource::from_result(result, "fetch wallet");
        }

        fn apply_event(&mut self, event: PushEvent) -> Result<Outcome, ClientError> {
            match event {
                PushEvent::Replace(fields) => {
                    let balance = fields
                        .get("balance")
                        .and_then(|v| v.as_f64())
                        .ok_or_else(|| ClientError::PushPayload("no balance".into()))?;
                    self.events += 1;
                    self.wallet = Resource::Ready(Wallet { balance });
                    Ok(Outcome::Updated)
                }
                _ => Ok(Outcome::Ignored),
            }
        }
    }

    #[tokio::test]
    async fn mount_loads_then_reports_ready() {
        let api = FakeApi::with(|d| d.wallet = Wallet { balance: 12.0 });
        let mut live = LiveView::mount(BalanceView::default(), api.shared(), None).await;
        live.loaded().await;
        assert_eq!(live.with(|v| v.wallet.clone()).await, Resource::Ready(Wallet { balance: 12.0 }));
        assert_eq!(live.push_status().await, PushStatus::Idle);
    }

    #[tokio::test]
    async fn nothing_lands_after_teardown() {
        let api = FakeApi::with(|d| {
            d.wallet = Wallet { balance: 12.0 };
            d.read_delay = Some(Duration::from_millis(50));
        });
        let mut live = LiveView::mount(BalanceView::default(), api.shared(), None).await;
        assert!(live.is_mounted().await);
        live.teardown().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!live.is_mounted().await);
        assert!(live.with(|v| v.wallet.is_loading()).await);
        assert!(live.update(|v| v.events += 1).await.is_none());
    }

    #[tokio::test]
    async fn stale_read_is_discarded_by_refetch() {
        let api = FakeApi::with(|d| {
            d.wallet = Wallet { balance: 1.0 };
            d.read_delay = Some(Duration::from_millis(30));
        });
        let mut live = LiveView::mount(BalanceView::default(), api.shared(), None).await;
        api.edit(|d| d.wallet = Wallet { balance: 2.0 });
        live.refetch().await;
        live.loaded().await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(live.with(|v| v.wallet.clone()).await, Resource::Ready(Wallet { balance: 2.0 }));
    }

    #[tokio::test]
    async fn bad_push_is_recoverable_and_later_pushes_apply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            // Let the initial read land first.
            tokio::time::sleep(Duration::from_millis(100)).await;
            ws.send(Message::Text(r#"{"balance": "oops"}"#.into())).await.unwrap();
            ws.send(Message::Text(r#"{"balance": 99.5}"#.into())).await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let api = FakeApi::with(|d| d.wallet = Wallet { balance: 1.0 });
        let push = PushConfig {
            ws_base: format!("ws://{}", addr),
            token: Some("tok".into()),
            policy: RetryPolicy { max_attempts: 2, delay: Duration::from_millis(10) },
        };
        let mut live = LiveView::mount(BalanceView::default(), api.shared(), Some(push)).await;
        live.loaded().await;

        let mut changes = live.changes();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        while live.with(|v| v.events).await == 0 {
            assert!(tokio::time::Instant::now() < deadline, "push never applied");
            let _ = tokio::time::timeout(Duration::from_millis(100), changes.changed()).await;
        }

        assert_eq!(live.with(|v| v.wallet.clone()).await, Resource::Ready(Wallet { balance: 99.5 }));
        assert_eq!(live.event_error().await, None);
        assert_eq!(live.push_status().await, PushStatus::Live);
    }

    #[tokio::test]
    async fn early_push_survives_the_initial_read() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let frame = r#"{"id": "c1", "title": "Logo", "status": "completed",
                "milestones": [{"id": "m1", "title": "Wireframes", "status": "approved"}]}"#;
            ws.send(Message::Text(frame.into())).await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let stale: Contract = serde_json::from_str(
            r#"{"id": "c1", "title": "Logo", "status": "active",
                "milestones": [{"id": "m1", "title": "Wireframes", "status": "submitted"}]}"#,
        )
        .unwrap();
        let api = FakeApi::with(|d| {
            d.contracts = vec![stale];
            d.read_delay = Some(Duration::from_millis(300));
        });
        let push = PushConfig {
            ws_base: format!("ws://{}", addr),
            token: None,
            policy: RetryPolicy { max_attempts: 2, delay: Duration::from_millis(10) },
        };
        let mut live = LiveView::mount(ContractDetailView::new("c1"), api.shared(), Some(push)).await;

        let mut changes = live.changes();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        while live.with(|v| v.contract.ready().is_none()).await {
            assert!(tokio::time::Instant::now() < deadline, "push never applied");
            let _ = tokio::time::timeout(Duration::from_millis(50), changes.changed()).await;
        }
        assert_eq!(api.calls(), vec!["get_contract"]);

        live.loaded().await;
        let (status, milestone) = live
            .with(|v| (v.contract.ready().map(|c| c.status), v.milestone("m1").map(|m| m.status)))
            .await;
        assert_eq!(status, Some(ContractStatus::Completed));
        assert_eq!(milestone, Some(MilestoneStatus::Approved));
    }
}
