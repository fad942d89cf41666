use futures_util::StreamExt;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::client::config::ClientConfig;
use crate::common::protocol::{parse_push_event, PushEvent};
use crate::error::ClientError;

/// Server-to-client update streams, one per kind of screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    ContractDetail(String),
    ContractList,
    ThreadDetail(String),
    ThreadList,
    Notifications,
    Wallet,
    Reviews,
    ClientAnalytics,
    FreelancerAnalytics,
}

impl Channel {
    pub fn path(&self) -> String {
        match self {
            Channel::ContractDetail(id) => format!("/contracts/{}/updates", id),
            Channel::ContractList => "/contracts/updates".to_string(),
            Channel::ThreadDetail(id) => format!("/messages/threads/{}/updates", id),
            Channel::ThreadList => "/messages/threads/updates".to_string(),
            Channel::Notifications => "/notifications".to_string(),
            Channel::Wallet => "/wallet/updates".to_string(),
            Channel::Reviews => "/reviews/updates".to_string(),
            Channel::ClientAnalytics => "/client/updates".to_string(),
            Channel::FreelancerAnalytics => "/freelancer/updates".to_string(),
        }
    }
}

/// `contract:<id>`, `contracts`, `thread:<id>`, `threads`, `notifications`,
/// `wallet`, `reviews`, `client`, `freelancer`.
impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, id) = match s.trim().split_once(':') {
            Some((name, id)) => (name, Some(id.trim())),
            None => (s.trim(), None),
        };
        match (name, id) {
            ("contract", Some(id)) if !id.is_empty() => Ok(Channel::ContractDetail(id.to_string())),
            ("thread", Some(id)) if !id.is_empty() => Ok(Channel::ThreadDetail(id.to_string())),
            ("contracts", None) => Ok(Channel::ContractList),
            ("threads", None) => Ok(Channel::ThreadList),
            ("notifications", None) => Ok(Channel::Notifications),
            ("wallet", None) => Ok(Channel::Wallet),
            ("reviews", None) => Ok(Channel::Reviews),
            ("client", None) => Ok(Channel::ClientAnalytics),
            ("freelancer", None) => Ok(Channel::FreelancerAnalytics),
            _ => Err(format!("unknown channel '{}'", s)),
        }
    }
}

/// Finite reconnects with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, delay: Duration::from_secs(2) }
    }
}

impl From<&ClientConfig> for RetryPolicy {
    fn from(config: &ClientConfig) -> Self {
        Self { max_attempts: config.ws_max_retries.max(1), delay: config.ws_retry_delay }
    }
}

/// What the subscriber reports to the view that owns it.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriberEvent {
    Connected,
    Event(PushEvent),
    /// One bad frame; the subscription keeps going.
    PayloadError(String),
    /// The link dropped or an attempt failed; another attempt follows.
    Reconnecting { attempt: u32, reason: String },
    /// All attempts used up. Nothing more will arrive.
    Exhausted(String),
}

pub struct PushSubscriber {
    url: Url,
    token: Option<String>,
    policy: RetryPolicy,
}

impl PushSubscriber {
    pub fn new(base: &str, channel: &Channel, policy: RetryPolicy) -> Result<Self, ClientError> {
        let url = Url::parse(&format!("{}{}", base.trim_end_matches('/'), channel.path()))?;
        match url.scheme() {
            "ws" | "wss" => Ok(Self { url, token: None, policy }),
            other => Err(ClientError::Push(format!("unsupported scheme '{}'", other))),
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Starts the subscription on the runtime and hands back its event stream.
    pub fn spawn(self) -> (tokio::task::JoinHandle<()>, mpsc::UnboundedReceiver<SubscriberEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(self.run(tx));
        (handle, rx)
    }

    /// Connects, forwards events, reconnects. Returns once the attempts are
    /// exhausted or nobody listens any more.
    pub async fn run(self, events: mpsc::UnboundedSender<SubscriberEvent>) {
        let mut failures: u32 = 0;

        loop {
            let reason = match self.connect_and_stream(&events).await {
                Stream::ReceiverGone => {
                    debug!("[WS:CLIENT] {} listener dropped, stopping", self.url);
                    return;
                }
                Stream::Ended { was_connected, reason } => {
                    if was_connected {
                        failures = 0;
                    }
                    reason
                }
            };

            failures += 1;
            if failures >= self.policy.max_attempts {
                warn!("[WS:CLIENT] {} giving up after {} attempts: {}", self.url, failures, reason);
                let _ = events.send(SubscriberEvent::Exhausted(reason));
                return;
            }

            info!(
                "[WS:CLIENT] {} attempt {} failed ({}), retrying in {:?}",
                self.url, failures, reason, self.policy.delay
            );
            if events.send(SubscriberEvent::Reconnecting { attempt: failures, reason }).is_err() {
                return;
            }
            tokio::time::sleep(self.policy.delay).await;
        }
    }

    async fn connect_and_stream(&self, events: &mpsc::UnboundedSender<SubscriberEvent>) -> Stream {
        let mut request = match self.url.as_str().into_client_request() {
            Ok(request) => request,
            Err(e) => return Stream::Ended { was_connected: false, reason: e.to_string() },
        };
        if let Some(token) = &self.token {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    request.headers_mut().insert("Authorization", value);
                }
                Err(e) => return Stream::Ended { was_connected: false, reason: e.to_string() },
            }
        }

        let (ws_stream, _) = match connect_async(request).await {
            Ok(ok) => ok,
            Err(e) => return Stream::Ended { was_connected: false, reason: format!("Failed to connect: {}", e) },
        };
        info!("[WS:CLIENT] Connected to {}", self.url);
        if events.send(SubscriberEvent::Connected).is_err() {
            return Stream::ReceiverGone;
        }

        // Push channels are one-directional; the sink half only answers pings,
        // which tungstenite queues on its own.
        let (_sink, mut stream) = ws_stream.split();
        while let Some(frame) = stream.next().await {
            let outgoing = match frame {
                Ok(Message::Text(text)) => match parse_push_event(&text) {
                    Ok(event) => SubscriberEvent::Event(event),
                    Err(e) => {
                        warn!("[WS:CLIENT] Failed to parse message: {}", e);
                        SubscriberEvent::PayloadError(e.to_string())
                    }
                },
                Ok(Message::Close(_)) => {
                    return Stream::Ended { was_connected: true, reason: "Connection closed".to_string() };
                }
                Ok(_) => continue,
                Err(e) => {
                    return Stream::Ended { was_connected: true, reason: format!("WebSocket error: {}", e) };
                }
            };
            if events.send(outgoing).is_err() {
                return Stream::ReceiverGone;
            }
        }
        Stream::Ended { was_connected: true, reason: "Connection closed".to_string() }
    }
}

enum Stream {
    ReceiverGone,
    Ended { was_connected: bool, reason: String },
}
