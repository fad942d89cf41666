use serde_json::Value;

use crate::client::models::reconciler::{merge_fields, sort_newest_first, thread_timestamp, upsert_fields, upsert_tail, Outcome};
use crate::client::models::view_state::{FetchFuture, Resource, ViewModel};
use crate::client::services::api_client::SharedApi;
use crate::client::services::websocket_client::Channel;
use crate::common::models::{Message, Thread};
use crate::common::protocol::PushEvent;
use crate::error::ClientError;

/// Inbox, newest conversation first.
#[derive(Debug, Clone, Default)]
pub struct ThreadListView {
    pub threads: Resource<Vec<Thread>>,
}

impl ThreadListView {
    pub fn new() -> Self {
        Self::default()
    }

    fn resort(&mut self) {
        if let Some(threads) = self.threads.ready_mut() {
            sort_newest_first(threads, thread_timestamp);
        }
    }
}

impl ViewModel for ThreadListView {
    type Payload = Vec<Thread>;

    fn fetch(&self, api: SharedApi) -> Option<FetchFuture<Vec<Thread>>> {
        Some(Box::pin(async move { api.list_threads().await }))
    }

    fn channel(&self) -> Option<Channel> {
        Some(Channel::ThreadList)
    }

    fn begin_fetch(&mut self) {
        self.threads = Resource::Loading;
    }

    fn apply_fetch(&mut self, result: Result<Vec<Thread>, ClientError>) {
        self.threads = Resource::from_result(result, "fetch threads");
        self.resort();
    }

    fn apply_event(&mut self, event: PushEvent) -> Result<Outcome, ClientError> {
        let Some(threads) = self.threads.ready_mut() else {
            return Ok(Outcome::Ignored);
        };
        let outcome = match event {
            PushEvent::NewMessage { thread_id, message } => match threads.iter_mut().find(|t| t.id == thread_id) {
                Some(thread) => {
                    thread.last_message = Some(message);
                    Outcome::Updated
                }
                None => {
                    threads.insert(
                        0,
                        Thread { id: thread_id, title: None, last_message: Some(message), messages: Vec::new() },
                    );
                    Outcome::Inserted
                }
            },
            PushEvent::Replace(fields) => upsert_fields(threads, &fields)?,
            _ => Outcome::Ignored,
        };
        if outcome != Outcome::Ignored {
            self.resort();
        }
        Ok(outcome)
    }
}

/// One conversation, messages in the order they were sent.
#[derive(Debug, Clone)]
pub struct ThreadDetailView {
    pub id: String,
    pub thread: Resource<Thread>,
}

impl ThreadDetailView {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), thread: Resource::Loading }
    }

    /// Adds a message the user just sent, once the server confirmed it.
    pub fn append(&mut self, message: Message) -> Outcome {
        match self.thread.ready_mut() {
            Some(thread) => {
                thread.last_message = Some(message.clone());
                upsert_tail(&mut thread.messages, message)
            }
            None => Outcome::Ignored,
        }
    }
}

impl ViewModel for ThreadDetailView {
    type Payload = Thread;

    fn fetch(&self, api: SharedApi) -> Option<FetchFuture<Thread>> {
        let id = self.id.clone();
        Some(Box::pin(async move { api.get_thread(&id).await }))
    }

    fn channel(&self) -> Option<Channel> {
        Some(Channel::ThreadDetail(self.id.clone()))
    }

    fn begin_fetch(&mut self) {
        self.thread = Resource::Loading;
    }

    fn apply_fetch(&mut self, result: Result<Thread, ClientError>) {
        self.thread = Resource::from_result(result, "fetch messages");
    }

    fn apply_event(&mut self, event: PushEvent) -> Result<Outcome, ClientError> {
        match event {
            PushEvent::NewMessage { thread_id, message } if thread_id == self.id => Ok(self.append(message)),
            PushEvent::Replace(fields) => {
                if matches!(fields.get("id").and_then(Value::as_str), Some(id) if id != self.id) {
                    return Ok(Outcome::Ignored);
                }
                match self.thread.ready_mut() {
                    Some(thread) => {
                        *thread = merge_fields(thread, &fields)?;
                        Ok(Outcome::Updated)
                    }
                    None => Ok(Outcome::Ignored),
                }
            }
            _ => Ok(Outcome::Ignored),
        }
    }
}
