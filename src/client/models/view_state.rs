use futures_util::future::BoxFuture;

use crate::client::models::reconciler::Outcome;
use crate::client::services::api_client::SharedApi;
use crate::client::services::websocket_client::Channel;
use crate::common::protocol::PushEvent;
use crate::error::ClientError;

/// Result of a read as a view sees it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Resource<T> {
    #[default]
    Loading,
    Failed(String),
    Ready(T),
}

impl<T> Resource<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Resource::Loading)
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Resource::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn ready_mut(&mut self) -> Option<&mut T> {
        match self {
            Resource::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Resource::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// Maps a fetch result, prefixing failures with the action that failed.
    pub fn from_result(result: Result<T, ClientError>, action: &str) -> Self {
        match result {
            Ok(value) => Resource::Ready(value),
            Err(e) => Resource::Failed(e.describe(action)),
        }
    }
}

pub type FetchFuture<P> = BoxFuture<'static, Result<P, ClientError>>;

/// State of one mounted screen.
///
/// A view says what to read (`fetch`), which push channel feeds it
/// (`channel`), and how reads and events change it. It never performs IO
/// itself; [`crate::client::services::live_view::LiveView`] drives it.
pub trait ViewModel: Send + 'static {
    type Payload: Send + 'static;

    /// `None` when there is nothing to read for the current key.
    fn fetch(&self, api: SharedApi) -> Option<FetchFuture<Self::Payload>>;

    fn channel(&self) -> Option<Channel>;

    /// Called right before a fetch starts.
    fn begin_fetch(&mut self) {}

    fn apply_fetch(&mut self, result: Result<Self::Payload, ClientError>);

    fn apply_event(&mut self, event: PushEvent) -> Result<Outcome, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_states_are_exclusive() {
        let loading: Resource<u8> = Resource::default();
        assert!(loading.is_loading());
        assert!(loading.ready().is_none() && loading.error().is_none());

        let failed: Resource<u8> = Resource::from_result(Err(ClientError::Transport("refused".into())), "fetch wallet");
        assert_eq!(failed.error(), Some("Failed to fetch wallet: Network error: refused"));
        assert!(!failed.is_loading());

        let mut ready = Resource::from_result(Ok(3u8), "fetch wallet");
        *ready.ready_mut().unwrap() += 1;
        assert_eq!(ready.ready(), Some(&4));
    }
}
