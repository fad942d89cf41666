use crate::client::models::reconciler::Outcome;
use crate::client::models::view_state::{FetchFuture, ViewModel};
use crate::client::services::api_client::SharedApi;
use crate::client::services::websocket_client::Channel;
use crate::common::protocol::PushEvent;
use crate::error::ClientError;

/// Unread badge. Nothing to read up front; only the push channel feeds it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationCounter {
    pub count: u32,
}

impl NotificationCounter {
    pub fn reset(&mut self) {
        self.count = 0;
    }
}

impl ViewModel for NotificationCounter {
    type Payload = ();

    fn fetch(&self, _api: SharedApi) -> Option<FetchFuture<()>> {
        None
    }

    fn channel(&self) -> Option<Channel> {
        Some(Channel::Notifications)
    }

    fn apply_fetch(&mut self, _result: Result<(), ClientError>) {}

    fn apply_event(&mut self, event: PushEvent) -> Result<Outcome, ClientError> {
        match event {
            PushEvent::NewMessage { .. } | PushEvent::ContractUpdate(_) => {
                self.count = self.count.saturating_add(1);
                Ok(Outcome::Updated)
            }
            _ => Ok(Outcome::Ignored),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::models::Message;
    use serde_json::Map;

    #[test]
    fn counts_messages_and_contract_updates_only() {
        let mut counter = NotificationCounter::default();
        counter.apply_event(PushEvent::NewMessage { thread_id: "t1".into(), message: Message::default() }).unwrap();
        counter.apply_event(PushEvent::ContractUpdate(Map::new())).unwrap();
        counter.apply_event(PushEvent::Unknown("typing".into())).unwrap();
        counter.apply_event(PushEvent::Replace(Map::new())).unwrap();
        assert_eq!(counter.count, 2);
        counter.reset();
        assert_eq!(counter.count, 0);
    }
}
