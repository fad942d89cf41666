use crate::client::models::reconciler::{merge_wallet, Outcome};
use crate::client::models::view_state::{FetchFuture, Resource, ViewModel};
use crate::client::services::api_client::SharedApi;
use crate::client::services::websocket_client::Channel;
use crate::common::models::Wallet;
use crate::common::protocol::PushEvent;
use crate::error::ClientError;

#[derive(Debug, Clone, Default)]
pub struct WalletView {
    pub wallet: Resource<Wallet>,
}

impl WalletView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Money moved into escrow.
    pub fn debit(&mut self, amount: f64) {
        if let Some(wallet) = self.wallet.ready_mut() {
            wallet.balance -= amount;
        }
    }

    /// Takes the server's figure as is.
    pub fn adopt(&mut self, wallet: Wallet) {
        self.wallet = Resource::Ready(wallet);
    }
}

impl ViewModel for WalletView {
    type Payload = Wallet;

    fn fetch(&self, api: SharedApi) -> Option<FetchFuture<Wallet>> {
        Some(Box::pin(async move { api.get_wallet().await }))
    }

    fn channel(&self) -> Option<Channel> {
        Some(Channel::Wallet)
    }

    fn begin_fetch(&mut self) {
        self.wallet = Resource::Loading;
    }

    fn apply_fetch(&mut self, result: Result<Wallet, ClientError>) {
        self.wallet = Resource::from_result(result, "fetch wallet");
    }

    fn apply_event(&mut self, event: PushEvent) -> Result<Outcome, ClientError> {
        match (event, self.wallet.ready_mut()) {
            (PushEvent::Replace(fields), Some(wallet)) => {
                *wallet = merge_wallet(wallet, &fields)?;
                Ok(Outcome::Updated)
            }
            _ => Ok(Outcome::Ignored),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn balance_push_overwrites_and_other_kinds_are_ignored() {
        let mut view = WalletView::new();
        view.apply_fetch(Ok(Wallet { balance: 500.0 }));

        let Some(fields) = json!({"balance": 320.0}).as_object().cloned() else { panic!() };
        assert_eq!(view.apply_event(PushEvent::Replace(fields)).unwrap(), Outcome::Updated);
        assert_eq!(view.wallet.ready().map(|w| w.balance), Some(320.0));

        assert_eq!(view.apply_event(PushEvent::Unknown("ping".into())).unwrap(), Outcome::Ignored);
        view.debit(20.0);
        assert_eq!(view.wallet.ready().map(|w| w.balance), Some(300.0));
    }

    #[test]
    fn failed_read_reports_action() {
        let mut view = WalletView::new();
        view.apply_fetch(Err(ClientError::Api { status: 500, message: "Internal error".into() }));
        assert_eq!(view.wallet.error(), Some("Failed to fetch wallet: Internal error"));
    }
}
