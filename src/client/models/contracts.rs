use log::warn;
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::client::models::reconciler::{append_page, merge_fields, upsert_fields, upsert_tail, Entity, Outcome};
use crate::client::models::view_state::{FetchFuture, Resource, ViewModel};
use crate::client::services::api_client::{Page, SharedApi};
use crate::client::services::websocket_client::Channel;
use crate::common::models::{Contract, ContractStatus, Milestone, MilestoneStatus};
use crate::common::protocol::PushEvent;
use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(ContractStatus),
}

impl StatusFilter {
    pub fn matches(&self, contract: &Contract) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(status) => contract.status == *status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "pending" => Ok(StatusFilter::Only(ContractStatus::Pending)),
            "active" => Ok(StatusFilter::Only(ContractStatus::Active)),
            "completed" => Ok(StatusFilter::Only(ContractStatus::Completed)),
            other => Err(format!("unknown status filter '{}'", other)),
        }
    }
}

/// "My contracts": paginated, filterable, fed by `/contracts/updates`.
#[derive(Debug, Clone)]
pub struct ContractListView {
    pub contracts: Resource<Vec<Contract>>,
    pub filter: StatusFilter,
    pub page: Page,
    pub has_more: bool,
    /// Failure of a later page; the loaded pages stay visible.
    pub load_more_error: Option<String>,
}

impl ContractListView {
    pub fn new(limit: u32) -> Self {
        Self {
            contracts: Resource::Loading,
            filter: StatusFilter::All,
            page: Page::first(limit),
            has_more: false,
            load_more_error: None,
        }
    }

    pub fn visible(&self) -> Vec<&Contract> {
        match self.contracts.ready() {
            Some(list) => list.iter().filter(|c| self.filter.matches(c)).collect(),
            None => Vec::new(),
        }
    }

    /// Moves to the next page. The caller refetches when this returns true.
    pub fn load_more(&mut self) -> bool {
        if !self.has_more || self.contracts.ready().is_none() {
            return false;
        }
        self.page.page += 1;
        true
    }
}

impl ViewModel for ContractListView {
    type Payload = (Page, Vec<Contract>);

    fn fetch(&self, api: SharedApi) -> Option<FetchFuture<Self::Payload>> {
        let page = self.page;
        Some(Box::pin(async move { api.list_contracts(page).await.map(|items| (page, items)) }))
    }

    fn channel(&self) -> Option<Channel> {
        Some(Channel::ContractList)
    }

    fn begin_fetch(&mut self) {
        if self.page.page <= 1 {
            self.contracts = Resource::Loading;
        }
        self.load_more_error = None;
    }

    fn apply_fetch(&mut self, result: Result<Self::Payload, ClientError>) {
        match result {
            Ok((page, items)) => {
                self.has_more = items.len() as u32 >= page.limit && page.limit > 0;
                if page.page > 1 {
                    if let Some(list) = self.contracts.ready_mut() {
                        append_page(list, items);
                        return;
                    }
                }
                self.contracts = Resource::Ready(items);
            }
            Err(e) if self.page.page > 1 && self.contracts.ready().is_some() => {
                self.load_more_error = Some(e.describe("load more contracts"));
            }
            Err(e) => self.contracts = Resource::Failed(e.describe("fetch contracts")),
        }
    }

    fn apply_event(&mut self, event: PushEvent) -> Result<Outcome, ClientError> {
        let Some(list) = self.contracts.ready_mut() else {
            return Ok(Outcome::Ignored);
        };
        match event {
            PushEvent::ContractUpdate(fields) | PushEvent::Replace(fields) => upsert_fields(list, &fields),
            PushEvent::MilestoneUpdate { contract_id: Some(contract_id), milestone } => {
                match list.iter_mut().find(|c| c.id == contract_id) {
                    Some(contract) => Ok(upsert_tail(&mut contract.milestones, milestone)),
                    None => Ok(Outcome::Ignored),
                }
            }
            _ => Ok(Outcome::Ignored),
        }
    }
}

/// One contract with its milestones, fed by `/contracts/:id/updates`.
#[derive(Debug, Clone)]
pub struct ContractDetailView {
    pub id: String,
    pub contract: Resource<Contract>,
}

impl ContractDetailView {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), contract: Resource::Loading }
    }

    pub fn milestone(&self, milestone_id: &str) -> Option<&Milestone> {
        self.contract.ready().and_then(|c| c.milestone(milestone_id))
    }

    /// Local patch after a successful approve.
    pub fn mark_approved(&mut self, milestone_id: &str) -> bool {
        let Some(contract) = self.contract.ready_mut() else {
            return false;
        };
        match contract.milestones.iter_mut().find(|m| m.id == milestone_id) {
            Some(milestone) => {
                milestone.status = milestone.status.advance(MilestoneStatus::Approved);
                true
            }
            None => false,
        }
    }

    fn is_other_contract(&self, fields: &Map<String, Value>) -> bool {
        matches!(fields.get("id").and_then(Value::as_str), Some(id) if id != self.id)
    }
}

impl ViewModel for ContractDetailView {
    type Payload = Contract;

    fn fetch(&self, api: SharedApi) -> Option<FetchFuture<Contract>> {
        let id = self.id.clone();
        Some(Box::pin(async move { api.get_contract(&id).await }))
    }

    fn channel(&self) -> Option<Channel> {
        Some(Channel::ContractDetail(self.id.clone()))
    }

    /// A contract already on screen stays there while it is read again.
    fn begin_fetch(&mut self) {
        if self.contract.ready().is_none() {
            self.contract = Resource::Loading;
        }
    }

    fn apply_fetch(&mut self, result: Result<Contract, ClientError>) {
        // Held state came from a push or an earlier read: the answer may be
        // older than it, so it is settled against it instead of replacing it.
        if let Some(current) = self.contract.ready_mut() {
            match result {
                Ok(mut fetched) => {
                    fetched.settle(current);
                    *current = fetched;
                }
                Err(e) => warn!("[VIEW] Keeping contract {} after failed read: {}", self.id, e),
            }
            return;
        }
        self.contract = Resource::from_result(result, "fetch contract");
    }

    fn apply_event(&mut self, event: PushEvent) -> Result<Outcome, ClientError> {
        match event {
            PushEvent::ContractUpdate(fields) | PushEvent::Replace(fields) => {
                if self.is_other_contract(&fields) {
                    return Ok(Outcome::Ignored);
                }
                match self.contract.ready_mut() {
                    Some(current) => {
                        *current = merge_fields(current, &fields)?;
                        Ok(Outcome::Updated)
                    }
                    // A complete contract pushed before the read answered.
                    None => {
                        let contract: Contract = serde_json::from_value(Value::Object(fields))
                            .map_err(|e| ClientError::PushPayload(format!("incomplete contract: {}", e)))?;
                        self.contract = Resource::Ready(contract);
                        Ok(Outcome::Inserted)
                    }
                }
            }
            PushEvent::MilestoneUpdate { contract_id, milestone } => {
                if contract_id.is_some_and(|id| id != self.id) {
                    return Ok(Outcome::Ignored);
                }
                match self.contract.ready_mut() {
                    Some(contract) => Ok(upsert_tail(&mut contract.milestones, milestone)),
                    None => Ok(Outcome::Ignored),
                }
            }
            _ => Ok(Outcome::Ignored),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contract(id: &str, status: &str) -> Contract {
        serde_json::from_value(json!({
            "id": id, "title": format!("Contract {}", id), "status": status,
            "milestones": [{"id": "m1", "title": "Wireframes", "status": "submitted"}]
        }))
        .unwrap()
    }

    fn fields(value: serde_json::Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn filter_and_pagination() {
        let mut view = ContractListView::new(2);
        view.apply_fetch(Ok((Page::first(2), vec![contract("c1", "active"), contract("c2", "pending")])));
        assert!(view.has_more);

        view.filter = "active".parse().unwrap();
        assert_eq!(view.visible().len(), 1);

        assert!(view.load_more());
        view.begin_fetch();
        view.apply_fetch(Ok((view.page, vec![contract("c3", "active")])));
        assert!(!view.has_more);
        assert_eq!(view.visible().len(), 2);
        assert_eq!(view.contracts.ready().map(Vec::len), Some(3));
        assert!(!view.load_more());
    }

    #[test]
    fn later_page_failure_keeps_loaded_rows() {
        let mut view = ContractListView::new(1);
        view.apply_fetch(Ok((Page::first(1), vec![contract("c1", "active")])));
        assert!(view.load_more());
        view.begin_fetch();
        view.apply_fetch(Err(ClientError::Transport("reset".into())));
        assert_eq!(view.contracts.ready().map(Vec::len), Some(1));
        assert_eq!(view.load_more_error.as_deref(), Some("Failed to load more contracts: Network error: reset"));
    }

    #[test]
    fn list_upserts_by_id() {
        let mut view = ContractListView::new(20);
        view.apply_fetch(Ok((Page::first(20), vec![contract("c1", "active")])));

        let outcome = view
            .apply_event(PushEvent::ContractUpdate(fields(json!({"id": "c1", "status": "completed"}))))
            .unwrap();
        assert_eq!(outcome, Outcome::Updated);
        assert_eq!(view.contracts.ready().unwrap()[0].status, ContractStatus::Completed);

        let outcome = view
            .apply_event(PushEvent::ContractUpdate(fields(json!({"id": "c2", "title": "New", "status": "pending"}))))
            .unwrap();
        assert_eq!(outcome, Outcome::Inserted);
        assert_eq!(view.contracts.ready().unwrap()[0].id, "c2");
    }

    #[test]
    fn events_before_load_are_ignored() {
        let mut view = ContractListView::new(20);
        let outcome = view.apply_event(PushEvent::ContractUpdate(fields(json!({"id": "c1"})))).unwrap();
        assert_eq!(outcome, Outcome::Ignored);
        assert!(view.contracts.is_loading());
    }

    #[test]
    fn detail_merges_milestones_without_regressing() {
        let mut view = ContractDetailView::new("c1");
        view.apply_fetch(Ok(contract("c1", "active")));
        assert!(view.mark_approved("m1"));

        let stale = Milestone { id: "m1".into(), title: "Wireframes".into(), status: MilestoneStatus::Submitted, created_at: None };
        view.apply_event(PushEvent::MilestoneUpdate { contract_id: Some("c1".into()), milestone: stale }).unwrap();
        assert_eq!(view.milestone("m1").map(|m| m.status), Some(MilestoneStatus::Approved));

        let added = Milestone { id: "m2".into(), title: "Build".into(), status: MilestoneStatus::Pending, created_at: None };
        let outcome = view.apply_event(PushEvent::MilestoneUpdate { contract_id: None, milestone: added }).unwrap();
        assert_eq!(outcome, Outcome::Inserted);
        assert_eq!(view.contract.ready().unwrap().milestones.last().map(|m| m.id.as_str()), Some("m2"));
    }

    #[test]
    fn detail_ignores_other_contracts_and_adopts_early_replace() {
        let mut view = ContractDetailView::new("c1");
        let early = fields(json!({"id": "c1", "title": "Logo", "status": "pending"}));
        assert_eq!(view.apply_event(PushEvent::Replace(early)).unwrap(), Outcome::Inserted);

        let other = fields(json!({"id": "c2", "status": "completed"}));
        assert_eq!(view.apply_event(PushEvent::ContractUpdate(other)).unwrap(), Outcome::Ignored);
        assert_eq!(view.contract.ready().unwrap().status, ContractStatus::Pending);
    }

    #[test]
    fn read_after_early_push_cannot_regress_it() {
        let mut view = ContractDetailView::new("c1");
        let pushed = fields(json!({
            "id": "c1", "title": "Logo", "status": "completed",
            "milestones": [{"id": "m1", "title": "Wireframes", "status": "approved"}]
        }));
        view.apply_event(PushEvent::Replace(pushed)).unwrap();

        view.begin_fetch();
        assert!(view.contract.ready().is_some());
        view.apply_fetch(Ok(contract("c1", "active")));
        assert_eq!(view.contract.ready().unwrap().status, ContractStatus::Completed);
        assert_eq!(view.milestone("m1").map(|m| m.status), Some(MilestoneStatus::Approved));

        view.apply_fetch(Err(ClientError::Transport("reset".into())));
        assert_eq!(view.contract.ready().unwrap().status, ContractStatus::Completed);
        assert_eq!(view.contract.error(), None);
    }

    #[test]
    fn failed_first_read_is_reported() {
        let mut view = ContractDetailView::new("c1");
        view.apply_fetch(Err(ClientError::Transport("reset".into())));
        assert_eq!(view.contract.error(), Some("Failed to fetch contract: Network error: reset"));
    }
}
