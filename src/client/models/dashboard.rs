use log::warn;

use crate::client::models::reconciler::{overlay, Outcome};
use crate::client::models::view_state::{FetchFuture, Resource, ViewModel};
use crate::client::services::api_client::SharedApi;
use crate::client::services::websocket_client::Channel;
use crate::common::models::{Activity, Analytics, Role};
use crate::common::protocol::PushEvent;
use crate::error::ClientError;

pub const ACTIVITY_FEED_LEN: usize = 5;

/// Client or freelancer overview. Mounted for a user of the other role it
/// neither reads nor subscribes.
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub role: Role,
    viewer: Option<Role>,
    pub analytics: Resource<Analytics>,
}

impl DashboardView {
    pub fn new(role: Role, viewer: Option<Role>) -> Self {
        Self { role, viewer, analytics: Resource::Loading }
    }

    pub fn is_authorized(&self) -> bool {
        self.viewer == Some(self.role)
    }

    fn push_activity(analytics: &mut Analytics, activity: Activity) {
        analytics.recent_activity.retain(|a| a.id != activity.id);
        analytics.recent_activity.insert(0, activity);
        analytics.recent_activity.truncate(ACTIVITY_FEED_LEN);
    }
}

impl ViewModel for DashboardView {
    type Payload = Analytics;

    fn fetch(&self, api: SharedApi) -> Option<FetchFuture<Analytics>> {
        if !self.is_authorized() {
            return None;
        }
        let role = self.role;
        Some(Box::pin(async move { api.get_analytics(role).await }))
    }

    fn channel(&self) -> Option<Channel> {
        match (self.is_authorized(), self.role) {
            (false, _) => None,
            (true, Role::Client) => Some(Channel::ClientAnalytics),
            (true, Role::Freelancer) => Some(Channel::FreelancerAnalytics),
        }
    }

    fn begin_fetch(&mut self) {
        if self.is_authorized() {
            self.analytics = Resource::Loading;
        }
    }

    /// A failed read starts the dashboard from zeroed counters so the push
    /// channel can still fill it in.
    fn apply_fetch(&mut self, result: Result<Analytics, ClientError>) {
        let mut analytics = result.unwrap_or_else(|e| {
            warn!("[VIEW] No {} analytics snapshot, starting empty: {}", self.role.as_str(), e);
            Analytics::default()
        });
        analytics.recent_activity.truncate(ACTIVITY_FEED_LEN);
        self.analytics = Resource::Ready(analytics);
    }

    fn apply_event(&mut self, event: PushEvent) -> Result<Outcome, ClientError> {
        let Some(analytics) = self.analytics.ready_mut() else {
            return Ok(Outcome::Ignored);
        };
        match event {
            PushEvent::Analytics(fields) | PushEvent::Replace(fields) => {
                let mut next: Analytics = overlay(analytics, &fields)?;
                next.recent_activity.truncate(ACTIVITY_FEED_LEN);
                *analytics = next;
                Ok(Outcome::Updated)
            }
            PushEvent::Activity(activity) => {
                Self::push_activity(analytics, activity);
                Ok(Outcome::Inserted)
            }
            _ => Ok(Outcome::Ignored),
        }
    }
}
