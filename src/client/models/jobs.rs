use crate::client::models::reconciler::{upsert, Outcome};
use crate::client::models::view_state::{FetchFuture, Resource, ViewModel};
use crate::client::services::api_client::SharedApi;
use crate::client::services::websocket_client::Channel;
use crate::common::models::{Bid, Job};
use crate::common::protocol::PushEvent;
use crate::error::ClientError;

/// Browse page. No push channel; the list is as fresh as the last read.
#[derive(Debug, Clone, Default)]
pub struct JobBoardView {
    pub jobs: Resource<Vec<Job>>,
    pub query: String,
}

impl JobBoardView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive match on title or description.
    pub fn visible(&self) -> Vec<&Job> {
        let Some(jobs) = self.jobs.ready() else {
            return Vec::new();
        };
        let needle = self.query.trim().to_lowercase();
        jobs.iter()
            .filter(|job| {
                needle.is_empty()
                    || job.title.to_lowercase().contains(&needle)
                    || job.description.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn prepend(&mut self, job: Job) -> Outcome {
        match self.jobs.ready_mut() {
            Some(jobs) => upsert(jobs, job),
            None => Outcome::Ignored,
        }
    }
}

impl ViewModel for JobBoardView {
    type Payload = Vec<Job>;

    fn fetch(&self, api: SharedApi) -> Option<FetchFuture<Vec<Job>>> {
        Some(Box::pin(async move { api.list_jobs().await }))
    }

    fn channel(&self) -> Option<Channel> {
        None
    }

    fn begin_fetch(&mut self) {
        self.jobs = Resource::Loading;
    }

    fn apply_fetch(&mut self, result: Result<Vec<Job>, ClientError>) {
        self.jobs = Resource::from_result(result, "fetch jobs");
    }

    fn apply_event(&mut self, _event: PushEvent) -> Result<Outcome, ClientError> {
        Ok(Outcome::Ignored)
    }
}

#[derive(Debug, Clone)]
pub struct JobDetailView {
    pub id: String,
    pub job: Resource<Job>,
    /// Set once this user's bid went through.
    pub submitted_bid: Option<Bid>,
}

impl JobDetailView {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), job: Resource::Loading, submitted_bid: None }
    }
}

impl ViewModel for JobDetailView {
    type Payload = Job;

    fn fetch(&self, api: SharedApi) -> Option<FetchFuture<Job>> {
        let id = self.id.clone();
        Some(Box::pin(async move { api.get_job(&id).await }))
    }

    fn channel(&self) -> Option<Channel> {
        None
    }

    fn begin_fetch(&mut self) {
        self.job = Resource::Loading;
    }

    fn apply_fetch(&mut self, result: Result<Job, ClientError>) {
        self.job = Resource::from_result(result, "fetch job");
    }

    fn apply_event(&mut self, _event: PushEvent) -> Result<Outcome, ClientError> {
        Ok(Outcome::Ignored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str, title: &str, description: &str) -> Job {
        Job {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            budget: None,
            skills: None,
            client_id: None,
        }
    }

    #[test]
    fn search_matches_title_or_description_ignoring_case() {
        let mut view = JobBoardView::new();
        view.apply_fetch(Ok(vec![
            job("j1", "Logo design", "Vector logo for a bakery"),
            job("j2", "Rust backend", "Axum service"),
            job("j3", "Landing page", "Needs a LOGO too"),
        ]));
        view.query = "logo".into();
        let ids: Vec<_> = view.visible().iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["j1", "j3"]);

        view.query = "  ".into();
        assert_eq!(view.visible().len(), 3);
    }

    #[test]
    fn posted_job_goes_first() {
        let mut view = JobBoardView::new();
        view.apply_fetch(Ok(vec![job("j1", "Logo design", "")]));
        assert_eq!(view.prepend(job("j2", "Copywriting", "")), Outcome::Inserted);
        assert_eq!(view.jobs.ready().unwrap()[0].id, "j2");
    }
}
